//! Dotted field paths.
//!
//! `"a.b.c"` addresses field `c` of document `b` nested in document `a`. A path that starts with
//! [`LITERAL_MARKER`] names a single field verbatim, dots included, which is how identifiers such
//! as host names or file names are used as keys.

pub const SEPARATOR: char = '.';
pub const LITERAL_MARKER: char = '@';

/// Splits a path into its segments. Never returns an empty list.
pub fn split(path: &str) -> Vec<&str> {
    match path.strip_prefix(LITERAL_MARKER) {
        Some(literal) => vec![literal],
        None => path.split(SEPARATOR).collect(),
    }
}

/// Escapes `name` so that [`split`] returns it as a single segment.
pub fn literal(name: &str) -> String {
    format!("{LITERAL_MARKER}{name}")
}

pub fn is_literal(path: &str) -> bool {
    path.starts_with(LITERAL_MARKER)
}
