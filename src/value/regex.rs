use std::fmt;

/// Option flags of a [`Regex`], written on the wire as a string of letters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RegexOptions {
    /// `i`
    pub case_insensitive: bool,
    /// `l`, locale dependent matching.
    pub locale: bool,
    /// `m`
    pub multiline: bool,
    /// `s`, `.` also matches newlines.
    pub dot_all: bool,
    /// `x`, whitespace in the pattern is ignored.
    pub extended: bool,
}

impl RegexOptions {
    /// Parses a flag string. Letters outside `ilmsx` are ignored.
    pub fn from_flags(flags: &str) -> Self {
        let mut options = Self::default();
        for flag in flags.chars() {
            match flag {
                'i' => options.case_insensitive = true,
                'l' => options.locale = true,
                'm' => options.multiline = true,
                's' => options.dot_all = true,
                'x' => options.extended = true,
                _ => {}
            }
        }
        options
    }

    /// Flag string in the canonical `ilmsx` order.
    pub fn to_flags(&self) -> String {
        [
            (self.case_insensitive, 'i'),
            (self.locale, 'l'),
            (self.multiline, 'm'),
            (self.dot_all, 's'),
            (self.extended, 'x'),
        ]
        .into_iter()
        .filter_map(|(set, flag)| set.then_some(flag))
        .collect()
    }
}

/// A regular expression as stored by the server; it is never compiled client side.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Regex {
    pub pattern: String,
    pub options: RegexOptions,
}

impl Regex {
    pub fn new(pattern: impl Into<String>) -> Self {
        Self::with_options(pattern, RegexOptions::default())
    }

    pub fn with_options(pattern: impl Into<String>, options: RegexOptions) -> Self {
        Self {
            pattern: pattern.into(),
            options,
        }
    }

    pub fn with_flags(pattern: impl Into<String>, flags: &str) -> Self {
        Self::with_options(pattern, RegexOptions::from_flags(flags))
    }
}

impl fmt::Display for Regex {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "/{}/{}", self.pattern, self.options.to_flags())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn flags_are_canonically_ordered() {
        let options = RegexOptions::from_flags("xsmi");
        assert_eq!(options.to_flags(), "imsx");
    }

    #[test]
    fn unknown_flags_are_ignored() {
        let options = RegexOptions::from_flags("iuq");
        assert!(options.case_insensitive);
        assert_eq!(options.to_flags(), "i");
    }

    #[test]
    fn display_uses_slash_form() {
        assert_eq!(Regex::with_flags("^ab+", "li").to_string(), "/^ab+/il");
    }
}
