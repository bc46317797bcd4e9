//! Interactive shell helpers for the docwire client.
//!
//! Each line typed at the prompt is either a dot-command or a JSON filter:
//!
//! - `.exit`: leave the shell.
//! - `.take N`: stop every following query after `N` documents; `.take` alone removes the cap.
//! - anything else: a JSON object used as the filter of a find.
//!
//! # Example
//! ```rust
//! use docwire::{cli::Command, doc};
//!
//! let cmd: Command = r#"{"age": 41}"#.try_into().unwrap();
//! assert_eq!(cmd, Command::Find(doc! { "age" => 41 }));
//! ```
use std::io::{self, BufRead, Write};

use thiserror::Error;

use crate::{document::Document, value::ValueError};

#[derive(Debug, Error)]
pub enum CommandError {
    #[error("unrecognized command '{0}'")]
    UnrecognizedCommand(String),

    #[error("invalid '{command}' command, {reason}")]
    InvalidCommandArguments { command: String, reason: String },

    #[error("invalid filter, {0}")]
    InvalidFilter(#[from] ValueError),

    #[error("no command provided")]
    Empty,

    #[error(transparent)]
    Io(#[from] io::Error),
}

/// Possible commands from a user.
#[derive(Debug, Clone, PartialEq)]
pub enum Command {
    /// Exit command `.exit`
    Exit,
    /// Result cap for later queries, `None` for unbounded.
    Take(Option<usize>),
    /// Filter to run against the current namespace.
    Find(Document),
}

impl TryFrom<&str> for Command {
    type Error = CommandError;

    fn try_from(line: &str) -> Result<Self, Self::Error> {
        match line.trim() {
            "" => Err(CommandError::Empty),
            ".exit" => Ok(Command::Exit),
            ".take" => Ok(Command::Take(None)),
            s if s.starts_with(".take ") => {
                let arg = s[".take ".len()..].trim();
                arg.parse()
                    .map(|n| Command::Take(Some(n)))
                    .map_err(|_| CommandError::InvalidCommandArguments {
                        command: ".take".to_string(),
                        reason: format!("'{arg}' is not a document count"),
                    })
            }
            s if s.starts_with('.') => Err(CommandError::UnrecognizedCommand(s.to_string())),
            s => Ok(Command::Find(Document::parse_json(s)?)),
        }
    }
}

/// Prompts for and parses one command. End of input reads as [`Command::Exit`].
pub fn prompt<R, W>(mut reader: R, mut writer: W) -> Result<Command, CommandError>
where
    R: BufRead,
    W: Write,
{
    write!(&mut writer, "> ")?;
    writer.flush()?;

    let mut line = String::new();
    if reader.read_line(&mut line)? == 0 {
        return Ok(Command::Exit);
    }
    line.as_str().try_into()
}

#[cfg(test)]
mod tests {
    use crate::doc;

    use super::*;

    #[test]
    fn prompt_prints_correctly() {
        let input = b".exit\n";
        let mut output = Vec::new();

        prompt(&input[..], &mut output).unwrap();

        let output = String::from_utf8(output).expect("not valid UTF-8");
        assert_eq!("> ", output);
    }

    #[test]
    fn prompt_handles_filters() {
        let input = b"{\"name\": \"ada\", \"age\": {\"$gt\": 30}}\n";
        let mut output = Vec::new();

        let res = prompt(&input[..], &mut output).unwrap();
        assert_eq!(
            Command::Find(doc! { "name" => "ada", "age" => doc! { "$gt" => 30 } }),
            res
        );
    }

    #[test]
    fn end_of_input_exits() {
        let mut output = Vec::new();
        assert_eq!(prompt(&b""[..], &mut output).unwrap(), Command::Exit);
    }

    #[test]
    fn take_command() {
        assert_eq!(
            Command::try_from(".take 25").unwrap(),
            Command::Take(Some(25))
        );
        assert_eq!(Command::try_from(".take").unwrap(), Command::Take(None));
        assert!(matches!(
            Command::try_from(".take many"),
            Err(CommandError::InvalidCommandArguments { .. })
        ));
    }

    #[test]
    fn filter_must_be_an_object() {
        assert!(matches!(
            Command::try_from("[1, 2]"),
            Err(CommandError::InvalidFilter(_))
        ));
        assert!(matches!(
            Command::try_from("{nope"),
            Err(CommandError::InvalidFilter(_))
        ));
    }

    #[test]
    fn prompt_unrecognized_command() {
        let input = b".something_wrong\n";
        let mut output = Vec::new();

        let err = prompt(&input[..], &mut output).unwrap_err();
        assert_eq!(err.to_string(), "unrecognized command '.something_wrong'");
    }

    #[test]
    fn blank_line_is_empty() {
        let mut output = Vec::new();
        assert!(matches!(
            prompt(&b"   \n"[..], &mut output),
            Err(CommandError::Empty)
        ));
    }
}
