//! Line protocol: one ASCII command per line, one reply line per command.
//!
//! ```text
//! CREATE <name>            -> OK
//! READ <name>              -> OK <payload>
//! WRITE <name> <payload>   -> OK
//! DELETE <name>            -> OK
//! LIST                     -> OK name1,name2,...
//! QUIT                     -> OK closing
//! ```
//!
//! Failures reply `ERROR: <reason>`.

use std::fmt;
use std::str::FromStr;
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Create { name: String },
    Read { name: String },
    Write { name: String, payload: String },
    Delete { name: String },
    List,
    Quit,
}

#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum ParseError {
    #[error("Unknown command")]
    Unknown,
    #[error("Malformed command")]
    Malformed,
}

impl FromStr for Command {
    type Err = ParseError;

    /// The verb is case-insensitive. The line splits on single spaces into at
    /// most three tokens, so a WRITE payload keeps its inner spaces.
    fn from_str(line: &str) -> Result<Self, Self::Err> {
        let mut parts = line.trim().splitn(3, ' ');
        let verb = parts.next().unwrap_or_default().to_ascii_uppercase();
        let name = parts.next().map(str::to_string);
        let payload = parts.next().map(str::to_string);

        let required = |arg: Option<String>| arg.ok_or(ParseError::Malformed);
        match verb.as_str() {
            "CREATE" => Ok(Self::Create { name: required(name)? }),
            "READ" => Ok(Self::Read { name: required(name)? }),
            "WRITE" => Ok(Self::Write {
                name: required(name)?,
                payload: required(payload)?,
            }),
            "DELETE" => Ok(Self::Delete { name: required(name)? }),
            "LIST" => Ok(Self::List),
            "QUIT" => Ok(Self::Quit),
            _ => Err(ParseError::Unknown),
        }
    }
}

impl Command {
    pub fn verb(&self) -> &'static str {
        match self {
            Self::Create { .. } => "CREATE",
            Self::Read { .. } => "READ",
            Self::Write { .. } => "WRITE",
            Self::Delete { .. } => "DELETE",
            Self::List => "LIST",
            Self::Quit => "QUIT",
        }
    }
}

/// One reply line, without the trailing newline.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Reply {
    Ok,
    /// `OK` followed by a space and the text, even when the text is empty.
    Data(String),
    Closing,
    Error(String),
}

impl fmt::Display for Reply {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Ok => f.write_str("OK"),
            Self::Data(text) => write!(f, "OK {text}"),
            Self::Closing => f.write_str("OK closing"),
            Self::Error(reason) => write!(f, "ERROR: {reason}"),
        }
    }
}
