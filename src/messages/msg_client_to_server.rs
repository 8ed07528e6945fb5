use std::fmt;
use std::str::FromStr;

use thiserror::Error;

use crate::session::Position;

/// Commands a participant may send, one per line.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClientToServer {
    Move(Position),
    Quit,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ProtocolError {
    #[error("unknown command '{0}'")]
    UnknownCommand(String),

    #[error("{command} is missing its {name} argument")]
    MissingArgument {
        command: &'static str,
        name: &'static str,
    },

    #[error("{command} takes no argument '{extra}'")]
    UnexpectedArgument { command: &'static str, extra: String },

    #[error("{name} '{value}' is not a number")]
    InvalidNumber { name: &'static str, value: String },

    #[error("{name} {value} is outside 0..=2")]
    OutOfRange { name: &'static str, value: u8 },
}

fn coordinate<'a>(
    parts: &mut impl Iterator<Item = &'a str>,
    name: &'static str,
) -> Result<u8, ProtocolError> {
    let raw = parts.next().ok_or(ProtocolError::MissingArgument {
        command: "MOVE",
        name,
    })?;
    let value = raw.parse::<u8>().map_err(|_| ProtocolError::InvalidNumber {
        name,
        value: raw.to_string(),
    })?;
    if value >= Position::SIZE {
        return Err(ProtocolError::OutOfRange { name, value });
    }
    Ok(value)
}

fn no_more<'a>(
    parts: &mut impl Iterator<Item = &'a str>,
    command: &'static str,
) -> Result<(), ProtocolError> {
    match parts.next() {
        Some(extra) => Err(ProtocolError::UnexpectedArgument {
            command,
            extra: extra.to_string(),
        }),
        None => Ok(()),
    }
}

impl FromStr for ClientToServer {
    type Err = ProtocolError;

    fn from_str(line: &str) -> Result<Self, Self::Err> {
        let mut parts = line.split_whitespace();
        match parts.next() {
            Some("MOVE") => {
                let row = coordinate(&mut parts, "row")?;
                let col = coordinate(&mut parts, "col")?;
                no_more(&mut parts, "MOVE")?;
                // Both axes were range-checked above.
                Position::new(row, col)
                    .map(ClientToServer::Move)
                    .ok_or(ProtocolError::OutOfRange { name: "row", value: row })
            }
            Some("QUIT") => {
                no_more(&mut parts, "QUIT")?;
                Ok(ClientToServer::Quit)
            }
            Some(other) => Err(ProtocolError::UnknownCommand(other.to_string())),
            None => Err(ProtocolError::UnknownCommand(String::new())),
        }
    }
}

impl fmt::Display for ClientToServer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ClientToServer::Move(pos) => write!(f, "MOVE {} {}", pos.row(), pos.col()),
            ClientToServer::Quit => write!(f, "QUIT"),
        }
    }
}
