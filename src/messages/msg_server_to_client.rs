use std::fmt;
use std::str::FromStr;

use crate::session::{Position, Seat};

// Server to Client lines
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ServerToClient {
    /// First line on every admitted connection.
    Id(Seat),
    Move { seat: Seat, pos: Position },
    Win(Seat),
    Draw,
    Quit(Seat),
    /// Not your turn, or no opponent yet.
    Wait,
    /// Both seats are taken; the connection is closed right after.
    Busy,
    /// The requested cell already holds a mark.
    Occupied(Position),
    /// Protocol violation; the connection is closed right after.
    Error(String),
}

impl ServerToClient {
    pub fn error(message: impl Into<String>) -> Self {
        // Keep the reason on one line.
        let message: String = message.into();
        Self::Error(message.replace(['\r', '\n'], " "))
    }

    /// Outcome lines after which the board is reset.
    pub fn ends_round(&self) -> bool {
        matches!(self, Self::Win(_) | Self::Draw | Self::Quit(_))
    }
}

impl fmt::Display for ServerToClient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Id(seat) => write!(f, "ID {seat}"),
            Self::Move { seat, pos } => write!(f, "MOVE {seat} {} {}", pos.row(), pos.col()),
            Self::Win(seat) => write!(f, "WIN {seat}"),
            Self::Draw => write!(f, "DRAW"),
            Self::Quit(seat) => write!(f, "QUIT {seat}"),
            Self::Wait => write!(f, "WAIT"),
            Self::Busy => write!(f, "BUSY"),
            Self::Occupied(pos) => write!(f, "OCCUPIED {} {}", pos.row(), pos.col()),
            Self::Error(message) => write!(f, "ERROR {message}"),
        }
    }
}

/// Returned when a server line cannot be understood by a client.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unrecognised server line '{0}'")]
pub struct UnknownServerLine(pub String);

impl FromStr for ServerToClient {
    type Err = UnknownServerLine;

    fn from_str(line: &str) -> Result<Self, Self::Err> {
        let line = line.trim_end_matches(['\r', '\n']);
        let unknown = || UnknownServerLine(line.to_string());
        let number = |raw: Option<&str>| raw.and_then(|s| s.parse::<u8>().ok());
        let seat = |raw: Option<&str>| number(raw).and_then(Seat::from_number);
        let position = |r: Option<&str>, c: Option<&str>| -> Option<Position> {
            Position::new(number(r)?, number(c)?)
        };

        if let Some(message) = line.strip_prefix("ERROR ") {
            return Ok(Self::Error(message.to_string()));
        }

        let parts: Vec<&str> = line.split_whitespace().collect();
        let arg = |i: usize| parts.get(i).copied();
        let parsed = match (arg(0), parts.len()) {
            (Some("ID"), 2) => seat(arg(1)).map(Self::Id),
            (Some("MOVE"), 4) => seat(arg(1))
                .zip(position(arg(2), arg(3)))
                .map(|(seat, pos)| Self::Move { seat, pos }),
            (Some("WIN"), 2) => seat(arg(1)).map(Self::Win),
            (Some("DRAW"), 1) => Some(Self::Draw),
            (Some("QUIT"), 2) => seat(arg(1)).map(Self::Quit),
            (Some("WAIT"), 1) => Some(Self::Wait),
            (Some("BUSY"), 1) => Some(Self::Busy),
            (Some("OCCUPIED"), 3) => position(arg(1), arg(2)).map(Self::Occupied),
            (Some("ERROR"), 1) => Some(Self::Error(String::new())),
            _ => None,
        };
        parsed.ok_or_else(unknown)
    }
}
