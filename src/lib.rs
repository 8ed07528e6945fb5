//! Two-seat tic-tac-toe server speaking a newline-terminated text protocol.
//!
//! The listener seats at most two connections, a single session task owns
//! the board and turn order, and every accepted move is broadcast back to
//! both seats.

pub mod client;
pub mod config;
pub mod messages;
pub mod server;
pub mod session;

#[cfg(test)]
mod test_utils;

pub use config::{OccupiedCellPolicy, ServerConfig};
pub use messages::{ClientToServer, ServerToClient};
pub use server::{SessionHandle, bind, serve, start_session};
