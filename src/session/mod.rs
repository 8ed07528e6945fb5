pub mod board;
pub mod broadcaster;
pub mod state;
pub mod task;

pub use board::{Board, Cell, Outcome, Position, Seat};
pub use broadcaster::SeatBroadcaster;
pub use state::{MoveResult, Phase, Session, SessionSnapshot};
pub use task::session_task;
