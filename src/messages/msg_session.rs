use std::sync::Arc;
use tokio::sync::{mpsc, oneshot};
use uuid::Uuid;

use crate::{
    messages::{ClientToServer, ServerToClient},
    session::{Seat, SessionSnapshot},
};

pub type Outbound = mpsc::Sender<Arc<ServerToClient>>;

/// Reply to an admission request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Admission {
    Seated(Seat),
    Busy,
}

#[derive(Debug)]
pub enum SessionMessage {
    /// The listener accepted a socket and wants a seat for it
    Admit {
        conn_id: Uuid,
        outbound: Outbound,
        respond_to: oneshot::Sender<Admission>,
    },
    /// A parsed command from a seated connection
    Command {
        seat: Seat,
        conn_id: Uuid,
        command: ClientToServer,
    },
    /// The connection sent a line that is not part of the protocol
    ProtocolViolation {
        seat: Seat,
        conn_id: Uuid,
        reason: String,
    },
    /// Stream closed or failed without a QUIT
    Disconnected { seat: Seat, conn_id: Uuid },

    Snapshot {
        respond_to: oneshot::Sender<SessionSnapshot>,
    },
}

impl SessionMessage {
    pub fn command(seat: Seat, conn_id: Uuid, command: ClientToServer) -> Self {
        Self::Command {
            seat,
            conn_id,
            command,
        }
    }
}
