use super::state::{MoveResult, Session};
use crate::{config::OccupiedCellPolicy, messages::SessionMessage};
use tokio::sync::mpsc;
use tracing::{debug, info};

/// The one session task. Every message is handled to completion before the
/// next is received, so board updates and their broadcasts never interleave.
pub async fn session_task(
    mut rx: mpsc::UnboundedReceiver<SessionMessage>,
    occupied_policy: OccupiedCellPolicy,
) {
    let mut session = Session::new(occupied_policy);

    info!("Session started (occupied cells: {:?})", occupied_policy);

    while let Some(msg) = rx.recv().await {
        match msg {
            SessionMessage::Admit {
                conn_id,
                outbound,
                respond_to,
            } => {
                let admission = session.admit(conn_id, outbound);
                // The listener may have given up on this socket already;
                // the handler's disconnect then frees the seat.
                let _ = respond_to.send(admission);
            }
            SessionMessage::Command {
                seat,
                conn_id,
                command,
            } => {
                let result = session.handle_command(seat, conn_id, command);
                if matches!(result, Some(MoveResult::Won(_) | MoveResult::Draw)) {
                    debug!(
                        "Session after round: {}",
                        serde_json::to_string(&session.snapshot()).unwrap_or_default()
                    );
                }
            }
            SessionMessage::ProtocolViolation {
                seat,
                conn_id,
                reason,
            } => {
                session.handle_violation(seat, conn_id, &reason);
            }
            SessionMessage::Disconnected { seat, conn_id } => {
                session.handle_disconnect(seat, conn_id);
            }
            SessionMessage::Snapshot { respond_to } => {
                let _ = respond_to.send(session.snapshot());
            }
        }
    }
    debug!("Session task ended");
}
