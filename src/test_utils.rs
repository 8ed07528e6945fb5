use crate::messages::ServerToClient;
use std::sync::Arc;
use tokio::sync::mpsc;

/// Everything currently queued on an outbound channel, in order.
pub fn drain(rx: &mut mpsc::Receiver<Arc<ServerToClient>>) -> Vec<ServerToClient> {
    let mut lines = Vec::new();
    while let Ok(line) = rx.try_recv() {
        lines.push((*line).clone());
    }
    lines
}
