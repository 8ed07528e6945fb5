use crate::messages::{ClientToServer, ServerToClient, SessionMessage};
use crate::session::Seat;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, AsyncReadExt, AsyncWriteExt};
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio::sync::mpsc;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

/// Identity of an admitted connection.
#[derive(Debug, Clone, Copy)]
pub struct Client {
    pub conn_id: Uuid,
    pub seat: Seat,
    pub addr: SocketAddr,
}

/// How the read loop ended.
#[derive(Debug, Clone, PartialEq, Eq)]
enum Exit {
    Quit,
    Violation(String),
    Closed,
}

impl Client {
    fn send_to_session(
        &self,
        session_tx: &mpsc::UnboundedSender<SessionMessage>,
        message: SessionMessage,
    ) {
        if session_tx.send(message).is_err() {
            error!("Session task is gone, dropping message from player {}", self.seat);
        }
    }
}

/// Runs one seated connection until it quits, breaks the protocol or goes
/// away. The session already holds the sending end of `writer_rx` and has
/// queued the `ID` line on it.
pub async fn handle_client(
    client: Client,
    socket_reader: OwnedReadHalf,
    socket_writer: OwnedWriteHalf,
    writer_rx: mpsc::Receiver<Arc<ServerToClient>>,
    session_tx: mpsc::UnboundedSender<SessionMessage>,
    max_line_bytes: usize,
    drain_timeout: Duration,
) {
    info!(
        "Player {} ({}) connected from {}",
        client.seat, client.conn_id, client.addr
    );

    let mut write_task = tokio::spawn(handle_client_writer(socket_writer, writer_rx, client));

    let mut reader = tokio::io::BufReader::new(socket_reader);
    let mut buf = Vec::new();

    let exit = loop {
        buf.clear();
        let mut limited = (&mut reader).take(max_line_bytes as u64);
        tokio::select! {
            read = limited.read_until(b'\n', &mut buf) => match read {
                Ok(0) => {
                    info!("Player {} ({}) closed the connection", client.seat, client.conn_id);
                    break Exit::Closed;
                }
                Ok(_) => {
                    if !buf.ends_with(b"\n") && buf.len() >= max_line_bytes {
                        warn!("Player {} sent a line over {} bytes", client.seat, max_line_bytes);
                        break Exit::Violation(format!("line exceeds {max_line_bytes} bytes"));
                    }
                    let Ok(line) = std::str::from_utf8(&buf) else {
                        warn!("Bad line from {}: {:?}", client.addr, String::from_utf8_lossy(&buf));
                        break Exit::Violation("line is not valid UTF-8".into());
                    };
                    if line.trim().is_empty() {
                        continue;
                    }
                    match line.parse::<ClientToServer>() {
                        Ok(command) => {
                            client.send_to_session(
                                &session_tx,
                                SessionMessage::command(client.seat, client.conn_id, command),
                            );
                            if command == ClientToServer::Quit {
                                break Exit::Quit;
                            }
                        }
                        Err(e) => {
                            warn!("Bad line from {}: {:?} ({})", client.addr, line.trim_end(), e);
                            break Exit::Violation(e.to_string());
                        }
                    }
                }
                Err(e) => {
                    error!("Player {} read error: {}", client.seat, e);
                    break Exit::Closed;
                }
            },
            // Writer stops on a failed write or once the session has dropped
            // this connection.
            _ = &mut write_task => {
                debug!("Player {} ({}) writer finished", client.seat, client.conn_id);
                break Exit::Closed;
            }
        }
    };

    match exit {
        Exit::Quit => {}
        Exit::Violation(reason) => client.send_to_session(
            &session_tx,
            SessionMessage::ProtocolViolation {
                seat: client.seat,
                conn_id: client.conn_id,
                reason,
            },
        ),
        Exit::Closed => client.send_to_session(
            &session_tx,
            SessionMessage::Disconnected {
                seat: client.seat,
                conn_id: client.conn_id,
            },
        ),
    }

    // Once the session releases the seat the channel closes and the writer
    // finishes flushing. Don't wait forever on a peer that stopped reading.
    if !write_task.is_finished()
        && tokio::time::timeout(drain_timeout, &mut write_task)
            .await
            .is_err()
    {
        warn!("Player {} writer did not drain in time", client.seat);
        write_task.abort();
    }

    debug!("Player {} ({}) cleanup complete", client.seat, client.conn_id);
}

/// Writes queued lines to the socket in order.
async fn handle_client_writer(
    mut writer: OwnedWriteHalf,
    mut rx: mpsc::Receiver<Arc<ServerToClient>>,
    client: Client,
) {
    while let Some(message) = rx.recv().await {
        let message_with_newline = format!("{}\n", message);
        if let Err(e) = writer.write_all(message_with_newline.as_bytes()).await {
            error!("Failed to write to player {}: {}", client.seat, e);
            return;
        }
        if message.ends_round() {
            debug!("Player {} told '{}'", client.seat, message);
        }
    }
    let _ = writer.shutdown().await;
}
