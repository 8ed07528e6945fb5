use crate::client::{Client, handle_client};
use crate::config::ServerConfig;
use crate::messages::{Admission, ServerToClient, SessionMessage};
use crate::session::{SessionSnapshot, session_task};
use anyhow::Context;
use socket2::{SockRef, TcpKeepalive};
use std::future::Future;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::io::AsyncWriteExt;
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::{mpsc, oneshot};
use tracing::{debug, error, info, warn};
use uuid::Uuid;

/// Cheap handle for asking the running session about its state.
#[derive(Debug, Clone)]
pub struct SessionHandle {
    tx: mpsc::UnboundedSender<SessionMessage>,
}

impl SessionHandle {
    pub async fn snapshot(&self) -> anyhow::Result<SessionSnapshot> {
        let (respond_to, rx) = oneshot::channel();
        self.tx
            .send(SessionMessage::Snapshot { respond_to })
            .context("session task is not running")?;
        rx.await.context("session task dropped the snapshot request")
    }
}

pub async fn bind(config: &ServerConfig) -> anyhow::Result<TcpListener> {
    let addr = config.socket_addr()?;
    TcpListener::bind(addr)
        .await
        .with_context(|| format!("failed to bind {addr}"))
}

/// Spawns the session task and returns the sender the listener feeds.
pub fn start_session(config: &ServerConfig) -> SessionHandle {
    let (tx, rx) = mpsc::unbounded_channel::<SessionMessage>();
    tokio::spawn(session_task(rx, config.occupied_cell_policy));
    SessionHandle { tx }
}

/// Accepts connections until `shutdown` resolves.
pub async fn serve<F>(
    listener: TcpListener,
    session: SessionHandle,
    config: ServerConfig,
    shutdown: F,
) -> anyhow::Result<()>
where
    F: Future<Output = ()>,
{
    info!("Server listening on {}", listener.local_addr()?);
    tokio::pin!(shutdown);

    loop {
        let (socket, addr) = tokio::select! {
            accepted = listener.accept() => match accepted {
                Ok(pair) => pair,
                Err(e) => {
                    error!("Error in server socket: {}", e);
                    continue;
                }
            },
            _ = &mut shutdown => break,
        };
        admit(socket, addr, &session, &config).await?;
    }

    info!("Server stopped");
    Ok(())
}

/// Asks the session for a seat before accepting the next socket, so seats
/// follow arrival order.
async fn admit(
    socket: TcpStream,
    addr: SocketAddr,
    session: &SessionHandle,
    config: &ServerConfig,
) -> anyhow::Result<()> {
    let keepalive = TcpKeepalive::new()
        .with_time(Duration::from_secs(config.keepalive_time_secs))
        .with_interval(Duration::from_secs(config.keepalive_interval_secs));
    let sf = SockRef::from(&socket);
    if let Err(e) = sf.set_tcp_keepalive(&keepalive) {
        debug!("Could not set keepalive for {}: {}", addr, e);
    }

    let conn_id = Uuid::new_v4();
    let (writer_tx, writer_rx) = mpsc::channel::<Arc<ServerToClient>>(config.outbound_buffer);
    let (respond_to, admission) = oneshot::channel();
    session
        .tx
        .send(SessionMessage::Admit {
            conn_id,
            outbound: writer_tx,
            respond_to,
        })
        .context("session task is not running")?;
    let admission = admission
        .await
        .context("session task dropped the admission request")?;

    match admission {
        Admission::Seated(seat) => {
            let (reader, writer) = socket.into_split();
            let client = Client {
                conn_id,
                seat,
                addr,
            };
            tokio::spawn(handle_client(
                client,
                reader,
                writer,
                writer_rx,
                session.tx.clone(),
                config.max_line_bytes,
                Duration::from_millis(config.drain_timeout_ms),
            ));
        }
        Admission::Busy => {
            tokio::spawn(reject_busy(socket, addr));
        }
    }
    Ok(())
}

async fn reject_busy(mut socket: TcpStream, addr: SocketAddr) {
    let line = format!("{}\n", ServerToClient::Busy);
    if let Err(e) = socket.write_all(line.as_bytes()).await {
        warn!("Could not send BUSY to {}: {}", addr, e);
    }
    let _ = socket.shutdown().await;
    debug!("Rejected {} (busy)", addr);
}
