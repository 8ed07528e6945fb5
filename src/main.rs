use anyhow::Context;
use tictactoe_server::{ServerConfig, bind, serve, start_session};
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

/// Entry point: loads config, binds the port and serves until Ctrl-C
#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = ServerConfig::load().context("failed to load configuration")?;

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new(&config.log_level)),
        )
        .init();
    info!("Server initializing");

    let listener = bind(&config).await?;
    let session = start_session(&config);

    let shutdown = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!("Failed to listen for Ctrl-C: {}", e);
            std::future::pending::<()>().await;
        }
    };

    serve(listener, session, config, shutdown).await
}
