use clap::Parser;
use tokio::signal;
use tracing_subscriber::EnvFilter;

use ttt_server::server::GameServer;
use ttt_server::wire::DEFAULT_PORT;

/// Arbitrates one game of tic-tac-toe between two network clients.
#[derive(Debug, Parser)]
#[command(version, about)]
struct Cli {
    /// Port to listen on; 12345 is used if absent or unparsable
    port: Option<String>,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let cli = Cli::parse();
    let port = cli
        .port
        .and_then(|port| port.parse().ok())
        .unwrap_or(DEFAULT_PORT);
    let addr = format!("[::]:{}", port).parse()?;

    let server = GameServer::bind(addr).await?;
    tracing::info!(addr = %server.local_addr()?, "listening for connections");

    let token = server.cancellation_token();
    tokio::spawn(async move {
        if let Err(err) = signal::ctrl_c().await {
            tracing::warn!(%err, "unable to listen for shutdown signal");
        }
        token.cancel();
    });

    server.run().await?;
    Ok(())
}
