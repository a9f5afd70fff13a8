//! Stormon Daemon Binary
//!
//! Serves the WebSocket event stream for a storage server.
//!
//! # Usage
//!
//! ```bash
//! stormon-daemon --port 8080
//! stormon-daemon --config /etc/stormon/config.toml --host 127.0.0.1
//! ```

use std::process::ExitCode;
use std::time::Duration;

use clap::Parser;
use tokio::net::TcpListener;
use tracing_subscriber::EnvFilter;

use stormon::cli::DaemonArgs;
use stormon::events::EventBus;
use stormon::heartbeat::spawn_heartbeat;
use stormon::socket_server::SocketServer;

const SHUTDOWN_GRACE: Duration = Duration::from_secs(2);

#[tokio::main]
async fn main() -> ExitCode {
    let args = DaemonArgs::parse();

    let config = match args.resolve_config() {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Error: {}", e);
            return e.exit_code();
        }
    };

    // RUST_LOG wins over the configured level
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(format!("stormon={}", config.logging.level)));
    tracing_subscriber::fmt().with_env_filter(filter).init();

    match run(config).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            tracing::error!("{:#}", e);
            ExitCode::from(1)
        }
    }
}

async fn run(config: stormon::AgentConfig) -> anyhow::Result<()> {
    let bus = EventBus::with_buffer(config.limits.bus_buffer);
    let server = SocketServer::new(&config, bus.clone());

    let heartbeat = if config.heartbeat.interval_secs > 0 {
        Some(spawn_heartbeat(
            bus,
            server.registry().clone(),
            Duration::from_secs(config.heartbeat.interval_secs),
            server.shutdown_token(),
        ))
    } else {
        None
    };

    let listener = TcpListener::bind(config.bind_addr()).await?;

    let shutdown_server = server.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::info!("shutdown requested");
            shutdown_server.shutdown();
        }
    });

    server.clone().serve(listener).await?;

    // Give cancelled connections a moment to send their close frames
    let drain = async {
        while server.registry().count() > 0 {
            tokio::time::sleep(Duration::from_millis(50)).await;
        }
    };
    let _ = tokio::time::timeout(SHUTDOWN_GRACE, drain).await;

    if let Some(handle) = heartbeat {
        let _ = handle.await;
    }
    Ok(())
}
