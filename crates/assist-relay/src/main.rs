//! assist-relay: pairing and signaling relay for remote assistance.
//!
//! Hosts mint short-lived 6-digit assist codes over the pairing API; guests
//! join with the code; the relay then forwards WebRTC signaling and editor
//! control frames between the two bound realtime connections. Payloads are
//! never inspected.

use std::time::Duration;

use clap::Parser;

use assist_relay::{serve, RelayConfig};

#[derive(Parser)]
#[command(name = "assist-relay", about = "Pairing and signaling relay for remote assistance")]
struct Args {
    /// Port for the pairing control API.
    #[arg(long, default_value_t = 8080)]
    http_port: u16,

    /// Port for the realtime WebSocket endpoint.
    #[arg(long, default_value_t = 8081)]
    ws_port: u16,

    /// Maximum unclaimed session age in seconds.
    #[arg(long, default_value_t = 300)]
    session_ttl: u64,

    /// Seconds between liveness probes on realtime connections.
    #[arg(long, default_value_t = 5)]
    probe_interval: u64,

    /// Seconds between stale-session sweeps.
    #[arg(long, default_value_t = 60)]
    sweep_interval: u64,
}

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "assist_relay=info".into()),
        )
        .init();

    let args = Args::parse();
    let config = RelayConfig {
        http_port: args.http_port,
        ws_port: args.ws_port,
        session_ttl: Duration::from_secs(args.session_ttl),
        probe_interval: Duration::from_secs(args.probe_interval),
        sweep_interval: Duration::from_secs(args.sweep_interval),
    };

    let handle = match serve(config).await {
        Ok(handle) => handle,
        Err(e) => {
            tracing::error!(error = %e, "failed to bind listeners");
            std::process::exit(1);
        }
    };

    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "shutdown signal listener failed");
    }
    tracing::info!("shutting down");
    handle.shutdown();
}
