//! Process assembly: bind both listeners, spawn the sweeper, own shutdown.

use std::io;
use std::net::SocketAddr;
use std::sync::Arc;

use tokio::net::TcpListener;
use tokio::task::JoinHandle;

use crate::config::RelayConfig;
use crate::connection;
use crate::pairing::{self, ApiState};
use crate::rate_limit::RateLimiter;
use crate::session::SessionRegistry;

/// Keeps the serving tasks alive and tears them down on shutdown.
pub struct RelayHandle {
    pub http_addr: SocketAddr,
    pub ws_addr: SocketAddr,
    http: JoinHandle<()>,
    gateway: JoinHandle<()>,
    sweeper: JoinHandle<()>,
}

impl RelayHandle {
    /// Stop serving: cancels the sweeper and both listeners. Connection
    /// tasks drop with the process.
    pub fn shutdown(self) {
        self.sweeper.abort();
        self.gateway.abort();
        self.http.abort();
    }
}

/// Start the pairing API, the realtime gateway, and the expiry sweeper.
pub async fn serve(config: RelayConfig) -> io::Result<RelayHandle> {
    let registry = SessionRegistry::new(config.session_ttl);
    let limiter = Arc::new(RateLimiter::new(
        pairing::CREATE_RATE_WINDOW,
        pairing::CREATE_RATE_MAX,
    ));

    let http_listener = TcpListener::bind(("0.0.0.0", config.http_port)).await?;
    let http_addr = http_listener.local_addr()?;
    let router = pairing::router(ApiState {
        registry: registry.clone(),
        limiter: Arc::clone(&limiter),
    });
    let http = tokio::spawn(async move {
        if let Err(e) = axum::serve(http_listener, router).await {
            tracing::error!(error = %e, "pairing API server exited");
        }
    });

    let ws_listener = TcpListener::bind(("0.0.0.0", config.ws_port)).await?;
    let ws_addr = ws_listener.local_addr()?;
    let gateway_registry = registry.clone();
    let probe_interval = config.probe_interval;
    let gateway = tokio::spawn(async move {
        connection::run_gateway(ws_listener, gateway_registry, probe_interval).await;
    });

    let sweep_interval = config.sweep_interval;
    let sweeper = tokio::spawn(async move {
        let mut ticker = tokio::time::interval(sweep_interval);
        ticker.tick().await;
        loop {
            ticker.tick().await;
            registry.reap_stale().await;
            limiter.prune().await;
            let sessions = registry.count().await;
            tracing::debug!(sessions, "sweep tick");
        }
    });

    tracing::info!(http = %http_addr, ws = %ws_addr, "assist relay listening");

    Ok(RelayHandle {
        http_addr,
        ws_addr,
        http,
        gateway,
        sweeper,
    })
}
