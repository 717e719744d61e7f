use std::time::Duration;

/// Runtime configuration for the relay process.
#[derive(Debug, Clone)]
pub struct RelayConfig {
    /// Port for the pairing control API. 0 picks an ephemeral port.
    pub http_port: u16,
    /// Port for the realtime WebSocket endpoint. 0 picks an ephemeral port.
    pub ws_port: u16,
    /// How long an unclaimed session lives.
    pub session_ttl: Duration,
    /// Interval between liveness probes on realtime connections.
    pub probe_interval: Duration,
    /// Interval between stale-session sweeps.
    pub sweep_interval: Duration,
}

impl Default for RelayConfig {
    fn default() -> Self {
        Self {
            http_port: 8080,
            ws_port: 8081,
            session_ttl: Duration::from_secs(300),
            probe_interval: Duration::from_secs(5),
            sweep_interval: Duration::from_secs(60),
        }
    }
}
