//! Pairing and signaling relay for remote assistance.
//!
//! A host requests a short-lived 6-digit assist code over the pairing HTTP
//! API; a guest joins with that code; both then open realtime connections,
//! authenticate against the session, and the relay forwards their WebRTC
//! signaling and editor control frames verbatim in each direction.

pub mod config;
pub mod connection;
pub mod pairing;
pub mod rate_limit;
pub mod server;
pub mod session;

pub use config::RelayConfig;
pub use server::{serve, RelayHandle};
pub use session::SessionRegistry;
