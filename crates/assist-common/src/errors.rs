use crate::protocol::SessionStatus;

/// Rejections from the pairing control API. None of these mutate state.
#[derive(Debug, thiserror::Error)]
pub enum PairingError {
    #[error("invalid client id: {0}")]
    InvalidClientId(String),

    #[error("invalid assist code")]
    InvalidCode,

    #[error("assist code not found")]
    NotFound,

    #[error("cannot join your own session")]
    SelfJoin,

    #[error("session already has a guest")]
    Occupied,

    #[error("too many pairing requests")]
    RateLimited,
}

/// Rejections from realtime `auth`. The connection stays open for retry.
#[derive(Debug, thiserror::Error)]
pub enum AuthError {
    #[error("unknown assist code")]
    UnknownCode,

    #[error("client id does not match session {0}")]
    IdentityMismatch(&'static str),

    #[error("connection already authenticated")]
    AlreadyBound,
}

/// A best-effort send to a peer connection failed. Logged, never propagated.
#[derive(Debug, thiserror::Error)]
pub enum SendError {
    #[error("peer channel closed")]
    Closed,

    #[error("peer send queue full")]
    Full,
}

#[derive(Debug, thiserror::Error)]
#[error("illegal session transition: {from:?} -> {to:?}")]
pub struct TransitionError {
    pub from: SessionStatus,
    pub to: SessionStatus,
}
