//! Realtime wire protocol for the assist relay.
//!
//! Inbound frames are peeked via [`Envelope`] for their `type` tag; only
//! `auth` and `heartbeat` are parsed in full. Signaling and control frames
//! are forwarded to the bound peer as the original text, never re-encoded.

use serde::{Deserialize, Serialize};

use crate::errors::TransitionError;

// ---------------------------------------------------------------------------
// Frame type names
// ---------------------------------------------------------------------------

/// `type` values that appear on the realtime socket.
pub mod frame_types {
    pub const AUTH: &str = "auth";
    pub const HEARTBEAT: &str = "heartbeat";

    pub const OFFER: &str = "offer";
    pub const ANSWER: &str = "answer";
    pub const ICE_CANDIDATE: &str = "ice_candidate";

    pub const CURSOR: &str = "cursor";
    pub const SELECTION: &str = "selection";
    pub const GRAPH_EDIT: &str = "graph_edit";
    pub const VIEWPORT: &str = "viewport";
    pub const SYNC: &str = "sync";
    pub const CHAT_MESSAGE: &str = "chat_message";
}

/// WebRTC handshake frames, relayed opaquely.
pub const SIGNALING_TYPES: [&str; 3] = [
    frame_types::OFFER,
    frame_types::ANSWER,
    frame_types::ICE_CANDIDATE,
];

/// Editor control events, relayed opaquely. Extend here when the editor
/// grows a new realtime event.
pub const CONTROL_TYPES: [&str; 6] = [
    frame_types::CURSOR,
    frame_types::SELECTION,
    frame_types::GRAPH_EDIT,
    frame_types::VIEWPORT,
    frame_types::SYNC,
    frame_types::CHAT_MESSAGE,
];

/// Whether a frame of this type is forwarded verbatim to the bound peer.
pub fn is_relayable(kind: &str) -> bool {
    SIGNALING_TYPES.contains(&kind) || CONTROL_TYPES.contains(&kind)
}

// ---------------------------------------------------------------------------
// Roles and session state
// ---------------------------------------------------------------------------

/// Which side of the assist session a client is.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    /// Created the session; the machine being assisted.
    Host,
    /// Joined via the assist code; the remote helper.
    Guest,
}

/// Lifecycle state of an assist session.
///
/// `Closed` is the removal transition: a session never sits in the registry
/// as `Closed`, it is dropped the moment it gets there.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SessionStatus {
    Waiting,
    Connected,
    Closed,
}

impl SessionStatus {
    /// Step to `to`, rejecting moves the session lifecycle does not allow.
    pub fn transition(self, to: SessionStatus) -> Result<SessionStatus, TransitionError> {
        use SessionStatus::*;
        match (self, to) {
            (Waiting, Connected) => Ok(Connected),
            (Connected, Waiting) => Ok(Waiting),
            (Waiting, Closed) | (Connected, Closed) => Ok(Closed),
            (from, to) => Err(TransitionError { from, to }),
        }
    }
}

// ---------------------------------------------------------------------------
// Inbound frames
// ---------------------------------------------------------------------------

/// Minimal view of any inbound frame: just the `type` tag. Unknown fields
/// are untouched so the original text can be forwarded as-is.
#[derive(Debug, Deserialize)]
pub struct Envelope {
    #[serde(rename = "type")]
    pub kind: String,
}

/// Full payload of an `auth` frame.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AuthRequest {
    pub client_id: String,
    pub assist_code: String,
    pub role: Role,
}

// ---------------------------------------------------------------------------
// Outbound frames
// ---------------------------------------------------------------------------

/// Why a `session_closed` frame was pushed.
#[derive(Debug, Clone, Copy, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum CloseReason {
    HostClosed,
    HostDisconnected,
}

/// Frames the relay itself sends to clients.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ServerEvent {
    AuthSuccess {
        role: Role,
        #[serde(rename = "hasGuest", skip_serializing_if = "Option::is_none")]
        has_guest: Option<bool>,
    },
    AuthFailed {
        message: String,
    },
    HeartbeatAck {
        /// Epoch milliseconds.
        timestamp: i64,
    },
    SessionClosed {
        reason: CloseReason,
    },
    GuestLeft,
    HostConnected,
    GuestConnected,
    Error {
        message: String,
    },
}

impl ServerEvent {
    /// Serialize to the wire form. Server frames contain no payloads that
    /// can fail to encode.
    pub fn to_json(&self) -> String {
        serde_json::to_string(self).unwrap()
    }
}
