//! Realtime gateway: accepts WebSocket connections, authenticates them
//! against an assist session, probes liveness, and relays signaling and
//! control frames verbatim between the two bound peers.

use std::net::SocketAddr;
use std::time::Duration;

use futures_util::stream::SplitSink;
use futures_util::{SinkExt, StreamExt};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::mpsc;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::WebSocketStream;

use assist_common::errors::{AuthError, SendError};
use assist_common::protocol::{
    frame_types, is_relayable, AuthRequest, CloseReason, Envelope, Role, ServerEvent,
};

use crate::session::{DisconnectOutcome, PeerSender, SessionRegistry};

/// Outbound queue depth per connection.
const SEND_QUEUE: usize = 256;

type WsSink = SplitSink<WebSocketStream<TcpStream>, Message>;

/// Identity a connection acquires when auth succeeds. Built exactly once;
/// a connection never returns to the unauthenticated state.
#[derive(Debug, Clone)]
pub struct ConnectionBinding {
    pub client_id: String,
    pub role: Role,
    pub code: String,
}

/// Best-effort send of raw frame text to a peer's outbound queue. A full
/// queue counts as a failure; nothing blocks, buffers, or retries.
pub(crate) fn send_text(tx: &PeerSender, text: String) -> Result<(), SendError> {
    tx.try_send(text).map_err(|e| match e {
        mpsc::error::TrySendError::Full(_) => SendError::Full,
        mpsc::error::TrySendError::Closed(_) => SendError::Closed,
    })
}

pub(crate) fn send_event(tx: &PeerSender, event: &ServerEvent) -> Result<(), SendError> {
    send_text(tx, event.to_json())
}

/// Accept realtime connections until the gateway task is torn down.
pub async fn run_gateway(
    listener: TcpListener,
    registry: SessionRegistry,
    probe_interval: Duration,
) {
    loop {
        match listener.accept().await {
            Ok((stream, addr)) => {
                let registry = registry.clone();
                tokio::spawn(async move {
                    match tokio_tungstenite::accept_async(stream).await {
                        Ok(ws) => handle_connection(ws, addr, registry, probe_interval).await,
                        Err(e) => {
                            tracing::warn!(peer = %addr, error = %e, "WS handshake failed");
                        }
                    }
                });
            }
            Err(e) => {
                tracing::warn!(error = %e, "TCP accept error");
            }
        }
    }
}

/// Per-connection loop: outbound queue, liveness probe, and inbound frames
/// all multiplexed in one task so frames are handled in receipt order.
async fn handle_connection(
    ws: WebSocketStream<TcpStream>,
    addr: SocketAddr,
    registry: SessionRegistry,
    probe_interval: Duration,
) {
    let (mut sink, mut stream) = ws.split();
    let (tx, mut rx) = mpsc::channel::<String>(SEND_QUEUE);

    let mut binding: Option<ConnectionBinding> = None;
    let mut alive = true;
    let mut probe = tokio::time::interval(probe_interval);
    probe.tick().await; // consume the immediate first tick

    loop {
        tokio::select! {
            // Frames queued for this client by its peer or the control API.
            Some(msg) = rx.recv() => {
                if sink.send(Message::Text(msg.into())).await.is_err() {
                    break;
                }
            }

            // One-missed-beat eviction: a probe that was never acknowledged
            // kills the connection before the next one goes out.
            _ = probe.tick() => {
                if !alive {
                    tracing::info!(peer = %addr, "liveness probe missed, evicting");
                    break;
                }
                alive = false;
                if sink.send(Message::Ping(Vec::new().into())).await.is_err() {
                    break;
                }
            }

            frame = stream.next() => {
                match frame {
                    Some(Ok(Message::Text(text))) => {
                        handle_frame(text.as_str(), &mut sink, &tx, &mut binding, &registry, addr)
                            .await;
                    }
                    Some(Ok(Message::Pong(_))) => {
                        alive = true;
                    }
                    Some(Ok(Message::Ping(data))) => {
                        let _ = sink.send(Message::Pong(data)).await;
                    }
                    Some(Ok(Message::Close(_))) | None => break,
                    Some(Err(e)) => {
                        tracing::debug!(peer = %addr, error = %e, "WS error");
                        break;
                    }
                    _ => {}
                }
            }
        }
    }

    match &binding {
        Some(bound) => {
            tracing::info!(
                peer = %addr,
                code = %bound.code,
                role = ?bound.role,
                "client disconnected"
            );
            run_disconnect(&registry, bound, &tx).await;
        }
        None => tracing::debug!(peer = %addr, "unauthenticated connection closed"),
    }
}

async fn handle_frame(
    text: &str,
    sink: &mut WsSink,
    self_tx: &PeerSender,
    binding: &mut Option<ConnectionBinding>,
    registry: &SessionRegistry,
    addr: SocketAddr,
) {
    let envelope = match serde_json::from_str::<Envelope>(text) {
        Ok(envelope) => envelope,
        Err(e) => {
            tracing::warn!(peer = %addr, error = %e, "malformed frame");
            let reply = ServerEvent::Error {
                message: format!("malformed frame: {e}"),
            };
            let _ = send_frame(sink, &reply).await;
            return;
        }
    };

    match envelope.kind.as_str() {
        frame_types::AUTH => {
            handle_auth(text, sink, self_tx, binding, registry, addr).await;
        }
        frame_types::HEARTBEAT => {
            if let Some(bound) = binding.as_ref() {
                registry.heartbeat(&bound.client_id, bound.role).await;
            }
            let reply = ServerEvent::HeartbeatAck {
                timestamp: chrono::Utc::now().timestamp_millis(),
            };
            let _ = send_frame(sink, &reply).await;
        }
        kind if is_relayable(kind) => {
            let Some(bound) = binding.as_ref() else {
                tracing::debug!(peer = %addr, kind, "relay frame before auth dropped");
                return;
            };
            match registry.peer_sender(&bound.client_id, bound.role).await {
                Some(peer) => {
                    if let Err(e) = send_text(&peer, text.to_string()) {
                        tracing::debug!(code = %bound.code, kind, error = %e, "relay frame dropped");
                    }
                }
                None => {
                    tracing::debug!(code = %bound.code, kind, "no peer bound, frame dropped");
                }
            }
        }
        other => {
            tracing::debug!(peer = %addr, kind = other, "ignoring unrecognized frame");
        }
    }
}

async fn handle_auth(
    text: &str,
    sink: &mut WsSink,
    self_tx: &PeerSender,
    binding: &mut Option<ConnectionBinding>,
    registry: &SessionRegistry,
    addr: SocketAddr,
) {
    if binding.is_some() {
        let reply = ServerEvent::AuthFailed {
            message: AuthError::AlreadyBound.to_string(),
        };
        let _ = send_frame(sink, &reply).await;
        return;
    }

    let auth = match serde_json::from_str::<AuthRequest>(text) {
        Ok(auth) => auth,
        Err(e) => {
            tracing::warn!(peer = %addr, error = %e, "malformed auth frame");
            let reply = ServerEvent::Error {
                message: format!("malformed frame: {e}"),
            };
            let _ = send_frame(sink, &reply).await;
            return;
        }
    };

    let outcome = match registry
        .bind(&auth.assist_code, &auth.client_id, auth.role, self_tx.clone())
        .await
    {
        Ok(outcome) => outcome,
        Err(e) => {
            tracing::info!(
                peer = %addr,
                code = %auth.assist_code,
                role = ?auth.role,
                error = %e,
                "auth failed"
            );
            let reply = ServerEvent::AuthFailed {
                message: e.to_string(),
            };
            let _ = send_frame(sink, &reply).await;
            return;
        }
    };

    let role = auth.role;
    *binding = Some(ConnectionBinding {
        client_id: auth.client_id,
        role,
        code: auth.assist_code,
    });

    let reply = ServerEvent::AuthSuccess {
        role,
        has_guest: matches!(role, Role::Host).then_some(outcome.has_guest),
    };
    let _ = send_frame(sink, &reply).await;

    // Mutual presence once both sides are bound.
    if let Some(peer_tx) = outcome.peer_tx {
        let (to_self, to_peer) = match role {
            Role::Host => (ServerEvent::GuestConnected, ServerEvent::HostConnected),
            Role::Guest => (ServerEvent::HostConnected, ServerEvent::GuestConnected),
        };
        let _ = send_frame(sink, &to_self).await;
        if let Err(e) = send_event(&peer_tx, &to_peer) {
            tracing::debug!(error = %e, "presence notification dropped");
        }
    }
}

/// Disconnect handling runs only if this connection still owns the
/// session's live handle for its role. A replacement handle from a
/// re-auth must not be torn down by the old connection going away.
async fn run_disconnect(registry: &SessionRegistry, bound: &ConnectionBinding, tx: &PeerSender) {
    match registry.disconnect(&bound.client_id, bound.role, tx).await {
        DisconnectOutcome::HostGone { guest_tx } => {
            if let Some(guest_tx) = guest_tx {
                let event = ServerEvent::SessionClosed {
                    reason: CloseReason::HostDisconnected,
                };
                if let Err(e) = send_event(&guest_tx, &event) {
                    tracing::debug!(code = %bound.code, error = %e, "session_closed notification dropped");
                }
            }
        }
        DisconnectOutcome::GuestGone { host_tx } => {
            if let Some(host_tx) = host_tx {
                if let Err(e) = send_event(&host_tx, &ServerEvent::GuestLeft) {
                    tracing::debug!(code = %bound.code, error = %e, "guest_left notification dropped");
                }
            }
        }
        DisconnectOutcome::Unbound => {}
    }
}

async fn send_frame(
    sink: &mut WsSink,
    event: &ServerEvent,
) -> Result<(), tokio_tungstenite::tungstenite::Error> {
    sink.send(Message::Text(event.to_json().into())).await
}
