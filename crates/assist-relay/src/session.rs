//! Session registry: assist sessions keyed by code, plus a host index.
//!
//! Both indices live under one lock so create/join/heartbeat/close and
//! disconnect handling are linearized. Registry methods never send on a
//! peer channel while holding the lock; they hand the senders back and the
//! caller notifies after the lock is gone.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use rand::Rng;
use tokio::sync::{mpsc, RwLock};

use assist_common::errors::{AuthError, PairingError};
use assist_common::protocol::{Role, SessionStatus};

/// Outbound handle for one realtime connection.
pub type PeerSender = mpsc::Sender<String>;

/// One assist session. Holds at most one live connection handle per role;
/// a re-auth replaces the handle rather than accumulating.
#[derive(Debug)]
pub struct Session {
    pub code: String,
    pub host_id: String,
    pub guest_id: Option<String>,
    pub host_tx: Option<PeerSender>,
    pub guest_tx: Option<PeerSender>,
    pub created_at: DateTime<Utc>,
    pub last_heartbeat: DateTime<Utc>,
    pub status: SessionStatus,
}

impl Session {
    fn new(code: String, host_id: String) -> Self {
        let now = Utc::now();
        Self {
            code,
            host_id,
            guest_id: None,
            host_tx: None,
            guest_tx: None,
            created_at: now,
            last_heartbeat: now,
            status: SessionStatus::Waiting,
        }
    }
}

/// Read-only view of a session, safe to hand to the HTTP layer.
#[derive(Debug, Clone)]
pub struct SessionSnapshot {
    pub code: String,
    pub host_id: String,
    pub guest_id: Option<String>,
    pub status: SessionStatus,
    pub created_at: DateTime<Utc>,
}

impl SessionSnapshot {
    fn of(session: &Session) -> Self {
        Self {
            code: session.code.clone(),
            host_id: session.host_id.clone(),
            guest_id: session.guest_id.clone(),
            status: session.status,
            created_at: session.created_at,
        }
    }
}

/// Result of binding a realtime connection into a session.
#[derive(Debug)]
pub struct BindOutcome {
    pub has_guest: bool,
    /// The already-bound counterparty, if any, for presence notification.
    pub peer_tx: Option<PeerSender>,
}

/// Senders to notify after an explicit close. Both branches of a close can
/// fire for one client (host of one session, guest of another).
#[derive(Debug, Default)]
pub struct CloseOutcome {
    /// Connections of a removed session; tell them `session_closed`.
    pub session_closed: Vec<PeerSender>,
    /// Host connection of a session whose guest slot was vacated.
    pub guest_left: Option<PeerSender>,
}

/// What disconnect handling has to say to whoever is still connected.
#[derive(Debug)]
pub enum DisconnectOutcome {
    /// The session is gone; tell the guest, if bound.
    HostGone { guest_tx: Option<PeerSender> },
    /// The session reverted to waiting; tell the host, if bound.
    GuestGone { host_tx: Option<PeerSender> },
    /// No session matched the departing client.
    Unbound,
}

struct RegistryState {
    /// Active sessions keyed by assist code.
    sessions: HashMap<String, Session>,
    /// host_id -> assist code (each host owns at most one session).
    host_index: HashMap<String, String>,
}

/// Thread-safe session registry. Cheap to clone.
#[derive(Clone)]
pub struct SessionRegistry {
    state: Arc<RwLock<RegistryState>>,
    ttl: Duration,
}

impl SessionRegistry {
    pub fn new(ttl: Duration) -> Self {
        Self {
            state: Arc::new(RwLock::new(RegistryState {
                sessions: HashMap::new(),
                host_index: HashMap::new(),
            })),
            ttl,
        }
    }

    /// Seconds until an unclaimed session created at `created_at` expires.
    pub fn expires_in(&self, created_at: DateTime<Utc>) -> i64 {
        let remaining_ms = self.ttl.as_millis() as i64 - elapsed_ms(created_at);
        (remaining_ms / 1000).max(0)
    }

    /// Idempotent create: a host that already owns a live session gets it
    /// back unchanged (tolerates retries and double-clicks). Returns the
    /// snapshot and whether it was pre-existing.
    pub async fn create_or_get(&self, host_id: &str) -> (SessionSnapshot, bool) {
        let mut state = self.state.write().await;

        if let Some(code) = state.host_index.get(host_id) {
            if let Some(session) = state.sessions.get(code) {
                return (SessionSnapshot::of(session), true);
            }
        }

        let code = generate_code(&state.sessions);
        let session = Session::new(code.clone(), host_id.to_string());
        let snapshot = SessionSnapshot::of(&session);
        state.host_index.insert(host_id.to_string(), code.clone());
        state.sessions.insert(code.clone(), session);

        tracing::info!(code = %code, "assist session created");
        (snapshot, false)
    }

    pub async fn lookup_by_code(&self, code: &str) -> Option<SessionSnapshot> {
        self.state
            .read()
            .await
            .sessions
            .get(code)
            .map(SessionSnapshot::of)
    }

    pub async fn lookup_by_host(&self, host_id: &str) -> Option<SessionSnapshot> {
        let state = self.state.read().await;
        let code = state.host_index.get(host_id)?;
        state.sessions.get(code).map(SessionSnapshot::of)
    }

    /// Linear scan; fine at the expected handful of concurrent sessions.
    pub async fn lookup_as_guest(&self, guest_id: &str) -> Option<SessionSnapshot> {
        let state = self.state.read().await;
        state
            .sessions
            .values()
            .find(|s| s.guest_id.as_deref() == Some(guest_id))
            .map(SessionSnapshot::of)
    }

    /// Claim the guest slot of the session behind `code`. Returns the host
    /// id on success. Unclaimed sessions past the TTL are purged here as
    /// well as by the sweeper.
    pub async fn join(&self, guest_id: &str, code: &str) -> Result<String, PairingError> {
        let mut state = self.state.write().await;

        let session = state.sessions.get_mut(code).ok_or(PairingError::NotFound)?;

        if session.host_id == guest_id {
            return Err(PairingError::SelfJoin);
        }

        match session.guest_id.as_deref() {
            // The same guest asking again is a retry, not a conflict.
            Some(existing) if existing == guest_id => {
                session.last_heartbeat = Utc::now();
                return Ok(session.host_id.clone());
            }
            Some(_) => return Err(PairingError::Occupied),
            None => {}
        }

        if elapsed_ms(session.created_at) > self.ttl.as_millis() as i64 {
            let host_id = session.host_id.clone();
            state.sessions.remove(code);
            state.host_index.remove(&host_id);
            tracing::info!(code = %code, "expired session purged on join");
            return Err(PairingError::NotFound);
        }

        session.status = session
            .status
            .transition(SessionStatus::Connected)
            .map_err(|_| PairingError::Occupied)?;
        session.guest_id = Some(guest_id.to_string());
        session.last_heartbeat = Utc::now();

        tracing::info!(code = %code, "guest joined assist session");
        Ok(session.host_id.clone())
    }

    /// Authenticate a realtime connection and store its sender as the
    /// session's live handle for `role`, replacing any previous one.
    pub async fn bind(
        &self,
        code: &str,
        client_id: &str,
        role: Role,
        tx: PeerSender,
    ) -> Result<BindOutcome, AuthError> {
        let mut state = self.state.write().await;
        let session = state.sessions.get_mut(code).ok_or(AuthError::UnknownCode)?;

        let peer_tx = match role {
            Role::Host => {
                if session.host_id != client_id {
                    return Err(AuthError::IdentityMismatch("host"));
                }
                session.host_tx = Some(tx);
                session.guest_tx.clone()
            }
            Role::Guest => {
                if session.guest_id.as_deref() != Some(client_id) {
                    return Err(AuthError::IdentityMismatch("guest"));
                }
                session.guest_tx = Some(tx);
                session.host_tx.clone()
            }
        };

        tracing::info!(code = %code, role = ?role, "realtime connection bound");
        Ok(BindOutcome {
            has_guest: session.guest_id.is_some(),
            peer_tx,
        })
    }

    /// Refresh the bound session's heartbeat stamp. Returns the stamp, or
    /// `None` when no session matches the client.
    pub async fn heartbeat(&self, client_id: &str, role: Role) -> Option<DateTime<Utc>> {
        let mut state = self.state.write().await;
        let now = Utc::now();
        let session = match role {
            Role::Host => {
                let code = state.host_index.get(client_id)?.clone();
                state.sessions.get_mut(&code)
            }
            Role::Guest => state
                .sessions
                .values_mut()
                .find(|s| s.guest_id.as_deref() == Some(client_id)),
        }?;
        session.last_heartbeat = now;
        Some(now)
    }

    /// The counterparty's live sender, if one is bound.
    pub async fn peer_sender(&self, client_id: &str, role: Role) -> Option<PeerSender> {
        let state = self.state.read().await;
        match role {
            Role::Host => {
                let code = state.host_index.get(client_id)?;
                state.sessions.get(code)?.guest_tx.clone()
            }
            Role::Guest => state
                .sessions
                .values()
                .find(|s| s.guest_id.as_deref() == Some(client_id))?
                .host_tx
                .clone(),
        }
    }

    /// Explicit close. Runs both branches unconditionally: as a host the
    /// client's session is removed, and as a guest of some other session
    /// the guest slot is vacated.
    pub async fn close_client(&self, client_id: &str) -> CloseOutcome {
        let mut state = self.state.write().await;
        let mut outcome = CloseOutcome::default();

        if let Some(code) = state.host_index.remove(client_id) {
            if let Some(session) = state.sessions.remove(&code) {
                outcome
                    .session_closed
                    .extend(session.host_tx.into_iter().chain(session.guest_tx));
                tracing::info!(code = %code, "session closed by host");
            }
        }

        if let Some(session) = state
            .sessions
            .values_mut()
            .find(|s| s.guest_id.as_deref() == Some(client_id))
        {
            session.guest_id = None;
            session.guest_tx = None;
            if let Ok(next) = session.status.transition(SessionStatus::Waiting) {
                session.status = next;
            }
            outcome.guest_left = session.host_tx.clone();
            tracing::info!(code = %session.code, "guest left assist session");
        }

        outcome
    }

    /// Realtime connection dropped. Host disconnect tears the session down;
    /// guest disconnect reverts it to waiting. `conn_tx` must still be the
    /// session's live handle for the role; a connection whose handle was
    /// replaced by a re-auth no longer speaks for the session.
    pub async fn disconnect(
        &self,
        client_id: &str,
        role: Role,
        conn_tx: &PeerSender,
    ) -> DisconnectOutcome {
        let mut state = self.state.write().await;

        match role {
            Role::Host => {
                let Some(code) = state.host_index.get(client_id).cloned() else {
                    return DisconnectOutcome::Unbound;
                };
                let owns = state
                    .sessions
                    .get(&code)
                    .and_then(|s| s.host_tx.as_ref())
                    .is_some_and(|tx| tx.same_channel(conn_tx));
                if !owns {
                    return DisconnectOutcome::Unbound;
                }
                state.host_index.remove(client_id);
                match state.sessions.remove(&code) {
                    Some(session) => {
                        tracing::info!(code = %code, "session removed on host disconnect");
                        DisconnectOutcome::HostGone {
                            guest_tx: session.guest_tx,
                        }
                    }
                    None => DisconnectOutcome::Unbound,
                }
            }
            Role::Guest => {
                if let Some(session) = state.sessions.values_mut().find(|s| {
                    s.guest_id.as_deref() == Some(client_id)
                        && s.guest_tx
                            .as_ref()
                            .is_some_and(|tx| tx.same_channel(conn_tx))
                }) {
                    session.guest_id = None;
                    session.guest_tx = None;
                    if let Ok(next) = session.status.transition(SessionStatus::Waiting) {
                        session.status = next;
                    }
                    tracing::info!(code = %session.code, "guest disconnected");
                    return DisconnectOutcome::GuestGone {
                        host_tx: session.host_tx.clone(),
                    };
                }
                DisconnectOutcome::Unbound
            }
        }
    }

    /// Purge never-claimed sessions older than the TTL. Claimed sessions
    /// are never swept by age; their lifetime is governed by connection
    /// liveness and explicit close.
    pub async fn reap_stale(&self) {
        let mut state = self.state.write().await;
        let ttl_ms = self.ttl.as_millis() as i64;

        let stale: Vec<String> = state
            .sessions
            .values()
            .filter(|s| s.guest_id.is_none() && elapsed_ms(s.created_at) > ttl_ms)
            .map(|s| s.code.clone())
            .collect();

        for code in stale {
            if let Some(session) = state.sessions.remove(&code) {
                state.host_index.remove(&session.host_id);
                tracing::info!(code = %code, "reaped stale session");
            }
        }
    }

    /// Number of active sessions.
    pub async fn count(&self) -> usize {
        self.state.read().await.sessions.len()
    }
}

fn elapsed_ms(since: DateTime<Utc>) -> i64 {
    Utc::now().signed_duration_since(since).num_milliseconds()
}

/// Rejection-sample a 6-digit code not currently in use.
fn generate_code(active: &HashMap<String, Session>) -> String {
    let mut rng = rand::thread_rng();
    loop {
        let code = format!("{:06}", rng.gen_range(0..1_000_000));
        if !active.contains_key(&code) {
            return code;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn registry() -> SessionRegistry {
        SessionRegistry::new(Duration::from_secs(300))
    }

    fn short_ttl_registry() -> SessionRegistry {
        SessionRegistry::new(Duration::from_millis(20))
    }

    const HOST: &str = "aaaaaaaaaaaaaaaa";
    const GUEST: &str = "bbbbbbbbbbbbbbbb";
    const OTHER: &str = "cccccccccccccccc";

    #[tokio::test]
    async fn codes_are_six_digits_and_unique() {
        let reg = registry();
        let mut seen = std::collections::HashSet::new();
        for i in 0..50 {
            let (snap, _) = reg.create_or_get(&format!("host-{i:016}")).await;
            assert_eq!(snap.code.len(), 6);
            assert!(snap.code.chars().all(|c| c.is_ascii_digit()));
            assert!(seen.insert(snap.code));
        }
        assert_eq!(reg.count().await, 50);
    }

    #[tokio::test]
    async fn create_is_idempotent_per_host() {
        let reg = registry();
        let (first, existing) = reg.create_or_get(HOST).await;
        assert!(!existing);

        let (second, existing) = reg.create_or_get(HOST).await;
        assert!(existing);
        assert_eq!(first.code, second.code);
        assert_eq!(reg.count().await, 1);
    }

    #[tokio::test]
    async fn join_claims_the_guest_slot() {
        let reg = registry();
        let (snap, _) = reg.create_or_get(HOST).await;

        let host_id = reg.join(GUEST, &snap.code).await.unwrap();
        assert_eq!(host_id, HOST);

        let snap = reg.lookup_by_code(&snap.code).await.unwrap();
        assert_eq!(snap.status, SessionStatus::Connected);
        assert_eq!(snap.guest_id.as_deref(), Some(GUEST));
    }

    #[tokio::test]
    async fn lookups_resolve_each_index() {
        let reg = registry();
        let (snap, _) = reg.create_or_get(HOST).await;
        reg.join(GUEST, &snap.code).await.unwrap();

        assert_eq!(reg.lookup_by_code(&snap.code).await.unwrap().host_id, HOST);
        assert_eq!(reg.lookup_by_host(HOST).await.unwrap().code, snap.code);
        assert_eq!(reg.lookup_as_guest(GUEST).await.unwrap().code, snap.code);
        assert!(reg.lookup_as_guest(OTHER).await.is_none());
    }

    #[tokio::test]
    async fn join_rejects_unknown_code() {
        let reg = registry();
        assert!(matches!(
            reg.join(GUEST, "000000").await,
            Err(PairingError::NotFound)
        ));
    }

    #[tokio::test]
    async fn join_rejects_self_join() {
        let reg = registry();
        let (snap, _) = reg.create_or_get(HOST).await;
        assert!(matches!(
            reg.join(HOST, &snap.code).await,
            Err(PairingError::SelfJoin)
        ));
    }

    #[tokio::test]
    async fn join_rejects_second_guest_but_tolerates_retry() {
        let reg = registry();
        let (snap, _) = reg.create_or_get(HOST).await;
        reg.join(GUEST, &snap.code).await.unwrap();

        assert!(matches!(
            reg.join(OTHER, &snap.code).await,
            Err(PairingError::Occupied)
        ));

        // The guest that holds the slot may retry.
        assert_eq!(reg.join(GUEST, &snap.code).await.unwrap(), HOST);
    }

    #[tokio::test]
    async fn join_purges_expired_unclaimed_session() {
        let reg = short_ttl_registry();
        let (snap, _) = reg.create_or_get(HOST).await;

        tokio::time::sleep(Duration::from_millis(50)).await;

        assert!(matches!(
            reg.join(GUEST, &snap.code).await,
            Err(PairingError::NotFound)
        ));
        assert!(reg.lookup_by_code(&snap.code).await.is_none());
        assert!(reg.lookup_by_host(HOST).await.is_none());
    }

    #[tokio::test]
    async fn reap_spares_claimed_sessions() {
        let reg = short_ttl_registry();
        let (claimed, _) = reg.create_or_get(HOST).await;
        let (unclaimed, _) = reg.create_or_get(OTHER).await;
        reg.join(GUEST, &claimed.code).await.unwrap();

        tokio::time::sleep(Duration::from_millis(50)).await;
        reg.reap_stale().await;

        assert!(reg.lookup_by_code(&claimed.code).await.is_some());
        assert!(reg.lookup_by_code(&unclaimed.code).await.is_none());
        assert_eq!(reg.count().await, 1);
    }

    #[tokio::test]
    async fn bind_verifies_identity() {
        let reg = registry();
        let (snap, _) = reg.create_or_get(HOST).await;
        let (tx, _rx) = mpsc::channel(8);

        assert!(matches!(
            reg.bind(&snap.code, OTHER, Role::Host, tx.clone()).await,
            Err(AuthError::IdentityMismatch("host"))
        ));
        // Nobody has joined, so a guest bind cannot match.
        assert!(matches!(
            reg.bind(&snap.code, GUEST, Role::Guest, tx.clone()).await,
            Err(AuthError::IdentityMismatch("guest"))
        ));
        assert!(matches!(
            reg.bind("999999", HOST, Role::Host, tx).await,
            Err(AuthError::UnknownCode)
        ));
    }

    #[tokio::test]
    async fn bind_reports_peer_presence() {
        let reg = registry();
        let (snap, _) = reg.create_or_get(HOST).await;
        reg.join(GUEST, &snap.code).await.unwrap();

        let (host_tx, _host_rx) = mpsc::channel(8);
        let outcome = reg.bind(&snap.code, HOST, Role::Host, host_tx).await.unwrap();
        assert!(outcome.has_guest);
        assert!(outcome.peer_tx.is_none());

        let (guest_tx, _guest_rx) = mpsc::channel(8);
        let outcome = reg
            .bind(&snap.code, GUEST, Role::Guest, guest_tx)
            .await
            .unwrap();
        assert!(outcome.peer_tx.is_some());
    }

    #[tokio::test]
    async fn rebind_replaces_the_live_handle() {
        let reg = registry();
        let (snap, _) = reg.create_or_get(HOST).await;
        reg.join(GUEST, &snap.code).await.unwrap();

        let (old_tx, mut old_rx) = mpsc::channel(8);
        let (new_tx, mut new_rx) = mpsc::channel(8);
        reg.bind(&snap.code, HOST, Role::Host, old_tx).await.unwrap();
        reg.bind(&snap.code, HOST, Role::Host, new_tx).await.unwrap();

        let host_handle = reg.peer_sender(GUEST, Role::Guest).await.unwrap();
        host_handle.try_send("frame".into()).unwrap();

        assert!(old_rx.try_recv().is_err());
        assert_eq!(new_rx.try_recv().unwrap(), "frame");
    }

    #[tokio::test]
    async fn peer_sender_resolves_the_other_side() {
        let reg = registry();
        let (snap, _) = reg.create_or_get(HOST).await;
        reg.join(GUEST, &snap.code).await.unwrap();

        let (host_tx, mut host_rx) = mpsc::channel(8);
        let (guest_tx, mut guest_rx) = mpsc::channel(8);
        reg.bind(&snap.code, HOST, Role::Host, host_tx).await.unwrap();
        reg.bind(&snap.code, GUEST, Role::Guest, guest_tx)
            .await
            .unwrap();

        reg.peer_sender(HOST, Role::Host)
            .await
            .unwrap()
            .try_send("to guest".into())
            .unwrap();
        reg.peer_sender(GUEST, Role::Guest)
            .await
            .unwrap()
            .try_send("to host".into())
            .unwrap();

        assert_eq!(guest_rx.try_recv().unwrap(), "to guest");
        assert_eq!(host_rx.try_recv().unwrap(), "to host");
    }

    #[tokio::test]
    async fn heartbeat_resolves_by_role() {
        let reg = registry();
        let (snap, _) = reg.create_or_get(HOST).await;
        reg.join(GUEST, &snap.code).await.unwrap();

        assert!(reg.heartbeat(HOST, Role::Host).await.is_some());
        assert!(reg.heartbeat(GUEST, Role::Guest).await.is_some());
        assert!(reg.heartbeat(OTHER, Role::Host).await.is_none());
        assert!(reg.heartbeat(OTHER, Role::Guest).await.is_none());
    }

    #[tokio::test]
    async fn close_runs_host_and_guest_branches() {
        let reg = registry();
        // X hosts one session and guests another.
        let (own, _) = reg.create_or_get(HOST).await;
        let (other, _) = reg.create_or_get(OTHER).await;
        reg.join(GUEST, &own.code).await.unwrap();
        reg.join(HOST, &other.code).await.unwrap();

        let (guest_tx, mut guest_rx) = mpsc::channel(8);
        let (other_host_tx, mut other_host_rx) = mpsc::channel(8);
        reg.bind(&own.code, GUEST, Role::Guest, guest_tx).await.unwrap();
        reg.bind(&other.code, OTHER, Role::Host, other_host_tx)
            .await
            .unwrap();

        let outcome = reg.close_client(HOST).await;

        // Host branch: own session removed, its bound guest gets notified.
        assert!(reg.lookup_by_code(&own.code).await.is_none());
        assert_eq!(outcome.session_closed.len(), 1);
        outcome.session_closed[0].try_send("closed".into()).unwrap();
        assert_eq!(guest_rx.try_recv().unwrap(), "closed");

        // Guest branch: the other session reverts to waiting.
        let other_snap = reg.lookup_by_code(&other.code).await.unwrap();
        assert_eq!(other_snap.status, SessionStatus::Waiting);
        assert!(other_snap.guest_id.is_none());
        outcome.guest_left.unwrap().try_send("left".into()).unwrap();
        assert_eq!(other_host_rx.try_recv().unwrap(), "left");
    }

    #[tokio::test]
    async fn host_disconnect_removes_session() {
        let reg = registry();
        let (snap, _) = reg.create_or_get(HOST).await;
        reg.join(GUEST, &snap.code).await.unwrap();
        let (host_tx, _host_rx) = mpsc::channel(8);
        let (guest_tx, _guest_rx) = mpsc::channel(8);
        reg.bind(&snap.code, HOST, Role::Host, host_tx.clone())
            .await
            .unwrap();
        reg.bind(&snap.code, GUEST, Role::Guest, guest_tx).await.unwrap();

        match reg.disconnect(HOST, Role::Host, &host_tx).await {
            DisconnectOutcome::HostGone { guest_tx } => assert!(guest_tx.is_some()),
            other => panic!("expected HostGone, got {other:?}"),
        }
        assert!(reg.lookup_by_code(&snap.code).await.is_none());
    }

    #[tokio::test]
    async fn guest_disconnect_reverts_to_waiting() {
        let reg = registry();
        let (snap, _) = reg.create_or_get(HOST).await;
        reg.join(GUEST, &snap.code).await.unwrap();
        let (host_tx, _host_rx) = mpsc::channel(8);
        let (guest_tx, _guest_rx) = mpsc::channel(8);
        reg.bind(&snap.code, HOST, Role::Host, host_tx).await.unwrap();
        reg.bind(&snap.code, GUEST, Role::Guest, guest_tx.clone())
            .await
            .unwrap();

        match reg.disconnect(GUEST, Role::Guest, &guest_tx).await {
            DisconnectOutcome::GuestGone { host_tx } => assert!(host_tx.is_some()),
            other => panic!("expected GuestGone, got {other:?}"),
        }

        let snap = reg.lookup_by_code(&snap.code).await.unwrap();
        assert_eq!(snap.status, SessionStatus::Waiting);
        assert!(snap.guest_id.is_none());
    }

    #[tokio::test]
    async fn disconnect_of_unknown_client_is_unbound() {
        let reg = registry();
        let (tx, _rx) = mpsc::channel(8);
        assert!(matches!(
            reg.disconnect(OTHER, Role::Host, &tx).await,
            DisconnectOutcome::Unbound
        ));
        assert!(matches!(
            reg.disconnect(OTHER, Role::Guest, &tx).await,
            DisconnectOutcome::Unbound
        ));
    }

    #[tokio::test]
    async fn stale_disconnect_after_rebind_is_ignored() {
        let reg = registry();
        let (snap, _) = reg.create_or_get(HOST).await;
        reg.join(GUEST, &snap.code).await.unwrap();

        let (old_tx, _old_rx) = mpsc::channel(8);
        let (new_tx, _new_rx) = mpsc::channel(8);
        reg.bind(&snap.code, GUEST, Role::Guest, old_tx.clone())
            .await
            .unwrap();
        reg.bind(&snap.code, GUEST, Role::Guest, new_tx).await.unwrap();

        // The replaced connection closing must not evict the fresh one.
        assert!(matches!(
            reg.disconnect(GUEST, Role::Guest, &old_tx).await,
            DisconnectOutcome::Unbound
        ));
        let snap = reg.lookup_by_code(&snap.code).await.unwrap();
        assert_eq!(snap.status, SessionStatus::Connected);
        assert_eq!(snap.guest_id.as_deref(), Some(GUEST));
    }

    #[tokio::test]
    async fn expires_in_counts_down_from_ttl() {
        let reg = registry();
        let (snap, _) = reg.create_or_get(HOST).await;
        let remaining = reg.expires_in(snap.created_at);
        assert!(remaining > 295 && remaining <= 300);

        let past = Utc::now() - chrono::Duration::seconds(400);
        assert_eq!(reg.expires_in(past), 0);
    }
}
