//! Pairing control API: create / join / close / status over JSON.

use std::sync::Arc;
use std::time::Duration;

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use tower_http::cors::CorsLayer;

use assist_common::api::{
    CloseRequest, CloseResponse, CreateRequest, CreateResponse, ErrorResponse, HealthResponse,
    JoinRequest, JoinResponse, StatusResponse,
};
use assist_common::errors::PairingError;
use assist_common::protocol::{CloseReason, ServerEvent};

use crate::connection::send_event;
use crate::rate_limit::RateLimiter;
use crate::session::SessionRegistry;

/// Rolling window for the create limiter.
pub const CREATE_RATE_WINDOW: Duration = Duration::from_secs(60);
/// Creates allowed per client within the window.
pub const CREATE_RATE_MAX: usize = 5;

#[derive(Clone)]
pub struct ApiState {
    pub registry: SessionRegistry,
    pub limiter: Arc<RateLimiter>,
}

/// Build the pairing API router. CORS is permissive; the editor UI calls
/// from a browser origin.
pub fn router(state: ApiState) -> Router {
    Router::new()
        .route("/api/assist/create", post(create))
        .route("/api/assist/join", post(join))
        .route("/api/assist/close", post(close))
        .route("/api/assist/status/{code}", get(status))
        .route("/healthz", get(health))
        .with_state(state)
        .layer(CorsLayer::permissive())
}

struct ApiError(PairingError);

impl From<PairingError> for ApiError {
    fn from(err: PairingError) -> Self {
        Self(err)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = match &self.0 {
            PairingError::InvalidClientId(_)
            | PairingError::InvalidCode
            | PairingError::SelfJoin
            | PairingError::Occupied => StatusCode::BAD_REQUEST,
            PairingError::NotFound => StatusCode::NOT_FOUND,
            PairingError::RateLimited => StatusCode::TOO_MANY_REQUESTS,
        };
        (status, Json(ErrorResponse::new(self.0.to_string()))).into_response()
    }
}

async fn create(
    State(state): State<ApiState>,
    Json(req): Json<CreateRequest>,
) -> Result<Json<CreateResponse>, ApiError> {
    validate_client_id(&req.client_id)?;
    if !state.limiter.check(&req.client_id).await {
        return Err(PairingError::RateLimited.into());
    }

    let (session, is_existing) = state.registry.create_or_get(&req.client_id).await;
    Ok(Json(CreateResponse {
        success: true,
        expires_in: state.registry.expires_in(session.created_at),
        assist_code: session.code,
        is_existing: is_existing.then_some(true),
    }))
}

async fn join(
    State(state): State<ApiState>,
    Json(req): Json<JoinRequest>,
) -> Result<Json<JoinResponse>, ApiError> {
    validate_client_id(&req.client_id)?;
    validate_code(&req.assist_code)?;

    let host_id = state.registry.join(&req.client_id, &req.assist_code).await?;
    Ok(Json(JoinResponse {
        success: true,
        host_id,
    }))
}

/// Close takes either a JSON body or the bare clientId as text, since the
/// UI fires it from `sendBeacon` on page unload, which sends text/plain.
async fn close(
    State(state): State<ApiState>,
    body: String,
) -> Result<Json<CloseResponse>, ApiError> {
    let client_id = match serde_json::from_str::<CloseRequest>(&body) {
        Ok(req) => req.client_id,
        Err(_) => body.trim().to_string(),
    };
    validate_client_id(&client_id)?;

    let outcome = state.registry.close_client(&client_id).await;

    let closed = ServerEvent::SessionClosed {
        reason: CloseReason::HostClosed,
    };
    for tx in &outcome.session_closed {
        if let Err(e) = send_event(tx, &closed) {
            tracing::debug!(error = %e, "session_closed notification dropped");
        }
    }
    if let Some(tx) = &outcome.guest_left {
        if let Err(e) = send_event(tx, &ServerEvent::GuestLeft) {
            tracing::debug!(error = %e, "guest_left notification dropped");
        }
    }

    Ok(Json(CloseResponse { success: true }))
}

async fn status(
    State(state): State<ApiState>,
    Path(code): Path<String>,
) -> Result<Json<StatusResponse>, ApiError> {
    let session = state
        .registry
        .lookup_by_code(&code)
        .await
        .ok_or(PairingError::NotFound)?;

    Ok(Json(StatusResponse {
        status: session.status,
        has_guest: session.guest_id.is_some(),
        created_at: session.created_at,
        expires_in: state.registry.expires_in(session.created_at),
    }))
}

async fn health(State(state): State<ApiState>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".into(),
        sessions: state.registry.count().await,
    })
}

/// Client identities are opaque caller-supplied tokens; only their shape is
/// checked here.
fn validate_client_id(client_id: &str) -> Result<(), PairingError> {
    let len = client_id.chars().count();
    if (16..=64).contains(&len) {
        Ok(())
    } else {
        Err(PairingError::InvalidClientId(format!(
            "expected 16-64 characters, got {len}"
        )))
    }
}

fn validate_code(code: &str) -> Result<(), PairingError> {
    if code.len() == 6 && code.chars().all(|c| c.is_ascii_digit()) {
        Ok(())
    } else {
        Err(PairingError::InvalidCode)
    }
}
