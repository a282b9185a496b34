//! HTTP webhook endpoint for the Events API.
//!
//! A single POST route receives every delivery. Status codes drive the
//! platform's retry behavior: only authentication, framing, and tracker
//! creation failures return non-200 — every ordinary business branch
//! (not a task, duplicate, unmapped channel, completion failure) returns
//! 200 so no spurious retries are triggered.

use std::net::SocketAddr;
use std::sync::Arc;

use axum::body::Bytes;
use axum::extract::State;
use axum::http::{HeaderMap, StatusCode};
use axum::routing::{get, post};
use axum::Router;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use crate::config::GlobalConfig;
use crate::models::event::{EventEnvelope, InboundEvent};
use crate::router::{EventRouter, RouterOutcome};
use crate::{AppError, Result};

use super::signature;

const SIGNATURE_HEADER: &str = "x-slack-signature";
const TIMESTAMP_HEADER: &str = "x-slack-request-timestamp";

/// Shared state behind the webhook routes.
pub struct AppState {
    /// Global configuration.
    pub config: Arc<GlobalConfig>,
    /// The event-to-task state machine.
    pub router: EventRouter,
}

/// Handler for `GET /health` — returns 200 OK with a plain-text body.
async fn health() -> &'static str {
    "ok"
}

/// Build the axum router for the webhook endpoint.
#[must_use]
pub fn build_router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/slack/events", post(slack_events))
        .with_state(state)
}

/// Start the webhook HTTP server on `config.http_port`.
///
/// # Errors
///
/// Returns `AppError::Config` if the server fails to bind or serve.
pub async fn serve(state: Arc<AppState>, ct: CancellationToken) -> Result<()> {
    let addr = SocketAddr::from(([0, 0, 0, 0], state.config.http_port));
    let router = build_router(state);

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .map_err(|err| AppError::Config(format!("failed to bind {addr}: {err}")))?;
    info!(%addr, "webhook endpoint listening");

    axum::serve(listener, router)
        .with_graceful_shutdown(ct.cancelled_owned())
        .await
        .map_err(|err| AppError::Config(format!("webhook server failed: {err}")))
}

/// Handler for `POST /slack/events`.
///
/// The `url_verification` handshake is answered before signature state
/// is consulted (the platform sends it while the endpoint is still being
/// registered). Everything else must carry a valid signature.
async fn slack_events(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    body: Bytes,
) -> (StatusCode, String) {
    let Ok(raw) = serde_json::from_slice::<serde_json::Value>(&body) else {
        return (StatusCode::BAD_REQUEST, "malformed json body".into());
    };

    let kind = raw.get("type").and_then(|t| t.as_str()).unwrap_or_default();
    match kind {
        "url_verification" => {
            let Some(challenge) = raw.get("challenge").and_then(|c| c.as_str()) else {
                return (StatusCode::BAD_REQUEST, "missing challenge".into());
            };
            (StatusCode::OK, challenge.to_owned())
        }
        "event_callback" => {
            if let Err(err) = verify_signature(&state.config, &headers, &body) {
                warn!(%err, "webhook authentication failed");
                return (StatusCode::UNAUTHORIZED, "invalid signature".into());
            }
            handle_callback(&state, raw).await
        }
        other => {
            // Unknown envelope types are not retried-for; acknowledge.
            info!(kind = other, "unhandled envelope type acknowledged");
            (StatusCode::OK, "ignored".into())
        }
    }
}

fn verify_signature(config: &GlobalConfig, headers: &HeaderMap, body: &[u8]) -> Result<()> {
    let timestamp = headers
        .get(TIMESTAMP_HEADER)
        .and_then(|v| v.to_str().ok())
        .ok_or_else(|| AppError::Auth("missing timestamp header".into()))?;
    let claimed = headers
        .get(SIGNATURE_HEADER)
        .and_then(|v| v.to_str().ok())
        .ok_or_else(|| AppError::Auth("missing signature header".into()))?;

    signature::verify(&config.slack.signing_secret, timestamp, claimed, body)
}

async fn handle_callback(state: &AppState, raw: serde_json::Value) -> (StatusCode, String) {
    // Only message events participate in the task lifecycle.
    let inner_type = raw
        .pointer("/event/type")
        .and_then(|t| t.as_str())
        .unwrap_or_default();
    if inner_type != "message" {
        return (StatusCode::OK, "ignored".into());
    }

    let envelope: EventEnvelope = match serde_json::from_value(raw) {
        Ok(envelope) => envelope,
        Err(err) => {
            warn!(%err, "event callback failed validation");
            return (StatusCode::BAD_REQUEST, "unexpected event shape".into());
        }
    };
    let EventEnvelope::EventCallback { event_id, event } = envelope else {
        return (StatusCode::OK, "ignored".into());
    };

    let inbound = InboundEvent::from_callback(event_id, event);
    match state.router.handle_event(inbound).await {
        Ok(outcome) => respond(&outcome),
        Err(err) => {
            warn!(%err, "event routing failed");
            (StatusCode::INTERNAL_SERVER_ERROR, err.to_string())
        }
    }
}

/// Map a router outcome onto the retry-driving status code contract.
fn respond(outcome: &RouterOutcome) -> (StatusCode, String) {
    match outcome {
        RouterOutcome::Created { task_id } => (StatusCode::OK, format!("task created: {task_id}")),
        RouterOutcome::Completed { task_id } => {
            (StatusCode::OK, format!("task completed: {task_id}"))
        }
        RouterOutcome::AlreadyDone => (StatusCode::OK, "already completed".into()),
        RouterOutcome::NotATask => (StatusCode::OK, "not a task".into()),
        RouterOutcome::Duplicate => (StatusCode::OK, "duplicate event".into()),
        RouterOutcome::NoTaskForThread => (StatusCode::OK, "no task for thread".into()),
        RouterOutcome::CompletionFailed { reason } => {
            (StatusCode::OK, format!("completion failed: {reason}"))
        }
        // Creation failures are the one business branch that wants a
        // platform retry, since nothing was persisted.
        RouterOutcome::CreationFailed { reason } => (
            StatusCode::INTERNAL_SERVER_ERROR,
            format!("creation failed: {reason}"),
        ),
        RouterOutcome::Ignored(reason) => (StatusCode::OK, (*reason).into()),
    }
}
