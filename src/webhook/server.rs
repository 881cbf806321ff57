use std::sync::Arc;

use axum::{
    body::Bytes,
    extract::State,
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Json, Response},
    routing::{get, post},
    Router,
};
use serde_json::{json, Value};
use tokio::sync::mpsc::UnboundedSender;
use tracing::{debug, error, info, warn};

use super::{authorized, handle_delivery, Delivery, EventFilter, WebhookStore, SECRET_HEADER};

/// Shared state for the delivery endpoint.
#[derive(Clone)]
pub struct AppState {
    pub store: Arc<dyn WebhookStore>,
    /// Store key of the registration deliveries are checked against.
    pub registration_key: String,
    pub filter: EventFilter,
    /// Receives every payload that passes the secret and event checks.
    pub triggered: UnboundedSender<Value>,
}

pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/webhook", post(webhook_handler))
        .route("/health", get(health_check))
        .with_state(state)
}

async fn health_check() -> Json<Value> {
    Json(json!({ "status": "healthy" }))
}

async fn webhook_handler(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    let registration = match state.store.load(&state.registration_key) {
        Ok(registration) => registration,
        Err(err) => {
            error!(error = %err, "Failed to load webhook registration");
            return StatusCode::INTERNAL_SERVER_ERROR.into_response();
        }
    };

    // The secret is checked before the body is looked at, whatever its
    // content type.
    let secret = headers.get(SECRET_HEADER).and_then(|v| v.to_str().ok());
    if !authorized(&registration, secret) {
        warn!(has_secret = secret.is_some(), "Rejected webhook delivery");
        return (StatusCode::FORBIDDEN, Json(Delivery::Rejected.response_body())).into_response();
    }

    let body: Value = match serde_json::from_slice(&body) {
        Ok(body) => body,
        Err(err) => {
            warn!(error = %err, "Webhook delivery is not valid JSON");
            return (
                StatusCode::BAD_REQUEST,
                Json(json!({ "message": "Invalid JSON payload" })),
            )
                .into_response();
        }
    };

    let delivery = handle_delivery(&registration, secret, body, &state.filter);
    let status =
        StatusCode::from_u16(delivery.status_code()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
    let response_body = delivery.response_body();

    match delivery {
        Delivery::Rejected => {
            warn!(has_secret = secret.is_some(), "Rejected webhook delivery");
        }
        Delivery::Filtered { event } => {
            debug!(event = %event, "Ignoring webhook event");
        }
        Delivery::Triggered(payload) => {
            info!(event = ?payload.get("event"), "Webhook event received");
            if state.triggered.send(payload).is_err() {
                warn!("No consumer for triggered webhook payloads");
            }
        }
    }

    (status, Json(response_body)).into_response()
}

/// Bind and serve until the process is stopped.
pub async fn serve(bind: &str, state: AppState) -> std::io::Result<()> {
    let listener = tokio::net::TcpListener::bind(bind).await?;
    info!(address = %bind, "Listening for webhook deliveries");
    axum::serve(listener, build_router(state)).await
}
