//! Webhook intake handler.
//!
//! Every request goes through the same steps:
//! 1. Read the whole body
//! 2. Drop event types outside the allow-list
//! 3. Verify the HMAC signature
//! 4. Hand the event to the configured dispatcher
//!
//! The response body is always empty; the status code is the only signal.

use std::sync::Arc;

use axum::{
    body::{to_bytes, Body},
    extract::State,
    http::{HeaderMap, Request, StatusCode},
    routing::post,
    Router,
};
use tower_http::trace::TraceLayer;
use tracing::{debug, info, info_span, warn, Instrument};

use crate::config::ServerConfig;
use crate::dispatch::{Dispatcher, InboundEvent};
use crate::web::signature::verify;

/// Header carrying the Cirrus CI event type.
pub const EVENT_HEADER: &str = "X-Cirrus-Event";

/// Header carrying the hex-encoded HMAC-SHA256 of the body.
pub const SIGNATURE_HEADER: &str = "X-Cirrus-Signature";

/// Shared application state.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<ServerConfig>,
    pub dispatcher: Arc<dyn Dispatcher>,
}

impl AppState {
    pub fn new(config: Arc<ServerConfig>, dispatcher: Arc<dyn Dispatcher>) -> Self {
        Self { config, dispatcher }
    }
}

/// Build the router serving the webhook endpoint on the configured path.
pub fn router(state: AppState) -> Router {
    let path = state.config.http_path.clone();

    Router::new()
        .route(&path, post(webhook))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Webhook endpoint.
///
/// Responds with:
/// - `200` when the event type is filtered out
/// - `201` when the event was dispatched
/// - `400` when the body is unreadable or the signature is invalid
/// - `500` when the dispatcher failed
pub async fn webhook(State(state): State<AppState>, request: Request<Body>) -> StatusCode {
    let (parts, body) = request.into_parts();

    let body = match to_bytes(body, state.config.max_body_bytes).await {
        Ok(body) => body,
        Err(e) => {
            warn!(error = %e, "webhook_body_read_failed");
            return StatusCode::BAD_REQUEST;
        }
    };

    let event_type = header_str(&parts.headers, EVENT_HEADER)
        .unwrap_or_default()
        .to_string();

    if !state.config.event_filter.should_process(&event_type) {
        debug!(
            event_type = %event_type,
            allowed_event_types = %state.config.event_filter.describe(),
            "webhook_filtered"
        );
        return StatusCode::OK;
    }

    let signature = header_str(&parts.headers, SIGNATURE_HEADER);
    if let Err(e) = verify(&state.config.secret_token, &body, signature) {
        warn!(event_type = %event_type, error = %e, "webhook_signature_invalid");
        return StatusCode::BAD_REQUEST;
    }

    let body_length = body.len();
    let event = InboundEvent::new(event_type, parts.headers, body);
    let span = info_span!("webhook", event_type = %event.event_type);

    let result = state.dispatcher.dispatch(&event).instrument(span).await;

    match result {
        Ok(()) => {
            info!(
                event_type = %event.event_type,
                body_length = body_length,
                "webhook_dispatched"
            );
            StatusCode::CREATED
        }
        Err(e) => {
            warn!(event_type = %event.event_type, error = %e, "webhook_dispatch_failed");
            StatusCode::INTERNAL_SERVER_ERROR
        }
    }
}

fn header_str<'a>(headers: &'a HeaderMap, name: &str) -> Option<&'a str> {
    headers.get(name).and_then(|v| v.to_str().ok())
}
