//! Contract between the intake server and the downstream integrations.
//!
//! The server hands every verified, allow-listed webhook to exactly one
//! [`Dispatcher`]. Dispatch runs inside the request's `webhook` tracing
//! span, so anything a dispatcher logs is tagged with the event type.

use async_trait::async_trait;
use axum::body::Bytes;
use axum::http::HeaderMap;
use reqwest::StatusCode;

use crate::getdx::EnrichError;

/// A verified webhook event, as read from the HTTP request.
#[derive(Debug, Clone)]
pub struct InboundEvent {
    /// Value of the `X-Cirrus-Event` header
    pub event_type: String,
    /// Request headers, for integrations that enrich from them
    pub headers: HeaderMap,
    /// Raw request body
    pub body: Bytes,
}

impl InboundEvent {
    pub fn new(event_type: impl Into<String>, headers: HeaderMap, body: Bytes) -> Self {
        Self {
            event_type: event_type.into(),
            headers,
            body,
        }
    }
}

/// Turns a webhook event into a downstream side effect.
///
/// Returning `Ok(())` means the event was either delivered or deliberately
/// ignored. An error makes the intake server answer `500` so that Cirrus CI
/// can redeliver.
#[async_trait]
pub trait Dispatcher: Send + Sync {
    async fn dispatch(&self, event: &InboundEvent) -> Result<(), DispatchError>;
}

/// Why a dispatcher failed to handle an event.
#[derive(Debug, thiserror::Error)]
pub enum DispatchError {
    #[error("failed to parse the webhook event of type {event_type:?} as JSON: {source}")]
    Decode {
        event_type: String,
        #[source]
        source: serde_json::Error,
    },
    #[error("failed to enrich the event: {0}")]
    Enrich(#[from] EnrichError),
    #[error(transparent)]
    Send(#[from] SenderError),
}

/// Errors from the vendor-facing senders.
#[derive(Debug, thiserror::Error)]
pub enum SenderError {
    #[error("request to {target} failed: {source}")]
    Transport {
        target: &'static str,
        #[source]
        source: reqwest::Error,
    },
    #[error("{target} unexpectedly responded with HTTP {status}")]
    Status {
        target: &'static str,
        status: StatusCode,
    },
    #[error("failed to send DogStatsD datagram to {addr}: {source}")]
    Datagram {
        addr: String,
        #[source]
        source: std::io::Error,
    },
}
