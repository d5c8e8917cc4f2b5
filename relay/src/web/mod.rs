//! Web server module for receiving Cirrus CI webhooks.
//!
//! This module provides a small intake server that:
//! - Reads the webhook body
//! - Skips event types outside the configured allow-list
//! - Verifies the HMAC-SHA256 signature
//! - Hands the event to the integration's dispatcher
//!
//! There is no queueing or retrying here: a failed dispatch is reported
//! back to Cirrus CI with a `500`.

pub mod filter;
pub mod handlers;
pub mod server;
pub mod signature;

pub use filter::{should_process, EventFilter};
pub use handlers::{router, webhook, AppState, EVENT_HEADER, SIGNATURE_HEADER};
pub use server::{IntakeServer, ServerError};
pub use signature::{is_signature_verification_enabled, sign, verify, SignatureError};
