//! Cirrus CI webhooks relay.
//!
//! Receives webhook events from Cirrus CI, verifies their HMAC signatures
//! and forwards them to one integration per process:
//! - `datadog`: Datadog events over DogStatsD, or logs over the Logs API
//! - `getdx`: DX pipeline runs over the Data Cloud API
//!
//! ## Architecture
//!
//! ```text
//! Cirrus CI → IntakeServer → filter → verify → Dispatcher → Datadog / DX
//! ```

pub mod config;
pub mod datadog;
pub mod dispatch;
pub mod getdx;
pub mod payload;
pub mod web;

// Re-export commonly used types
pub use config::{Cli, Command, ConfigError, ServerConfig};
pub use datadog::{DatadogDispatcher, DatadogSender};
pub use dispatch::{DispatchError, Dispatcher, InboundEvent, SenderError};
pub use getdx::GetdxDispatcher;
pub use web::{AppState, EventFilter, IntakeServer, ServerError};
