//! Command-line and environment configuration.
//!
//! Every flag can also be supplied through an environment variable. The
//! parsed flags are turned into an immutable [`ServerConfig`] once at
//! startup and shared read-only afterwards.

use std::fmt;
use std::time::Duration;

use clap::{Args, Parser, Subcommand};

use crate::web::EventFilter;

/// Default cap on the size of an inbound webhook body.
pub const DEFAULT_MAX_BODY_BYTES: usize = 10 * 1024 * 1024;

/// Default ceiling on how long a client may take to send its request headers.
pub const DEFAULT_HEADER_READ_TIMEOUT: Duration = Duration::from_secs(10);

/// Event types the DX integration processes.
pub const GETDX_EVENT_TYPES: &[&str] = &["task"];

#[derive(Parser, Debug)]
#[command(
    name = "cws",
    version,
    about = "Cirrus CI webhooks server",
    long_about = "Receives Cirrus CI webhook events, verifies their signatures \
                  and streams them to Datadog or DX."
)]
pub struct Cli {
    /// Enable debug logging
    #[arg(long, global = true, env = "CWS_DEBUG")]
    pub debug: bool,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Stream Cirrus CI webhook events to Datadog
    Datadog(DatadogArgs),
    /// Stream Cirrus CI webhook events to DX's Data Cloud API
    Getdx(GetdxArgs),
}

/// Flags shared by every integration.
#[derive(Args, Debug, Clone)]
pub struct ServerArgs {
    /// Address on which the HTTP server will listen on
    #[arg(long, env = "CWS_HTTP_ADDR", default_value = ":8080")]
    pub http_addr: String,

    /// HTTP path on which the webhook events will be expected
    #[arg(long, env = "CWS_HTTP_PATH", default_value = "/")]
    pub http_path: String,

    /// If specified, this value will be used as a HMAC SHA-256 secret to
    /// verify the webhook events
    #[arg(long, env = "CWS_SECRET_TOKEN", hide_env_values = true)]
    pub secret_token: Option<String>,
}

#[derive(Args, Debug, Clone)]
pub struct DatadogArgs {
    #[command(flatten)]
    pub server: ServerArgs,

    /// Comma-separated list of the event types to limit processing to
    /// (for example, --event-types=audit_event or --event-types=build,task)
    #[arg(long, env = "CWS_EVENT_TYPES", value_delimiter = ',')]
    pub event_types: Vec<String>,

    /// Enables sending webhook events as Datadog events via the DogStatsD
    /// protocol to the specified address (for example, 127.0.0.1:8125)
    #[arg(long, env = "DD_DOGSTATSD_ADDR")]
    pub dogstatsd_addr: Option<String>,

    /// Enables sending webhook events as Datadog logs via the Datadog API
    /// using the specified API key
    #[arg(long, env = "DD_API_KEY", hide_env_values = true)]
    pub api_key: Option<String>,

    /// Datadog site to use when sending webhook events as Datadog logs
    #[arg(long, env = "DD_SITE", default_value = "datadoghq.com")]
    pub api_site: String,
}

#[derive(Args, Debug, Clone)]
pub struct GetdxArgs {
    #[command(flatten)]
    pub server: ServerArgs,

    /// DX instance to use when sending webhook events as DX Pipeline events
    #[arg(long, env = "DX_INSTANCE")]
    pub dx_instance: Option<String>,

    /// API key to use when sending webhook events to the Data Cloud API
    #[arg(long, env = "DX_API_KEY", hide_env_values = true)]
    pub dx_api_key: Option<String>,
}

/// Startup misconfiguration. Always fatal.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("no sender configured, please specify either --api-key or --dogstatsd-addr")]
    NoSender,
    #[error("\"--dx-instance\" is required")]
    MissingDxInstance,
    #[error("invalid --http-path {0:?}: the path must start with \"/\" and contain no route parameters or wildcards")]
    InvalidPath(String),
    #[error("invalid --http-addr {0:?}: expected HOST:PORT or :PORT")]
    InvalidAddr(String),
}

/// Immutable intake server configuration.
#[derive(Clone)]
pub struct ServerConfig {
    /// Address to bind, already normalised to `HOST:PORT`
    pub http_addr: String,
    /// Route the webhook handler is mounted on
    pub http_path: String,
    /// HMAC secret; empty disables verification
    pub secret_token: String,
    /// Event types to process
    pub event_filter: EventFilter,
    /// Maximum accepted body size
    pub max_body_bytes: usize,
    /// Connections that do not finish their headers in time are closed
    pub header_read_timeout: Duration,
}

impl ServerConfig {
    /// Build the configuration from the shared server flags and the
    /// integration's allow-list.
    pub fn from_args(args: &ServerArgs, event_filter: EventFilter) -> Result<Self, ConfigError> {
        if !is_literal_path(&args.http_path) {
            return Err(ConfigError::InvalidPath(args.http_path.clone()));
        }

        Ok(Self {
            http_addr: normalize_listen_addr(&args.http_addr)?,
            http_path: args.http_path.clone(),
            secret_token: args.secret_token.clone().unwrap_or_default(),
            event_filter,
            max_body_bytes: DEFAULT_MAX_BODY_BYTES,
            header_read_timeout: DEFAULT_HEADER_READ_TIMEOUT,
        })
    }

    /// A configuration listening on `http_addr` with no secret and no filter.
    pub fn new(http_addr: impl Into<String>) -> Self {
        Self {
            http_addr: http_addr.into(),
            http_path: "/".to_string(),
            secret_token: String::new(),
            event_filter: EventFilter::allow_all(),
            max_body_bytes: DEFAULT_MAX_BODY_BYTES,
            header_read_timeout: DEFAULT_HEADER_READ_TIMEOUT,
        }
    }

    pub fn with_path(mut self, path: impl Into<String>) -> Self {
        self.http_path = path.into();
        self
    }

    pub fn with_secret(mut self, secret: impl Into<String>) -> Self {
        self.secret_token = secret.into();
        self
    }

    pub fn with_event_filter(mut self, event_filter: EventFilter) -> Self {
        self.event_filter = event_filter;
        self
    }

    pub fn with_max_body_bytes(mut self, max_body_bytes: usize) -> Self {
        self.max_body_bytes = max_body_bytes;
        self
    }

    pub fn with_header_read_timeout(mut self, timeout: Duration) -> Self {
        self.header_read_timeout = timeout;
        self
    }
}

impl fmt::Debug for ServerConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ServerConfig")
            .field("http_addr", &self.http_addr)
            .field("http_path", &self.http_path)
            .field("secret_token", &"<redacted>")
            .field("event_filter", &self.event_filter)
            .field("max_body_bytes", &self.max_body_bytes)
            .field("header_read_timeout", &self.header_read_timeout)
            .finish()
    }
}

/// Whether `path` is an absolute path the router will mount verbatim.
fn is_literal_path(path: &str) -> bool {
    path.starts_with('/') && !path.contains(['*', ':', '{', '}'])
}

/// Turn `:8080` into `0.0.0.0:8080`; other addresses pass through.
fn normalize_listen_addr(raw: &str) -> Result<String, ConfigError> {
    let raw = raw.trim();

    let (host, port) = raw
        .rsplit_once(':')
        .ok_or_else(|| ConfigError::InvalidAddr(raw.to_string()))?;

    if port.parse::<u16>().is_err() {
        return Err(ConfigError::InvalidAddr(raw.to_string()));
    }

    if host.is_empty() {
        Ok(format!("0.0.0.0:{}", port))
    } else {
        Ok(raw.to_string())
    }
}
