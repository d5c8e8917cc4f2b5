//! Datadog Logs API sender.
//!
//! Events are submitted as log items to the v2 HTTP intake.
//! Reference: https://docs.datadoghq.com/api/latest/logs/#send-logs

use std::time::Duration;

use anyhow::{Context, Result};
use chrono::SecondsFormat;
use reqwest::Client;
use serde::Serialize;
use tracing::info;
use url::Url;

use super::Event;
use crate::dispatch::SenderError;

const TARGET: &str = "Datadog Logs API";

/// Value of `ddsource` on every submitted log item.
pub const LOG_SOURCE: &str = "Cirrus Webhooks Server";

const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// One item of the Logs API request body.
#[derive(Debug, Serialize)]
pub struct HttpLogItem<'a> {
    pub ddsource: &'static str,
    pub ddtags: String,
    pub message: &'a str,
    /// Picked up by Datadog's date remapper
    #[serde(skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<String>,
}

impl<'a> HttpLogItem<'a> {
    pub fn from_event(event: &'a Event) -> Self {
        Self {
            ddsource: LOG_SOURCE,
            ddtags: event.tags.join(","),
            message: &event.text,
            timestamp: event
                .timestamp
                .map(|ts| ts.to_rfc3339_opts(SecondsFormat::Secs, true)),
        }
    }
}

#[derive(Debug, Clone)]
pub struct ApiSender {
    client: Client,
    endpoint: Url,
    api_key: String,
}

impl ApiSender {
    /// Create a sender for the given Datadog site (e.g. `datadoghq.eu`).
    pub fn new(api_key: impl Into<String>, api_site: &str) -> Result<Self> {
        let endpoint = Url::parse(&format!("https://http-intake.logs.{}/api/v2/logs", api_site))
            .with_context(|| format!("Invalid Datadog site {:?}", api_site))?;
        Self::with_endpoint(api_key, endpoint)
    }

    /// Create a sender that posts to an explicit intake URL.
    pub fn with_endpoint(api_key: impl Into<String>, endpoint: Url) -> Result<Self> {
        let client = Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .context("Failed to create HTTP client")?;

        Ok(Self {
            client,
            endpoint,
            api_key: api_key.into(),
        })
    }

    pub fn endpoint(&self) -> &Url {
        &self.endpoint
    }

    pub async fn send_event(&self, event: &Event) -> std::result::Result<(), SenderError> {
        let items = [HttpLogItem::from_event(event)];

        let response = self
            .client
            .post(self.endpoint.clone())
            .header("DD-API-KEY", &self.api_key)
            .json(&items)
            .send()
            .await
            .map_err(|source| SenderError::Transport {
                target: TARGET,
                source,
            })?;

        let status = response.status();
        if !status.is_success() {
            return Err(SenderError::Status {
                target: TARGET,
                status,
            });
        }

        info!(
            status_code = status.as_u16(),
            tags = event.tags.len(),
            "datadog_log_submitted"
        );

        Ok(())
    }
}
