//! DX Data Cloud integration.
//!
//! Every `task` webhook becomes one `pipelineRuns.sync` call, so DX can
//! track each Cirrus CI task as a pipeline run.

pub mod pipeline_runs;

use std::time::Duration;

use anyhow::{Context, Result};
use async_trait::async_trait;
use reqwest::Client;
use tracing::info;
use url::Url;

use crate::dispatch::{DispatchError, Dispatcher, InboundEvent, SenderError};
use crate::payload::BuildOrTask;

pub use pipeline_runs::{EnrichError, PipelineRunStatus, PipelineRunsRequest, PIPELINE_SOURCE};

const TARGET: &str = "DX's Data Cloud API";

const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

pub struct GetdxDispatcher {
    client: Client,
    endpoint: Url,
    api_key: Option<String>,
}

impl GetdxDispatcher {
    /// Create a dispatcher for the DX instance `instance` (the subdomain of
    /// `getdx.net`).
    pub fn new(instance: &str, api_key: Option<String>) -> Result<Self> {
        let endpoint = Url::parse(&format!("https://{}.getdx.net/api/pipelineRuns.sync", instance))
            .with_context(|| format!("Invalid DX instance {:?}", instance))?;
        Self::with_endpoint(endpoint, api_key)
    }

    /// Create a dispatcher that posts to an explicit URL.
    pub fn with_endpoint(endpoint: Url, api_key: Option<String>) -> Result<Self> {
        let client = Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .context("Failed to create HTTP client")?;

        Ok(Self {
            client,
            endpoint,
            api_key: api_key.filter(|k| !k.is_empty()),
        })
    }

    pub fn endpoint(&self) -> &Url {
        &self.endpoint
    }

    async fn submit(&self, request: &PipelineRunsRequest) -> std::result::Result<(), SenderError> {
        let mut builder = self.client.post(self.endpoint.clone()).json(request);
        if let Some(api_key) = &self.api_key {
            builder = builder.bearer_auth(api_key);
        }

        let response = builder.send().await.map_err(|source| SenderError::Transport {
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

        Ok(())
    }
}

#[async_trait]
impl Dispatcher for GetdxDispatcher {
    async fn dispatch(&self, inbound: &InboundEvent) -> std::result::Result<(), DispatchError> {
        let payload: BuildOrTask =
            serde_json::from_slice(&inbound.body).map_err(|source| DispatchError::Decode {
                event_type: inbound.event_type.clone(),
                source,
            })?;

        let mut request = PipelineRunsRequest::new();
        request.enrich(&payload)?;

        self.submit(&request).await?;

        info!(
            reference_id = %request.reference_id,
            pipeline_name = %request.pipeline_name,
            status = ?request.status,
            "getdx_pipeline_run_synced"
        );

        Ok(())
    }
}
