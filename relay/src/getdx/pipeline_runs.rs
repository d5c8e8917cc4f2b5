//! DX Pipeline Runs request body.
//!
//! Reference: https://docs.getdx.com/webapi/methods/pipelineRuns.sync/

use serde::Serialize;

use crate::payload::BuildOrTask;

/// Reported as `pipeline_source` for every run.
pub const PIPELINE_SOURCE: &str = "Cirrus CI";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum PipelineRunStatus {
    Failure,
    Running,
    Success,
    Cancelled,
}

impl PipelineRunStatus {
    /// Map a Cirrus CI task status. Statuses with no DX counterpart map to
    /// `None`, which DX records as "unknown".
    pub fn from_task_status(status: &str) -> Option<Self> {
        match status {
            "EXECUTING" => Some(Self::Running),
            "FAILED" | "ERRORED" => Some(Self::Failure),
            "COMPLETED" => Some(Self::Success),
            "ABORTED" => Some(Self::Cancelled),
            _ => None,
        }
    }
}

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum EnrichError {
    #[error("{field:?} field is required, but no {source_field} found in the webhook payload")]
    MissingField {
        field: &'static str,
        source_field: &'static str,
    },
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct PipelineRunsRequest {
    /// Name of the pipeline this run is for
    pub pipeline_name: String,
    /// Which CI system reported the run
    pub pipeline_source: String,
    /// Globally unique identifier of this run
    pub reference_id: String,
    /// Unix timestamp string; DX keeps the earliest value it sees
    pub started_at: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<PipelineRunStatus>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub finished_at: Option<String>,
    /// Full name of the repository, required with `commit_sha` or `pr_number`
    #[serde(skip_serializing_if = "Option::is_none")]
    pub repository: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub commit_sha: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pr_number: Option<i64>,
    /// Where to view the run
    #[serde(skip_serializing_if = "Option::is_none")]
    pub source_url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub head_branch: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub github_username: Option<String>,
}

impl PipelineRunsRequest {
    pub fn new() -> Self {
        Self {
            pipeline_source: PIPELINE_SOURCE.to_string(),
            ..Default::default()
        }
    }

    /// Fill the request in from a `task` webhook payload.
    pub fn enrich(&mut self, payload: &BuildOrTask) -> Result<(), EnrichError> {
        let build = &payload.build;
        let task = &payload.task;

        self.pipeline_name = task.name.clone().ok_or(EnrichError::MissingField {
            field: "pipeline_name",
            source_field: "task name",
        })?;

        self.reference_id = match (build.id, task.local_group_id) {
            (Some(build_id), Some(local_group_id)) => {
                format!("build-{}-local-group-id-{}", build_id, local_group_id)
            }
            _ => {
                return Err(EnrichError::MissingField {
                    field: "reference_id",
                    source_field: "build ID and/or task's local group ID",
                })
            }
        };

        self.started_at = task
            .status_timestamp
            .map(|ts| ts.to_string())
            .ok_or(EnrichError::MissingField {
                field: "started_at",
                source_field: "task status timestamp",
            })?;

        self.status = task
            .status
            .as_deref()
            .and_then(PipelineRunStatus::from_task_status);

        let repository = &payload.common.repository;
        if let (Some(owner), Some(name)) = (&repository.owner, &repository.name) {
            self.repository = Some(format!("{}/{}", owner, name));
        }

        self.commit_sha = build.change_id_in_repo.clone();
        self.pr_number = build.pull_request;
        self.source_url = task.id.map(|id| format!("https://cirrus-ci.com/task/{}", id));
        self.github_username = build.user.username.clone();

        Ok(())
    }
}
