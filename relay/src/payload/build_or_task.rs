//! `build` and `task` webhook payloads.
//!
//! Both event types share one shape: a `task` event carries the build it
//! belongs to, a `build` event simply has no task fields.

use axum::http::HeaderMap;
use serde::Deserialize;

use super::common::{null_as_default, Common};
use crate::datadog::Event;

/// Username reported when a build was not started by a person.
const API_INITIALIZER: &str = "api";

#[derive(Debug, Clone, Default, Deserialize)]
pub struct BuildOrTask {
    #[serde(default, deserialize_with = "null_as_default")]
    pub build: Build,
    #[serde(default, deserialize_with = "null_as_default")]
    pub task: Task,
    #[serde(flatten)]
    pub common: Common,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Build {
    pub id: Option<i64>,
    pub status: Option<String>,
    pub branch: Option<String>,
    pub pull_request: Option<i64>,
    pub pull_request_draft: Option<bool>,
    pub change_id_in_repo: Option<String>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub user: User,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct User {
    pub username: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Task {
    pub id: Option<i64>,
    pub name: Option<String>,
    pub status: Option<String>,
    /// Milliseconds since the Unix epoch
    pub status_timestamp: Option<i64>,
    pub instance_type: Option<String>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub unique_labels: Vec<String>,
    pub manual_rerun_count: Option<i64>,
    pub local_group_id: Option<i64>,
}

impl BuildOrTask {
    pub fn enrich(&self, headers: &HeaderMap, evt: &mut Event) {
        self.common.enrich(headers, evt);

        let build = &self.build;
        if let Some(value) = build.id {
            evt.add_tag("build_id", value);
        }
        if let Some(value) = &build.status {
            evt.add_tag("build_status", value);
        }
        if let Some(value) = &build.branch {
            evt.add_tag("build_branch", value);
        }
        if let Some(value) = build.pull_request {
            evt.add_tag("build_pull_request", value);
        }
        if let Some(value) = build.pull_request_draft {
            evt.add_tag("build_pull_request_draft", value);
        }

        let initializer = build.user.username.as_deref().unwrap_or(API_INITIALIZER);
        evt.add_tag("initializer_username", initializer);

        let task = &self.task;
        if let Some(value) = task.id {
            evt.add_tag("task_id", value);
        }
        if let Some(value) = &task.name {
            evt.add_tag("task_name", value);
        }
        if let Some(value) = &task.status {
            evt.add_tag("task_status", value);
        }
        if let Some(value) = &task.instance_type {
            evt.add_tag("task_instance_type", value);
        }
        if !task.unique_labels.is_empty() {
            evt.add_tag("task_unique_labels", task.unique_labels.join(","));
        }
        if let Some(value) = task.manual_rerun_count {
            evt.add_tag("manual_rerun_count", value);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const TASK_EVENT: &str = r#"{
        "action": "updated",
        "timestamp": 1700000000000,
        "repository": {"id": 1, "owner": "cirruslabs", "name": "cirrus-cli"},
        "build": {
            "id": 42,
            "status": "EXECUTING",
            "branch": "main",
            "pullRequest": 17,
            "pullRequestDraft": false,
            "changeIdInRepo": "0123abcd",
            "user": {"username": "octocat"}
        },
        "task": {
            "id": 4242,
            "name": "test",
            "status": "COMPLETED",
            "statusTimestamp": 1700000001000,
            "instanceType": "container",
            "uniqueLabels": ["linux", "arm64"],
            "manualRerunCount": 0,
            "localGroupId": 3
        }
    }"#;

    #[test]
    fn test_decode_task_event() {
        let payload: BuildOrTask = serde_json::from_str(TASK_EVENT).unwrap();

        assert_eq!(payload.build.id, Some(42));
        assert_eq!(payload.build.change_id_in_repo.as_deref(), Some("0123abcd"));
        assert_eq!(payload.task.local_group_id, Some(3));
        assert_eq!(payload.task.status_timestamp, Some(1_700_000_001_000));
        assert_eq!(payload.common.repository.owner.as_deref(), Some("cirruslabs"));
    }

    #[test]
    fn test_enrich_task_event() {
        let payload: BuildOrTask = serde_json::from_str(TASK_EVENT).unwrap();

        let mut evt = Event::new("Webhook event", TASK_EVENT);
        payload.enrich(&HeaderMap::new(), &mut evt);

        for expected in [
            "action:updated",
            "repository_name:cirrus-cli",
            "build_id:42",
            "build_status:EXECUTING",
            "build_branch:main",
            "build_pull_request:17",
            "build_pull_request_draft:false",
            "initializer_username:octocat",
            "task_id:4242",
            "task_name:test",
            "task_status:COMPLETED",
            "task_instance_type:container",
            "task_unique_labels:linux,arm64",
            "manual_rerun_count:0",
        ] {
            assert!(
                evt.tags.iter().any(|t| t == expected),
                "missing tag {expected}, got {:?}",
                evt.tags
            );
        }
        assert!(evt.timestamp.is_some());
    }

    #[test]
    fn test_enrich_build_event_defaults_initializer() {
        let payload: BuildOrTask =
            serde_json::from_str(r#"{"build": {"id": 1, "user": null}, "task": null}"#).unwrap();

        let mut evt = Event::new("Webhook event", "");
        payload.enrich(&HeaderMap::new(), &mut evt);

        assert_eq!(evt.tags, vec!["build_id:1", "initializer_username:api"]);
    }
}
