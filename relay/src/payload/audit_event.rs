//! `audit_event` webhook payloads.

use axum::http::HeaderMap;
use serde::Deserialize;
use serde_json::Value;

use super::common::Common;
use crate::datadog::Event;

#[derive(Debug, Clone, Default, Deserialize)]
pub struct AuditEvent {
    /// Kind of audited operation, e.g. `graphql.mutation`
    #[serde(rename = "type")]
    pub event_type: Option<String>,
    /// Operation-specific details, forwarded verbatim in the event text
    #[serde(default)]
    pub data: Value,
    #[serde(flatten)]
    pub common: Common,
}

impl AuditEvent {
    pub fn enrich(&self, headers: &HeaderMap, evt: &mut Event) {
        self.common.enrich(headers, evt);

        if let Some(value) = &self.event_type {
            evt.add_tag("audit_event_type", value);
        }
    }
}
