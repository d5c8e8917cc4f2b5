//! Cirrus CI webhook payload types.
//!
//! The event type header selects which shape the body is decoded into:
//!
//! ```text
//! audit_event  → AuditEvent
//! build, task  → BuildOrTask
//! anything else → nothing to do
//! ```

pub mod audit_event;
pub mod build_or_task;
pub mod common;

use axum::http::HeaderMap;

use crate::datadog::Event;

pub use audit_event::AuditEvent;
pub use build_or_task::{Build, BuildOrTask, Task, User};
pub use common::{Actor, Common, Repository, DELIVERY_HEADER};

/// Which payload shape an event type decodes into.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PayloadKind {
    AuditEvent,
    BuildOrTask,
}

/// Event type → payload shape.
const PAYLOAD_KINDS: &[(&str, PayloadKind)] = &[
    ("audit_event", PayloadKind::AuditEvent),
    ("build", PayloadKind::BuildOrTask),
    ("task", PayloadKind::BuildOrTask),
];

impl PayloadKind {
    pub fn for_event_type(event_type: &str) -> Option<Self> {
        PAYLOAD_KINDS
            .iter()
            .find(|(name, _)| *name == event_type)
            .map(|(_, kind)| *kind)
    }
}

/// A decoded webhook payload.
#[derive(Debug, Clone)]
pub enum Payload {
    AuditEvent(AuditEvent),
    BuildOrTask(BuildOrTask),
}

impl Payload {
    /// Decode `body` according to `event_type`.
    ///
    /// Returns `Ok(None)` for event types that have no payload shape.
    pub fn decode(event_type: &str, body: &[u8]) -> Result<Option<Self>, serde_json::Error> {
        let Some(kind) = PayloadKind::for_event_type(event_type) else {
            return Ok(None);
        };

        let payload = match kind {
            PayloadKind::AuditEvent => Payload::AuditEvent(serde_json::from_slice(body)?),
            PayloadKind::BuildOrTask => Payload::BuildOrTask(serde_json::from_slice(body)?),
        };

        Ok(Some(payload))
    }

    pub fn common(&self) -> &Common {
        match self {
            Payload::AuditEvent(p) => &p.common,
            Payload::BuildOrTask(p) => &p.common,
        }
    }

    /// Add the payload's metadata to a Datadog event.
    pub fn enrich(&self, headers: &HeaderMap, evt: &mut Event) {
        match self {
            Payload::AuditEvent(p) => p.enrich(headers, evt),
            Payload::BuildOrTask(p) => p.enrich(headers, evt),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_payload_kind_mapping() {
        assert_eq!(
            PayloadKind::for_event_type("audit_event"),
            Some(PayloadKind::AuditEvent)
        );
        assert_eq!(
            PayloadKind::for_event_type("build"),
            Some(PayloadKind::BuildOrTask)
        );
        assert_eq!(
            PayloadKind::for_event_type("task"),
            Some(PayloadKind::BuildOrTask)
        );
        assert_eq!(PayloadKind::for_event_type("check_suite"), None);
        assert_eq!(PayloadKind::for_event_type(""), None);
    }

    #[test]
    fn test_decode_unknown_type_is_ignored_even_if_not_json() {
        assert!(Payload::decode("something_else", b"not json").unwrap().is_none());
    }

    #[test]
    fn test_decode_known_types() {
        let payload = Payload::decode("task", br#"{"task": {"id": 1}, "action": "created"}"#)
            .unwrap()
            .unwrap();
        assert!(matches!(payload, Payload::BuildOrTask(ref p) if p.task.id == Some(1)));
        assert_eq!(payload.common().action.as_deref(), Some("created"));

        let payload = Payload::decode("audit_event", br#"{"type": "graphql.mutation"}"#)
            .unwrap()
            .unwrap();
        assert!(matches!(payload, Payload::AuditEvent(_)));
    }

    #[test]
    fn test_decode_invalid_json() {
        assert!(Payload::decode("build", b"{not json").is_err());
        assert!(Payload::decode("audit_event", b"[1, 2, 3]").is_err());
    }
}
