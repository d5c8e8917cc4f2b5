//! Datadog integration.
//!
//! Every webhook becomes one Datadog event: the raw body is the text and the
//! decoded payload contributes tags. The event is then delivered either as a
//! log item over the Logs API or as a DogStatsD event to a local agent.

pub mod api;
pub mod dogstatsd;
pub mod event;

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use tracing::{debug, warn};

use crate::dispatch::{DispatchError, Dispatcher, InboundEvent, SenderError};
use crate::payload::Payload;

pub use api::ApiSender;
pub use dogstatsd::DogstatsdSender;
pub use event::Event;

/// Title of every event sent to Datadog.
pub const EVENT_TITLE: &str = "Webhook event";

/// Datadog silently discards log items whose timestamp is more than this far
/// in the past.
/// Reference: https://docs.datadoghq.com/api/latest/logs/#send-logs
pub const MAX_EVENT_AGE_HOURS: i64 = 18;

/// Where Datadog events are delivered.
#[derive(Debug)]
pub enum DatadogSender {
    Api(ApiSender),
    Dogstatsd(DogstatsdSender),
}

impl DatadogSender {
    pub async fn send_event(&self, event: &Event) -> Result<(), SenderError> {
        match self {
            DatadogSender::Api(sender) => sender.send_event(event).await,
            DatadogSender::Dogstatsd(sender) => sender.send_event(event).await,
        }
    }

    pub fn kind(&self) -> &'static str {
        match self {
            DatadogSender::Api(_) => "api",
            DatadogSender::Dogstatsd(_) => "dogstatsd",
        }
    }
}

/// Whether Datadog will likely drop an event with this timestamp.
pub fn is_likely_discarded(timestamp: DateTime<Utc>, now: DateTime<Utc>) -> bool {
    now - timestamp >= Duration::hours(MAX_EVENT_AGE_HOURS)
}

pub struct DatadogDispatcher {
    sender: DatadogSender,
}

impl DatadogDispatcher {
    pub fn new(sender: DatadogSender) -> Self {
        Self { sender }
    }

    /// Build the Datadog event for a webhook, or `None` if the event type
    /// carries nothing we forward.
    pub fn build_event(inbound: &InboundEvent) -> Result<Option<Event>, DispatchError> {
        let payload = Payload::decode(&inbound.event_type, &inbound.body).map_err(|source| {
            DispatchError::Decode {
                event_type: inbound.event_type.clone(),
                source,
            }
        })?;

        let Some(payload) = payload else {
            debug!(event_type = %inbound.event_type, "datadog_event_type_ignored");
            return Ok(None);
        };

        let mut event = Event::new(EVENT_TITLE, String::from_utf8_lossy(&inbound.body));
        event.add_tag("webhook_event_type", &inbound.event_type);
        payload.enrich(&inbound.headers, &mut event);

        debug!(
            action = ?payload.common().action,
            tags = event.tags.len(),
            "datadog_event_built"
        );

        Ok(Some(event))
    }
}

#[async_trait]
impl Dispatcher for DatadogDispatcher {
    async fn dispatch(&self, inbound: &InboundEvent) -> Result<(), DispatchError> {
        let Some(event) = Self::build_event(inbound)? else {
            return Ok(());
        };

        if let Some(timestamp) = event.timestamp {
            if is_likely_discarded(timestamp, Utc::now()) {
                warn!(
                    event_type = %inbound.event_type,
                    timestamp = %timestamp,
                    max_age_hours = MAX_EVENT_AGE_HOURS,
                    "datadog_event_timestamp_too_old"
                );
            }
        }

        self.sender.send_event(&event).await?;

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use axum::body::Bytes;
    use axum::http::{HeaderMap, HeaderValue};
    use tokio::net::UdpSocket;

    use crate::payload::DELIVERY_HEADER;

    fn inbound(event_type: &str, body: &'static str) -> InboundEvent {
        InboundEvent::new(event_type, HeaderMap::new(), Bytes::from_static(body.as_bytes()))
    }

    #[test]
    fn test_is_likely_discarded() {
        let now = Utc::now();
        assert!(!is_likely_discarded(now, now));
        assert!(!is_likely_discarded(now - Duration::hours(17), now));
        assert!(is_likely_discarded(now - Duration::hours(18), now));
        assert!(is_likely_discarded(now - Duration::days(3), now));
        assert!(!is_likely_discarded(now + Duration::hours(1), now));
    }

    #[test]
    fn test_build_event_for_build() {
        let mut headers = HeaderMap::new();
        headers.insert(DELIVERY_HEADER, HeaderValue::from_static("d-1"));
        let body = r#"{"action":"created","build":{"id":42,"status":"CREATED"}}"#;
        let inbound = InboundEvent::new("build", headers, Bytes::from_static(body.as_bytes()));

        let event = DatadogDispatcher::build_event(&inbound).unwrap().unwrap();

        assert_eq!(event.title, EVENT_TITLE);
        assert_eq!(event.text, body);
        assert_eq!(event.tags[0], "webhook_event_type:build");
        assert!(event.tags.contains(&"webhook_delivery_id:d-1".to_string()));
        assert!(event.tags.contains(&"build_id:42".to_string()));
        assert!(event.tags.contains(&"initializer_username:api".to_string()));
    }

    #[test]
    fn test_build_event_ignores_unknown_types() {
        let event = DatadogDispatcher::build_event(&inbound("check_run", "whatever")).unwrap();
        assert!(event.is_none());
    }

    #[test]
    fn test_build_event_invalid_json() {
        let result = DatadogDispatcher::build_event(&inbound("task", "{oops"));
        assert!(matches!(
            result,
            Err(DispatchError::Decode { ref event_type, .. }) if event_type == "task"
        ));
    }

    #[tokio::test]
    async fn test_dispatch_sends_stale_events_anyway() {
        let agent = UdpSocket::bind("127.0.0.1:0").await.unwrap();
        let sender = DogstatsdSender::new(&agent.local_addr().unwrap().to_string())
            .await
            .unwrap();
        let dispatcher = DatadogDispatcher::new(DatadogSender::Dogstatsd(sender));

        // 2001-09-09, far beyond the 18 hour window
        let body = r#"{"action":"created","timestamp":1000000000000}"#;
        dispatcher.dispatch(&inbound("audit_event", body)).await.unwrap();

        let mut buf = [0u8; 2048];
        let len = agent.recv(&mut buf).await.unwrap();
        let datagram = std::str::from_utf8(&buf[..len]).unwrap();
        assert!(datagram.contains("|d:1000000000|"));
        assert!(datagram.ends_with("#webhook_event_type:audit_event,action:created"));
    }

    #[tokio::test]
    async fn test_dispatch_unknown_type_sends_nothing() {
        let agent = UdpSocket::bind("127.0.0.1:0").await.unwrap();
        let sender = DogstatsdSender::new(&agent.local_addr().unwrap().to_string())
            .await
            .unwrap();
        let dispatcher = DatadogDispatcher::new(DatadogSender::Dogstatsd(sender));

        dispatcher.dispatch(&inbound("check_run", "{}")).await.unwrap();

        let mut buf = [0u8; 64];
        let received = tokio::time::timeout(
            std::time::Duration::from_millis(100),
            agent.recv(&mut buf),
        )
        .await;
        assert!(received.is_err());
    }
}
