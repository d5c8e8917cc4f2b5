//! Fields present on every Cirrus CI webhook payload.

use axum::http::HeaderMap;
use chrono::DateTime;
use serde::{Deserialize, Deserializer};

use crate::datadog::Event;

/// Header carrying the unique id of a webhook delivery.
pub const DELIVERY_HEADER: &str = "X-Cirrus-Delivery";

#[derive(Debug, Clone, Default, Deserialize)]
pub struct Common {
    pub action: Option<String>,
    /// Milliseconds since the Unix epoch
    pub timestamp: Option<i64>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub actor: Actor,
    #[serde(default, deserialize_with = "null_as_default")]
    pub repository: Repository,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct Actor {
    pub id: Option<i64>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct Repository {
    pub id: Option<i64>,
    pub owner: Option<String>,
    pub name: Option<String>,
}

impl Common {
    pub fn enrich(&self, headers: &HeaderMap, evt: &mut Event) {
        if let Some(delivery_id) = headers.get(DELIVERY_HEADER).and_then(|v| v.to_str().ok()) {
            evt.add_tag("webhook_delivery_id", delivery_id);
        }

        if let Some(value) = &self.action {
            evt.add_tag("action", value);
        }
        if let Some(value) = self.timestamp {
            evt.timestamp = DateTime::from_timestamp_millis(value);
        }
        if let Some(value) = self.actor.id {
            evt.add_tag("actor_id", value);
        }
        if let Some(value) = self.repository.id {
            evt.add_tag("repository_id", value);
        }
        if let Some(value) = &self.repository.owner {
            evt.add_tag("repository_owner", value);
        }
        if let Some(value) = &self.repository.name {
            evt.add_tag("repository_name", value);
        }
    }
}

/// Treat an explicit JSON `null` like a missing field.
pub(crate) fn null_as_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}
