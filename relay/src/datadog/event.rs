//! Vendor-neutral representation of an event sent to Datadog.

use std::fmt::Display;

use chrono::{DateTime, Utc};

#[derive(Debug, Clone, PartialEq)]
pub struct Event {
    pub title: String,
    pub text: String,
    /// `key:value` tags
    pub tags: Vec<String>,
    /// When the event happened, if the payload says so
    pub timestamp: Option<DateTime<Utc>>,
}

impl Event {
    pub fn new(title: impl Into<String>, text: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            text: text.into(),
            tags: Vec::new(),
            timestamp: None,
        }
    }

    pub fn add_tag(&mut self, key: &str, value: impl Display) {
        self.tags.push(format!("{}:{}", key, value));
    }
}
