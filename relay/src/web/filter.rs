//! Event type allow-list.

use std::collections::BTreeSet;

/// Returns true when `presented` should be processed under `allow_list`.
///
/// An empty allow-list means no filtering was configured.
pub fn should_process(presented: &str, allow_list: &BTreeSet<String>) -> bool {
    allow_list.is_empty() || allow_list.contains(presented)
}

/// The set of event types an integration wants to see.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EventFilter {
    allowed: BTreeSet<String>,
}

impl EventFilter {
    /// Build a filter from a list of event types. Blank entries are dropped
    /// and duplicates collapse.
    pub fn new<I, S>(event_types: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let allowed = event_types
            .into_iter()
            .map(|s| s.as_ref().trim().to_string())
            .filter(|s| !s.is_empty())
            .collect();

        Self { allowed }
    }

    /// A filter that lets every event type through.
    pub fn allow_all() -> Self {
        Self::default()
    }

    pub fn should_process(&self, presented: &str) -> bool {
        should_process(presented, &self.allowed)
    }

    pub fn is_empty(&self) -> bool {
        self.allowed.is_empty()
    }

    /// Comma-separated list of the allowed types, for logging.
    pub fn describe(&self) -> String {
        self.allowed
            .iter()
            .map(String::as_str)
            .collect::<Vec<_>>()
            .join(", ")
    }
}
