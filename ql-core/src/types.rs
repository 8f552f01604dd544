//! Common domain types
//!
//! Newtype identifiers shared across the engine. Identifiers wrap plain
//! strings so that callers cannot confuse a user id with a circle id or an
//! opaque event id.

use serde::{Deserialize, Serialize};

use crate::constants::terminal_events;

/// User identifier
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct UserId(pub String);

impl UserId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for UserId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Circle (group) identifier
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct CircleId(pub String);

impl CircleId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for CircleId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Event identifier
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct EventId(pub String);

impl EventId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for EventId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Event type identifier
///
/// The vocabulary is open (dynamic quest and badge definitions may reference
/// new types) so this is a string newtype; well-known values live in
/// [`crate::constants::event_types`].
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct EventType(pub String);

impl EventType {
    pub fn new(t: impl Into<String>) -> Self {
        Self(t.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Terminal event types are emitted by quest completion and must never
    /// feed back into quest matching, or completions would trigger
    /// completions without end.
    pub fn is_terminal(&self) -> bool {
        terminal_events::ALL.contains(&self.0.as_str())
    }
}

impl std::fmt::Display for EventType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for EventType {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

/// Opaque key/value metadata attached to an event
pub type Metadata = serde_json::Map<String, serde_json::Value>;

/// Read an integral metadata field, accepting both number and numeric-string
/// encodings.
pub fn metadata_i64(metadata: &Metadata, key: &str) -> Option<i64> {
    let value = metadata.get(key)?;
    value
        .as_i64()
        .or_else(|| value.as_str().and_then(|s| s.parse().ok()))
}

/// Read a string metadata field.
pub fn metadata_str<'a>(metadata: &'a Metadata, key: &str) -> Option<&'a str> {
    metadata.get(key).and_then(|v| v.as_str())
}

/// Aggregation period granularity
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PeriodType {
    Daily,
    Weekly,
    Monthly,
}

impl PeriodType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Daily => "daily",
            Self::Weekly => "weekly",
            Self::Monthly => "monthly",
        }
    }
}

impl std::fmt::Display for PeriodType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Canonical period key (`YYYY-MM-DD`, `YYYY-Www`, or `YYYY-MM`)
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct PeriodKey(pub String);

impl PeriodKey {
    pub fn new(key: impl Into<String>) -> Self {
        Self(key.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for PeriodKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_metadata_i64_accepts_number_and_string() {
        let mut metadata = Metadata::new();
        metadata.insert("a".to_string(), serde_json::json!(12));
        metadata.insert("b".to_string(), serde_json::json!("34"));
        metadata.insert("c".to_string(), serde_json::json!("nope"));

        assert_eq!(metadata_i64(&metadata, "a"), Some(12));
        assert_eq!(metadata_i64(&metadata, "b"), Some(34));
        assert_eq!(metadata_i64(&metadata, "c"), None);
        assert_eq!(metadata_i64(&metadata, "missing"), None);
    }

    #[test]
    fn test_terminal_event_types() {
        assert!(EventType::from("task_completed").is_terminal());
        assert!(EventType::from("weekly_task_completed").is_terminal());
        assert!(!EventType::from("login_success").is_terminal());
    }
}
