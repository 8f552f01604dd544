//! Event entity

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use ql_core::types::{EventId, EventType, Metadata, UserId};

use super::new_row_id;

/// Lifecycle status of a recorded event
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventStatus {
    Valid,
    Rejected,
    Duplicate,
}

impl EventStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Valid => "valid",
            Self::Rejected => "rejected",
            Self::Duplicate => "duplicate",
        }
    }
}

/// A single recorded user action
///
/// Created once per logical action and never mutated afterwards; status and
/// points are fixed at creation time. The idempotency key is globally unique.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct EventEntity {
    pub id: EventId,
    pub user_id: UserId,
    pub event_type: EventType,
    pub entity_type: Option<String>,
    pub entity_id: Option<String>,
    pub occurred_at: DateTime<Utc>,
    /// Calendar day of `occurred_at` in the engine's fixed timezone
    pub occurred_on: NaiveDate,
    pub idempotency_key: String,
    pub source: String,
    pub status: EventStatus,
    pub rejection_reason: Option<String>,
    pub points_awarded: i64,
    pub metadata: Metadata,
    pub created_at: DateTime<Utc>,
}

impl EventEntity {
    pub const TABLE: &'static str = "ql_event";

    pub fn new(
        user_id: UserId,
        event_type: EventType,
        idempotency_key: impl Into<String>,
        source: impl Into<String>,
        occurred_on: NaiveDate,
    ) -> Self {
        let now = Utc::now();
        Self {
            id: EventId::new(new_row_id(Self::TABLE)),
            user_id,
            event_type,
            entity_type: None,
            entity_id: None,
            occurred_at: now,
            occurred_on,
            idempotency_key: idempotency_key.into(),
            source: source.into(),
            status: EventStatus::Valid,
            rejection_reason: None,
            points_awarded: 0,
            metadata: Metadata::new(),
            created_at: now,
        }
    }

    pub fn with_entity(mut self, entity_type: Option<String>, entity_id: Option<String>) -> Self {
        self.entity_type = entity_type;
        self.entity_id = entity_id;
        self
    }

    pub fn with_metadata(mut self, metadata: Metadata) -> Self {
        self.metadata = metadata;
        self
    }

    pub fn with_points(mut self, points: i64) -> Self {
        self.points_awarded = points;
        self
    }

    pub fn rejected(mut self, reason: impl Into<String>) -> Self {
        self.status = EventStatus::Rejected;
        self.rejection_reason = Some(reason.into());
        self.points_awarded = 0;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rejected_event_has_zero_points() {
        let day = NaiveDate::from_ymd_opt(2025, 1, 1).unwrap();
        let event = EventEntity::new(
            UserId::new("u1"),
            EventType::from("login_success"),
            "key",
            "test",
            day,
        )
        .with_points(2)
        .rejected("daily_limit_exceeded");

        assert_eq!(event.status, EventStatus::Rejected);
        assert_eq!(event.points_awarded, 0);
        assert_eq!(
            event.rejection_reason.as_deref(),
            Some("daily_limit_exceeded")
        );
    }
}
