//! Event repository trait

use async_trait::async_trait;
use chrono::NaiveDate;

use ql_core::types::{EventId, EventType, UserId};

use crate::entities::{EventEntity, EventStatus};
use crate::error::StoreResult;

/// Query filter for event scans; empty vectors match anything
#[derive(Clone, Debug, Default)]
pub struct EventFilter {
    pub user_id: Option<UserId>,
    pub event_types: Vec<EventType>,
    pub statuses: Vec<EventStatus>,
    pub day_start: Option<NaiveDate>,
    pub day_end: Option<NaiveDate>,
    pub limit: Option<usize>,
}

impl EventFilter {
    pub fn for_user(user_id: UserId) -> Self {
        Self {
            user_id: Some(user_id),
            statuses: vec![EventStatus::Valid],
            ..Default::default()
        }
    }

    pub fn with_types(mut self, types: Vec<EventType>) -> Self {
        self.event_types = types;
        self
    }

    pub fn between(mut self, start: NaiveDate, end: NaiveDate) -> Self {
        self.day_start = Some(start);
        self.day_end = Some(end);
        self
    }

    pub fn matches(&self, event: &EventEntity) -> bool {
        if let Some(user) = &self.user_id {
            if &event.user_id != user {
                return false;
            }
        }
        if !self.event_types.is_empty() && !self.event_types.contains(&event.event_type) {
            return false;
        }
        if !self.statuses.is_empty() && !self.statuses.contains(&event.status) {
            return false;
        }
        if let Some(start) = self.day_start {
            if event.occurred_on < start {
                return false;
            }
        }
        if let Some(end) = self.day_end {
            if event.occurred_on > end {
                return false;
            }
        }
        true
    }
}

/// Event persistence
#[async_trait]
pub trait EventRepository: Send + Sync {
    /// Insert a new event. Fails with `StoreError::Duplicate` when another
    /// event already holds the same idempotency key; the caller treats the
    /// lost race as a duplicate submission.
    async fn insert_event(&self, event: EventEntity) -> StoreResult<EventEntity>;

    /// Look up an event by idempotency key
    async fn find_by_idempotency_key(&self, key: &str) -> StoreResult<Option<EventEntity>>;

    /// Look up an event by id
    async fn find_event(&self, id: &EventId) -> StoreResult<Option<EventEntity>>;

    /// Count of valid events for (user, type) on a calendar day; drives the
    /// daily-limit check.
    async fn count_valid_on_day(
        &self,
        user_id: &UserId,
        event_type: &EventType,
        day: NaiveDate,
    ) -> StoreResult<u32>;

    /// Scan events matching the filter, ordered by occurrence ascending
    async fn query_events(&self, filter: &EventFilter) -> StoreResult<Vec<EventEntity>>;
}
