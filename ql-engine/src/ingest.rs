//! Event ingestion state machine
//!
//! The primary inbound interface. One call is one logical unit of work:
//!
//! 1. validate, compute the idempotency digest
//! 2. duplicate lookup; a hit returns the prior result with no new writes
//! 3. daily-limit check; a breach records a rejected event for audit
//! 4. persist the event row, then the ledger entry (this ordering is the
//!    correctness guarantee: no ledger entry without a durable event)
//! 5. best-effort fan-out to streaks, quests, circles, and badges; fan-out
//!    failures never roll back or fail the committed award

use std::sync::Arc;

use serde_json::json;
use sha2::{Digest, Sha256};
use tracing::{info, warn};

use ql_core::constants::{event_types, metadata_keys, outcome_codes};
use ql_core::logging::operations;
use ql_core::period::PeriodService;
use ql_core::rules::RuleEngine;
use ql_core::types::{EventId, EventType, Metadata, UserId};
use ql_store::{Datastore, EventEntity};

use crate::badges::BadgeService;
use crate::circles::CircleTaskService;
use crate::error::{EngineError, EngineResult};
use crate::ledger::LedgerService;
use crate::streak::StreakService;
use crate::tasks::TaskProgressService;

/// One logical user action to ingest
#[derive(Clone, Debug)]
pub struct IngestRequest {
    pub user_id: UserId,
    pub event_type: EventType,
    pub entity_type: Option<String>,
    pub entity_id: Option<String>,
    pub metadata: Metadata,
    pub source: String,
}

impl IngestRequest {
    pub fn new(user_id: UserId, event_type: impl Into<String>) -> Self {
        Self {
            user_id,
            event_type: EventType::new(event_type),
            entity_type: None,
            entity_id: None,
            metadata: Metadata::new(),
            source: "api".to_string(),
        }
    }

    pub fn with_entity(
        mut self,
        entity_type: impl Into<String>,
        entity_id: impl Into<String>,
    ) -> Self {
        self.entity_type = Some(entity_type.into());
        self.entity_id = Some(entity_id.into());
        self
    }

    pub fn with_metadata(mut self, metadata: Metadata) -> Self {
        self.metadata = metadata;
        self
    }

    pub fn with_source(mut self, source: impl Into<String>) -> Self {
        self.source = source.into();
        self
    }
}

/// Terminal status of an ingest call
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum IngestStatus {
    Valid,
    Duplicate,
    Rejected,
}

/// Result of an ingest call
#[derive(Clone, Debug)]
pub struct IngestOutcome {
    pub status: IngestStatus,
    /// Machine code for the status, from [`outcome_codes`]
    pub code: &'static str,
    pub event_id: EventId,
    pub awarded_points: i64,
    pub messages: Vec<String>,
    /// Remaining daily quota, when the event type is limited
    pub daily_remaining: Option<u32>,
    pub current_balance: i64,
}

/// The idempotent intake pipeline
#[derive(Clone)]
pub struct EventIngestionService {
    store: Arc<dyn Datastore>,
    rules: RuleEngine,
    ledger: LedgerService,
    streaks: StreakService,
    tasks: TaskProgressService,
    circles: CircleTaskService,
    badges: BadgeService,
    period: PeriodService,
}

impl EventIngestionService {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        store: Arc<dyn Datastore>,
        rules: RuleEngine,
        ledger: LedgerService,
        streaks: StreakService,
        tasks: TaskProgressService,
        circles: CircleTaskService,
        badges: BadgeService,
        period: PeriodService,
    ) -> Self {
        Self {
            store,
            rules,
            ledger,
            streaks,
            tasks,
            circles,
            badges,
            period,
        }
    }

    /// Ingest one logical action
    pub async fn ingest(&self, request: IngestRequest) -> EngineResult<IngestOutcome> {
        if request.user_id.as_str().is_empty() {
            return Err(EngineError::Validation("user_id must not be empty".into()));
        }
        if request.event_type.as_str().is_empty() {
            return Err(EngineError::Validation(
                "event_type must not be empty".into(),
            ));
        }
        if !self.store.is_ready() {
            return Err(EngineError::NotReady);
        }

        let today = self.period.today();
        let limit = self.rules.daily_limit(&request.event_type);
        // Daily-limited types dedupe within a day; the quota resets with the
        // calendar, so their digest carries the day.
        let key = idempotency_key(&request, limit.map(|_| today));
        if let Some(existing) = self.store.find_by_idempotency_key(&key).await? {
            return self.duplicate_outcome(existing).await;
        }

        let today_count = match limit {
            Some(_) => {
                self.store
                    .count_valid_on_day(&request.user_id, &request.event_type, today)
                    .await?
            }
            None => 0,
        };

        if let Some(limit) = limit {
            if today_count >= limit {
                return self.reject_limited(request, key, today).await;
            }
        }

        let points = self
            .rules
            .calculate_points(&request.event_type, &request.metadata);
        let event = EventEntity::new(
            request.user_id.clone(),
            request.event_type.clone(),
            key.clone(),
            request.source.clone(),
            today,
        )
        .with_entity(request.entity_type.clone(), request.entity_id.clone())
        .with_metadata(request.metadata.clone())
        .with_points(points);

        let event = match self.store.insert_event(event).await {
            Ok(event) => event,
            // Lost the insert race: the other submission owns the key
            Err(err) if err.is_duplicate() => {
                let existing = self
                    .store
                    .find_by_idempotency_key(&key)
                    .await?
                    .ok_or_else(|| EngineError::NotFound("event for duplicate key".into()))?;
                return self.duplicate_outcome(existing).await;
            }
            Err(err) => return Err(err.into()),
        };

        if points > 0 {
            self.ledger
                .add_points(
                    &request.user_id,
                    points,
                    request.event_type.as_str(),
                    Some(event.id.clone()),
                    Some(request.metadata.clone()),
                )
                .await?;
        }

        info!(
            user_id = %request.user_id,
            event_type = %request.event_type,
            event_id = %event.id,
            operation = operations::INGEST,
            points,
            "event ingested"
        );

        self.fan_out(&request).await;

        let message = self
            .rules
            .message(&request.event_type, points, &request.metadata);
        let messages = if message.is_empty() {
            Vec::new()
        } else {
            vec![message]
        };

        Ok(IngestOutcome {
            status: IngestStatus::Valid,
            code: outcome_codes::OK,
            event_id: event.id,
            awarded_points: points,
            messages,
            daily_remaining: limit.map(|l| l.saturating_sub(today_count + 1)),
            current_balance: self.ledger.balance(&request.user_id).await?,
        })
    }

    /// Submit a comment-like milestone for a comment whose like count moved
    /// from `previous` to `current`. Awards the highest threshold crossed in
    /// the move, if any; keyed by comment and threshold so each threshold is
    /// awarded once.
    pub async fn ingest_comment_like_milestone(
        &self,
        user_id: UserId,
        comment_id: impl Into<String>,
        previous: u32,
        current: u32,
    ) -> EngineResult<Option<IngestOutcome>> {
        let Some(threshold) = crossed_like_threshold(previous, current) else {
            return Ok(None);
        };
        let mut metadata = Metadata::new();
        metadata.insert("like_threshold".to_string(), json!(threshold));
        let request = IngestRequest::new(user_id, event_types::COMMENT_LIKE_MILESTONE)
            .with_entity("comment", comment_id)
            .with_metadata(metadata);
        Ok(Some(self.ingest(request).await?))
    }

    async fn duplicate_outcome(&self, existing: EventEntity) -> EngineResult<IngestOutcome> {
        info!(
            user_id = %existing.user_id,
            event_type = %existing.event_type,
            event_id = %existing.id,
            operation = operations::INGEST,
            "duplicate submission"
        );
        let balance = self.ledger.balance(&existing.user_id).await?;
        Ok(IngestOutcome {
            status: IngestStatus::Duplicate,
            code: outcome_codes::DUPLICATE,
            event_id: existing.id,
            awarded_points: existing.points_awarded,
            messages: Vec::new(),
            daily_remaining: None,
            current_balance: balance,
        })
    }

    /// Record the over-limit submission for audit with zero points
    async fn reject_limited(
        &self,
        request: IngestRequest,
        key: String,
        today: chrono::NaiveDate,
    ) -> EngineResult<IngestOutcome> {
        warn!(
            user_id = %request.user_id,
            event_type = %request.event_type,
            operation = operations::INGEST,
            "daily limit exceeded"
        );
        let event = EventEntity::new(
            request.user_id.clone(),
            request.event_type.clone(),
            key.clone(),
            request.source.clone(),
            today,
        )
        .with_entity(request.entity_type, request.entity_id)
        .with_metadata(request.metadata)
        .rejected(outcome_codes::DAILY_LIMIT_EXCEEDED);

        let event = match self.store.insert_event(event).await {
            Ok(event) => event,
            Err(err) if err.is_duplicate() => {
                match self.store.find_by_idempotency_key(&key).await? {
                    Some(existing) => return self.duplicate_outcome(existing).await,
                    None => return Err(err.into()),
                }
            }
            Err(err) => return Err(err.into()),
        };

        Ok(IngestOutcome {
            status: IngestStatus::Rejected,
            code: outcome_codes::DAILY_LIMIT_EXCEEDED,
            event_id: event.id,
            awarded_points: 0,
            messages: Vec::new(),
            daily_remaining: Some(0),
            current_balance: self.ledger.balance(&event.user_id).await?,
        })
    }

    /// Best-effort downstream effects. Each failure is logged and swallowed;
    /// the committed event and ledger entry are never rolled back.
    async fn fan_out(&self, request: &IngestRequest) {
        let user_id = &request.user_id;
        let event_type = &request.event_type;

        if StreakService::is_activity_event(event_type) {
            if let Err(err) = self.streaks.record_default_activity(user_id).await {
                warn!(user_id = %user_id, error = %err, "streak update failed");
            }
        }

        if let Err(err) = self.tasks.process_event(user_id, event_type).await {
            warn!(user_id = %user_id, error = %err, "quest progress failed");
        }

        if let Err(err) = self.circles.process_event(user_id, event_type).await {
            warn!(user_id = %user_id, error = %err, "circle quest progress failed");
        }

        match self.badges.process_event(user_id, event_type).await {
            Ok(earned) => {
                // Badge notifications go out inside the badge service; only
                // the count matters here.
                if !earned.is_empty() {
                    info!(
                        user_id = %user_id,
                        count = earned.len(),
                        "badges earned by event"
                    );
                }
            }
            Err(err) => warn!(user_id = %user_id, error = %err, "badge progress failed"),
        }
    }
}

/// Stable digest of (event type, user, metadata merged with entity refs).
/// Metadata keys iterate in sorted order, so equal logical actions always
/// produce equal keys. For daily-limited types the caller passes the
/// calendar day, which is folded in so the same action dedupes within a
/// day but scores again once the quota resets.
fn idempotency_key(request: &IngestRequest, day: Option<chrono::NaiveDate>) -> String {
    let mut merged = request.metadata.clone();
    if let Some(entity_type) = &request.entity_type {
        merged.insert(metadata_keys::ENTITY_TYPE.to_string(), json!(entity_type));
    }
    if let Some(entity_id) = &request.entity_id {
        merged.insert(metadata_keys::ENTITY_ID.to_string(), json!(entity_id));
    }
    if let Some(day) = day {
        merged.insert(metadata_keys::DAY.to_string(), json!(day.to_string()));
    }

    let mut hasher = Sha256::new();
    hasher.update(request.event_type.as_str().as_bytes());
    hasher.update([0x1f]);
    hasher.update(request.user_id.as_str().as_bytes());
    for (key, value) in &merged {
        hasher.update([0x1f]);
        hasher.update(key.as_bytes());
        hasher.update([0x1e]);
        hasher.update(value.to_string().as_bytes());
    }
    hex::encode(hasher.finalize())
}

/// Highest like-count threshold crossed in `(previous, current]`. Thresholds
/// are 3 likes, then every multiple of 50.
fn crossed_like_threshold(previous: u32, current: u32) -> Option<u32> {
    if current <= previous {
        return None;
    }
    let highest_fifty = (current / 50) * 50;
    if highest_fifty > previous && highest_fifty > 0 {
        return Some(highest_fifty);
    }
    if previous < 3 && current >= 3 {
        return Some(3);
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_idempotency_key_is_stable() {
        let mut metadata = Metadata::new();
        metadata.insert("b".to_string(), json!(2));
        metadata.insert("a".to_string(), json!(1));
        let request = IngestRequest::new(UserId::new("u1"), "login_success")
            .with_metadata(metadata.clone());

        let again = IngestRequest::new(UserId::new("u1"), "login_success")
            .with_metadata(metadata);
        assert_eq!(idempotency_key(&request, None), idempotency_key(&again, None));
    }

    #[test]
    fn test_idempotency_key_differs_per_user_and_entity() {
        let base = IngestRequest::new(UserId::new("u1"), "blog_liked");
        let other_user = IngestRequest::new(UserId::new("u2"), "blog_liked");
        let with_entity = IngestRequest::new(UserId::new("u1"), "blog_liked")
            .with_entity("blog", "post-9");

        assert_ne!(idempotency_key(&base, None), idempotency_key(&other_user, None));
        assert_ne!(idempotency_key(&base, None), idempotency_key(&with_entity, None));
    }

    #[test]
    fn test_idempotency_key_scoped_by_day_when_given() {
        let request = IngestRequest::new(UserId::new("u1"), "login_success");
        let monday = chrono::NaiveDate::from_ymd_opt(2025, 3, 10).unwrap();
        let tuesday = chrono::NaiveDate::from_ymd_opt(2025, 3, 11).unwrap();

        assert_eq!(
            idempotency_key(&request, Some(monday)),
            idempotency_key(&request, Some(monday))
        );
        assert_ne!(
            idempotency_key(&request, Some(monday)),
            idempotency_key(&request, Some(tuesday))
        );
    }

    #[test]
    fn test_like_threshold_first_at_three() {
        assert_eq!(crossed_like_threshold(0, 2), None);
        assert_eq!(crossed_like_threshold(2, 3), Some(3));
        assert_eq!(crossed_like_threshold(3, 10), None);
    }

    #[test]
    fn test_like_threshold_burst_awards_highest() {
        assert_eq!(crossed_like_threshold(48, 52), Some(50));
        assert_eq!(crossed_like_threshold(40, 170), Some(150));
        assert_eq!(crossed_like_threshold(0, 120), Some(100));
    }

    #[test]
    fn test_like_threshold_no_regression() {
        assert_eq!(crossed_like_threshold(60, 55), None);
        assert_eq!(crossed_like_threshold(50, 50), None);
    }
}
