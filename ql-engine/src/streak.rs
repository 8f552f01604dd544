//! Streak service
//!
//! Applies the pure advance math from `ql_core::streak` to the persisted
//! per-user row and awards milestone bonuses through the ledger.

use std::sync::Arc;

use serde_json::json;
use tracing::info;

use ql_core::constants::{event_types, metadata_keys, streak_types};
use ql_core::logging::operations;
use ql_core::period::PeriodService;
use ql_core::streak::{advance, milestone_bonus, StreakAdvance};
use ql_core::types::{EventType, Metadata, UserId};
use ql_store::{Datastore, EventEntity, StreakEntity};

use crate::error::EngineResult;
use crate::ledger::LedgerService;

/// Event types that count as daily activity for streak purposes
const ACTIVITY_EVENTS: &[&str] = &[
    event_types::LOGIN_SUCCESS,
    event_types::DIET_COMPLETED,
    event_types::EXERCISE_COMPLETED,
];

/// Result of recording one day's activity
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct StreakOutcome {
    pub current_streak: u32,
    pub is_new_milestone: bool,
    pub bonus_points: i64,
}

/// Consecutive-activity tracking
#[derive(Clone)]
pub struct StreakService {
    store: Arc<dyn Datastore>,
    ledger: LedgerService,
    period: PeriodService,
}

impl StreakService {
    pub fn new(store: Arc<dyn Datastore>, ledger: LedgerService, period: PeriodService) -> Self {
        Self {
            store,
            ledger,
            period,
        }
    }

    /// Whether an event of this type drives the daily activity streak
    pub fn is_activity_event(event_type: &EventType) -> bool {
        ACTIVITY_EVENTS.contains(&event_type.as_str())
    }

    /// Record activity for today. Same-day re-entry is a no-op returning the
    /// existing count. Milestone bonuses are appended to the ledger once, on
    /// the increment that reaches the milestone length.
    pub async fn record_activity(
        &self,
        user_id: &UserId,
        streak_type: &str,
    ) -> EngineResult<StreakOutcome> {
        let today = self.period.today();
        let mut row = match self.store.get_streak(user_id, streak_type).await? {
            Some(row) => row,
            None => StreakEntity::new(user_id.clone(), streak_type),
        };

        let outcome = advance(&mut row.state, today);
        let current = row.state.current_count;

        if outcome == StreakAdvance::SameDay {
            return Ok(StreakOutcome {
                current_streak: current,
                is_new_milestone: false,
                bonus_points: 0,
            });
        }

        row.touch();
        self.store.upsert_streak(row).await?;

        let bonus = match outcome {
            StreakAdvance::Incremented { .. } => milestone_bonus(current),
            _ => None,
        };

        let mut paid = 0i64;
        if let Some(bonus_points) = bonus {
            let mut metadata = Metadata::new();
            metadata.insert(metadata_keys::BONUS_POINTS.to_string(), json!(bonus_points));
            metadata.insert("streak_type".to_string(), json!(streak_type));
            metadata.insert("streak_count".to_string(), json!(current));

            // The event row commits before the ledger entry; a duplicate key
            // means this milestone was already settled.
            let key = format!(
                "{}:{}:{}:{}:{}",
                event_types::STREAK_MILESTONE,
                user_id,
                streak_type,
                current,
                today
            );
            let event = EventEntity::new(
                user_id.clone(),
                EventType::new(event_types::STREAK_MILESTONE),
                key,
                "engine",
                today,
            )
            .with_metadata(metadata.clone())
            .with_points(bonus_points);

            match self.store.insert_event(event).await {
                Ok(event) => {
                    self.ledger
                        .add_points(
                            user_id,
                            bonus_points,
                            &format!("streak_milestone:{streak_type}:{current}"),
                            Some(event.id),
                            Some(metadata),
                        )
                        .await?;
                    paid = bonus_points;
                    info!(
                        user_id = %user_id,
                        operation = operations::STREAK_ADVANCE,
                        count = current,
                        points = bonus_points,
                        "streak milestone reached"
                    );
                }
                Err(err) if err.is_duplicate() => {}
                Err(err) => return Err(err.into()),
            }
        }

        Ok(StreakOutcome {
            current_streak: current,
            is_new_milestone: paid > 0,
            bonus_points: paid,
        })
    }

    /// Current daily-activity streak length, 0 with no row
    pub async fn current_streak(&self, user_id: &UserId, streak_type: &str) -> EngineResult<u32> {
        Ok(self
            .store
            .get_streak(user_id, streak_type)
            .await?
            .map(|row| row.state.current_count)
            .unwrap_or(0))
    }

    /// Weekly job hook: clear grace usage for all users
    pub async fn reset_weekly_grace(&self) -> EngineResult<u64> {
        Ok(self.store.reset_all_grace().await?)
    }

    /// Convenience for the ingestion fan-out
    pub async fn record_default_activity(&self, user_id: &UserId) -> EngineResult<StreakOutcome> {
        self.record_activity(user_id, streak_types::DAILY_ACTIVITY)
            .await
    }
}
