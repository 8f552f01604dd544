//! Period snapshot entities
//!
//! Immutable-per-period rollups upserted by the close jobs: one row per
//! (subject, period_type, period_start).

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use ql_core::types::{CircleId, PeriodKey, PeriodType, UserId};

use super::level::TransitionType;
use super::new_row_id;

/// Per-user score rollup for a closed period
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct UserScoreSnapshotEntity {
    pub id: String,
    pub user_id: UserId,
    pub period_type: PeriodType,
    pub period_start: NaiveDate,
    pub period_end: NaiveDate,
    pub score: i64,
    pub rank_position: Option<u32>,
    pub created_at: DateTime<Utc>,
}

impl UserScoreSnapshotEntity {
    pub const TABLE: &'static str = "ql_user_score_snapshot";

    pub fn new(
        user_id: UserId,
        period_type: PeriodType,
        period_start: NaiveDate,
        period_end: NaiveDate,
        score: i64,
    ) -> Self {
        Self {
            id: new_row_id(Self::TABLE),
            user_id,
            period_type,
            period_start,
            period_end,
            score,
            rank_position: None,
            created_at: Utc::now(),
        }
    }
}

/// Per-circle score rollup for a closed period
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct CircleScoreSnapshotEntity {
    pub id: String,
    pub circle_id: CircleId,
    pub period_type: PeriodType,
    pub period_start: NaiveDate,
    pub period_end: NaiveDate,
    pub score: i64,
    pub rank_position: Option<u32>,
    pub created_at: DateTime<Utc>,
}

impl CircleScoreSnapshotEntity {
    pub const TABLE: &'static str = "ql_circle_score_snapshot";

    pub fn new(
        circle_id: CircleId,
        period_type: PeriodType,
        period_start: NaiveDate,
        period_end: NaiveDate,
        score: i64,
    ) -> Self {
        Self {
            id: new_row_id(Self::TABLE),
            circle_id,
            period_type,
            period_start,
            period_end,
            score,
            rank_position: None,
            created_at: Utc::now(),
        }
    }
}

/// Weekly league outcome for one user
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct LevelSnapshotEntity {
    pub id: String,
    pub user_id: UserId,
    pub level_id: String,
    pub week_key: PeriodKey,
    pub score: i64,
    pub rank_position: u32,
    pub position_reward: Option<i64>,
    pub transition: TransitionType,
    pub created_at: DateTime<Utc>,
}

impl LevelSnapshotEntity {
    pub const TABLE: &'static str = "ql_level_snapshot";

    #[allow(clippy::too_many_arguments)]
    pub fn new(
        user_id: UserId,
        level_id: impl Into<String>,
        week_key: PeriodKey,
        score: i64,
        rank_position: u32,
        position_reward: Option<i64>,
        transition: TransitionType,
    ) -> Self {
        Self {
            id: new_row_id(Self::TABLE),
            user_id,
            level_id: level_id.into(),
            week_key,
            score,
            rank_position,
            position_reward,
            transition,
            created_at: Utc::now(),
        }
    }
}
