//! Circle quest entities

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use ql_core::types::{CircleId, PeriodKey, UserId};

use super::new_row_id;
use super::task::TaskStatus;

/// Group analogue of a user quest row; one per (circle, quest, period_key)
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct CircleTaskEntity {
    pub id: String,
    pub circle_id: CircleId,
    pub task_slug: String,
    pub period_key: PeriodKey,
    pub current_value: u32,
    pub target_value: u32,
    pub status: TaskStatus,
    pub completed_at: Option<DateTime<Utc>>,
    pub updated_at: DateTime<Utc>,
}

impl CircleTaskEntity {
    pub const TABLE: &'static str = "ql_circle_task";

    pub fn new(
        circle_id: CircleId,
        task_slug: impl Into<String>,
        period_key: PeriodKey,
        target_value: u32,
    ) -> Self {
        Self {
            id: new_row_id(Self::TABLE),
            circle_id,
            task_slug: task_slug.into(),
            period_key,
            current_value: 0,
            target_value,
            status: TaskStatus::InProgress,
            completed_at: None,
            updated_at: Utc::now(),
        }
    }

    pub fn complete(&mut self) {
        self.status = TaskStatus::Completed;
        self.completed_at = Some(Utc::now());
        self.updated_at = Utc::now();
    }
}

/// Per-member per-day contribution journal row, aggregated into the circle
/// task's `current_value`
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct CircleContributionEntity {
    pub id: String,
    pub circle_task_id: String,
    pub user_id: UserId,
    pub day: NaiveDate,
    pub amount: u32,
}

impl CircleContributionEntity {
    pub const TABLE: &'static str = "ql_circle_contribution";

    pub fn new(circle_task_id: impl Into<String>, user_id: UserId, day: NaiveDate) -> Self {
        Self {
            id: new_row_id(Self::TABLE),
            circle_task_id: circle_task_id.into(),
            user_id,
            day,
            amount: 0,
        }
    }
}
