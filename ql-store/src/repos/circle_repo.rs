//! Circle quest repository trait

use async_trait::async_trait;
use chrono::NaiveDate;

use ql_core::types::{CircleId, PeriodKey, UserId};

use crate::entities::{CircleContributionEntity, CircleTaskEntity};
use crate::error::StoreResult;

/// Circle quest rows and the per-member contribution journal
#[async_trait]
pub trait CircleRepository: Send + Sync {
    async fn get_circle_task(
        &self,
        circle_id: &CircleId,
        slug: &str,
        period_key: &PeriodKey,
    ) -> StoreResult<Option<CircleTaskEntity>>;

    async fn upsert_circle_task(&self, task: CircleTaskEntity) -> StoreResult<CircleTaskEntity>;

    async fn list_circle_tasks_in_progress(&self) -> StoreResult<Vec<CircleTaskEntity>>;

    /// Completed circle tasks, for contribution-share badge conditions
    async fn list_completed_circle_tasks(&self) -> StoreResult<Vec<CircleTaskEntity>>;

    /// Add `amount` to the (task, user, day) journal row, creating it lazily
    async fn add_contribution(
        &self,
        circle_task_id: &str,
        user_id: &UserId,
        day: NaiveDate,
        amount: u32,
    ) -> StoreResult<CircleContributionEntity>;

    /// All journal rows for a circle task
    async fn contributions_for_task(
        &self,
        circle_task_id: &str,
    ) -> StoreResult<Vec<CircleContributionEntity>>;
}
