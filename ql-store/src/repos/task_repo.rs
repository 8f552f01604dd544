//! Quest repository trait

use async_trait::async_trait;

use ql_core::types::{PeriodKey, UserId};

use crate::entities::{TaskDefinitionEntity, UserTaskEntity};
use crate::error::StoreResult;

/// Quest definition store (dynamic side) and per-user quest rows
#[async_trait]
pub trait TaskRepository: Send + Sync {
    async fn list_dynamic_tasks(&self) -> StoreResult<Vec<TaskDefinitionEntity>>;

    async fn upsert_dynamic_task(
        &self,
        definition: TaskDefinitionEntity,
    ) -> StoreResult<TaskDefinitionEntity>;

    async fn get_user_task(
        &self,
        user_id: &UserId,
        slug: &str,
        period_key: &PeriodKey,
    ) -> StoreResult<Option<UserTaskEntity>>;

    async fn upsert_user_task(&self, task: UserTaskEntity) -> StoreResult<UserTaskEntity>;

    async fn list_user_tasks(&self, user_id: &UserId) -> StoreResult<Vec<UserTaskEntity>>;

    /// Every in-progress quest row, for the expiry sweep
    async fn list_tasks_in_progress(&self) -> StoreResult<Vec<UserTaskEntity>>;
}
