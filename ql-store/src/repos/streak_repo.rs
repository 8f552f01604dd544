//! Streak repository trait

use async_trait::async_trait;

use ql_core::types::UserId;

use crate::entities::StreakEntity;
use crate::error::StoreResult;

/// Streak persistence, one row per (user, streak_type)
#[async_trait]
pub trait StreakRepository: Send + Sync {
    async fn get_streak(
        &self,
        user_id: &UserId,
        streak_type: &str,
    ) -> StoreResult<Option<StreakEntity>>;

    async fn upsert_streak(&self, streak: StreakEntity) -> StoreResult<StreakEntity>;

    /// Zero `grace_used_this_week` on every row; returns rows touched.
    /// Invoked by the weekly close job.
    async fn reset_all_grace(&self) -> StoreResult<u64>;
}
