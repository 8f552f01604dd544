//! League repository trait

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use ql_core::types::UserId;

use crate::entities::{LevelEntity, UserLevelEntity};
use crate::error::StoreResult;

/// League tiers and membership history
#[async_trait]
pub trait LevelRepository: Send + Sync {
    /// Seed the tier table if empty; idempotent
    async fn seed_levels(&self, levels: Vec<LevelEntity>) -> StoreResult<()>;

    /// All tiers, ordered by `rank_order` ascending (top tier first)
    async fn list_levels(&self) -> StoreResult<Vec<LevelEntity>>;

    async fn find_level(&self, level_id: &str) -> StoreResult<Option<LevelEntity>>;

    async fn find_level_by_rank(&self, rank_order: u32) -> StoreResult<Option<LevelEntity>>;

    /// The user's single `is_current` membership row, if any
    async fn current_level_of(&self, user_id: &UserId) -> StoreResult<Option<UserLevelEntity>>;

    /// Open a new membership row
    async fn insert_user_level(&self, row: UserLevelEntity) -> StoreResult<UserLevelEntity>;

    /// Close a membership row (`is_current = false`, `left_at` set)
    async fn close_user_level(&self, row_id: &str, left_at: DateTime<Utc>) -> StoreResult<()>;

    /// Current members of a tier
    async fn members_of_level(&self, level_id: &str) -> StoreResult<Vec<UserLevelEntity>>;
}
