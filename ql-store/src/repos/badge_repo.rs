//! Badge repository trait

use async_trait::async_trait;

use ql_core::types::UserId;

use crate::entities::{BadgeDefinitionEntity, UserBadgeEntity};
use crate::error::StoreResult;

/// Badge definition store (dynamic side) and per-user progress rows
#[async_trait]
pub trait BadgeRepository: Send + Sync {
    /// All dynamic badge definitions; merged over the static table by slug,
    /// dynamic wins.
    async fn list_dynamic_badges(&self) -> StoreResult<Vec<BadgeDefinitionEntity>>;

    async fn upsert_dynamic_badge(
        &self,
        definition: BadgeDefinitionEntity,
    ) -> StoreResult<BadgeDefinitionEntity>;

    async fn get_user_badge(
        &self,
        user_id: &UserId,
        slug: &str,
    ) -> StoreResult<Option<UserBadgeEntity>>;

    async fn upsert_user_badge(&self, badge: UserBadgeEntity) -> StoreResult<UserBadgeEntity>;

    async fn list_user_badges(&self, user_id: &UserId) -> StoreResult<Vec<UserBadgeEntity>>;
}
