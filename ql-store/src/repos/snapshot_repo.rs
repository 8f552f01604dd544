//! Snapshot repository trait

use async_trait::async_trait;
use chrono::NaiveDate;

use ql_core::types::{PeriodType, UserId};

use crate::entities::{CircleScoreSnapshotEntity, LevelSnapshotEntity, UserScoreSnapshotEntity};
use crate::error::StoreResult;

/// Immutable-per-period rollups; upserts are keyed by
/// (subject, period_type, period_start) so close jobs are safe to re-run.
#[async_trait]
pub trait SnapshotRepository: Send + Sync {
    async fn upsert_user_snapshot(
        &self,
        snapshot: UserScoreSnapshotEntity,
    ) -> StoreResult<UserScoreSnapshotEntity>;

    async fn list_user_snapshots(
        &self,
        period_type: PeriodType,
        period_start: NaiveDate,
    ) -> StoreResult<Vec<UserScoreSnapshotEntity>>;

    async fn upsert_circle_snapshot(
        &self,
        snapshot: CircleScoreSnapshotEntity,
    ) -> StoreResult<CircleScoreSnapshotEntity>;

    async fn list_circle_snapshots(
        &self,
        period_type: PeriodType,
        period_start: NaiveDate,
    ) -> StoreResult<Vec<CircleScoreSnapshotEntity>>;

    async fn insert_level_snapshot(
        &self,
        snapshot: LevelSnapshotEntity,
    ) -> StoreResult<LevelSnapshotEntity>;

    async fn list_level_snapshots(&self, user_id: &UserId)
        -> StoreResult<Vec<LevelSnapshotEntity>>;
}
