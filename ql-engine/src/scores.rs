//! Score snapshot service
//!
//! Period rollups written by the close jobs. One row per (subject, period
//! type, period start), upserted by replacement so a re-run of a close is
//! harmless. Rankings sort a period's snapshots by score and assign 1-based
//! positions.

use std::sync::Arc;

use chrono::NaiveDate;
use tracing::info;

use ql_core::period::PeriodService;
use ql_core::types::{CircleId, PeriodKey, PeriodType, UserId};
use ql_store::{CircleScoreSnapshotEntity, Datastore, UserScoreSnapshotEntity};

use crate::directory::UserDirectory;
use crate::error::EngineResult;
use crate::ledger::LedgerService;

/// Period score rollups and rankings
#[derive(Clone)]
pub struct ScoreService {
    store: Arc<dyn Datastore>,
    ledger: LedgerService,
    directory: Arc<dyn UserDirectory>,
    period: PeriodService,
}

impl ScoreService {
    pub fn new(
        store: Arc<dyn Datastore>,
        ledger: LedgerService,
        directory: Arc<dyn UserDirectory>,
        period: PeriodService,
    ) -> Self {
        Self {
            store,
            ledger,
            directory,
            period,
        }
    }

    /// Upsert the user's earned-points rollup for a period. Returns `None`
    /// for an unparsable period key.
    pub async fn snapshot_user(
        &self,
        user_id: &UserId,
        period_type: PeriodType,
        key: &PeriodKey,
    ) -> EngineResult<Option<UserScoreSnapshotEntity>> {
        let Some((start, end)) = self.period.bounds(key, period_type) else {
            return Ok(None);
        };
        let score = self.ledger.earned_between(user_id, start, end).await?;
        let snapshot =
            UserScoreSnapshotEntity::new(user_id.clone(), period_type, start, end, score);
        Ok(Some(self.store.upsert_user_snapshot(snapshot).await?))
    }

    /// Upsert a circle's rollup for a period: the sum of every member's
    /// earned points in the range.
    pub async fn snapshot_circle(
        &self,
        circle_id: &CircleId,
        period_type: PeriodType,
        key: &PeriodKey,
    ) -> EngineResult<Option<CircleScoreSnapshotEntity>> {
        let Some((start, end)) = self.period.bounds(key, period_type) else {
            return Ok(None);
        };
        let mut score = 0i64;
        for member in self.directory.circle_members(circle_id).await? {
            score += self.ledger.earned_between(&member, start, end).await?;
        }
        let snapshot =
            CircleScoreSnapshotEntity::new(circle_id.clone(), period_type, start, end, score);
        Ok(Some(self.store.upsert_circle_snapshot(snapshot).await?))
    }

    /// Assign 1-based rank positions to every user snapshot of a period,
    /// descending by score with ties broken by the lower user id.
    pub async fn calculate_rankings(
        &self,
        period_type: PeriodType,
        period_start: NaiveDate,
    ) -> EngineResult<Vec<UserScoreSnapshotEntity>> {
        let mut snapshots = self
            .store
            .list_user_snapshots(period_type, period_start)
            .await?;
        snapshots.sort_by(|a, b| {
            b.score
                .cmp(&a.score)
                .then_with(|| a.user_id.cmp(&b.user_id))
        });

        let mut ranked = Vec::with_capacity(snapshots.len());
        for (index, mut snapshot) in snapshots.into_iter().enumerate() {
            snapshot.rank_position = Some((index + 1) as u32);
            ranked.push(self.store.upsert_user_snapshot(snapshot).await?);
        }
        info!(
            period = %period_start,
            count = ranked.len(),
            "user rankings assigned"
        );
        Ok(ranked)
    }

    /// Assign 1-based rank positions to every circle snapshot of a period
    pub async fn calculate_circle_rankings(
        &self,
        period_type: PeriodType,
        period_start: NaiveDate,
    ) -> EngineResult<Vec<CircleScoreSnapshotEntity>> {
        let mut snapshots = self
            .store
            .list_circle_snapshots(period_type, period_start)
            .await?;
        snapshots.sort_by(|a, b| {
            b.score
                .cmp(&a.score)
                .then_with(|| a.circle_id.cmp(&b.circle_id))
        });

        let mut ranked = Vec::with_capacity(snapshots.len());
        for (index, mut snapshot) in snapshots.into_iter().enumerate() {
            snapshot.rank_position = Some((index + 1) as u32);
            ranked.push(self.store.upsert_circle_snapshot(snapshot).await?);
        }
        Ok(ranked)
    }
}
