//! League service
//!
//! Weekly promotion and demotion over a fixed tier ladder. Every user holds
//! exactly one current membership row; each weekly outcome closes the old row
//! and opens a new one, forming a history chain, and writes one snapshot per
//! member. Position rewards go through the standard ingestion path so they
//! are subject to the same idempotency rules as any other event.

use std::sync::Arc;

use serde_json::json;
use tracing::{info, warn};

use ql_core::config::default_levels;
use ql_core::constants::{
    event_types, metadata_keys, notifications, DEMOTION_ZONE, POSITION_REWARDS, PROMOTION_ZONE,
};
use ql_core::logging::operations;
use ql_core::period::PeriodService;
use ql_core::types::{Metadata, PeriodKey, PeriodType, UserId};
use ql_store::{
    Datastore, LevelEntity, LevelSnapshotEntity, TransitionType, UserLevelEntity,
};

use crate::error::{EngineError, EngineResult};
use crate::ingest::{EventIngestionService, IngestRequest};
use crate::notify::Notifier;

/// One member's weekly league outcome
#[derive(Clone, Debug)]
pub struct LevelOutcome {
    pub user_id: UserId,
    pub rank_position: u32,
    pub score: i64,
    pub transition: TransitionType,
    pub position_reward: Option<i64>,
}

/// Weekly league promotion and demotion
#[derive(Clone)]
pub struct LevelService {
    store: Arc<dyn Datastore>,
    ingestion: EventIngestionService,
    notifier: Arc<dyn Notifier>,
    period: PeriodService,
}

impl LevelService {
    pub fn new(
        store: Arc<dyn Datastore>,
        ingestion: EventIngestionService,
        notifier: Arc<dyn Notifier>,
        period: PeriodService,
    ) -> Self {
        Self {
            store,
            ingestion,
            notifier,
            period,
        }
    }

    /// Provision the tier ladder; idempotent
    pub async fn seed(&self) -> EngineResult<()> {
        let levels = default_levels()
            .into_iter()
            .map(LevelEntity::from_spec)
            .collect();
        Ok(self.store.seed_levels(levels).await?)
    }

    /// Place a user into the bottom tier if they have no membership yet
    pub async fn ensure_member(&self, user_id: &UserId) -> EngineResult<UserLevelEntity> {
        if let Some(current) = self.store.current_level_of(user_id).await? {
            return Ok(current);
        }
        let bottom = self
            .store
            .list_levels()
            .await?
            .into_iter()
            .last()
            .ok_or_else(|| EngineError::NotFound("level ladder not seeded".into()))?;
        let row = UserLevelEntity::new(user_id.clone(), bottom.id, TransitionType::Initial, None);
        Ok(self.store.insert_user_level(row).await?)
    }

    /// The user's current tier and membership row
    pub async fn current_level(
        &self,
        user_id: &UserId,
    ) -> EngineResult<Option<(LevelEntity, UserLevelEntity)>> {
        let Some(membership) = self.store.current_level_of(user_id).await? else {
            return Ok(None);
        };
        let level = self
            .store
            .find_level(&membership.level_id)
            .await?
            .ok_or_else(|| EngineError::NotFound(format!("level {}", membership.level_id)))?;
        Ok(Some((level, membership)))
    }

    /// Weekly close: rank every tier's members by their earned points in the
    /// given week, promote the top zone, demote the bottom zone, retain the
    /// rest, pay position rewards, and snapshot every member. A failure on
    /// one member is logged and does not stop the pass.
    pub async fn close_week(&self, week_key: &PeriodKey) -> EngineResult<Vec<LevelOutcome>> {
        let Some((week_start, week_end)) = self.period.bounds(week_key, PeriodType::Weekly) else {
            warn!(period = %week_key, "unparsable week key, skipping league close");
            return Ok(Vec::new());
        };

        let levels = self.store.list_levels().await?;
        let max_rank = levels.iter().map(|l| l.rank_order).max().unwrap_or(0);
        let mut outcomes = Vec::new();

        for level in &levels {
            let members = self.store.members_of_level(&level.id).await?;
            if members.is_empty() {
                continue;
            }

            // Rank by weekly earned points descending, ties broken by the
            // lower user id.
            let mut ranked: Vec<(UserId, i64)> = Vec::with_capacity(members.len());
            for membership in &members {
                let score = self
                    .store
                    .total_earned_between(&membership.user_id, week_start, week_end)
                    .await?;
                ranked.push((membership.user_id.clone(), score));
            }
            ranked.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(&b.0)));

            let count = ranked.len();
            for (index, (user_id, score)) in ranked.into_iter().enumerate() {
                let position = (index + 1) as u32;
                let transition = zone_transition(index, count, level.rank_order, max_rank);
                let target_rank = match transition {
                    TransitionType::Promote => level.rank_order - 1,
                    TransitionType::Demote => level.rank_order + 1,
                    _ => level.rank_order,
                };

                let outcome = self
                    .apply_outcome(
                        &user_id, level, target_rank, transition, position, score, week_key,
                    )
                    .await;
                match outcome {
                    Ok(outcome) => outcomes.push(outcome),
                    Err(err) => warn!(
                        user_id = %user_id,
                        period = %week_key,
                        error = %err,
                        "league close failed for member"
                    ),
                }
            }
        }

        Ok(outcomes)
    }

    /// Past weekly outcomes for a user
    pub async fn history_of(&self, user_id: &UserId) -> EngineResult<Vec<LevelSnapshotEntity>> {
        Ok(self.store.list_level_snapshots(user_id).await?)
    }

    #[allow(clippy::too_many_arguments)]
    async fn apply_outcome(
        &self,
        user_id: &UserId,
        level: &LevelEntity,
        target_rank: u32,
        transition: TransitionType,
        position: u32,
        score: i64,
        week_key: &PeriodKey,
    ) -> EngineResult<LevelOutcome> {
        let target_level = self
            .store
            .find_level_by_rank(target_rank)
            .await?
            .ok_or_else(|| EngineError::NotFound(format!("level rank {target_rank}")))?;

        let reward = self.pay_position_reward(user_id, position, week_key).await;

        let membership = self
            .store
            .current_level_of(user_id)
            .await?
            .ok_or_else(|| EngineError::NotFound(format!("membership of {user_id}")))?;
        self.store
            .close_user_level(&membership.id, chrono::Utc::now())
            .await?;
        self.store
            .insert_user_level(UserLevelEntity::new(
                user_id.clone(),
                target_level.id.clone(),
                transition,
                Some(week_key.clone()),
            ))
            .await?;

        self.store
            .insert_level_snapshot(LevelSnapshotEntity::new(
                user_id.clone(),
                level.id.clone(),
                week_key.clone(),
                score,
                position,
                reward,
                transition,
            ))
            .await?;

        info!(
            user_id = %user_id,
            operation = operations::LEVEL_TRANSITION,
            period = %week_key,
            transition = transition.as_str(),
            position,
            points = score,
            "league outcome applied"
        );

        let kind = match transition {
            TransitionType::Promote => notifications::LEVEL_PROMOTE,
            TransitionType::Demote => notifications::LEVEL_DEMOTE,
            _ => notifications::LEVEL_RETAIN,
        };
        self.notifier
            .notify(
                user_id,
                kind,
                json!({
                    "from_level": level.name,
                    "to_level": target_level.name,
                    "week": week_key.as_str(),
                    "position": position,
                    "score": score,
                }),
            )
            .await;

        Ok(LevelOutcome {
            user_id: user_id.clone(),
            rank_position: position,
            score,
            transition,
            position_reward: reward,
        })
    }

    /// Positions 1-3 earn bonus points, submitted through the normal
    /// ingestion path so a re-run of the close is deduplicated by the
    /// (user, week, position) digest. Reward failure never blocks the
    /// transition.
    async fn pay_position_reward(
        &self,
        user_id: &UserId,
        position: u32,
        week_key: &PeriodKey,
    ) -> Option<i64> {
        let (_, points) = POSITION_REWARDS.iter().find(|(p, _)| *p == position)?;

        let mut metadata = Metadata::new();
        metadata.insert(metadata_keys::REWARD_POINTS.to_string(), json!(points));
        metadata.insert(metadata_keys::WEEK.to_string(), json!(week_key.as_str()));
        metadata.insert(metadata_keys::POSITION.to_string(), json!(position));
        let request = IngestRequest::new(user_id.clone(), event_types::POSITION_REWARD)
            .with_metadata(metadata)
            .with_source("engine");

        match self.ingestion.ingest(request).await {
            Ok(outcome) => {
                self.notifier
                    .notify(
                        user_id,
                        notifications::LEVEL_POSITION_REWARDED,
                        json!({
                            "week": week_key.as_str(),
                            "position": position,
                            "points": outcome.awarded_points,
                        }),
                    )
                    .await;
                Some(outcome.awarded_points)
            }
            Err(err) => {
                warn!(
                    user_id = %user_id,
                    period = %week_key,
                    position,
                    error = %err,
                    "position reward failed"
                );
                None
            }
        }
    }
}

/// Zone assignment for the member at `index` (0-based, ranked descending) of
/// a tier with `count` members. Promotion requires a strictly higher tier,
/// demotion a strictly lower one; a member in both zones promotes.
fn zone_transition(index: usize, count: usize, rank_order: u32, max_rank: u32) -> TransitionType {
    let can_promote = rank_order > 1;
    let can_demote = rank_order < max_rank;

    if can_promote && index < PROMOTION_ZONE {
        return TransitionType::Promote;
    }
    if can_demote && index >= count.saturating_sub(DEMOTION_ZONE) && index >= PROMOTION_ZONE {
        return TransitionType::Demote;
    }
    if can_demote && !can_promote && index >= count.saturating_sub(DEMOTION_ZONE) {
        return TransitionType::Demote;
    }
    TransitionType::Retain
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_zone_transition_middle_tier() {
        // Twelve members of a middle tier: 1-5 promote, 8-12 demote
        let outcomes: Vec<TransitionType> = (0..12)
            .map(|i| zone_transition(i, 12, 3, 5))
            .collect();
        assert!(outcomes[..5]
            .iter()
            .all(|t| *t == TransitionType::Promote));
        assert!(outcomes[5..7].iter().all(|t| *t == TransitionType::Retain));
        assert!(outcomes[7..].iter().all(|t| *t == TransitionType::Demote));
    }

    #[test]
    fn test_top_tier_never_promotes() {
        assert_eq!(zone_transition(0, 12, 1, 5), TransitionType::Retain);
        assert_eq!(zone_transition(11, 12, 1, 5), TransitionType::Demote);
    }

    #[test]
    fn test_bottom_tier_never_demotes() {
        assert_eq!(zone_transition(0, 12, 5, 5), TransitionType::Promote);
        assert_eq!(zone_transition(11, 12, 5, 5), TransitionType::Retain);
    }

    #[test]
    fn test_small_tier_prefers_promotion() {
        // Six members: the promotion zone wins the overlap
        let outcomes: Vec<TransitionType> =
            (0..6).map(|i| zone_transition(i, 6, 3, 5)).collect();
        assert!(outcomes[..5]
            .iter()
            .all(|t| *t == TransitionType::Promote));
        assert_eq!(outcomes[5], TransitionType::Demote);
    }
}
