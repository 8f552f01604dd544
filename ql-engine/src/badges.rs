//! Badge service
//!
//! Merges static and dynamic badge definitions (dynamic wins on slug), tracks
//! per-user progress with a monotonicity invariant, and marks badges earned
//! exactly once. Returns every badge newly earned by an event, not just the
//! first.

use std::collections::BTreeMap;
use std::sync::Arc;

use serde_json::json;
use tracing::{debug, info, warn};

use ql_core::config::{default_badges, BadgeDefinitionSpec, BadgeTier};
use ql_core::constants::{event_types, notifications};
use ql_core::logging::operations;
use ql_core::period::PeriodService;
use ql_core::types::{EventType, UserId};
use ql_store::{
    BadgeDefinitionEntity, Datastore, DefinitionSource, EventEntity, UserBadgeEntity,
};

use crate::badge_rules::BadgeRuleEngine;
use crate::error::EngineResult;
use crate::notify::Notifier;

/// A badge the user just earned
#[derive(Clone, Debug)]
pub struct EarnedBadge {
    pub slug: String,
    pub title: String,
    pub tier: BadgeTier,
    pub category: String,
}

/// Achievement progress tracking
#[derive(Clone)]
pub struct BadgeService {
    store: Arc<dyn Datastore>,
    rules: BadgeRuleEngine,
    notifier: Arc<dyn Notifier>,
    period: PeriodService,
}

impl BadgeService {
    pub fn new(
        store: Arc<dyn Datastore>,
        rules: BadgeRuleEngine,
        notifier: Arc<dyn Notifier>,
        period: PeriodService,
    ) -> Self {
        Self {
            store,
            rules,
            notifier,
            period,
        }
    }

    /// Effective definition table: compiled-in defaults overlaid with dynamic
    /// definitions keyed by slug, dynamic entries winning.
    pub async fn definitions(&self) -> EngineResult<Vec<BadgeDefinitionEntity>> {
        let mut merged: BTreeMap<String, BadgeDefinitionEntity> = default_badges()
            .into_iter()
            .map(|spec| {
                let entity = BadgeDefinitionEntity::from_spec(spec, DefinitionSource::Static);
                (entity.slug.clone(), entity)
            })
            .collect();
        for dynamic in self.store.list_dynamic_badges().await? {
            merged.insert(dynamic.slug.clone(), dynamic);
        }
        Ok(merged.into_values().collect())
    }

    /// Register or replace a dynamic badge definition
    pub async fn upsert_definition(
        &self,
        spec: BadgeDefinitionSpec,
    ) -> EngineResult<BadgeDefinitionEntity> {
        let entity = BadgeDefinitionEntity::from_spec(spec, DefinitionSource::Dynamic);
        Ok(self.store.upsert_dynamic_badge(entity).await?)
    }

    /// Re-evaluate every badge whose condition references this event type.
    /// Progress is persisted only when it increased; already-earned badges
    /// are skipped. Returns all badges newly earned by this event.
    pub async fn process_event(
        &self,
        user_id: &UserId,
        event_type: &EventType,
    ) -> EngineResult<Vec<EarnedBadge>> {
        let mut earned = Vec::new();

        for definition in self.definitions().await? {
            if !definition.condition.references(event_type) {
                continue;
            }

            let mut row = match self.store.get_user_badge(user_id, &definition.slug).await? {
                Some(row) => row,
                None => UserBadgeEntity::new(user_id.clone(), &definition.slug),
            };
            if row.is_earned {
                continue;
            }

            let eval = self.rules.evaluate(user_id, &definition.condition).await?;
            let completes = !definition.is_progressive() && eval.passed;

            let mut changed = false;
            if eval.progress > row.current_progress {
                row.current_progress = eval.progress;
                row.updated_at = chrono::Utc::now();
                changed = true;
                debug!(
                    user_id = %user_id,
                    badge = %definition.slug,
                    operation = operations::BADGE_PROGRESS,
                    progress = eval.progress,
                    max = eval.max,
                    "badge progress advanced"
                );
            }
            if completes {
                row.mark_earned();
                changed = true;
            }
            if changed {
                self.store.upsert_user_badge(row).await?;
            }

            if completes {
                self.record_earned(user_id, &definition).await;
                earned.push(EarnedBadge {
                    slug: definition.slug,
                    title: definition.title,
                    tier: definition.tier,
                    category: definition.category,
                });
            }
        }

        Ok(earned)
    }

    /// Progress rows for a user's badge overview
    pub async fn progress_of(&self, user_id: &UserId) -> EngineResult<Vec<UserBadgeEntity>> {
        Ok(self.store.list_user_badges(user_id).await?)
    }

    /// Persist the terminal `badge_earned` event and notify. Best-effort:
    /// the earned flag is already committed, so failures here are logged and
    /// swallowed.
    async fn record_earned(&self, user_id: &UserId, definition: &BadgeDefinitionEntity) {
        info!(
            user_id = %user_id,
            badge = %definition.slug,
            operation = operations::BADGE_EARNED,
            tier = definition.tier.as_str(),
            "badge earned"
        );

        let key = format!("badge_earned:{}:{}", user_id, definition.slug);
        let mut metadata = ql_core::types::Metadata::new();
        metadata.insert("badge".to_string(), json!(definition.slug));
        metadata.insert("title".to_string(), json!(definition.title));
        metadata.insert("tier".to_string(), json!(definition.tier.as_str()));

        let event = EventEntity::new(
            user_id.clone(),
            EventType::new(event_types::BADGE_EARNED),
            key,
            "engine",
            self.period.today(),
        )
        .with_entity(Some("badge".to_string()), Some(definition.slug.clone()))
        .with_metadata(metadata.clone());

        if let Err(err) = self.store.insert_event(event).await {
            if !err.is_duplicate() {
                warn!(
                    user_id = %user_id,
                    badge = %definition.slug,
                    error = %err,
                    "failed to record badge_earned event"
                );
            }
        }

        self.notifier
            .notify(
                user_id,
                notifications::BADGE_EARNED,
                serde_json::Value::Object(metadata),
            )
            .await;
    }
}
