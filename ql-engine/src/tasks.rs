//! Quest progress service
//!
//! Period-scoped counters created lazily per (user, quest, period key). A
//! matching event increments the counter; reaching the target completes the
//! quest, pays the reward through the ledger, and emits terminal completion
//! events that never feed back into quest matching.

use std::collections::BTreeMap;
use std::sync::Arc;

use serde_json::json;
use tracing::{info, warn};

use ql_core::config::{default_tasks, TaskDefinitionSpec, TaskType};
use ql_core::constants::{event_types, notifications};
use ql_core::logging::operations;
use ql_core::period::PeriodService;
use ql_core::types::{EventType, Metadata, UserId};
use ql_store::{
    Datastore, DefinitionSource, EventEntity, TaskDefinitionEntity, TaskStatus, UserTaskEntity,
};

use crate::badges::BadgeService;
use crate::error::EngineResult;
use crate::ledger::LedgerService;
use crate::notify::Notifier;

/// Event types that only count once per calendar day toward weekly and
/// monthly quests.
const FIRST_OF_DAY_TYPES: &[&str] = &[event_types::DIET_COMPLETED, event_types::EXERCISE_COMPLETED];

/// Completion event type for a quest scope
fn completion_event_type(task_type: TaskType) -> &'static str {
    match task_type {
        TaskType::Daily => event_types::DAILY_TASK_COMPLETED,
        TaskType::Weekly => event_types::WEEKLY_TASK_COMPLETED,
        TaskType::Monthly => event_types::MONTHLY_TASK_COMPLETED,
        TaskType::Circle => event_types::CIRCLE_TASK_COMPLETED,
    }
}

/// Per-user quest progress
#[derive(Clone)]
pub struct TaskProgressService {
    store: Arc<dyn Datastore>,
    ledger: LedgerService,
    badges: BadgeService,
    notifier: Arc<dyn Notifier>,
    period: PeriodService,
}

impl TaskProgressService {
    pub fn new(
        store: Arc<dyn Datastore>,
        ledger: LedgerService,
        badges: BadgeService,
        notifier: Arc<dyn Notifier>,
        period: PeriodService,
    ) -> Self {
        Self {
            store,
            ledger,
            badges,
            notifier,
            period,
        }
    }

    /// Effective quest table: compiled-in defaults overlaid with dynamic
    /// definitions keyed by slug, dynamic entries winning.
    pub async fn definitions(&self) -> EngineResult<Vec<TaskDefinitionEntity>> {
        let mut merged: BTreeMap<String, TaskDefinitionEntity> = default_tasks()
            .into_iter()
            .map(|spec| {
                let entity = TaskDefinitionEntity::from_spec(spec, DefinitionSource::Static);
                (entity.slug.clone(), entity)
            })
            .collect();
        for dynamic in self.store.list_dynamic_tasks().await? {
            merged.insert(dynamic.slug.clone(), dynamic);
        }
        Ok(merged.into_values().collect())
    }

    /// Register or replace a dynamic quest definition
    pub async fn upsert_definition(
        &self,
        spec: TaskDefinitionSpec,
    ) -> EngineResult<TaskDefinitionEntity> {
        let entity = TaskDefinitionEntity::from_spec(spec, DefinitionSource::Dynamic);
        Ok(self.store.upsert_dynamic_task(entity).await?)
    }

    /// Advance every non-circle quest matched by this event. Terminal event
    /// types never advance a quest. Returns the quests completed by this
    /// event.
    pub async fn process_event(
        &self,
        user_id: &UserId,
        event_type: &EventType,
    ) -> EngineResult<Vec<UserTaskEntity>> {
        if event_type.is_terminal() {
            return Ok(Vec::new());
        }

        let mut completed = Vec::new();
        for definition in self.definitions().await? {
            if definition.task_type == TaskType::Circle || !definition.matches(event_type) {
                continue;
            }

            let period_key = self.period.current_key(definition.task_type.period());
            let mut row = match self
                .store
                .get_user_task(user_id, &definition.slug, &period_key)
                .await?
            {
                Some(row) => row,
                None => UserTaskEntity::new(
                    user_id.clone(),
                    &definition.slug,
                    period_key.clone(),
                    definition.target_value,
                ),
            };
            if row.status != TaskStatus::InProgress {
                continue;
            }

            if self.skip_same_day_repeat(&definition, user_id, event_type).await? {
                continue;
            }

            row.current_value += 1;
            row.updated_at = chrono::Utc::now();

            if row.current_value >= row.target_value {
                row.complete();
                let row = self.store.upsert_user_task(row).await?;
                self.settle_completion(user_id, &definition, &row).await;
                completed.push(row);
            } else {
                info!(
                    user_id = %user_id,
                    task = %definition.slug,
                    operation = operations::TASK_PROGRESS,
                    progress = row.current_value,
                    target = row.target_value,
                    "quest progress advanced"
                );
                self.store.upsert_user_task(row).await?;
            }
        }

        Ok(completed)
    }

    /// Quest rows for a user's progress overview
    pub async fn progress_of(&self, user_id: &UserId) -> EngineResult<Vec<UserTaskEntity>> {
        Ok(self.store.list_user_tasks(user_id).await?)
    }

    /// Mark every in-progress quest row whose period has passed as expired.
    /// Returns the number of rows expired.
    pub async fn expire_old_tasks(&self) -> EngineResult<u64> {
        let definitions: BTreeMap<String, TaskDefinitionEntity> = self
            .definitions()
            .await?
            .into_iter()
            .map(|d| (d.slug.clone(), d))
            .collect();

        let mut expired = 0u64;
        for mut row in self.store.list_tasks_in_progress().await? {
            let Some(definition) = definitions.get(&row.task_slug) else {
                warn!(task = %row.task_slug, "in-progress quest has no definition, skipping");
                continue;
            };
            let current = self.period.current_key(definition.task_type.period());
            if row.period_key == current {
                continue;
            }
            row.status = TaskStatus::Expired;
            row.updated_at = chrono::Utc::now();
            info!(
                user_id = %row.user_id,
                task = %row.task_slug,
                operation = operations::TASK_EXPIRED,
                period = %row.period_key,
                "quest expired"
            );
            self.store.upsert_user_task(row).await?;
            expired += 1;
        }
        Ok(expired)
    }

    /// Weekly and monthly diet/exercise quests only count the first matching
    /// event of a type per day. The current event is already persisted, so a
    /// same-day count above one means this is a repeat.
    async fn skip_same_day_repeat(
        &self,
        definition: &TaskDefinitionEntity,
        user_id: &UserId,
        event_type: &EventType,
    ) -> EngineResult<bool> {
        let scoped = matches!(definition.task_type, TaskType::Weekly | TaskType::Monthly);
        if !scoped || !FIRST_OF_DAY_TYPES.contains(&event_type.as_str()) {
            return Ok(false);
        }
        let today_count = self
            .store
            .count_valid_on_day(user_id, event_type, self.period.today())
            .await?;
        Ok(today_count > 1)
    }

    /// Pay the reward and emit the terminal completion events. The quest row
    /// is already committed as completed; failures here are logged and
    /// swallowed.
    async fn settle_completion(
        &self,
        user_id: &UserId,
        definition: &TaskDefinitionEntity,
        row: &UserTaskEntity,
    ) {
        info!(
            user_id = %user_id,
            task = %definition.slug,
            operation = operations::TASK_COMPLETED,
            points = definition.reward_score,
            period = %row.period_key,
            "quest completed"
        );

        if definition.reward_score > 0 {
            let reason = format!("task_reward:{}", definition.slug);
            if let Err(err) = self
                .ledger
                .add_points(user_id, definition.reward_score, &reason, None, None)
                .await
            {
                warn!(
                    user_id = %user_id,
                    task = %definition.slug,
                    error = %err,
                    "failed to pay quest reward"
                );
            }
        }

        let mut metadata = Metadata::new();
        metadata.insert("task".to_string(), json!(definition.slug));
        metadata.insert("title".to_string(), json!(definition.title));
        metadata.insert("task_type".to_string(), json!(definition.task_type.as_str()));
        metadata.insert("reward_score".to_string(), json!(definition.reward_score));
        metadata.insert(
            "badge_progress_contribution".to_string(),
            json!(definition.badge_progress_contribution),
        );

        let typed = completion_event_type(definition.task_type);
        for completion in [typed, event_types::TASK_COMPLETED] {
            let key = format!(
                "{completion}:{}:{}:{}",
                user_id, definition.slug, row.period_key
            );
            let event = EventEntity::new(
                user_id.clone(),
                EventType::new(completion),
                key,
                "engine",
                self.period.today(),
            )
            .with_entity(Some("task".to_string()), Some(definition.slug.clone()))
            .with_metadata(metadata.clone());
            if let Err(err) = self.store.insert_event(event).await {
                if !err.is_duplicate() {
                    warn!(
                        user_id = %user_id,
                        task = %definition.slug,
                        error = %err,
                        "failed to record completion event"
                    );
                }
            }
        }

        // Completion events may themselves move badges forward
        if let Err(err) = self
            .badges
            .process_event(user_id, &EventType::new(typed))
            .await
        {
            warn!(
                user_id = %user_id,
                task = %definition.slug,
                error = %err,
                "badge pass after completion failed"
            );
        }

        self.notifier
            .notify(
                user_id,
                notifications::TASK_COMPLETED,
                serde_json::Value::Object(metadata),
            )
            .await;
    }
}
