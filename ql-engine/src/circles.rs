//! Circle quest service
//!
//! Group analogue of the per-user quests: every member's matching event adds
//! one unit to the circle's weekly counter and is journaled per (task, user,
//! day). Completion pays the reward to every member except professional-role
//! accounts.

use std::sync::Arc;

use serde_json::json;
use tracing::{info, warn};

use ql_core::config::TaskType;
use ql_core::constants::{event_types, notifications};
use ql_core::logging::operations;
use ql_core::period::PeriodService;
use ql_core::types::{CircleId, EventType, Metadata, UserId};
use ql_store::{CircleTaskEntity, Datastore, EventEntity, TaskDefinitionEntity, TaskStatus};

use crate::badges::BadgeService;
use crate::directory::{UserDirectory, UserRole};
use crate::error::EngineResult;
use crate::ledger::LedgerService;
use crate::notify::Notifier;
use crate::tasks::TaskProgressService;

/// Group quest progress and reward fan-out
#[derive(Clone)]
pub struct CircleTaskService {
    store: Arc<dyn Datastore>,
    ledger: LedgerService,
    badges: BadgeService,
    tasks: TaskProgressService,
    directory: Arc<dyn UserDirectory>,
    notifier: Arc<dyn Notifier>,
    period: PeriodService,
}

impl CircleTaskService {
    pub fn new(
        store: Arc<dyn Datastore>,
        ledger: LedgerService,
        badges: BadgeService,
        tasks: TaskProgressService,
        directory: Arc<dyn UserDirectory>,
        notifier: Arc<dyn Notifier>,
        period: PeriodService,
    ) -> Self {
        Self {
            store,
            ledger,
            badges,
            tasks,
            directory,
            notifier,
            period,
        }
    }

    /// Journal this member's event against every matching circle quest of
    /// every circle the member belongs to. Returns the circle quests
    /// completed by this event.
    pub async fn process_event(
        &self,
        user_id: &UserId,
        event_type: &EventType,
    ) -> EngineResult<Vec<CircleTaskEntity>> {
        if event_type.is_terminal() {
            return Ok(Vec::new());
        }

        let circle_definitions: Vec<TaskDefinitionEntity> = self
            .tasks
            .definitions()
            .await?
            .into_iter()
            .filter(|d| d.task_type == TaskType::Circle)
            .collect();
        if circle_definitions.is_empty() {
            return Ok(Vec::new());
        }

        let mut completed = Vec::new();
        for circle_id in self.directory.circles_of(user_id).await? {
            for definition in &circle_definitions {
                if !definition.matches(event_type) {
                    continue;
                }
                if let Some(task) = self
                    .advance(&circle_id, definition, user_id)
                    .await?
                {
                    completed.push(task);
                }
            }
        }
        Ok(completed)
    }

    /// Mark every in-progress circle quest row from a past week as expired
    pub async fn expire_old_tasks(&self) -> EngineResult<u64> {
        let current = self.period.current_key(TaskType::Circle.period());
        let mut expired = 0u64;
        for mut row in self.store.list_circle_tasks_in_progress().await? {
            if row.period_key == current {
                continue;
            }
            row.status = TaskStatus::Expired;
            row.updated_at = chrono::Utc::now();
            info!(
                circle_id = %row.circle_id,
                task = %row.task_slug,
                operation = operations::TASK_EXPIRED,
                period = %row.period_key,
                "circle quest expired"
            );
            self.store.upsert_circle_task(row).await?;
            expired += 1;
        }
        Ok(expired)
    }

    /// Add one contribution unit; complete and settle when the target is
    /// reached. Returns the completed row, if this event completed it.
    async fn advance(
        &self,
        circle_id: &CircleId,
        definition: &TaskDefinitionEntity,
        user_id: &UserId,
    ) -> EngineResult<Option<CircleTaskEntity>> {
        let period_key = self.period.current_key(definition.task_type.period());
        let mut row = match self
            .store
            .get_circle_task(circle_id, &definition.slug, &period_key)
            .await?
        {
            Some(row) => row,
            None => {
                let fresh = CircleTaskEntity::new(
                    circle_id.clone(),
                    &definition.slug,
                    period_key.clone(),
                    definition.target_value,
                );
                self.store.upsert_circle_task(fresh).await?
            }
        };
        if row.status != TaskStatus::InProgress {
            return Ok(None);
        }

        self.store
            .add_contribution(&row.id, user_id, self.period.today(), 1)
            .await?;
        row.current_value += 1;
        row.updated_at = chrono::Utc::now();

        if row.current_value >= row.target_value {
            row.complete();
            let row = self.store.upsert_circle_task(row).await?;
            self.settle_completion(circle_id, definition, &row).await;
            Ok(Some(row))
        } else {
            info!(
                circle_id = %circle_id,
                user_id = %user_id,
                task = %definition.slug,
                operation = operations::TASK_PROGRESS,
                progress = row.current_value,
                target = row.target_value,
                "circle quest progress advanced"
            );
            self.store.upsert_circle_task(row).await?;
            Ok(None)
        }
    }

    /// Pay the reward to every non-professional member and emit per-member
    /// completion events. The circle row is already committed as completed;
    /// per-member failures are logged and do not stop the fan-out.
    async fn settle_completion(
        &self,
        circle_id: &CircleId,
        definition: &TaskDefinitionEntity,
        row: &CircleTaskEntity,
    ) {
        info!(
            circle_id = %circle_id,
            task = %definition.slug,
            operation = operations::TASK_COMPLETED,
            points = definition.reward_score,
            period = %row.period_key,
            "circle quest completed"
        );

        let members = match self.directory.circle_members(circle_id).await {
            Ok(members) => members,
            Err(err) => {
                warn!(
                    circle_id = %circle_id,
                    task = %definition.slug,
                    error = %err,
                    "cannot enumerate circle members, skipping reward fan-out"
                );
                return;
            }
        };

        for member in members {
            match self.directory.profile(&member).await {
                Ok(Some(profile)) if profile.role == UserRole::Professional => continue,
                Ok(_) => {}
                Err(err) => {
                    warn!(
                        user_id = %member,
                        error = %err,
                        "profile lookup failed, skipping member reward"
                    );
                    continue;
                }
            }
            if let Err(err) = self.reward_member(&member, circle_id, definition, row).await {
                warn!(
                    user_id = %member,
                    circle_id = %circle_id,
                    task = %definition.slug,
                    error = %err,
                    "circle reward failed for member"
                );
            }
        }
    }

    async fn reward_member(
        &self,
        member: &UserId,
        circle_id: &CircleId,
        definition: &TaskDefinitionEntity,
        row: &CircleTaskEntity,
    ) -> EngineResult<()> {
        if definition.reward_score > 0 {
            let reason = format!("circle_task_reward:{}:{}", circle_id, definition.slug);
            self.ledger
                .add_points(member, definition.reward_score, &reason, None, None)
                .await?;
        }

        let mut metadata = Metadata::new();
        metadata.insert("circle_id".to_string(), json!(circle_id.as_str()));
        metadata.insert("task".to_string(), json!(definition.slug));
        metadata.insert("title".to_string(), json!(definition.title));
        metadata.insert("reward_score".to_string(), json!(definition.reward_score));

        let key = format!(
            "{}:{}:{}:{}:{}",
            event_types::CIRCLE_TASK_COMPLETED,
            member,
            circle_id,
            definition.slug,
            row.period_key
        );
        let event = EventEntity::new(
            member.clone(),
            EventType::new(event_types::CIRCLE_TASK_COMPLETED),
            key,
            "engine",
            self.period.today(),
        )
        .with_entity(Some("circle_task".to_string()), Some(row.id.clone()))
        .with_metadata(metadata.clone());
        if let Err(err) = self.store.insert_event(event).await {
            if !err.is_duplicate() {
                warn!(
                    user_id = %member,
                    task = %definition.slug,
                    error = %err,
                    "failed to record circle completion event"
                );
            }
        }

        // Contribution-share badges key off completed circle tasks
        if let Err(err) = self
            .badges
            .process_event(member, &EventType::new(event_types::CIRCLE_TASK_COMPLETED))
            .await
        {
            warn!(
                user_id = %member,
                error = %err,
                "badge pass after circle completion failed"
            );
        }

        self.notifier
            .notify(
                member,
                notifications::CIRCLE_TASK_COMPLETED,
                serde_json::Value::Object(metadata),
            )
            .await;
        Ok(())
    }
}
