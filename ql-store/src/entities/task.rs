//! Quest entities

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use ql_core::config::{TaskDefinitionSpec, TaskType};
use ql_core::types::{EventType, PeriodKey, UserId};

use super::badge::DefinitionSource;
use super::new_row_id;

/// Stored quest definition
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct TaskDefinitionEntity {
    pub slug: String,
    pub title: String,
    pub task_type: TaskType,
    pub target_value: u32,
    pub scoring_event_types: Vec<EventType>,
    pub reward_score: i64,
    pub badge_progress_contribution: u32,
    pub is_active: bool,
    pub source: DefinitionSource,
}

impl TaskDefinitionEntity {
    pub const TABLE: &'static str = "ql_task_definition";

    pub fn from_spec(spec: TaskDefinitionSpec, source: DefinitionSource) -> Self {
        Self {
            slug: spec.slug,
            title: spec.title,
            task_type: spec.task_type,
            target_value: spec.target_value,
            scoring_event_types: spec.scoring_event_types,
            reward_score: spec.reward_score,
            badge_progress_contribution: spec.badge_progress_contribution,
            is_active: spec.is_active,
            source,
        }
    }

    pub fn matches(&self, event_type: &EventType) -> bool {
        self.is_active && self.scoring_event_types.contains(event_type)
    }
}

/// Progress status of a period-scoped quest row
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskStatus {
    InProgress,
    Completed,
    Expired,
}

impl TaskStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::InProgress => "in_progress",
            Self::Completed => "completed",
            Self::Expired => "expired",
        }
    }
}

/// One row per (user, quest, period_key), created lazily
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct UserTaskEntity {
    pub id: String,
    pub user_id: UserId,
    pub task_slug: String,
    pub period_key: PeriodKey,
    pub current_value: u32,
    pub target_value: u32,
    pub status: TaskStatus,
    pub completed_at: Option<DateTime<Utc>>,
    pub updated_at: DateTime<Utc>,
}

impl UserTaskEntity {
    pub const TABLE: &'static str = "ql_user_task";

    pub fn new(
        user_id: UserId,
        task_slug: impl Into<String>,
        period_key: PeriodKey,
        target_value: u32,
    ) -> Self {
        Self {
            id: new_row_id(Self::TABLE),
            user_id,
            task_slug: task_slug.into(),
            period_key,
            current_value: 0,
            target_value,
            status: TaskStatus::InProgress,
            completed_at: None,
            updated_at: Utc::now(),
        }
    }

    pub fn complete(&mut self) {
        self.status = TaskStatus::Completed;
        self.completed_at = Some(Utc::now());
        self.updated_at = Utc::now();
    }
}
