//! League entities

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use ql_core::config::LevelSpec;
use ql_core::types::{PeriodKey, UserId};

use super::new_row_id;

/// League tier; lower `rank_order` is a higher tier
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct LevelEntity {
    pub id: String,
    pub rank_order: u32,
    pub name: String,
    pub min_score: i64,
    pub max_score: Option<i64>,
}

impl LevelEntity {
    pub const TABLE: &'static str = "ql_level";

    pub fn from_spec(spec: LevelSpec) -> Self {
        Self {
            id: format!("{}:{}", Self::TABLE, spec.rank_order),
            rank_order: spec.rank_order,
            name: spec.name,
            min_score: spec.min_score,
            max_score: spec.max_score,
        }
    }
}

/// How a user entered their current level
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TransitionType {
    Initial,
    Promote,
    Demote,
    Retain,
}

impl TransitionType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Initial => "initial",
            Self::Promote => "promote",
            Self::Demote => "demote",
            Self::Retain => "retain",
        }
    }
}

/// League membership history row; exactly one `is_current` row per user
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct UserLevelEntity {
    pub id: String,
    pub user_id: UserId,
    pub level_id: String,
    pub is_current: bool,
    pub joined_at: DateTime<Utc>,
    pub left_at: Option<DateTime<Utc>>,
    pub transition: TransitionType,
    pub week_key: Option<PeriodKey>,
}

impl UserLevelEntity {
    pub const TABLE: &'static str = "ql_user_level";

    pub fn new(
        user_id: UserId,
        level_id: impl Into<String>,
        transition: TransitionType,
        week_key: Option<PeriodKey>,
    ) -> Self {
        Self {
            id: new_row_id(Self::TABLE),
            user_id,
            level_id: level_id.into(),
            is_current: true,
            joined_at: Utc::now(),
            left_at: None,
            transition,
            week_key,
        }
    }
}
