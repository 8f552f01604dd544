//! Streak entity

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use ql_core::streak::StreakState;
use ql_core::types::UserId;

/// One row per (user, streak_type)
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct StreakEntity {
    pub user_id: UserId,
    pub streak_type: String,
    #[serde(flatten)]
    pub state: StreakState,
    pub updated_at: DateTime<Utc>,
}

impl StreakEntity {
    pub const TABLE: &'static str = "ql_streak";

    pub fn new(user_id: UserId, streak_type: impl Into<String>) -> Self {
        Self {
            user_id,
            streak_type: streak_type.into(),
            state: StreakState::default(),
            updated_at: Utc::now(),
        }
    }

    pub fn touch(&mut self) {
        self.updated_at = Utc::now();
    }
}
