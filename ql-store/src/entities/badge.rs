//! Badge entities

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use ql_core::conditions::BadgeCondition;
use ql_core::config::{BadgeDefinitionSpec, BadgeTier};
use ql_core::types::UserId;

use super::new_row_id;

/// Where a definition came from; dynamic entries override static ones
/// sharing a slug.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DefinitionSource {
    Static,
    Dynamic,
}

/// Stored badge definition
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct BadgeDefinitionEntity {
    pub slug: String,
    pub title: String,
    pub condition: BadgeCondition,
    pub max_progress: u32,
    pub category: String,
    pub tier: BadgeTier,
    pub source: DefinitionSource,
}

impl BadgeDefinitionEntity {
    pub const TABLE: &'static str = "ql_badge_definition";

    pub fn from_spec(spec: BadgeDefinitionSpec, source: DefinitionSource) -> Self {
        Self {
            slug: spec.slug,
            title: spec.title,
            condition: spec.condition,
            max_progress: spec.max_progress,
            category: spec.category,
            tier: spec.tier,
            source,
        }
    }

    /// Progressive badges (max_progress == 0) have no fixed ceiling.
    pub fn is_progressive(&self) -> bool {
        self.max_progress == 0
    }
}

/// Per-user badge progress, created lazily on the first relevant event
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct UserBadgeEntity {
    pub id: String,
    pub user_id: UserId,
    pub badge_slug: String,
    /// Monotonically non-decreasing until earned
    pub current_progress: u32,
    pub is_earned: bool,
    pub earned_at: Option<DateTime<Utc>>,
    pub updated_at: DateTime<Utc>,
}

impl UserBadgeEntity {
    pub const TABLE: &'static str = "ql_user_badge";

    pub fn new(user_id: UserId, badge_slug: impl Into<String>) -> Self {
        Self {
            id: new_row_id(Self::TABLE),
            user_id,
            badge_slug: badge_slug.into(),
            current_progress: 0,
            is_earned: false,
            earned_at: None,
            updated_at: Utc::now(),
        }
    }

    pub fn mark_earned(&mut self) {
        if !self.is_earned {
            self.is_earned = true;
            self.earned_at = Some(Utc::now());
        }
        self.updated_at = Utc::now();
    }
}
