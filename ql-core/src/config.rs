//! Static definition tables
//!
//! Default badge, quest, and league definitions compiled into the engine.
//! A dynamic definition store may override any entry sharing a slug; the
//! merge is resolved by the engine services (dynamic wins).

use serde::{Deserialize, Serialize};

use crate::conditions::{BadgeCondition, EventMatcher};
use crate::constants::{event_types, streak_types};
use crate::types::{EventType, PeriodType};

/// Badge achievement tier
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BadgeTier {
    Bronze,
    Silver,
    Gold,
    Platinum,
}

impl BadgeTier {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Bronze => "bronze",
            Self::Silver => "silver",
            Self::Gold => "gold",
            Self::Platinum => "platinum",
        }
    }
}

/// Badge definition
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct BadgeDefinitionSpec {
    pub slug: String,
    pub title: String,
    pub condition: BadgeCondition,
    /// Progress ceiling; progressive badges keep this at 0 (no fixed ceiling)
    pub max_progress: u32,
    pub category: String,
    pub tier: BadgeTier,
}

impl BadgeDefinitionSpec {
    pub fn new(
        slug: impl Into<String>,
        title: impl Into<String>,
        condition: BadgeCondition,
        category: impl Into<String>,
        tier: BadgeTier,
    ) -> Self {
        let max_progress = condition.fixed_target().unwrap_or(0);
        Self {
            slug: slug.into(),
            title: title.into(),
            condition,
            max_progress,
            category: category.into(),
            tier,
        }
    }
}

/// Quest period scope
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TaskType {
    Daily,
    Weekly,
    Monthly,
    Circle,
}

impl TaskType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Daily => "daily",
            Self::Weekly => "weekly",
            Self::Monthly => "monthly",
            Self::Circle => "circle",
        }
    }

    /// Period granularity used for this quest's lazily-created rows.
    /// Circle quests run on weekly periods.
    pub fn period(&self) -> PeriodType {
        match self {
            Self::Daily => PeriodType::Daily,
            Self::Weekly | Self::Circle => PeriodType::Weekly,
            Self::Monthly => PeriodType::Monthly,
        }
    }
}

/// Quest definition
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct TaskDefinitionSpec {
    pub slug: String,
    pub title: String,
    pub task_type: TaskType,
    pub target_value: u32,
    pub scoring_event_types: Vec<EventType>,
    pub reward_score: i64,
    /// Progress contributed toward badge evaluation on completion
    pub badge_progress_contribution: u32,
    pub is_active: bool,
}

impl TaskDefinitionSpec {
    pub fn matches(&self, event_type: &EventType) -> bool {
        self.is_active && self.scoring_event_types.contains(event_type)
    }
}

/// League tier definition; lower `rank_order` is a higher tier
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct LevelSpec {
    pub rank_order: u32,
    pub name: String,
    pub min_score: i64,
    pub max_score: Option<i64>,
}

/// Default badge table
pub fn default_badges() -> Vec<BadgeDefinitionSpec> {
    vec![
        BadgeDefinitionSpec::new(
            "first-steps",
            "First Steps",
            BadgeCondition::Count {
                event: EventMatcher::one(event_types::LOGIN_SUCCESS),
                target: 1,
                metadata_field: None,
                metadata_value: None,
            },
            "engagement",
            BadgeTier::Bronze,
        ),
        BadgeDefinitionSpec::new(
            "conversation-starter",
            "Conversation Starter",
            BadgeCondition::Count {
                event: EventMatcher::one(event_types::COMMENT_CREATED),
                target: 5,
                metadata_field: None,
                metadata_value: None,
            },
            "community",
            BadgeTier::Bronze,
        ),
        BadgeDefinitionSpec::new(
            "healthy-habits",
            "Healthy Habits",
            BadgeCondition::Count {
                event: EventMatcher::any([event_types::DIET_COMPLETED, event_types::EXERCISE_COMPLETED]),
                target: 20,
                metadata_field: None,
                metadata_value: None,
            },
            "health",
            BadgeTier::Silver,
        ),
        BadgeDefinitionSpec::new(
            "week-warrior",
            "Week Warrior",
            BadgeCondition::Streak {
                event: EventMatcher::one(event_types::LOGIN_SUCCESS),
                streak_type: streak_types::DAILY_ACTIVITY.to_string(),
                target: 7,
            },
            "engagement",
            BadgeTier::Silver,
        ),
        BadgeDefinitionSpec::new(
            "marathon-month",
            "Marathon Month",
            BadgeCondition::ConsecutiveWeeks {
                event: EventMatcher::one(event_types::EXERCISE_COMPLETED),
                target: 4,
            },
            "health",
            BadgeTier::Gold,
        ),
        BadgeDefinitionSpec::new(
            "daily-dozen",
            "Daily Dozen",
            BadgeCondition::CountInPeriod {
                event: EventMatcher::one(event_types::COMMENT_CREATED),
                period: PeriodType::Daily,
                target: 12,
            },
            "community",
            BadgeTier::Gold,
        ),
        BadgeDefinitionSpec::new(
            "active-days",
            "Active Days",
            BadgeCondition::CountUniqueDays {
                event: EventMatcher::any([
                    event_types::DIET_COMPLETED,
                    event_types::EXERCISE_COMPLETED,
                ]),
            },
            "health",
            BadgeTier::Bronze,
        ),
        BadgeDefinitionSpec::new(
            "welcome-back",
            "Welcome Back",
            BadgeCondition::Comeback {
                min_gap_days: 14,
                active_days_after: 3,
                lookback_days: 60,
            },
            "engagement",
            BadgeTier::Silver,
        ),
        BadgeDefinitionSpec::new(
            "team-player",
            "Team Player",
            BadgeCondition::CircleContribution {
                share_percent: 25,
                target: 3,
            },
            "circle",
            BadgeTier::Silver,
        ),
        BadgeDefinitionSpec::new(
            "circle-hero",
            "Circle Hero",
            BadgeCondition::CircleHero {
                share_percent: 50,
                target: 1,
                window_days: 30,
            },
            "circle",
            BadgeTier::Gold,
        ),
        BadgeDefinitionSpec::new(
            "social-butterfly",
            "Social Butterfly",
            BadgeCondition::CountUniqueUsers {
                events: vec![EventType::new(event_types::MESSAGE_SENT)],
                counterpart_field: crate::constants::metadata_keys::COUNTERPART_USER_ID.to_string(),
            },
            "community",
            BadgeTier::Platinum,
        ),
    ]
}

/// Default quest table
pub fn default_tasks() -> Vec<TaskDefinitionSpec> {
    vec![
        TaskDefinitionSpec {
            slug: "daily-checkin".to_string(),
            title: "Daily Check-in".to_string(),
            task_type: TaskType::Daily,
            target_value: 1,
            scoring_event_types: vec![EventType::new(event_types::LOGIN_SUCCESS)],
            reward_score: 5,
            badge_progress_contribution: 1,
            is_active: true,
        },
        TaskDefinitionSpec {
            slug: "daily-mover".to_string(),
            title: "Daily Mover".to_string(),
            task_type: TaskType::Daily,
            target_value: 1,
            scoring_event_types: vec![EventType::new(event_types::EXERCISE_COMPLETED)],
            reward_score: 10,
            badge_progress_contribution: 1,
            is_active: true,
        },
        TaskDefinitionSpec {
            slug: "weekly-workouts".to_string(),
            title: "Weekly Workouts".to_string(),
            task_type: TaskType::Weekly,
            target_value: 3,
            scoring_event_types: vec![EventType::new(event_types::EXERCISE_COMPLETED)],
            reward_score: 30,
            badge_progress_contribution: 1,
            is_active: true,
        },
        TaskDefinitionSpec {
            slug: "weekly-meals".to_string(),
            title: "Weekly Meals".to_string(),
            task_type: TaskType::Weekly,
            target_value: 5,
            scoring_event_types: vec![EventType::new(event_types::DIET_COMPLETED)],
            reward_score: 25,
            badge_progress_contribution: 1,
            is_active: true,
        },
        TaskDefinitionSpec {
            slug: "monthly-regular".to_string(),
            title: "Monthly Regular".to_string(),
            task_type: TaskType::Monthly,
            target_value: 20,
            scoring_event_types: vec![EventType::new(event_types::LOGIN_SUCCESS)],
            reward_score: 50,
            badge_progress_contribution: 1,
            is_active: true,
        },
        TaskDefinitionSpec {
            slug: "circle-workout-week".to_string(),
            title: "Circle Workout Week".to_string(),
            task_type: TaskType::Circle,
            target_value: 15,
            scoring_event_types: vec![EventType::new(event_types::EXERCISE_COMPLETED)],
            reward_score: 20,
            badge_progress_contribution: 1,
            is_active: true,
        },
    ]
}

/// Default league ladder, top tier first
pub fn default_levels() -> Vec<LevelSpec> {
    vec![
        LevelSpec {
            rank_order: 1,
            name: "Diamond".to_string(),
            min_score: 2000,
            max_score: None,
        },
        LevelSpec {
            rank_order: 2,
            name: "Platinum".to_string(),
            min_score: 1000,
            max_score: Some(1999),
        },
        LevelSpec {
            rank_order: 3,
            name: "Gold".to_string(),
            min_score: 500,
            max_score: Some(999),
        },
        LevelSpec {
            rank_order: 4,
            name: "Silver".to_string(),
            min_score: 100,
            max_score: Some(499),
        },
        LevelSpec {
            rank_order: 5,
            name: "Bronze".to_string(),
            min_score: 0,
            max_score: Some(99),
        },
    ]
}
