//! Protocol constants
//!
//! Well-known event types, metadata field names, and notification kinds.

/// Well-known event types
pub mod event_types {
    /// Successful login (limited to one scoring per day)
    pub const LOGIN_SUCCESS: &str = "login_success";
    /// A blog post of the user received a like (limited per day)
    pub const BLOG_LIKED: &str = "blog_liked";
    /// User published a blog post
    pub const BLOG_POST_CREATED: &str = "blog_post_created";
    /// User wrote a comment
    pub const COMMENT_CREATED: &str = "comment_created";
    /// A comment of the user crossed a like milestone
    pub const COMMENT_LIKE_MILESTONE: &str = "comment_like_milestone";
    /// User completed a logged diet entry (points may be overridden)
    pub const DIET_COMPLETED: &str = "diet_completed";
    /// User completed a logged exercise session (points may be overridden)
    pub const EXERCISE_COMPLETED: &str = "exercise_completed";
    /// User completed their profile
    pub const PROFILE_COMPLETED: &str = "profile_completed";
    /// User invited a friend who joined
    pub const FRIEND_INVITED: &str = "friend_invited";
    /// User sent a direct message to another member
    pub const MESSAGE_SENT: &str = "message_sent";
    /// Streak milestone bonus (points carried in metadata)
    pub const STREAK_MILESTONE: &str = "streak_milestone";
    /// Weekly league position reward (points carried in metadata)
    pub const POSITION_REWARD: &str = "position_reward";
    /// A badge was earned
    pub const BADGE_EARNED: &str = "badge_earned";
    /// Generic quest completion
    pub const TASK_COMPLETED: &str = "task_completed";
    /// Daily quest completion
    pub const DAILY_TASK_COMPLETED: &str = "daily_task_completed";
    /// Weekly quest completion
    pub const WEEKLY_TASK_COMPLETED: &str = "weekly_task_completed";
    /// Monthly quest completion
    pub const MONTHLY_TASK_COMPLETED: &str = "monthly_task_completed";
    /// Circle quest completion
    pub const CIRCLE_TASK_COMPLETED: &str = "circle_task_completed";
}

/// Event types that are emitted by completion paths and excluded from further
/// quest matching.
pub mod terminal_events {
    use super::event_types;

    pub const ALL: &[&str] = &[
        event_types::TASK_COMPLETED,
        event_types::DAILY_TASK_COMPLETED,
        event_types::WEEKLY_TASK_COMPLETED,
        event_types::MONTHLY_TASK_COMPLETED,
        event_types::CIRCLE_TASK_COMPLETED,
        event_types::BADGE_EARNED,
    ];
}

/// Well-known metadata field names
pub mod metadata_keys {
    /// Override for diet completion points
    pub const DIET_POINTS: &str = "diet_points";
    /// Override for exercise completion points
    pub const EXERCISE_POINTS: &str = "exercise_points";
    /// Override for milestone bonus points
    pub const BONUS_POINTS: &str = "bonus_points";
    /// Override for position reward points
    pub const REWARD_POINTS: &str = "reward_points";
    /// Counterpart user id for social events
    pub const COUNTERPART_USER_ID: &str = "counterpart_user_id";
    /// Entity type merged into the idempotency digest
    pub const ENTITY_TYPE: &str = "entity_type";
    /// Entity id merged into the idempotency digest
    pub const ENTITY_ID: &str = "entity_id";
    /// Week key attached to position reward events
    pub const WEEK: &str = "week";
    /// League position attached to position reward events
    pub const POSITION: &str = "position";
    /// Calendar day folded into the digest of daily-limited event types
    pub const DAY: &str = "day";
}

/// Machine-readable ingest outcome codes carried alongside the status
pub mod outcome_codes {
    pub const OK: &str = "ok";
    pub const DUPLICATE: &str = "duplicate";
    pub const DAILY_LIMIT_EXCEEDED: &str = "daily_limit_exceeded";
    /// Error-path code: the backing store is not provisioned
    pub const SERVICE_UNAVAILABLE: &str = "service_unavailable";
    /// Error-path code for validation and persistence failures
    pub const INTERNAL_ERROR: &str = "internal_error";
}

/// Notification kinds emitted through the notifier seam
pub mod notifications {
    pub const BADGE_EARNED: &str = "badge_earned";
    pub const TASK_COMPLETED: &str = "task_completed";
    pub const CIRCLE_TASK_COMPLETED: &str = "circle_task_completed";
    pub const LEVEL_PROMOTE: &str = "level_promote";
    pub const LEVEL_DEMOTE: &str = "level_demote";
    pub const LEVEL_RETAIN: &str = "level_retain";
    pub const LEVEL_POSITION_REWARDED: &str = "level_position_rewarded";
}

/// Streak type names
pub mod streak_types {
    /// Daily login / general activity streak
    pub const DAILY_ACTIVITY: &str = "daily_activity";
}

/// Maximum grace days per week that can forgive a one-day streak gap
pub const MAX_WEEKLY_GRACE: u32 = 2;

/// League position rewards, 1-based position to bonus points
pub const POSITION_REWARDS: &[(u32, i64)] = &[(1, 50), (2, 25), (3, 15)];

/// How many members move up and down a league each week
pub const PROMOTION_ZONE: usize = 5;
pub const DEMOTION_ZONE: usize = 5;
