//! Logging conventions
//!
//! Operation names attached as the `operation` field on engine log records so
//! downstream aggregation can rely on consistent keys.
//!
//! | Level | Usage |
//! |-------|-------|
//! | ERROR | Required write failed, invariant violated |
//! | WARN  | Downstream effect swallowed, limit breached, re-run skipped |
//! | INFO  | Award committed, period close progress, transitions |
//! | DEBUG | Rule lookups, pre-filter decisions, intermediate counts |

/// Log operation categories
pub mod operations {
    pub const INGEST: &str = "ingest";
    pub const LEDGER_APPEND: &str = "ledger_append";
    pub const STREAK_ADVANCE: &str = "streak_advance";
    pub const BADGE_PROGRESS: &str = "badge_progress";
    pub const BADGE_EARNED: &str = "badge_earned";
    pub const TASK_PROGRESS: &str = "task_progress";
    pub const TASK_COMPLETED: &str = "task_completed";
    pub const TASK_EXPIRED: &str = "task_expired";
    pub const LEVEL_TRANSITION: &str = "level_transition";
    pub const WEEKLY_CLOSE: &str = "weekly_close";
    pub const MONTHLY_CLOSE: &str = "monthly_close";
}
