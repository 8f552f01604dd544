//! Questline Engine
//!
//! Services orchestrating the gamification core over the `ql-store`
//! repository traits:
//! - [`EventIngestionService`] - the idempotent intake state machine
//! - [`LedgerService`] - append-only points with an invariant-safe balance
//! - [`StreakService`] - consecutive-activity tracking with weekly grace
//! - [`BadgeRuleEngine`] / [`BadgeService`] - declarative achievement progress
//! - [`TaskProgressService`] / [`CircleTaskService`] - period-scoped quests
//! - [`LevelService`] - weekly league promotion and demotion
//! - [`ScoreService`] / [`ScheduledJobs`] - period close, snapshots, rankings
//!
//! External collaborators are consumed through the [`UserDirectory`] and
//! [`Notifier`] seams; no service touches a concrete store or transport.

pub mod badge_rules;
pub mod badges;
pub mod circles;
pub mod directory;
pub mod error;
pub mod ingest;
pub mod jobs;
pub mod ledger;
pub mod levels;
pub mod notify;
pub mod scores;
pub mod streak;
pub mod tasks;

pub use badge_rules::{BadgeRuleEngine, Evaluation};
pub use badges::{BadgeService, EarnedBadge};
pub use circles::CircleTaskService;
pub use directory::{StaticDirectory, UserDirectory, UserProfile, UserRole};
pub use error::{EngineError, EngineResult};
pub use ingest::{EventIngestionService, IngestOutcome, IngestRequest, IngestStatus};
pub use jobs::{CloseReport, ScheduledJobs};
pub use ledger::LedgerService;
pub use levels::{LevelOutcome, LevelService};
pub use notify::{Notifier, NullNotifier, RecordingNotifier};
pub use scores::ScoreService;
pub use streak::{StreakOutcome, StreakService};
pub use tasks::TaskProgressService;
