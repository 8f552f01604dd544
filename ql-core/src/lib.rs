//! Questline Core
//!
//! This crate provides the pure domain logic for the Questline gamification
//! engine. Nothing in here performs I/O:
//! - Typed identifiers and the event-type vocabulary
//! - Period-key arithmetic (daily / ISO-weekly / monthly, fixed timezone)
//! - The stateless event-to-points rule table and daily limits
//! - Streak-advance math with weekly grace forgiveness
//! - The badge condition sum type interpreted by the engine
//! - Static badge / quest / league definition tables
//!
//! Persistence lives in `ql-store`; the services that orchestrate these rules
//! live in `ql-engine`.

pub mod conditions;
pub mod config;
pub mod constants;
pub mod logging;
pub mod period;
pub mod rules;
pub mod streak;
pub mod types;

pub use conditions::{BadgeCondition, EventMatcher};
pub use config::{BadgeDefinitionSpec, LevelSpec, TaskDefinitionSpec};
pub use period::PeriodService;
pub use rules::RuleEngine;
pub use types::*;
