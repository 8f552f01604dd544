//! Persistence entities
//!
//! One module per aggregate. Every entity is a plain serde struct carrying a
//! `TABLE` constant so backends can map it to their own storage.

mod badge;
mod circle;
mod event;
mod ledger;
mod level;
mod snapshot;
mod streak;
mod task;

pub use badge::*;
pub use circle::*;
pub use event::*;
pub use ledger::*;
pub use level::*;
pub use snapshot::*;
pub use streak::*;
pub use task::*;

/// Generate a fresh row identifier
pub(crate) fn new_row_id(prefix: &str) -> String {
    format!("{}:{}", prefix, uuid::Uuid::new_v4())
}
