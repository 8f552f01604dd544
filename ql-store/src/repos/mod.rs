//! Repository traits
//!
//! `async_trait` interfaces consumed by the engine services. [`Datastore`]
//! bundles them so services can hold a single `Arc<dyn Datastore>`; backends
//! implement every trait on one type.

mod badge_repo;
mod circle_repo;
mod event_repo;
mod ledger_repo;
mod level_repo;
mod snapshot_repo;
mod streak_repo;
mod task_repo;

pub use badge_repo::BadgeRepository;
pub use circle_repo::CircleRepository;
pub use event_repo::{EventFilter, EventRepository};
pub use ledger_repo::LedgerRepository;
pub use level_repo::LevelRepository;
pub use snapshot_repo::SnapshotRepository;
pub use streak_repo::StreakRepository;
pub use task_repo::TaskRepository;

use async_trait::async_trait;

use crate::error::StoreResult;

/// Full persistence surface of the engine
#[async_trait]
pub trait Datastore:
    EventRepository
    + LedgerRepository
    + StreakRepository
    + BadgeRepository
    + TaskRepository
    + CircleRepository
    + LevelRepository
    + SnapshotRepository
    + Send
    + Sync
{
    /// Provision tables. Until this has run, every repository call fails
    /// with `StoreError::NotReady`.
    async fn init_schema(&self) -> StoreResult<()>;

    /// Whether the schema has been provisioned
    fn is_ready(&self) -> bool;
}
