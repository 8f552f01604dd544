//! Questline Store
//!
//! Persistence layer for the gamification engine:
//! - Serde entities, one module per aggregate, each naming its table
//! - `async_trait` repository traits consumed by `ql-engine`
//! - [`MemoryStore`], an in-process datastore backed by `tokio::sync::RwLock`
//!   maps, which enforces the idempotency-key uniqueness constraint and
//!   provides an atomic append-with-balance primitive for the ledger
//!
//! Services never see a concrete store; they hold `Arc<dyn Datastore>` and a
//! different backend slots in behind the same traits.

pub mod entities;
pub mod error;
pub mod memory;
pub mod repos;

pub use entities::*;
pub use error::{StoreError, StoreResult};
pub use memory::MemoryStore;
pub use repos::*;
