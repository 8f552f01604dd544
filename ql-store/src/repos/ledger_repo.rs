//! Ledger repository trait

use async_trait::async_trait;
use chrono::NaiveDate;

use ql_core::types::UserId;

use crate::entities::{LedgerEntryEntity, NewLedgerEntry};
use crate::error::StoreResult;

/// Append-only point ledger
///
/// The append primitive is atomic per user: the backend computes
/// `balance_after` from the latest entry under a single writer, so two
/// concurrent appends for the same user can never read the same prior
/// balance.
#[async_trait]
pub trait LedgerRepository: Send + Sync {
    /// Append one entry, computing `balance_after` and the per-user sequence
    /// atomically.
    async fn append_entry(&self, entry: NewLedgerEntry) -> StoreResult<LedgerEntryEntity>;

    /// Current balance: latest `balance_after`, or 0 with no entries.
    async fn balance(&self, user_id: &UserId) -> StoreResult<i64>;

    /// Latest entry for a user
    async fn latest_entry(&self, user_id: &UserId) -> StoreResult<Option<LedgerEntryEntity>>;

    /// Paginated history, newest first
    async fn history(
        &self,
        user_id: &UserId,
        limit: usize,
        offset: usize,
    ) -> StoreResult<Vec<LedgerEntryEntity>>;

    /// Entries whose `created_on` falls in the inclusive range, oldest first
    async fn entries_between(
        &self,
        user_id: &UserId,
        start: NaiveDate,
        end: NaiveDate,
    ) -> StoreResult<Vec<LedgerEntryEntity>>;

    /// Sum of positive deltas in the inclusive range. Ranking score counts
    /// earned points, not net of penalties.
    async fn total_earned_between(
        &self,
        user_id: &UserId,
        start: NaiveDate,
        end: NaiveDate,
    ) -> StoreResult<i64>;
}
