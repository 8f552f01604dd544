//! Ledger service
//!
//! Thin orchestration over the store's atomic append primitive. The balance
//! invariant (`balance == sum of deltas`) is enforced by the backend's
//! single-writer append; this service owns reasons, period sums, and reads.

use std::sync::Arc;

use tracing::info;

use ql_core::logging::operations;
use ql_core::period::PeriodService;
use ql_core::types::{EventId, Metadata, PeriodType, UserId};
use ql_store::{Datastore, LedgerEntryEntity, NewLedgerEntry};

use crate::error::EngineResult;

/// Append-only point ledger operations
#[derive(Clone)]
pub struct LedgerService {
    store: Arc<dyn Datastore>,
    period: PeriodService,
}

impl LedgerService {
    pub fn new(store: Arc<dyn Datastore>, period: PeriodService) -> Self {
        Self { store, period }
    }

    /// Append a signed point delta and return the committed entry.
    pub async fn add_points(
        &self,
        user_id: &UserId,
        delta: i64,
        reason: &str,
        related_event_id: Option<EventId>,
        metadata: Option<Metadata>,
    ) -> EngineResult<LedgerEntryEntity> {
        let mut entry = NewLedgerEntry::new(user_id.clone(), delta, reason, self.period.today());
        if let Some(event_id) = related_event_id {
            entry = entry.with_event(event_id);
        }
        if let Some(metadata) = metadata {
            entry = entry.with_metadata(metadata);
        }

        let committed = self.store.append_entry(entry).await?;
        info!(
            user_id = %user_id,
            operation = operations::LEDGER_APPEND,
            points = delta,
            reason,
            balance = committed.balance_after,
            "ledger entry appended"
        );
        Ok(committed)
    }

    /// Current balance (0 for users with no entries)
    pub async fn balance(&self, user_id: &UserId) -> EngineResult<i64> {
        Ok(self.store.balance(user_id).await?)
    }

    /// Earned (positive-delta) points within the current period of the given
    /// type; this is the score used for rankings.
    pub async fn earned_in_current_period(
        &self,
        user_id: &UserId,
        period_type: PeriodType,
    ) -> EngineResult<i64> {
        match self.period.current_bounds(period_type) {
            Some((start, end)) => Ok(self
                .store
                .total_earned_between(user_id, start, end)
                .await?),
            None => Ok(0),
        }
    }

    /// Earned points within an explicit date range
    pub async fn earned_between(
        &self,
        user_id: &UserId,
        start: chrono::NaiveDate,
        end: chrono::NaiveDate,
    ) -> EngineResult<i64> {
        Ok(self.store.total_earned_between(user_id, start, end).await?)
    }

    /// Paginated history, newest first
    pub async fn history(
        &self,
        user_id: &UserId,
        limit: usize,
        offset: usize,
    ) -> EngineResult<Vec<LedgerEntryEntity>> {
        Ok(self.store.history(user_id, limit, offset).await?)
    }
}
