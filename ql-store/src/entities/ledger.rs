//! Ledger entry entity

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use ql_core::types::{EventId, Metadata, UserId};

use super::new_row_id;

/// One append-only point delta
///
/// Never updated or deleted. `balance_after` equals the previous entry's
/// `balance_after` for the same user plus `points_delta`; the backend's
/// append primitive computes it atomically.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct LedgerEntryEntity {
    pub id: String,
    pub user_id: UserId,
    pub points_delta: i64,
    pub reason: String,
    pub related_event_id: Option<EventId>,
    pub balance_after: i64,
    pub metadata: Option<Metadata>,
    /// Calendar day in the engine's fixed timezone, for period sums
    pub created_on: NaiveDate,
    pub created_at: DateTime<Utc>,
    /// Per-user append sequence assigned by the backend
    pub sequence_no: u64,
}

impl LedgerEntryEntity {
    pub const TABLE: &'static str = "ql_ledger_entry";
}

/// Request to append one ledger entry
#[derive(Clone, Debug)]
pub struct NewLedgerEntry {
    pub user_id: UserId,
    pub points_delta: i64,
    pub reason: String,
    pub related_event_id: Option<EventId>,
    pub metadata: Option<Metadata>,
    pub created_on: NaiveDate,
}

impl NewLedgerEntry {
    pub fn new(
        user_id: UserId,
        points_delta: i64,
        reason: impl Into<String>,
        created_on: NaiveDate,
    ) -> Self {
        Self {
            user_id,
            points_delta,
            reason: reason.into(),
            related_event_id: None,
            metadata: None,
            created_on,
        }
    }

    pub fn with_event(mut self, event_id: EventId) -> Self {
        self.related_event_id = Some(event_id);
        self
    }

    pub fn with_metadata(mut self, metadata: Metadata) -> Self {
        self.metadata = Some(metadata);
        self
    }

    /// Materialize the entry at a given balance and sequence. Called by the
    /// backend inside its append primitive.
    pub fn into_entry(self, balance_after: i64, sequence_no: u64) -> LedgerEntryEntity {
        LedgerEntryEntity {
            id: new_row_id(LedgerEntryEntity::TABLE),
            user_id: self.user_id,
            points_delta: self.points_delta,
            reason: self.reason,
            related_event_id: self.related_event_id,
            balance_after,
            metadata: self.metadata,
            created_on: self.created_on,
            created_at: Utc::now(),
            sequence_no,
        }
    }
}
