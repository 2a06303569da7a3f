//! Transaction store seam.
//!
//! The store is the sole source of truth for the ledger. It only appends;
//! there is no update or delete path. The db crate provides the durable
//! implementation, [`super::memory::MemoryStore`] the process-local one.

use std::future::Future;
use std::time::Duration;

use chrono::{DateTime, Utc};
use lifeline_shared::types::{ActorId, CursorPage, CursorRequest, TransactionId};

use super::error::{LedgerError, LedgerResult};
use super::types::{
    BloodGroup, Direction, NewTransaction, OrganType, ResourceKind, StockKey, Transaction,
};

/// Page size used when the ledger scans a whole history internally.
pub const SCAN_PAGE_SIZE: u32 = 500;

/// Repository trait for ledger persistence.
///
/// This trait is implemented by the db crate to provide actual database operations.
pub trait TransactionStore: Send + Sync {
    /// Appends a transaction and assigns its sequence number.
    fn append(
        &self,
        tx: NewTransaction,
    ) -> impl std::future::Future<Output = LedgerResult<Transaction>> + Send;

    /// Fetches a transaction by id.
    ///
    /// Fails with `TransactionNotFound` for unknown ids.
    fn get(
        &self,
        id: TransactionId,
    ) -> impl std::future::Future<Output = LedgerResult<Transaction>> + Send;

    /// Lists matching transactions in ascending sequence order.
    fn list(
        &self,
        query: &HistoryQuery,
        page: CursorRequest,
    ) -> impl std::future::Future<Output = LedgerResult<CursorPage<Transaction>>> + Send;

    /// Newest transactions of a kind, by `created_at` then `id`, descending.
    fn recent(
        &self,
        kind: ResourceKind,
        limit: usize,
    ) -> impl std::future::Future<Output = LedgerResult<Vec<Transaction>>> + Send;

    /// Compensating entries referencing `id`, oldest first.
    fn corrections_of(
        &self,
        id: TransactionId,
    ) -> impl std::future::Future<Output = LedgerResult<Vec<Transaction>>> + Send;
}

/// Store-level filter for history listings. Unset fields match everything.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct HistoryQuery {
    /// Resource family.
    pub kind: Option<ResourceKind>,
    /// Blood group.
    pub blood_group: Option<BloodGroup>,
    /// Organ type.
    pub organ_type: Option<OrganType>,
    /// Direction.
    pub direction: Option<Direction>,
    /// Recording actor.
    pub recorded_by: Option<ActorId>,
    /// Donor reference, exact match.
    pub donor_ref: Option<String>,
    /// Hospital reference, exact match.
    pub hospital_ref: Option<String>,
    /// Inclusive lower bound on `created_at`.
    pub created_from: Option<DateTime<Utc>>,
    /// Exclusive upper bound on `created_at`.
    pub created_until: Option<DateTime<Utc>>,
}

impl HistoryQuery {
    /// Every transaction of one kind.
    #[must_use]
    pub fn for_kind(kind: ResourceKind) -> Self {
        Self {
            kind: Some(kind),
            ..Self::default()
        }
    }

    /// Every transaction of one stock key.
    #[must_use]
    pub fn for_key(key: &StockKey) -> Self {
        Self {
            kind: Some(key.kind()),
            blood_group: Some(key.blood_group()),
            organ_type: key.organ_type(),
            ..Self::default()
        }
    }

    /// Returns true if `tx` passes every set filter.
    #[must_use]
    pub fn matches(&self, tx: &Transaction) -> bool {
        self.kind.is_none_or(|kind| tx.key.kind() == kind)
            && self.blood_group.is_none_or(|group| tx.key.blood_group() == group)
            && self
                .organ_type
                .is_none_or(|organ| tx.key.organ_type() == Some(organ))
            && self.direction.is_none_or(|direction| tx.direction == direction)
            && self
                .recorded_by
                .as_ref()
                .is_none_or(|actor| &tx.recorded_by == actor)
            && self
                .donor_ref
                .as_deref()
                .is_none_or(|donor| tx.counterparty.donor_ref() == Some(donor))
            && self
                .hospital_ref
                .as_deref()
                .is_none_or(|hospital| tx.counterparty.hospital_ref() == Some(hospital))
            && self.created_from.is_none_or(|from| tx.created_at >= from)
            && self.created_until.is_none_or(|until| tx.created_at < until)
    }
}

/// Runs one store call under `timeout`.
///
/// # Errors
///
/// Returns `StoreUnavailable` when the call does not finish in time, or the
/// call's own error.
pub async fn bounded<T>(
    operation: &'static str,
    timeout: Duration,
    call: impl Future<Output = LedgerResult<T>>,
) -> LedgerResult<T> {
    tokio::time::timeout(timeout, call).await.map_err(|_| {
        LedgerError::StoreUnavailable(format!(
            "{operation} timed out after {}ms",
            timeout.as_millis()
        ))
    })?
}

/// Visits every transaction matching `query`, page by page.
///
/// Each page fetch is bounded by `timeout` on its own; a long history never
/// shares one deadline.
///
/// # Errors
///
/// Propagates the first store error or page timeout.
pub async fn scan<S, F>(
    store: &S,
    query: &HistoryQuery,
    timeout: Duration,
    mut visit: F,
) -> LedgerResult<()>
where
    S: TransactionStore,
    F: FnMut(&Transaction),
{
    let mut page = CursorRequest::first(SCAN_PAGE_SIZE);
    loop {
        let batch = bounded("list history page", timeout, store.list(query, page)).await?;
        batch.data.iter().for_each(&mut visit);
        match batch.next_cursor {
            Some(cursor) => page = CursorRequest::after(cursor, SCAN_PAGE_SIZE),
            None => return Ok(()),
        }
    }
}
