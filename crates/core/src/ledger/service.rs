//! Ledger service.
//!
//! The public surface of the ledger: record transactions and corrections,
//! read history, balances and summaries. Writes to the same stock key are
//! serialized by a per-key async mutex so that the stock check and the
//! append happen against the same balance. Writes to different keys never
//! contend.

use std::collections::{BTreeMap, BTreeSet};
use std::future::Future;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use dashmap::DashMap;
use lifeline_shared::types::{CursorPage, CursorRequest, TransactionId};
use lifeline_shared::{BalanceStrategy, LedgerConfig};
use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;
use tracing::{info, warn};

use super::balance::{Reconciliation, StockAggregator, StockSummary};
use super::correction::CorrectionService;
use super::error::{InputError, LedgerError, LedgerResult};
use super::store::{HistoryQuery, TransactionStore, bounded, scan};
use super::types::{
    BloodGroup, Direction, OrganType, ResourceKind, StockKey, Transaction, TransactionDetail,
    TransactionDraft,
};
use super::validation::{ValidatedDraft, check_stock, validate_draft};
use crate::auth::Caller;

/// Caller-facing history filter. Unset fields match everything.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct HistoryFilter {
    /// Blood group.
    #[serde(default)]
    pub blood_group: Option<BloodGroup>,
    /// Organ type, organs only.
    #[serde(default)]
    pub organ_type: Option<OrganType>,
    /// Direction.
    #[serde(default)]
    pub direction: Option<Direction>,
    /// Inclusive lower bound on `created_at`.
    #[serde(default)]
    pub created_from: Option<DateTime<Utc>>,
    /// Exclusive upper bound on `created_at`.
    #[serde(default)]
    pub created_until: Option<DateTime<Utc>>,
}

impl HistoryFilter {
    /// Filter matching one stock key.
    #[must_use]
    pub fn for_key(key: &StockKey) -> Self {
        Self {
            blood_group: Some(key.blood_group()),
            organ_type: key.organ_type(),
            ..Self::default()
        }
    }

    fn into_query(self, kind: ResourceKind) -> HistoryQuery {
        HistoryQuery {
            kind: Some(kind),
            blood_group: self.blood_group,
            organ_type: self.organ_type,
            direction: self.direction,
            created_from: self.created_from,
            created_until: self.created_until,
            ..HistoryQuery::default()
        }
    }
}

/// Ledger service over a transaction store.
pub struct LedgerService<S: TransactionStore> {
    store: Arc<S>,
    aggregator: StockAggregator<S>,
    locks: DashMap<StockKey, Arc<Mutex<()>>>,
    // Keys whose append failed without a clear outcome; the cache is
    // reconciled before the next write to them.
    suspect: DashMap<StockKey, ()>,
    config: LedgerConfig,
}

impl<S: TransactionStore> LedgerService<S> {
    /// Opens the ledger, rebuilding the stock cache from the store.
    ///
    /// # Errors
    ///
    /// Returns `StoreUnavailable` if the store cannot be read in time.
    pub async fn open(store: Arc<S>, config: LedgerConfig) -> LedgerResult<Self> {
        let service = Self {
            aggregator: StockAggregator::new(
                store.clone(),
                config.balance_strategy,
                config.store_timeout(),
            ),
            store,
            locks: DashMap::new(),
            suspect: DashMap::new(),
            config,
        };
        service.aggregator.rebuild().await?;
        info!(strategy = ?service.config.balance_strategy, "ledger opened");
        Ok(service)
    }

    /// Underlying store.
    #[must_use]
    pub fn store(&self) -> &Arc<S> {
        &self.store
    }

    /// Stock aggregator.
    #[must_use]
    pub fn aggregator(&self) -> &StockAggregator<S> {
        &self.aggregator
    }

    /// Validates and records a transaction.
    ///
    /// Rules 1-4 are checked before the key's lock is taken. Correction
    /// checks, the stock check, the append and the cache update all happen
    /// under the lock, so two dispenses on one key can never both pass
    /// against the same balance.
    ///
    /// # Errors
    ///
    /// - `Forbidden` if the caller's role cannot record
    /// - `InvalidInput` if a draft rule fails or a correction does not mirror its original
    /// - `TransactionNotFound` if a correction references an unknown transaction
    /// - `InsufficientStock` if a dispense exceeds the balance
    /// - `StoreUnavailable` if the store fails or times out
    pub async fn record_transaction(
        &self,
        caller: &Caller,
        draft: TransactionDraft,
    ) -> LedgerResult<Transaction> {
        let result = self.admit(caller, draft).await;
        match &result {
            Ok(tx) => info!(
                id = %tx.id,
                key = %tx.key,
                direction = %tx.direction,
                quantity = tx.quantity,
                actor = %tx.recorded_by,
                corrects = ?tx.corrects_id,
                "transaction recorded"
            ),
            Err(err) => warn!(
                code = err.error_code(),
                actor = %caller.actor_id,
                error = %err,
                "transaction rejected"
            ),
        }
        result
    }

    /// Records the compensating entry for `original_id`.
    ///
    /// # Errors
    ///
    /// Same as [`record_transaction`](Self::record_transaction).
    pub async fn record_correction(
        &self,
        caller: &Caller,
        original_id: TransactionId,
    ) -> LedgerResult<Transaction> {
        let original = match self.visible(caller, original_id).await {
            Ok(original) => original,
            Err(err) => {
                warn!(code = err.error_code(), original = %original_id, "correction rejected");
                return Err(err);
            }
        };
        let draft = CorrectionService::compensating_draft(&original);
        self.record_transaction(caller, draft).await
    }

    /// Fetches a transaction with its corrections.
    ///
    /// # Errors
    ///
    /// Returns `TransactionNotFound` for unknown ids and for transactions
    /// outside the caller's scope.
    pub async fn get_transaction(
        &self,
        caller: &Caller,
        id: TransactionId,
    ) -> LedgerResult<TransactionDetail> {
        let transaction = self.visible(caller, id).await?;
        let corrections = self
            .bounded("list corrections", self.store.corrections_of(id))
            .await?;
        Ok(TransactionDetail::new(transaction, corrections))
    }

    /// Lists the caller-visible history of a kind in insertion order.
    ///
    /// # Errors
    ///
    /// Returns `InvalidInput` for a zero or oversized page, or
    /// `StoreUnavailable`.
    pub async fn get_history(
        &self,
        caller: &Caller,
        kind: ResourceKind,
        filter: HistoryFilter,
        page: CursorRequest,
    ) -> LedgerResult<CursorPage<Transaction>> {
        if page.limit == 0 || page.limit > self.config.max_page_size {
            return Err(InputError::InvalidPageSize(page.limit).into());
        }

        let mut query = filter.into_query(kind);
        if !caller.restrict(&mut query) {
            return Ok(CursorPage::empty());
        }
        self.bounded("list history", self.store.list(&query, page))
            .await
    }

    /// Per-key stock summary of a kind.
    ///
    /// # Errors
    ///
    /// Returns `StoreUnavailable` in recompute mode if the store fails.
    pub async fn get_summary(
        &self,
        kind: ResourceKind,
    ) -> LedgerResult<BTreeMap<StockKey, StockSummary>> {
        self.aggregator.summary(kind).await
    }

    /// Current balance of a key.
    ///
    /// # Errors
    ///
    /// Returns `StoreUnavailable` in recompute mode if the store fails.
    pub async fn balance_of(&self, key: &StockKey) -> LedgerResult<i64> {
        self.aggregator.balance_of(key).await
    }

    /// Newest transactions of a kind, newest first.
    ///
    /// # Errors
    ///
    /// Returns `StoreUnavailable` if the store fails.
    pub async fn recent(&self, kind: ResourceKind, limit: usize) -> LedgerResult<Vec<Transaction>> {
        self.bounded("list recent", self.store.recent(kind, limit))
            .await
    }

    /// Reconciles one key's cached tally against the store.
    ///
    /// # Errors
    ///
    /// Returns `StoreUnavailable` if the store fails.
    pub async fn reconcile(&self, key: &StockKey) -> LedgerResult<Reconciliation> {
        let lock = self.lock_for(key);
        let _guard = lock.lock().await;
        let outcome = self.aggregator.reconcile(key).await?;
        self.suspect.remove(key);
        Ok(outcome)
    }

    /// Reconciles every key with history.
    ///
    /// # Errors
    ///
    /// Stops at the first store failure.
    pub async fn reconcile_all(&self) -> LedgerResult<Vec<Reconciliation>> {
        let mut keys: BTreeSet<StockKey> = self.aggregator.cached_keys().into_iter().collect();
        let timeout = self.config.store_timeout();
        scan(self.store.as_ref(), &HistoryQuery::default(), timeout, |tx| {
            keys.insert(tx.key);
        })
        .await?;

        let mut outcomes = Vec::with_capacity(keys.len());
        for key in keys {
            outcomes.push(self.reconcile(&key).await?);
        }
        let diverged = outcomes.iter().filter(|o| o.diverged()).count();
        info!(keys = outcomes.len(), diverged, "stock reconciled");
        Ok(outcomes)
    }

    async fn admit(&self, caller: &Caller, draft: TransactionDraft) -> LedgerResult<Transaction> {
        if !caller.role.can_record() {
            return Err(LedgerError::Forbidden(format!(
                "role '{}' cannot record transactions",
                caller.role
            )));
        }

        let draft = validate_draft(draft)?;
        let lock = self.lock_for(&draft.key);
        let _guard = lock.lock().await;

        if self.suspect.contains_key(&draft.key) {
            self.aggregator.reconcile(&draft.key).await?;
            self.suspect.remove(&draft.key);
        }

        if let Some(original_id) = draft.corrects_id {
            self.check_correction(caller, original_id, &draft).await?;
        }

        let available = self.aggregator.balance_of(&draft.key).await?;
        check_stock(&draft, available)?;

        let key = draft.key;
        let new = draft.into_new(caller.actor_id.clone(), Utc::now());
        let stored = match self.bounded("append transaction", self.store.append(new)).await {
            Ok(stored) => stored,
            Err(err) => {
                if self.aggregator.strategy() == BalanceStrategy::Cached {
                    self.suspect.insert(key, ());
                }
                return Err(err);
            }
        };
        self.aggregator.record(&stored);
        Ok(stored)
    }

    async fn check_correction(
        &self,
        caller: &Caller,
        original_id: TransactionId,
        draft: &ValidatedDraft,
    ) -> LedgerResult<()> {
        let original = self.visible(caller, original_id).await?;
        let corrections = self
            .bounded("list corrections", self.store.corrections_of(original_id))
            .await?;
        CorrectionService::validate_correction(&original, draft, !corrections.is_empty())?;
        Ok(())
    }

    async fn visible(&self, caller: &Caller, id: TransactionId) -> LedgerResult<Transaction> {
        let tx = self.bounded("get transaction", self.store.get(id)).await?;
        if caller.can_see(&tx) {
            Ok(tx)
        } else {
            Err(LedgerError::TransactionNotFound(id))
        }
    }

    fn lock_for(&self, key: &StockKey) -> Arc<Mutex<()>> {
        self.locks.entry(*key).or_default().clone()
    }

    // Single store calls only. Multi-page reads go through `scan`, which
    // bounds each page.
    async fn bounded<T>(
        &self,
        operation: &'static str,
        call: impl Future<Output = LedgerResult<T>>,
    ) -> LedgerResult<T> {
        bounded(operation, self.config.store_timeout(), call).await
    }
}

#[cfg(test)]
#[path = "service_tests.rs"]
mod tests;
