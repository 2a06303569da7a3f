//! Stock balance derivation.
//!
//! A key's balance is the sum of its intake quantities minus the sum of its
//! dispense quantities. The [`StockAggregator`] answers balance queries
//! either from an in-memory tally per key or by recomputing from the store;
//! both strategies return the same numbers for the same history.

use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;
use std::time::Duration;

use dashmap::DashMap;
use lifeline_shared::BalanceStrategy;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use super::error::LedgerResult;
use super::store::{HistoryQuery, TransactionStore, scan};
use super::types::{Direction, ResourceKind, StockKey, Transaction};

/// Running intake and dispense totals of one key.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Tally {
    /// Sum of intake quantities.
    pub total_in: i64,
    /// Sum of dispense quantities.
    pub total_out: i64,
}

impl Tally {
    /// Adds one movement.
    pub fn apply(&mut self, direction: Direction, quantity: i64) {
        match direction {
            Direction::In => self.total_in = self.total_in.saturating_add(quantity),
            Direction::Out => self.total_out = self.total_out.saturating_add(quantity),
        }
    }

    /// Signed balance, `total_in - total_out`.
    #[must_use]
    pub const fn balance(&self) -> i64 {
        self.total_in.saturating_sub(self.total_out)
    }
}

/// Per-key stock summary.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StockSummary {
    /// Sum of intake quantities.
    pub total_in: i64,
    /// Sum of dispense quantities.
    pub total_out: i64,
    /// `total_in - total_out`, never below zero.
    pub available: i64,
}

impl From<Tally> for StockSummary {
    fn from(tally: Tally) -> Self {
        Self {
            total_in: tally.total_in,
            total_out: tally.total_out,
            available: tally.balance().max(0),
        }
    }
}

/// Outcome of comparing a key's cached tally with a full recomputation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Reconciliation {
    /// Reconciled key.
    pub key: StockKey,
    /// Tally held by the cache before reconciling.
    pub cached: Tally,
    /// Tally recomputed from the store.
    pub recomputed: Tally,
}

impl Reconciliation {
    /// Returns true if the cache disagreed with the store.
    #[must_use]
    pub fn diverged(&self) -> bool {
        self.cached != self.recomputed
    }
}

/// Derives balances from the transaction store.
///
/// In `Cached` mode the cache holds a tally for every key with history. It
/// is filled by [`rebuild`](Self::rebuild) and afterwards changed only by
/// [`record`](Self::record) and [`reconcile`](Self::reconcile), both of which
/// the ledger service calls while holding the key's lock. Readers never
/// populate it.
///
/// Every page read from the store is bounded by `store_timeout`.
pub struct StockAggregator<S: TransactionStore> {
    store: Arc<S>,
    strategy: BalanceStrategy,
    store_timeout: Duration,
    cache: DashMap<StockKey, Tally>,
}

impl<S: TransactionStore> StockAggregator<S> {
    /// Creates an aggregator with an empty cache.
    #[must_use]
    pub fn new(store: Arc<S>, strategy: BalanceStrategy, store_timeout: Duration) -> Self {
        Self {
            store,
            strategy,
            store_timeout,
            cache: DashMap::new(),
        }
    }

    /// Strategy in use.
    #[must_use]
    pub const fn strategy(&self) -> BalanceStrategy {
        self.strategy
    }

    /// Rebuilds the cache from the full store history.
    ///
    /// No-op in `Recompute` mode.
    ///
    /// # Errors
    ///
    /// Propagates store errors; the previous cache is kept on failure.
    pub async fn rebuild(&self) -> LedgerResult<()> {
        if self.strategy == BalanceStrategy::Recompute {
            return Ok(());
        }

        let tallies = self.tallies(&HistoryQuery::default()).await?;
        self.cache.clear();
        let keys = tallies.len();
        for (key, tally) in tallies {
            self.cache.insert(key, tally);
        }
        debug!(keys, "stock cache rebuilt");
        Ok(())
    }

    /// Applies an accepted transaction to the cache.
    ///
    /// Must be called exactly once per appended transaction.
    pub fn record(&self, tx: &Transaction) {
        if self.strategy == BalanceStrategy::Cached {
            self.cache
                .entry(tx.key)
                .or_default()
                .apply(tx.direction, tx.quantity);
        }
    }

    /// Intake and dispense totals of a key.
    ///
    /// # Errors
    ///
    /// Propagates store errors in `Recompute` mode.
    pub async fn tally_of(&self, key: &StockKey) -> LedgerResult<Tally> {
        match self.strategy {
            BalanceStrategy::Cached => Ok(self.cached(key)),
            BalanceStrategy::Recompute => self.recompute(key).await,
        }
    }

    /// Current balance of a key. Keys without history have balance zero.
    ///
    /// # Errors
    ///
    /// Propagates store errors in `Recompute` mode.
    pub async fn balance_of(&self, key: &StockKey) -> LedgerResult<i64> {
        Ok(self.tally_of(key).await?.balance())
    }

    /// Recomputes a key's tally by streaming its history from the store.
    ///
    /// # Errors
    ///
    /// Propagates store errors.
    pub async fn recompute(&self, key: &StockKey) -> LedgerResult<Tally> {
        let mut tally = Tally::default();
        let query = HistoryQuery::for_key(key);
        scan(self.store.as_ref(), &query, self.store_timeout, |tx| {
            tally.apply(tx.direction, tx.quantity);
        })
        .await?;
        Ok(tally)
    }

    /// Summary of every key of `kind` that has history, in key order.
    ///
    /// # Errors
    ///
    /// Propagates store errors in `Recompute` mode.
    pub async fn summary(&self, kind: ResourceKind) -> LedgerResult<BTreeMap<StockKey, StockSummary>> {
        let tallies: Vec<(StockKey, Tally)> = match self.strategy {
            BalanceStrategy::Cached => self.cached_tallies(kind),
            BalanceStrategy::Recompute => self
                .tallies(&HistoryQuery::for_kind(kind))
                .await?
                .into_iter()
                .collect(),
        };

        Ok(tallies
            .into_iter()
            .map(|(key, tally)| (key, StockSummary::from(tally)))
            .collect())
    }

    /// Compares the cached tally of `key` with a recomputation and repairs
    /// the cache if they differ.
    ///
    /// The caller must hold the key's lock.
    ///
    /// # Errors
    ///
    /// Propagates store errors; the cache is left untouched on failure.
    pub async fn reconcile(&self, key: &StockKey) -> LedgerResult<Reconciliation> {
        let recomputed = self.recompute(key).await?;
        let cached = match self.strategy {
            BalanceStrategy::Cached => self.cached(key),
            BalanceStrategy::Recompute => recomputed,
        };

        let outcome = Reconciliation {
            key: *key,
            cached,
            recomputed,
        };
        if outcome.diverged() {
            warn!(
                %key,
                cached_in = cached.total_in,
                cached_out = cached.total_out,
                recomputed_in = recomputed.total_in,
                recomputed_out = recomputed.total_out,
                "stock cache diverged from store, repairing"
            );
            self.cache.insert(*key, recomputed);
        }
        Ok(outcome)
    }

    /// Keys currently held by the cache.
    #[must_use]
    pub fn cached_keys(&self) -> Vec<StockKey> {
        self.cache.iter().map(|entry| *entry.key()).collect()
    }

    fn cached_tallies(&self, kind: ResourceKind) -> Vec<(StockKey, Tally)> {
        self.cache
            .iter()
            .filter(|entry| entry.key().kind() == kind)
            .map(|entry| (*entry.key(), *entry.value()))
            .collect()
    }

    fn cached(&self, key: &StockKey) -> Tally {
        self.cache.get(key).map(|tally| *tally).unwrap_or_default()
    }

    async fn tallies(&self, query: &HistoryQuery) -> LedgerResult<HashMap<StockKey, Tally>> {
        let mut tallies: HashMap<StockKey, Tally> = HashMap::new();
        scan(self.store.as_ref(), query, self.store_timeout, |tx| {
            tallies
                .entry(tx.key)
                .or_default()
                .apply(tx.direction, tx.quantity);
        })
        .await?;
        Ok(tallies)
    }

    #[cfg(test)]
    pub(crate) fn corrupt(&self, key: StockKey, tally: Tally) {
        self.cache.insert(key, tally);
    }
}
