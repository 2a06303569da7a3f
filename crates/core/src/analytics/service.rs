//! Analytics reporter.
//!
//! Read-only aggregation over the ledger. Per-kind stock snapshots are
//! cached with Moka for `refresh_interval_secs`, so dashboards polling the
//! breakdowns do not hit the store on every request.

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

use lifeline_shared::AnalyticsConfig;
use moka::future::Cache;

use super::types::{BloodGroupRow, KindTotals, OrganRow};
use crate::ledger::balance::StockSummary;
use crate::ledger::error::LedgerResult;
use crate::ledger::service::LedgerService;
use crate::ledger::store::TransactionStore;
use crate::ledger::types::{BloodGroup, OrganType, ResourceKind, StockKey, Transaction};

type Snapshot = Arc<BTreeMap<StockKey, StockSummary>>;

/// Grouped stock reports and recent activity.
pub struct AnalyticsReporter<S: TransactionStore> {
    ledger: Arc<LedgerService<S>>,
    config: AnalyticsConfig,
    snapshots: Option<Cache<ResourceKind, Snapshot>>,
}

impl<S: TransactionStore> AnalyticsReporter<S> {
    /// Creates a reporter. A zero refresh interval disables caching.
    #[must_use]
    pub fn new(ledger: Arc<LedgerService<S>>, config: AnalyticsConfig) -> Self {
        let snapshots = (config.refresh_interval_secs > 0).then(|| {
            Cache::builder()
                .max_capacity(2)
                .time_to_live(Duration::from_secs(config.refresh_interval_secs))
                .build()
        });
        Self {
            ledger,
            config,
            snapshots,
        }
    }

    /// Blood stock per group: always eight rows, in canonical order,
    /// zero-filled for groups without history.
    ///
    /// # Errors
    ///
    /// Returns `StoreUnavailable` if the snapshot cannot be computed.
    pub async fn blood_group_breakdown(&self) -> LedgerResult<Vec<BloodGroupRow>> {
        let snapshot = self.snapshot(ResourceKind::Blood).await?;
        let mut rows = BloodGroup::ALL.map(BloodGroupRow::empty);
        for (key, summary) in snapshot.iter() {
            if let Some(row) = rows.iter_mut().find(|row| row.blood_group == key.blood_group()) {
                row.add(summary);
            }
        }
        Ok(rows.to_vec())
    }

    /// Organ stock per organ type, summed across blood groups: one row per
    /// catalog entry, zero-filled.
    ///
    /// # Errors
    ///
    /// Returns `StoreUnavailable` if the snapshot cannot be computed.
    pub async fn organ_breakdown(&self) -> LedgerResult<Vec<OrganRow>> {
        let snapshot = self.snapshot(ResourceKind::Organ).await?;
        let mut rows = OrganType::ALL.map(OrganRow::empty);
        for (key, summary) in snapshot.iter() {
            if let Some(row) = rows
                .iter_mut()
                .find(|row| Some(row.organ_type) == key.organ_type())
            {
                row.add(summary);
            }
        }
        Ok(rows.to_vec())
    }

    /// Totals across every key of a kind.
    ///
    /// # Errors
    ///
    /// Returns `StoreUnavailable` if the snapshot cannot be computed.
    pub async fn totals(&self, kind: ResourceKind) -> LedgerResult<KindTotals> {
        let snapshot = self.snapshot(kind).await?;
        let mut totals = KindTotals::empty(kind);
        snapshot.values().for_each(|summary| totals.add(summary));
        Ok(totals)
    }

    /// Newest transactions of a kind, newest first with ties broken by id.
    ///
    /// `None` uses the configured default limit. Never cached.
    ///
    /// # Errors
    ///
    /// Returns `StoreUnavailable` if the store fails.
    pub async fn recent_transactions(
        &self,
        kind: ResourceKind,
        limit: Option<usize>,
    ) -> LedgerResult<Vec<Transaction>> {
        let limit = limit.unwrap_or(self.config.recent_limit);
        self.ledger.recent(kind, limit).await
    }

    /// Drops cached snapshots so the next call recomputes them.
    pub fn invalidate(&self) {
        if let Some(cache) = &self.snapshots {
            cache.invalidate_all();
        }
    }

    async fn snapshot(&self, kind: ResourceKind) -> LedgerResult<Snapshot> {
        let Some(cache) = &self.snapshots else {
            return Ok(Arc::new(self.ledger.get_summary(kind).await?));
        };
        cache
            .try_get_with(kind, async { self.ledger.get_summary(kind).await.map(Arc::new) })
            .await
            .map_err(|err| (*err).clone())
    }
}
