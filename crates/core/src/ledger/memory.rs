//! Process-local transaction store.
//!
//! Keeps the ledger in a vector ordered by sequence. Used by tests, by the
//! seeder's dry runs and anywhere durability is not needed.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};

use lifeline_shared::types::{CursorPage, CursorRequest, TransactionId};
use tokio::sync::RwLock;

use super::error::{LedgerError, LedgerResult};
use super::store::{HistoryQuery, TransactionStore};
use super::types::{NewTransaction, ResourceKind, Transaction};

#[derive(Debug, Default)]
struct State {
    rows: Vec<Transaction>,
    by_id: HashMap<TransactionId, usize>,
}

/// In-memory [`TransactionStore`].
///
/// An append is applied under the write lock, so readers see either the
/// whole transaction or none of it.
#[derive(Debug, Default)]
pub struct MemoryStore {
    state: RwLock<State>,
    offline: AtomicBool,
}

impl MemoryStore {
    /// Creates an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Simulates losing the backing store. While offline every call fails
    /// with `StoreUnavailable`.
    pub fn set_offline(&self, offline: bool) {
        self.offline.store(offline, Ordering::SeqCst);
    }

    /// Number of stored transactions.
    pub async fn len(&self) -> usize {
        self.state.read().await.rows.len()
    }

    /// Returns true if nothing has been appended.
    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }

    fn ensure_online(&self) -> LedgerResult<()> {
        if self.offline.load(Ordering::SeqCst) {
            Err(LedgerError::StoreUnavailable(
                "memory store is offline".to_string(),
            ))
        } else {
            Ok(())
        }
    }
}

impl TransactionStore for MemoryStore {
    async fn append(&self, tx: NewTransaction) -> LedgerResult<Transaction> {
        self.ensure_online()?;
        let mut state = self.state.write().await;
        if state.by_id.contains_key(&tx.id) {
            return Err(LedgerError::Internal(format!(
                "duplicate transaction id {}",
                tx.id
            )));
        }

        let sequence = i64::try_from(state.rows.len())
            .map_err(|_| LedgerError::Internal("sequence overflow".to_string()))?
            + 1;
        let stored = Transaction::from_new(tx, sequence);
        let index = state.rows.len();
        state.by_id.insert(stored.id, index);
        state.rows.push(stored.clone());
        Ok(stored)
    }

    async fn get(&self, id: TransactionId) -> LedgerResult<Transaction> {
        self.ensure_online()?;
        let state = self.state.read().await;
        state
            .by_id
            .get(&id)
            .and_then(|&index| state.rows.get(index))
            .cloned()
            .ok_or(LedgerError::TransactionNotFound(id))
    }

    async fn list(
        &self,
        query: &HistoryQuery,
        page: CursorRequest,
    ) -> LedgerResult<CursorPage<Transaction>> {
        self.ensure_online()?;
        let state = self.state.read().await;
        let after = page.after.unwrap_or(0);
        // Sequences are 1-based positions, so the cursor is also an index.
        let start = usize::try_from(after.max(0)).unwrap_or(usize::MAX);

        let items: Vec<Transaction> = state
            .rows
            .iter()
            .skip(start)
            .filter(|tx| query.matches(tx))
            .take(page.limit as usize + 1)
            .cloned()
            .collect();

        Ok(CursorPage::from_lookahead(items, page.limit, |tx| tx.sequence))
    }

    async fn recent(&self, kind: ResourceKind, limit: usize) -> LedgerResult<Vec<Transaction>> {
        self.ensure_online()?;
        let state = self.state.read().await;
        let mut items: Vec<Transaction> = state
            .rows
            .iter()
            .filter(|tx| tx.key.kind() == kind)
            .cloned()
            .collect();
        items.sort_by(|a, b| b.created_at.cmp(&a.created_at).then(b.id.cmp(&a.id)));
        items.truncate(limit);
        Ok(items)
    }

    async fn corrections_of(&self, id: TransactionId) -> LedgerResult<Vec<Transaction>> {
        self.ensure_online()?;
        let state = self.state.read().await;
        Ok(state
            .rows
            .iter()
            .filter(|tx| tx.corrects_id == Some(id))
            .cloned()
            .collect())
    }
}
