//! Concurrent dispenses against a file-backed SQLite database.
//!
//! Several pool connections write at once, so the per-key lock is the only
//! thing standing between concurrent dispenses and an overdraft.

mod common;

use std::sync::Arc;

use futures::future::join_all;
use lifeline_core::auth::{Caller, Role};
use lifeline_core::ledger::{BloodGroup, LedgerError, LedgerService, StockKey};
use lifeline_db::SeaOrmTransactionStore;
use lifeline_shared::{BalanceStrategy, LedgerConfig};
use rstest::rstest;
use tokio::sync::Barrier;

use common::{blood_in, blood_out, file_db};

fn org() -> Caller {
    Caller::new("org-1", Role::Organisation)
}

async fn open(strategy: BalanceStrategy) -> (Arc<LedgerService<SeaOrmTransactionStore>>, std::path::PathBuf) {
    let (db, path) = file_db(4).await;
    let store = SeaOrmTransactionStore::open(db).await.unwrap();
    let config = LedgerConfig {
        balance_strategy: strategy,
        store_timeout_ms: 10_000,
        ..LedgerConfig::default()
    };
    let ledger = LedgerService::open(Arc::new(store), config).await.unwrap();
    (Arc::new(ledger), path)
}

async fn race(
    ledger: &Arc<LedgerService<SeaOrmTransactionStore>>,
    group: &'static str,
    requests: usize,
    quantity: i64,
) -> (usize, usize) {
    let barrier = Arc::new(Barrier::new(requests));
    let handles = (0..requests).map(|_| {
        let ledger = ledger.clone();
        let barrier = barrier.clone();
        tokio::spawn(async move {
            barrier.wait().await;
            ledger.record_transaction(&org(), blood_out(group, quantity)).await
        })
    });

    let mut accepted = 0;
    let mut rejected = 0;
    for result in join_all(handles).await {
        match result.unwrap() {
            Ok(_) => accepted += 1,
            Err(LedgerError::InsufficientStock { .. }) => rejected += 1,
            Err(other) => panic!("unexpected error: {other}"),
        }
    }
    (accepted, rejected)
}

#[rstest]
#[case::cached(BalanceStrategy::Cached)]
#[case::recompute(BalanceStrategy::Recompute)]
#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_two_dispenses_admit_exactly_one(#[case] strategy: BalanceStrategy) {
    let (ledger, path) = open(strategy).await;
    let a_pos = StockKey::blood(BloodGroup::APos);
    ledger.record_transaction(&org(), blood_in("A+", 100)).await.unwrap();

    assert_eq!(race(&ledger, "A+", 2, 100).await, (1, 1));
    assert_eq!(ledger.balance_of(&a_pos).await.unwrap(), 0);

    drop(ledger);
    let _ = std::fs::remove_file(path);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 8)]
async fn test_many_dispenses_across_keys() {
    let (ledger, path) = open(BalanceStrategy::Cached).await;
    ledger.record_transaction(&org(), blood_in("O-", 1_000)).await.unwrap();
    ledger.record_transaction(&org(), blood_in("AB+", 500)).await.unwrap();

    let (o_neg, ab_pos) = tokio::join!(race(&ledger, "O-", 20, 150), race(&ledger, "AB+", 12, 100));
    assert_eq!(o_neg, (6, 14));
    assert_eq!(ab_pos, (5, 7));

    let outcomes = ledger.reconcile_all().await.unwrap();
    assert!(outcomes.iter().all(|r| !r.diverged()));
    assert_eq!(
        ledger.balance_of(&StockKey::blood(BloodGroup::ONeg)).await.unwrap(),
        100
    );

    drop(ledger);
    let _ = std::fs::remove_file(path);
}
