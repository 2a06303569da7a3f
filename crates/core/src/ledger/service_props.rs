//! Property-based tests for LedgerService.
//!
//! Feature: inventory-ledger
//! - Property 1: Conservation (cached tally equals recomputation)
//! - Property 3: Non-negativity and idempotent rejection
//! - Property 4: Strategy independence

use std::sync::Arc;

use lifeline_shared::{BalanceStrategy, LedgerConfig};
use proptest::prelude::*;

use super::error::LedgerError;
use super::memory::MemoryStore;
use super::service::LedgerService;
use super::types::{
    AttachmentKind, BloodGroup, Contact, Direction, OrganType, ResourceKind, StockKey,
    TransactionDraft,
};
use crate::auth::{Caller, Role};

/// One write attempt against a small set of keys.
#[derive(Debug, Clone, Copy)]
struct Op {
    key: usize,
    direction: Direction,
    quantity: i64,
}

/// Keys the generated operations spread over.
const KEYS: [StockKey; 3] = [
    StockKey::blood(BloodGroup::OPos),
    StockKey::blood(BloodGroup::AbNeg),
    StockKey::organ(OrganType::Liver, BloodGroup::BPos),
];

/// Strategy to generate an operation sequence.
fn ops_strategy() -> impl Strategy<Value = Vec<Op>> {
    prop::collection::vec(
        (
            0usize..KEYS.len(),
            prop_oneof![Just(Direction::In), Just(Direction::Out)],
            1i64..400i64,
        )
            .prop_map(|(key, direction, quantity)| Op {
                key,
                direction,
                quantity,
            }),
        1..40,
    )
}

fn draft(op: Op) -> TransactionDraft {
    let key = KEYS[op.key];
    let group = key.blood_group().code();
    let draft = match key.organ_type() {
        None => TransactionDraft::blood(op.direction, group, op.quantity),
        Some(organ) => TransactionDraft::organ(op.direction, organ.as_str(), group, op.quantity)
            .contact(Contact {
                name: Some("Prop Donor".to_string()),
                age: Some(40),
                email: Some("prop@example.org".to_string()),
                phone: Some("5550100".to_string()),
            })
            .attachment(AttachmentKind::MedicalDocument, "blob://m")
            .attachment(AttachmentKind::IdentityProof, "blob://i"),
    };
    match op.direction {
        Direction::In => draft.donor("donor"),
        Direction::Out => draft.hospital("hospital"),
    }
}

fn runtime() -> tokio::runtime::Runtime {
    tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .unwrap()
}

async fn open(strategy: BalanceStrategy) -> LedgerService<MemoryStore> {
    let config = LedgerConfig {
        balance_strategy: strategy,
        ..LedgerConfig::default()
    };
    LedgerService::open(Arc::new(MemoryStore::new()), config)
        .await
        .unwrap()
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(100))]

    // =========================================================================
    // Property 1: Conservation
    // =========================================================================

    /// Property 1.1: Cached balance equals full recomputation after every write.
    ///
    /// *For any* sequence of write attempts, after each one the cached tally
    /// of every key SHALL equal the tally recomputed from the store.
    #[test]
    fn prop_cached_equals_recomputed(ops in ops_strategy()) {
        runtime().block_on(async move {
            let ledger = open(BalanceStrategy::Cached).await;
            let caller = Caller::new("org", Role::Organisation);

            for op in ops {
                let _ = ledger.record_transaction(&caller, draft(op)).await;
                for key in &KEYS {
                    let cached = ledger.aggregator().tally_of(key).await.unwrap();
                    let recomputed = ledger.aggregator().recompute(key).await.unwrap();
                    prop_assert_eq!(cached, recomputed, "diverged on {}", key);
                }
            }
            Ok(())
        })?;
    }

    // =========================================================================
    // Property 3: Non-negativity
    // =========================================================================

    /// Property 3.1: Balances never go negative and rejections change nothing.
    ///
    /// *For any* sequence of write attempts, every balance SHALL stay >= 0,
    /// an Out SHALL be rejected exactly when it exceeds the balance, and a
    /// rejected attempt SHALL leave the store unchanged.
    #[test]
    fn prop_balance_never_negative(ops in ops_strategy()) {
        runtime().block_on(async move {
            let ledger = open(BalanceStrategy::Cached).await;
            let caller = Caller::new("org", Role::Organisation);

            for op in ops {
                let key = KEYS[op.key];
                let before = ledger.balance_of(&key).await.unwrap();
                let stored_before = ledger.store().len().await;

                let result = ledger.record_transaction(&caller, draft(op)).await;
                let should_reject = op.direction == Direction::Out && op.quantity > before;

                match result {
                    Ok(_) => {
                        prop_assert!(!should_reject);
                        prop_assert_eq!(ledger.store().len().await, stored_before + 1);
                    }
                    Err(LedgerError::InsufficientStock { available, .. }) => {
                        prop_assert!(should_reject);
                        prop_assert_eq!(available, before);
                        prop_assert_eq!(ledger.store().len().await, stored_before);
                        prop_assert_eq!(ledger.balance_of(&key).await.unwrap(), before);
                    }
                    Err(other) => prop_assert!(false, "unexpected error: {}", other),
                }
                prop_assert!(ledger.balance_of(&key).await.unwrap() >= 0);
            }
            Ok(())
        })?;
    }

    // =========================================================================
    // Property 4: Strategy independence
    // =========================================================================

    /// Property 4.1: Cached and recompute strategies behave identically.
    ///
    /// *For any* sequence of write attempts, both strategies SHALL accept and
    /// reject the same attempts and report the same summaries.
    #[test]
    fn prop_strategies_agree(ops in ops_strategy()) {
        runtime().block_on(async move {
            let cached = open(BalanceStrategy::Cached).await;
            let recompute = open(BalanceStrategy::Recompute).await;
            let caller = Caller::new("org", Role::Organisation);

            for op in ops {
                let a = cached.record_transaction(&caller, draft(op)).await;
                let b = recompute.record_transaction(&caller, draft(op)).await;
                prop_assert_eq!(a.is_ok(), b.is_ok());
            }

            for kind in [ResourceKind::Blood, ResourceKind::Organ] {
                prop_assert_eq!(
                    cached.get_summary(kind).await.unwrap(),
                    recompute.get_summary(kind).await.unwrap()
                );
            }
            Ok(())
        })?;
    }
}
