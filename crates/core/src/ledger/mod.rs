//! Inventory ledger for blood and organ stock.
//!
//! This module implements the core ledger functionality:
//! - Resource catalogs and stock keys
//! - Draft validation
//! - The transaction store seam and an in-memory store
//! - Balance derivation, cached or recomputed
//! - Compensating entries
//! - Ledger service with per-key serialized writes

pub mod balance;
pub mod correction;
pub mod error;
pub mod memory;
pub mod service;
pub mod store;
pub mod types;
pub mod validation;

#[cfg(test)]
mod service_props;
#[cfg(test)]
mod validation_props;

pub use balance::{Reconciliation, StockAggregator, StockSummary, Tally};
pub use correction::CorrectionService;
pub use error::{InputError, LedgerError, LedgerResult};
pub use memory::MemoryStore;
pub use service::{HistoryFilter, LedgerService};
pub use store::{HistoryQuery, TransactionStore};
pub use types::{
    AttachmentKind, AttachmentRef, BloodGroup, Contact, Counterparty, Direction, NewTransaction,
    OrganType, ResourceKind, StockKey, Transaction, TransactionDetail, TransactionDraft,
};
pub use validation::{ValidatedDraft, validate_draft};
