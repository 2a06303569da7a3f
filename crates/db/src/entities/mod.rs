//! `SeaORM` entities for the ledger tables.

pub mod ledger_attachments;
pub mod ledger_transactions;

pub mod prelude {
    //! Entity re-exports.
    pub use super::ledger_attachments::Entity as LedgerAttachments;
    pub use super::ledger_transactions::Entity as LedgerTransactions;
}
