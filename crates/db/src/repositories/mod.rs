//! Repository abstractions for data access.
//!
//! Repositories implement the core crate's storage seams, hiding the
//! `SeaORM` implementation details from the rest of the application.

pub mod transaction;

pub use transaction::{RowError, SeaOrmTransactionStore};
