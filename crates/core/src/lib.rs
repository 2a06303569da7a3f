//! Core business logic for Lifeline.
//!
//! This crate contains the inventory ledger with ZERO web or database
//! dependencies. Storage is reached through the `TransactionStore` trait.
//!
//! # Modules
//!
//! - `ledger` - Append-only stock ledger, validation, balances and corrections
//! - `analytics` - Grouped stock reports and recent activity
//! - `auth` - Caller roles and visibility scoping

pub mod analytics;
pub mod auth;
pub mod ledger;
