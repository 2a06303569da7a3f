//! Stock analytics.
//!
//! This module provides read-only reports over the ledger:
//! - Blood group breakdown, zero-filled over the eight canonical groups
//! - Organ breakdown, zero-filled over the organ catalog
//! - Per-kind totals
//! - Recent transactions

pub mod service;
pub mod types;


pub use service::AnalyticsReporter;
pub use types::*;
