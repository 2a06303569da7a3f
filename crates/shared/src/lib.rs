//! Shared types and configuration for Lifeline.
//!
//! This crate provides common types used across all other crates:
//! - Typed IDs for type-safe entity references
//! - Cursor pagination types for history listings
//! - Configuration management

pub mod config;
pub mod types;

pub use config::{AnalyticsConfig, AppConfig, BalanceStrategy, DatabaseConfig, LedgerConfig};
