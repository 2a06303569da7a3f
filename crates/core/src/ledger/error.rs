//! Ledger error types.
//!
//! `LedgerError` is the only error crossing the ledger service boundary.
//! Input problems are grouped under [`InputError`] so that the API layer can
//! map them to a single response class.

use lifeline_shared::types::TransactionId;
use thiserror::Error;

use super::types::{AttachmentKind, Direction, StockKey};

/// Reasons a draft is rejected as malformed.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum InputError {
    /// Quantity must be strictly positive.
    #[error("Quantity must be positive, got {0}")]
    NonPositiveQuantity(i64),

    /// Blood group is not one of the eight canonical codes.
    #[error("Unknown blood group: {0:?}")]
    UnknownBloodGroup(String),

    /// Organ type is not in the catalog.
    #[error("Unknown organ type: {0:?}")]
    UnknownOrganType(String),

    /// Blood drafts cannot name an organ type.
    #[error("Organ type is only allowed on organ transactions")]
    OrganTypeOnBlood,

    /// Organ drafts must name an organ type.
    #[error("Organ transactions require an organ type")]
    MissingOrganType,

    /// A contact field required for organ transactions is absent.
    #[error("Contact field '{0}' is required for organ transactions")]
    MissingContactField(&'static str),

    /// A contact field is present but malformed.
    #[error("Contact field '{0}' is invalid")]
    InvalidContactField(&'static str),

    /// A document required for organ transactions is absent.
    #[error("Organ transactions require a {0} attachment")]
    MissingAttachment(AttachmentKind),

    /// Blood transactions carry no attachments.
    #[error("Attachments are only allowed on organ transactions")]
    AttachmentsOnBlood,

    /// Donor/hospital reference does not match the direction.
    #[error("A '{direction}' transaction requires exactly one counterparty of the matching role")]
    CounterpartyMismatch {
        /// Direction of the rejected draft.
        direction: Direction,
    },

    /// Compensating entry does not mirror its original.
    #[error("Invalid correction: {0}")]
    InvalidCorrection(String),

    /// Page size is zero or above the configured maximum.
    #[error("Invalid page size: {0}")]
    InvalidPageSize(u32),
}

/// Errors that can occur during ledger operations.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum LedgerError {
    /// Missing or malformed input. Never retried.
    #[error("Invalid input: {0}")]
    InvalidInput(#[from] InputError),

    /// Dispense exceeds the current balance of the key.
    #[error("Insufficient stock for {key}: requested {requested}, available {available}")]
    InsufficientStock {
        /// Stock pool the dispense targeted.
        key: StockKey,
        /// Requested quantity.
        requested: i64,
        /// Balance at the time of validation.
        available: i64,
    },

    /// Backing store unreachable or timed out.
    #[error("Store unavailable: {0}")]
    StoreUnavailable(String),

    /// No transaction with this id is visible to the caller.
    #[error("Transaction not found: {0}")]
    TransactionNotFound(TransactionId),

    /// Caller role does not permit the operation.
    #[error("Forbidden: {0}")]
    Forbidden(String),

    /// Internal error.
    #[error("Internal error: {0}")]
    Internal(String),
}

impl LedgerError {
    /// Returns the error code for API responses.
    #[must_use]
    pub fn error_code(&self) -> &'static str {
        match self {
            Self::InvalidInput(_) => "INVALID_INPUT",
            Self::InsufficientStock { .. } => "INSUFFICIENT_STOCK",
            Self::StoreUnavailable(_) => "STORE_UNAVAILABLE",
            Self::TransactionNotFound(_) => "TRANSACTION_NOT_FOUND",
            Self::Forbidden(_) => "FORBIDDEN",
            Self::Internal(_) => "INTERNAL_ERROR",
        }
    }

    /// Returns the HTTP status code for this error.
    #[must_use]
    pub fn http_status_code(&self) -> u16 {
        match self {
            // 400 Bad Request - validation errors
            Self::InvalidInput(_) => 400,

            // 403 Forbidden - permission errors
            Self::Forbidden(_) => 403,

            // 404 Not Found
            Self::TransactionNotFound(_) => 404,

            // 409 Conflict - stock would go negative
            Self::InsufficientStock { .. } => 409,

            // 503 Service Unavailable
            Self::StoreUnavailable(_) => 503,

            // 500 Internal Server Error
            Self::Internal(_) => 500,
        }
    }

    /// Returns true if this error is retryable.
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::StoreUnavailable(_))
    }

    /// Available amount carried by an `InsufficientStock` rejection.
    #[must_use]
    pub fn available(&self) -> Option<i64> {
        match self {
            Self::InsufficientStock { available, .. } => Some(*available),
            _ => None,
        }
    }
}

/// Result alias for ledger operations.
pub type LedgerResult<T> = Result<T, LedgerError>;
