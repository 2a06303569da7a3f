//! Compensating entries.
//!
//! History is never edited. A mistaken transaction is cancelled by recording
//! a new one with the opposite direction and the same key and quantity,
//! pointing back at the original through `corrects_id`.

use super::error::InputError;
use super::types::{Counterparty, Transaction, TransactionDraft};
use super::validation::ValidatedDraft;

/// Stateless helper for building and checking compensating entries.
pub struct CorrectionService;

impl CorrectionService {
    /// Builds the draft that cancels `original`.
    ///
    /// The direction is reversed, the key and quantity are preserved and the
    /// counterparty reference moves to the slot the reversed direction
    /// requires. Contact details and document references are carried over.
    #[must_use]
    pub fn compensating_draft(original: &Transaction) -> TransactionDraft {
        let direction = original.direction.opposite();
        let (donor_ref, hospital_ref) = match Self::mirrored_counterparty(original) {
            Counterparty::Donor(reference) => (Some(reference), None),
            Counterparty::Hospital(reference) => (None, Some(reference)),
        };

        TransactionDraft {
            resource_kind: original.key.kind(),
            blood_group: original.key.blood_group().code().to_string(),
            organ_type: original.key.organ_type().map(|organ| organ.as_str().to_string()),
            direction,
            quantity: original.quantity,
            donor_ref,
            hospital_ref,
            contact: original.contact.clone(),
            attachments: original.attachments.clone(),
            corrects_id: Some(original.id),
        }
    }

    /// Checks that `candidate` mirrors `original`.
    ///
    /// # Errors
    ///
    /// Returns `InvalidCorrection` if the key, direction or quantity do not
    /// mirror the original, if the original is itself a correction, or if it
    /// has already been corrected.
    pub fn validate_correction(
        original: &Transaction,
        candidate: &ValidatedDraft,
        already_corrected: bool,
    ) -> Result<(), InputError> {
        if Self::is_correction(original) {
            return Err(InputError::InvalidCorrection(format!(
                "transaction {} is itself a correction",
                original.id
            )));
        }
        if candidate.key != original.key {
            return Err(InputError::InvalidCorrection(format!(
                "key {} does not match original key {}",
                candidate.key, original.key
            )));
        }
        if candidate.direction != original.direction.opposite() {
            return Err(InputError::InvalidCorrection(format!(
                "direction must be '{}'",
                original.direction.opposite()
            )));
        }
        if candidate.quantity != original.quantity {
            return Err(InputError::InvalidCorrection(format!(
                "quantity must be {}",
                original.quantity
            )));
        }
        if already_corrected {
            return Err(InputError::InvalidCorrection(format!(
                "transaction {} has already been corrected",
                original.id
            )));
        }
        Ok(())
    }

    /// Returns true if `tx` is a compensating entry.
    #[must_use]
    pub fn is_correction(tx: &Transaction) -> bool {
        tx.corrects_id.is_some()
    }

    /// Counterparty a correction of `original` is expected to carry.
    #[must_use]
    pub fn mirrored_counterparty(original: &Transaction) -> Counterparty {
        match &original.counterparty {
            Counterparty::Donor(reference) => Counterparty::Hospital(reference.clone()),
            Counterparty::Hospital(reference) => Counterparty::Donor(reference.clone()),
        }
    }
}
