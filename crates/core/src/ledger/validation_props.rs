//! Property-based tests for draft validation rules.
//!
//! Feature: inventory-ledger, Property 2: Draft Validation Rules

use proptest::prelude::*;

use super::error::InputError;
use super::types::{AttachmentKind, BloodGroup, Contact, Direction, OrganType, TransactionDraft};
use super::validation::validate_draft;

/// Strategy to generate a canonical blood group code with random case and padding.
fn blood_group_code() -> impl Strategy<Value = String> {
    (prop::sample::select(BloodGroup::ALL.to_vec()), any::<bool>(), any::<bool>()).prop_map(
        |(group, lower, padded)| {
            let code = if lower {
                group.code().to_ascii_lowercase()
            } else {
                group.code().to_string()
            };
            if padded { format!(" {code} ") } else { code }
        },
    )
}

/// Strategy to generate a direction.
fn direction_strategy() -> impl Strategy<Value = Direction> {
    prop_oneof![Just(Direction::In), Just(Direction::Out)]
}

/// Strategy to generate a positive quantity.
fn positive_quantity() -> impl Strategy<Value = i64> {
    1i64..1_000_000i64
}

/// Attaches the counterparty matching the direction.
fn with_counterparty(draft: TransactionDraft) -> TransactionDraft {
    match draft.direction {
        Direction::In => draft.donor("donor-1"),
        Direction::Out => draft.hospital("hospital-1"),
    }
}

fn complete_organ(direction: Direction, organ: OrganType, group: &str, quantity: i64) -> TransactionDraft {
    with_counterparty(
        TransactionDraft::organ(direction, organ.as_str(), group, quantity)
            .contact(Contact {
                name: Some("Donor Name".to_string()),
                age: Some(30),
                email: Some("donor@example.org".to_string()),
                phone: Some("0123456789".to_string()),
            })
            .attachment(AttachmentKind::MedicalDocument, "blob://m")
            .attachment(AttachmentKind::IdentityProof, "blob://i"),
    )
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(100))]

    // =========================================================================
    // Property 2: Draft Validation Rules
    // =========================================================================

    /// Property 2.1: Well-formed blood drafts are accepted.
    ///
    /// *For any* canonical group, direction and positive quantity with the
    /// matching counterparty, validation SHALL succeed and resolve the group.
    #[test]
    fn prop_valid_blood_draft_accepted(
        code in blood_group_code(),
        direction in direction_strategy(),
        quantity in positive_quantity(),
    ) {
        let draft = with_counterparty(TransactionDraft::blood(direction, &code, quantity));
        let validated = validate_draft(draft);
        prop_assert!(validated.is_ok(), "valid draft rejected: {:?}", validated);
        let validated = validated.unwrap();
        prop_assert_eq!(Some(validated.key.blood_group()), BloodGroup::parse(&code));
        prop_assert_eq!(validated.quantity, quantity);
    }

    /// Property 2.2: Non-positive quantities are rejected first.
    ///
    /// *For any* quantity <= 0, validation SHALL fail with
    /// NonPositiveQuantity regardless of the other fields.
    #[test]
    fn prop_non_positive_quantity_rejected(
        quantity in i64::MIN..=0i64,
        code in "[A-Z]{0,3}",
        direction in direction_strategy(),
    ) {
        let draft = TransactionDraft::blood(direction, &code, quantity);
        prop_assert_eq!(validate_draft(draft), Err(InputError::NonPositiveQuantity(quantity)));
    }

    /// Property 2.3: Non-catalog blood groups are rejected.
    #[test]
    fn prop_unknown_blood_group_rejected(
        code in "[A-Z]{1,3}[+-]?",
        quantity in positive_quantity(),
    ) {
        prop_assume!(BloodGroup::parse(&code).is_none());
        let draft = with_counterparty(TransactionDraft::blood(Direction::In, &code, quantity));
        prop_assert_eq!(validate_draft(draft), Err(InputError::UnknownBloodGroup(code)));
    }

    /// Property 2.4: Complete organ drafts are accepted for every catalog entry.
    #[test]
    fn prop_complete_organ_draft_accepted(
        organ in prop::sample::select(OrganType::ALL.to_vec()),
        code in blood_group_code(),
        direction in direction_strategy(),
        quantity in 1i64..10i64,
    ) {
        let validated = validate_draft(complete_organ(direction, organ, &code, quantity));
        prop_assert!(validated.is_ok(), "complete organ draft rejected: {:?}", validated);
        prop_assert_eq!(validated.unwrap().key.organ_type(), Some(organ));
    }

    /// Property 2.5: Dropping any organ document is rejected.
    #[test]
    fn prop_organ_missing_document_rejected(
        organ in prop::sample::select(OrganType::ALL.to_vec()),
        missing in prop_oneof![Just(AttachmentKind::MedicalDocument), Just(AttachmentKind::IdentityProof)],
    ) {
        let mut draft = complete_organ(Direction::In, organ, "O+", 1);
        draft.attachments.retain(|a| a.kind != missing);
        prop_assert_eq!(validate_draft(draft), Err(InputError::MissingAttachment(missing)));
    }

    /// Property 2.6: The counterparty must match the direction.
    ///
    /// *For any* direction, providing only the other role's reference SHALL
    /// fail with CounterpartyMismatch.
    #[test]
    fn prop_wrong_counterparty_rejected(
        direction in direction_strategy(),
        quantity in positive_quantity(),
        reference in "[a-z]{1,12}",
    ) {
        let draft = TransactionDraft::blood(direction, "B+", quantity);
        let draft = match direction {
            Direction::In => draft.hospital(reference),
            Direction::Out => draft.donor(reference),
        };
        prop_assert_eq!(validate_draft(draft), Err(InputError::CounterpartyMismatch { direction }));
    }
}
