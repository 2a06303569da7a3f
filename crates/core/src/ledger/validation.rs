//! Business rule validation for ledger drafts.
//!
//! Rules run in a fixed order and stop at the first failure:
//!
//! 1. quantity is positive
//! 2. blood group and organ type belong to their catalogs
//! 3. organ transactions carry full contact details and both documents
//! 4. exactly one counterparty is set, matching the direction
//! 5. a dispense does not exceed the key's current balance
//!
//! Rules 1-4 depend only on the draft and are checked by [`validate_draft`].
//! Rule 5 needs a live balance and is checked by [`check_stock`] while the
//! caller holds the key's lock.

use chrono::{DateTime, Utc};
use lifeline_shared::types::{ActorId, TransactionId};

use super::error::{InputError, LedgerError};
use super::types::{
    AttachmentKind, AttachmentRef, BloodGroup, Contact, Counterparty, Direction, NewTransaction,
    OrganType, ResourceKind, StockKey, TransactionDraft,
};

/// Oldest accepted contact age, in years.
pub const MAX_CONTACT_AGE: u32 = 130;

/// A draft that passed the shape rules, with subtypes resolved to a key.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidatedDraft {
    /// Resolved stock pool.
    pub key: StockKey,
    /// Intake or dispense.
    pub direction: Direction,
    /// Positive quantity.
    pub quantity: i64,
    /// Donor or hospital.
    pub counterparty: Counterparty,
    /// Donor or recipient details.
    pub contact: Option<Contact>,
    /// Attached document references.
    pub attachments: Vec<AttachmentRef>,
    /// Transaction this entry compensates.
    pub corrects_id: Option<TransactionId>,
}

impl ValidatedDraft {
    /// Stamps the draft with identity and acceptance time.
    ///
    /// `created_at` is truncated to microseconds, the finest precision every
    /// backing store keeps.
    #[must_use]
    pub fn into_new(self, recorded_by: ActorId, created_at: DateTime<Utc>) -> NewTransaction {
        NewTransaction {
            id: TransactionId::new(),
            key: self.key,
            direction: self.direction,
            quantity: self.quantity,
            counterparty: self.counterparty,
            contact: self.contact,
            attachments: self.attachments,
            recorded_by,
            corrects_id: self.corrects_id,
            created_at: truncate_to_micros(created_at),
        }
    }
}

/// Drops sub-microsecond precision from a timestamp.
#[must_use]
pub fn truncate_to_micros(at: DateTime<Utc>) -> DateTime<Utc> {
    DateTime::from_timestamp_micros(at.timestamp_micros()).unwrap_or(at)
}

/// Validates the draft-only rules (1-4).
///
/// # Errors
///
/// Returns the first rule violation found.
pub fn validate_draft(draft: TransactionDraft) -> Result<ValidatedDraft, InputError> {
    // Rule 1
    if draft.quantity <= 0 {
        return Err(InputError::NonPositiveQuantity(draft.quantity));
    }

    // Rule 2
    let key = resolve_key(&draft)?;

    // Rule 3
    match key.kind() {
        ResourceKind::Organ => {
            let contact = draft
                .contact
                .as_ref()
                .ok_or(InputError::MissingContactField("name"))?;
            validate_contact(contact, true)?;
            require_attachment(&draft.attachments, AttachmentKind::MedicalDocument)?;
            require_attachment(&draft.attachments, AttachmentKind::IdentityProof)?;
        }
        ResourceKind::Blood => {
            if let Some(contact) = &draft.contact {
                validate_contact(contact, false)?;
            }
            if !draft.attachments.is_empty() {
                return Err(InputError::AttachmentsOnBlood);
            }
        }
    }

    // Rule 4
    let counterparty = resolve_counterparty(
        draft.direction,
        draft.donor_ref.as_deref(),
        draft.hospital_ref.as_deref(),
    )?;

    Ok(ValidatedDraft {
        key,
        direction: draft.direction,
        quantity: draft.quantity,
        counterparty,
        contact: draft.contact,
        attachments: draft.attachments,
        corrects_id: draft.corrects_id,
    })
}

/// Checks rule 5 against the balance observed under the key's lock.
///
/// # Errors
///
/// Returns `InsufficientStock` carrying `available` when a dispense exceeds it.
pub fn check_stock(draft: &ValidatedDraft, available: i64) -> Result<(), LedgerError> {
    if draft.direction == Direction::Out && draft.quantity > available {
        return Err(LedgerError::InsufficientStock {
            key: draft.key,
            requested: draft.quantity,
            available,
        });
    }
    Ok(())
}

fn resolve_key(draft: &TransactionDraft) -> Result<StockKey, InputError> {
    let blood_group = BloodGroup::parse(&draft.blood_group)
        .ok_or_else(|| InputError::UnknownBloodGroup(draft.blood_group.clone()))?;

    match (draft.resource_kind, draft.organ_type.as_deref()) {
        (ResourceKind::Blood, None) => Ok(StockKey::blood(blood_group)),
        (ResourceKind::Blood, Some(_)) => Err(InputError::OrganTypeOnBlood),
        (ResourceKind::Organ, None) => Err(InputError::MissingOrganType),
        (ResourceKind::Organ, Some(raw)) => {
            let organ = OrganType::parse(raw)
                .ok_or_else(|| InputError::UnknownOrganType(raw.to_string()))?;
            Ok(StockKey::organ(organ, blood_group))
        }
    }
}

fn validate_contact(contact: &Contact, required: bool) -> Result<(), InputError> {
    check_text("name", contact.name.as_deref(), required, |_| true)?;

    match contact.age {
        Some(age) if age > MAX_CONTACT_AGE => return Err(InputError::InvalidContactField("age")),
        None if required => return Err(InputError::MissingContactField("age")),
        _ => {}
    }

    check_text("email", contact.email.as_deref(), required, is_email)?;
    check_text("phone", contact.phone.as_deref(), required, is_phone)
}

fn check_text(
    field: &'static str,
    value: Option<&str>,
    required: bool,
    well_formed: impl Fn(&str) -> bool,
) -> Result<(), InputError> {
    match value.map(str::trim) {
        None | Some("") if required => Err(InputError::MissingContactField(field)),
        None => Ok(()),
        Some(text) if !text.is_empty() && !well_formed(text) => {
            Err(InputError::InvalidContactField(field))
        }
        Some(_) => Ok(()),
    }
}

fn is_email(value: &str) -> bool {
    match value.split_once('@') {
        Some((local, domain)) => {
            !local.is_empty()
                && !domain.is_empty()
                && !domain.contains('@')
                && !value.contains(char::is_whitespace)
        }
        None => false,
    }
}

fn is_phone(value: &str) -> bool {
    value.chars().any(|c| c.is_ascii_digit())
        && value
            .chars()
            .all(|c| c.is_ascii_digit() || matches!(c, '+' | '-' | ' ' | '(' | ')'))
}

fn require_attachment(attachments: &[AttachmentRef], kind: AttachmentKind) -> Result<(), InputError> {
    if attachments
        .iter()
        .any(|a| a.kind == kind && !a.blob_ref.trim().is_empty())
    {
        Ok(())
    } else {
        Err(InputError::MissingAttachment(kind))
    }
}

fn resolve_counterparty(
    direction: Direction,
    donor_ref: Option<&str>,
    hospital_ref: Option<&str>,
) -> Result<Counterparty, InputError> {
    let donor_ref = donor_ref.map(str::trim).filter(|s| !s.is_empty());
    let hospital_ref = hospital_ref.map(str::trim).filter(|s| !s.is_empty());

    match (direction, donor_ref, hospital_ref) {
        (Direction::In, Some(donor), None) => Ok(Counterparty::Donor(donor.to_string())),
        (Direction::Out, None, Some(hospital)) => Ok(Counterparty::Hospital(hospital.to_string())),
        _ => Err(InputError::CounterpartyMismatch { direction }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    fn full_contact() -> Contact {
        Contact {
            name: Some("Asha Rao".to_string()),
            age: Some(34),
            email: Some("asha@example.org".to_string()),
            phone: Some("+91 98450 12345".to_string()),
        }
    }

    fn kidney_intake() -> TransactionDraft {
        TransactionDraft::organ(Direction::In, "kidney", "A-", 1)
            .donor("donor-7")
            .contact(full_contact())
            .attachment(AttachmentKind::MedicalDocument, "blob://med/1")
            .attachment(AttachmentKind::IdentityProof, "blob://id/1")
    }

    #[test]
    fn test_valid_blood_intake() {
        let draft = TransactionDraft::blood(Direction::In, "O+", 500).donor("donor-1");
        let validated = validate_draft(draft).unwrap();
        assert_eq!(validated.key, StockKey::blood(BloodGroup::OPos));
        assert_eq!(validated.counterparty, Counterparty::Donor("donor-1".to_string()));
        assert_eq!((validated.direction, validated.quantity), (Direction::In, 500));
    }

    #[test]
    fn test_valid_organ_intake() {
        let validated = validate_draft(kidney_intake()).unwrap();
        assert_eq!(validated.key, StockKey::organ(OrganType::Kidney, BloodGroup::ANeg));
        assert_eq!(validated.attachments.len(), 2);
    }

    #[rstest]
    #[case(0)]
    #[case(-1)]
    #[case(i64::MIN)]
    fn test_non_positive_quantity(#[case] quantity: i64) {
        let draft = TransactionDraft::blood(Direction::In, "O+", quantity).donor("d");
        assert_eq!(
            validate_draft(draft),
            Err(InputError::NonPositiveQuantity(quantity))
        );
    }

    #[test]
    fn test_quantity_checked_before_catalog() {
        let draft = TransactionDraft::blood(Direction::In, "Z+", 0);
        assert_eq!(validate_draft(draft), Err(InputError::NonPositiveQuantity(0)));
    }

    #[test]
    fn test_unknown_blood_group() {
        let draft = TransactionDraft::blood(Direction::In, "C+", 10).donor("d");
        assert_eq!(
            validate_draft(draft),
            Err(InputError::UnknownBloodGroup("C+".to_string()))
        );
    }

    #[test]
    fn test_unknown_organ_type() {
        let mut draft = kidney_intake();
        draft.organ_type = Some("spleen".to_string());
        assert_eq!(
            validate_draft(draft),
            Err(InputError::UnknownOrganType("spleen".to_string()))
        );
    }

    #[test]
    fn test_organ_type_shape() {
        let mut blood = TransactionDraft::blood(Direction::In, "O+", 10).donor("d");
        blood.organ_type = Some("kidney".to_string());
        assert_eq!(validate_draft(blood), Err(InputError::OrganTypeOnBlood));

        let mut organ = kidney_intake();
        organ.organ_type = None;
        assert_eq!(validate_draft(organ), Err(InputError::MissingOrganType));
    }

    #[test]
    fn test_organ_missing_medical_document() {
        let mut draft = kidney_intake();
        draft.attachments.retain(|a| a.kind != AttachmentKind::MedicalDocument);
        assert_eq!(
            validate_draft(draft),
            Err(InputError::MissingAttachment(AttachmentKind::MedicalDocument))
        );
    }

    #[test]
    fn test_organ_blank_attachment_ref_is_missing() {
        let mut draft = kidney_intake();
        draft.attachments[1].blob_ref = "  ".to_string();
        assert_eq!(
            validate_draft(draft),
            Err(InputError::MissingAttachment(AttachmentKind::IdentityProof))
        );
    }

    #[test]
    fn test_organ_missing_contact() {
        let mut draft = kidney_intake();
        draft.contact = None;
        assert_eq!(validate_draft(draft), Err(InputError::MissingContactField("name")));
    }

    #[rstest]
    #[case::blank_name(Contact { name: Some("  ".into()), ..full_contact() }, InputError::MissingContactField("name"))]
    #[case::no_age(Contact { age: None, ..full_contact() }, InputError::MissingContactField("age"))]
    #[case::old(Contact { age: Some(131), ..full_contact() }, InputError::InvalidContactField("age"))]
    #[case::no_email(Contact { email: None, ..full_contact() }, InputError::MissingContactField("email"))]
    #[case::bad_email(Contact { email: Some("asha.example.org".into()), ..full_contact() }, InputError::InvalidContactField("email"))]
    #[case::no_domain(Contact { email: Some("asha@".into()), ..full_contact() }, InputError::InvalidContactField("email"))]
    #[case::no_phone(Contact { phone: None, ..full_contact() }, InputError::MissingContactField("phone"))]
    #[case::bad_phone(Contact { phone: Some("call me".into()), ..full_contact() }, InputError::InvalidContactField("phone"))]
    fn test_organ_contact_rules(#[case] contact: Contact, #[case] expected: InputError) {
        let draft = kidney_intake().contact(contact);
        assert_eq!(validate_draft(draft), Err(expected));
    }

    #[test]
    fn test_blood_contact_optional_but_checked() {
        let partial = Contact {
            name: Some("Ravi".to_string()),
            ..Contact::default()
        };
        let draft = TransactionDraft::blood(Direction::In, "B+", 250)
            .donor("d")
            .contact(partial);
        assert!(validate_draft(draft).is_ok());

        let bad_email = Contact {
            email: Some("nope".to_string()),
            ..Contact::default()
        };
        let draft = TransactionDraft::blood(Direction::In, "B+", 250)
            .donor("d")
            .contact(bad_email);
        assert_eq!(validate_draft(draft), Err(InputError::InvalidContactField("email")));
    }

    #[test]
    fn test_blood_rejects_attachments() {
        let draft = TransactionDraft::blood(Direction::In, "B+", 250)
            .donor("d")
            .attachment(AttachmentKind::IdentityProof, "blob://id");
        assert_eq!(validate_draft(draft), Err(InputError::AttachmentsOnBlood));
    }

    #[rstest]
    #[case(Direction::In, None, None)]
    #[case(Direction::In, None, Some("City Hospital"))]
    #[case(Direction::In, Some("d"), Some("City Hospital"))]
    #[case(Direction::Out, Some("d"), None)]
    #[case(Direction::Out, None, Some("   "))]
    #[case(Direction::Out, Some("d"), Some("City Hospital"))]
    fn test_counterparty_mismatch(
        #[case] direction: Direction,
        #[case] donor: Option<&str>,
        #[case] hospital: Option<&str>,
    ) {
        let mut draft = TransactionDraft::blood(direction, "AB+", 100);
        draft.donor_ref = donor.map(str::to_string);
        draft.hospital_ref = hospital.map(str::to_string);
        assert_eq!(
            validate_draft(draft),
            Err(InputError::CounterpartyMismatch { direction })
        );
    }

    #[test]
    fn test_hospital_free_text_name() {
        let draft = TransactionDraft::blood(Direction::Out, "AB+", 100).hospital(" St. Mary's ");
        let validated = validate_draft(draft).unwrap();
        assert_eq!(
            validated.counterparty,
            Counterparty::Hospital("St. Mary's".to_string())
        );
    }

    #[test]
    fn test_check_stock() {
        let out = validate_draft(TransactionDraft::blood(Direction::Out, "O+", 600).hospital("h"))
            .unwrap();
        let err = check_stock(&out, 500).unwrap_err();
        assert_eq!(err.available(), Some(500));
        assert!(check_stock(&out, 600).is_ok());

        let intake =
            validate_draft(TransactionDraft::blood(Direction::In, "O+", 600).donor("d")).unwrap();
        assert!(check_stock(&intake, 0).is_ok());
    }

    #[test]
    fn test_into_new_truncates_to_micros() {
        let validated =
            validate_draft(TransactionDraft::blood(Direction::In, "O+", 1).donor("d")).unwrap();
        let at = DateTime::from_timestamp(1_700_000_000, 123_456_789).unwrap();
        let new = validated.into_new(ActorId::new("org-1"), at);
        assert_eq!(new.created_at.timestamp_subsec_nanos(), 123_456_000);
        assert_eq!(new.recorded_by.as_str(), "org-1");
    }
}
