//! Inventory ledger domain types.
//!
//! This module defines the resource catalogs, the stock key, the draft a
//! caller submits and the immutable transaction the ledger stores.

use std::fmt;

use chrono::{DateTime, Utc};
use lifeline_shared::types::{ActorId, TransactionId};
use serde::{Deserialize, Serialize};

/// Resource family tracked by the ledger.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ResourceKind {
    /// Blood units, measured in milliliters.
    Blood,
    /// Organs, measured in unit count.
    Organ,
}

impl ResourceKind {
    /// Convert to database string value.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Blood => "blood",
            Self::Organ => "organ",
        }
    }

    /// Parse from database string value.
    #[must_use]
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "blood" => Some(Self::Blood),
            "organ" => Some(Self::Organ),
            _ => None,
        }
    }
}

impl fmt::Display for ResourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Movement direction of a transaction.
///
/// - `In`: intake from a donor, increases available stock
/// - `Out`: dispense to a hospital, decreases available stock
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
    /// Intake.
    In,
    /// Dispense.
    Out,
}

impl Direction {
    /// Returns the opposite direction.
    #[must_use]
    pub const fn opposite(self) -> Self {
        match self {
            Self::In => Self::Out,
            Self::Out => Self::In,
        }
    }

    /// Convert to database string value.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::In => "in",
            Self::Out => "out",
        }
    }

    /// Parse from database string value.
    #[must_use]
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "in" => Some(Self::In),
            "out" => Some(Self::Out),
            _ => None,
        }
    }
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The eight canonical ABO/Rh blood groups.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum BloodGroup {
    /// A positive.
    #[serde(rename = "A+")]
    APos,
    /// A negative.
    #[serde(rename = "A-")]
    ANeg,
    /// B positive.
    #[serde(rename = "B+")]
    BPos,
    /// B negative.
    #[serde(rename = "B-")]
    BNeg,
    /// AB positive.
    #[serde(rename = "AB+")]
    AbPos,
    /// AB negative.
    #[serde(rename = "AB-")]
    AbNeg,
    /// O positive.
    #[serde(rename = "O+")]
    OPos,
    /// O negative.
    #[serde(rename = "O-")]
    ONeg,
}

impl BloodGroup {
    /// All groups in canonical report order.
    pub const ALL: [Self; 8] = [
        Self::APos,
        Self::ANeg,
        Self::BPos,
        Self::BNeg,
        Self::AbPos,
        Self::AbNeg,
        Self::OPos,
        Self::ONeg,
    ];

    /// Returns the group code, e.g. `AB-`.
    #[must_use]
    pub const fn code(&self) -> &'static str {
        match self {
            Self::APos => "A+",
            Self::ANeg => "A-",
            Self::BPos => "B+",
            Self::BNeg => "B-",
            Self::AbPos => "AB+",
            Self::AbNeg => "AB-",
            Self::OPos => "O+",
            Self::ONeg => "O-",
        }
    }

    /// Parses a group code. Surrounding whitespace and letter case are ignored.
    #[must_use]
    pub fn parse(s: &str) -> Option<Self> {
        let code = s.trim().to_ascii_uppercase();
        Self::ALL.into_iter().find(|group| group.code() == code)
    }
}

impl fmt::Display for BloodGroup {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.code())
    }
}

/// Organ catalog.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OrganType {
    /// Heart.
    Heart,
    /// Liver.
    Liver,
    /// Kidney.
    Kidney,
    /// Lung.
    Lung,
    /// Pancreas.
    Pancreas,
    /// Intestine.
    Intestine,
    /// Cornea.
    Cornea,
    /// Skin.
    Skin,
}

impl OrganType {
    /// All organ types in catalog order.
    pub const ALL: [Self; 8] = [
        Self::Heart,
        Self::Liver,
        Self::Kidney,
        Self::Lung,
        Self::Pancreas,
        Self::Intestine,
        Self::Cornea,
        Self::Skin,
    ];

    /// Convert to database string value.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Heart => "heart",
            Self::Liver => "liver",
            Self::Kidney => "kidney",
            Self::Lung => "lung",
            Self::Pancreas => "pancreas",
            Self::Intestine => "intestine",
            Self::Cornea => "cornea",
            Self::Skin => "skin",
        }
    }

    /// Parses an organ name, ignoring surrounding whitespace and case.
    #[must_use]
    pub fn parse(s: &str) -> Option<Self> {
        let name = s.trim().to_ascii_lowercase();
        Self::ALL.into_iter().find(|organ| organ.as_str() == name)
    }
}

impl fmt::Display for OrganType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Identifies one stock pool: `(kind, blood group[, organ type])`.
///
/// The organ type is present exactly when the kind is `Organ`; the
/// constructors are the only way to build a key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
pub struct StockKey {
    kind: ResourceKind,
    organ_type: Option<OrganType>,
    blood_group: BloodGroup,
}

impl StockKey {
    /// Key for a blood pool.
    #[must_use]
    pub const fn blood(blood_group: BloodGroup) -> Self {
        Self {
            kind: ResourceKind::Blood,
            organ_type: None,
            blood_group,
        }
    }

    /// Key for an organ pool.
    #[must_use]
    pub const fn organ(organ_type: OrganType, blood_group: BloodGroup) -> Self {
        Self {
            kind: ResourceKind::Organ,
            organ_type: Some(organ_type),
            blood_group,
        }
    }

    /// The resource family.
    #[must_use]
    pub const fn kind(&self) -> ResourceKind {
        self.kind
    }

    /// The blood group.
    #[must_use]
    pub const fn blood_group(&self) -> BloodGroup {
        self.blood_group
    }

    /// The organ type, `None` for blood.
    #[must_use]
    pub const fn organ_type(&self) -> Option<OrganType> {
        self.organ_type
    }
}

impl fmt::Display for StockKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.organ_type {
            Some(organ) => write!(f, "{}/{}/{}", self.kind, organ, self.blood_group),
            None => write!(f, "{}/{}", self.kind, self.blood_group),
        }
    }
}

/// Descriptive donor/recipient details.
///
/// Optional for blood, every field required for organs.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Contact {
    /// Full name of the donor or recipient.
    pub name: Option<String>,
    /// Age in years.
    pub age: Option<u32>,
    /// Email address.
    pub email: Option<String>,
    /// Phone number.
    pub phone: Option<String>,
}

/// Kind of an attached document.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AttachmentKind {
    /// Medical report for the organ.
    MedicalDocument,
    /// Identity proof of the donor or recipient.
    IdentityProof,
}

impl AttachmentKind {
    /// Convert to database string value.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::MedicalDocument => "medical_document",
            Self::IdentityProof => "identity_proof",
        }
    }

    /// Parse from database string value.
    #[must_use]
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "medical_document" => Some(Self::MedicalDocument),
            "identity_proof" => Some(Self::IdentityProof),
            _ => None,
        }
    }
}

impl fmt::Display for AttachmentKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Opaque reference to a document already uploaded to the blob store.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AttachmentRef {
    /// What the document is.
    pub kind: AttachmentKind,
    /// Reference returned by the blob store.
    pub blob_ref: String,
}

impl AttachmentRef {
    /// Creates a new attachment reference.
    #[must_use]
    pub fn new(kind: AttachmentKind, blob_ref: impl Into<String>) -> Self {
        Self {
            kind,
            blob_ref: blob_ref.into(),
        }
    }
}

/// Who is on the other side of a movement.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "role", content = "reference", rename_all = "lowercase")]
pub enum Counterparty {
    /// Source of an intake.
    Donor(String),
    /// Receiver of a dispense: an identifier or a free-text hospital name.
    Hospital(String),
}

impl Counterparty {
    /// Donor reference, if this is a donor.
    #[must_use]
    pub fn donor_ref(&self) -> Option<&str> {
        match self {
            Self::Donor(reference) => Some(reference),
            Self::Hospital(_) => None,
        }
    }

    /// Hospital reference, if this is a hospital.
    #[must_use]
    pub fn hospital_ref(&self) -> Option<&str> {
        match self {
            Self::Donor(_) => None,
            Self::Hospital(reference) => Some(reference),
        }
    }
}

/// Caller-submitted, not-yet-validated transaction payload.
///
/// Subtypes are plain strings so that catalog membership is checked by
/// validation rather than by deserialization.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransactionDraft {
    /// Resource family.
    pub resource_kind: ResourceKind,
    /// Blood group code.
    pub blood_group: String,
    /// Organ type, organs only.
    #[serde(default)]
    pub organ_type: Option<String>,
    /// Intake or dispense.
    pub direction: Direction,
    /// Milliliters for blood, unit count for organs. Must be positive.
    pub quantity: i64,
    /// Donor reference, intake only.
    #[serde(default)]
    pub donor_ref: Option<String>,
    /// Hospital reference or name, dispense only.
    #[serde(default)]
    pub hospital_ref: Option<String>,
    /// Donor or recipient details.
    #[serde(default)]
    pub contact: Option<Contact>,
    /// Blob references for attached documents.
    #[serde(default)]
    pub attachments: Vec<AttachmentRef>,
    /// Transaction this entry compensates.
    #[serde(default)]
    pub corrects_id: Option<TransactionId>,
}

impl TransactionDraft {
    /// Starts a blood draft.
    #[must_use]
    pub fn blood(direction: Direction, blood_group: &str, quantity: i64) -> Self {
        Self {
            resource_kind: ResourceKind::Blood,
            blood_group: blood_group.to_string(),
            organ_type: None,
            direction,
            quantity,
            donor_ref: None,
            hospital_ref: None,
            contact: None,
            attachments: Vec::new(),
            corrects_id: None,
        }
    }

    /// Starts an organ draft.
    #[must_use]
    pub fn organ(direction: Direction, organ_type: &str, blood_group: &str, quantity: i64) -> Self {
        Self {
            resource_kind: ResourceKind::Organ,
            organ_type: Some(organ_type.to_string()),
            ..Self::blood(direction, blood_group, quantity)
        }
    }

    /// Sets the donor reference.
    #[must_use]
    pub fn donor(mut self, donor_ref: impl Into<String>) -> Self {
        self.donor_ref = Some(donor_ref.into());
        self
    }

    /// Sets the hospital reference.
    #[must_use]
    pub fn hospital(mut self, hospital_ref: impl Into<String>) -> Self {
        self.hospital_ref = Some(hospital_ref.into());
        self
    }

    /// Sets the contact details.
    #[must_use]
    pub fn contact(mut self, contact: Contact) -> Self {
        self.contact = Some(contact);
        self
    }

    /// Adds an attachment reference.
    #[must_use]
    pub fn attachment(mut self, kind: AttachmentKind, blob_ref: impl Into<String>) -> Self {
        self.attachments.push(AttachmentRef::new(kind, blob_ref));
        self
    }

    /// Marks the draft as a compensating entry for `original`.
    #[must_use]
    pub fn correcting(mut self, original: TransactionId) -> Self {
        self.corrects_id = Some(original);
        self
    }
}

/// A validated transaction handed to the store for appending.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewTransaction {
    /// Pre-assigned identifier.
    pub id: TransactionId,
    /// Stock pool.
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
    /// Actor that submitted the transaction.
    pub recorded_by: ActorId,
    /// Transaction this entry compensates.
    pub corrects_id: Option<TransactionId>,
    /// Acceptance time, microsecond precision.
    pub created_at: DateTime<Utc>,
}

/// An accepted, immutable ledger entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Transaction {
    /// Unique identifier, never reused.
    pub id: TransactionId,
    /// Store-assigned insertion order.
    pub sequence: i64,
    /// Stock pool.
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
    /// Actor that submitted the transaction.
    pub recorded_by: ActorId,
    /// Transaction this entry compensates.
    pub corrects_id: Option<TransactionId>,
    /// Acceptance time.
    pub created_at: DateTime<Utc>,
    /// Always equal to `created_at`; entries are never updated in place.
    pub updated_at: DateTime<Utc>,
}

impl Transaction {
    /// Materialises a stored transaction from an appended one.
    #[must_use]
    pub fn from_new(new: NewTransaction, sequence: i64) -> Self {
        Self {
            id: new.id,
            sequence,
            key: new.key,
            direction: new.direction,
            quantity: new.quantity,
            counterparty: new.counterparty,
            contact: new.contact,
            attachments: new.attachments,
            recorded_by: new.recorded_by,
            corrects_id: new.corrects_id,
            created_at: new.created_at,
            updated_at: new.created_at,
        }
    }
}

/// A transaction together with the compensating entries that reference it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TransactionDetail {
    /// The transaction itself.
    pub transaction: Transaction,
    /// Compensating entries, oldest first.
    pub corrections: Vec<Transaction>,
    /// When the latest compensating entry was accepted.
    pub last_corrected_at: Option<DateTime<Utc>>,
}

impl TransactionDetail {
    /// Combines a transaction with its corrections.
    #[must_use]
    pub fn new(transaction: Transaction, corrections: Vec<Transaction>) -> Self {
        let last_corrected_at = corrections.iter().map(|c| c.created_at).max();
        Self {
            transaction,
            corrections,
            last_corrected_at,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case("A+", BloodGroup::APos)]
    #[case("a-", BloodGroup::ANeg)]
    #[case(" B+ ", BloodGroup::BPos)]
    #[case("B-", BloodGroup::BNeg)]
    #[case("ab+", BloodGroup::AbPos)]
    #[case("AB-", BloodGroup::AbNeg)]
    #[case("O+", BloodGroup::OPos)]
    #[case("o-", BloodGroup::ONeg)]
    fn test_blood_group_parse(#[case] raw: &str, #[case] expected: BloodGroup) {
        assert_eq!(BloodGroup::parse(raw), Some(expected));
    }

    #[rstest]
    #[case("")]
    #[case("C+")]
    #[case("A")]
    #[case("O+ve")]
    #[case("AB")]
    fn test_blood_group_parse_rejects(#[case] raw: &str) {
        assert_eq!(BloodGroup::parse(raw), None);
    }

    #[rstest]
    #[case("Kidney", OrganType::Kidney)]
    #[case("heart", OrganType::Heart)]
    #[case(" LIVER ", OrganType::Liver)]
    #[case("Cornea", OrganType::Cornea)]
    #[case("skin", OrganType::Skin)]
    fn test_organ_type_parse(#[case] raw: &str, #[case] expected: OrganType) {
        assert_eq!(OrganType::parse(raw), Some(expected));
    }

    #[test]
    fn test_organ_type_parse_rejects_unknown() {
        assert_eq!(OrganType::parse("spleen"), None);
        assert_eq!(OrganType::parse(""), None);
    }

    #[test]
    fn test_catalog_sizes() {
        assert_eq!(BloodGroup::ALL.len(), 8);
        assert_eq!(OrganType::ALL.len(), 8);
    }

    #[test]
    fn test_stock_key_display() {
        assert_eq!(StockKey::blood(BloodGroup::OPos).to_string(), "blood/O+");
        assert_eq!(
            StockKey::organ(OrganType::Kidney, BloodGroup::ANeg).to_string(),
            "organ/kidney/A-"
        );
    }

    #[test]
    fn test_stock_key_shape() {
        let blood = StockKey::blood(BloodGroup::AbNeg);
        assert_eq!(blood.kind(), ResourceKind::Blood);
        assert_eq!(blood.organ_type(), None);

        let organ = StockKey::organ(OrganType::Lung, BloodGroup::OPos);
        assert_eq!(organ.kind(), ResourceKind::Organ);
        assert_eq!(organ.organ_type(), Some(OrganType::Lung));
        assert_ne!(blood, organ);
    }

    #[test]
    fn test_direction_opposite() {
        assert_eq!(Direction::In.opposite(), Direction::Out);
        assert_eq!(Direction::Out.opposite(), Direction::In);
    }

    #[test]
    fn test_db_string_roundtrips() {
        for kind in [ResourceKind::Blood, ResourceKind::Organ] {
            assert_eq!(ResourceKind::parse(kind.as_str()), Some(kind));
        }
        for direction in [Direction::In, Direction::Out] {
            assert_eq!(Direction::parse(direction.as_str()), Some(direction));
        }
        for kind in [AttachmentKind::MedicalDocument, AttachmentKind::IdentityProof] {
            assert_eq!(AttachmentKind::parse(kind.as_str()), Some(kind));
        }
        assert_eq!(ResourceKind::parse("plasma"), None);
    }

    #[test]
    fn test_blood_group_serde_uses_code() {
        let json = serde_json::to_string(&BloodGroup::AbNeg).unwrap();
        assert_eq!(json, "\"AB-\"");
    }

    #[test]
    fn test_counterparty_refs() {
        let donor = Counterparty::Donor("donor-1".to_string());
        assert_eq!(donor.donor_ref(), Some("donor-1"));
        assert_eq!(donor.hospital_ref(), None);

        let hospital = Counterparty::Hospital("City Hospital".to_string());
        assert_eq!(hospital.hospital_ref(), Some("City Hospital"));
        assert_eq!(hospital.donor_ref(), None);
    }

    #[test]
    fn test_organ_draft_builder() {
        let draft = TransactionDraft::organ(Direction::In, "Kidney", "A-", 1)
            .donor("donor-1")
            .attachment(AttachmentKind::MedicalDocument, "blob://med");
        assert_eq!(draft.resource_kind, ResourceKind::Organ);
        assert_eq!(draft.organ_type.as_deref(), Some("Kidney"));
        assert_eq!(draft.donor_ref.as_deref(), Some("donor-1"));
        assert_eq!(draft.attachments.len(), 1);
    }
}
