//! `SeaORM` Entity for ledger_transactions table.

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Eq, Serialize, Deserialize)]
#[sea_orm(table_name = "ledger_transactions")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,
    #[sea_orm(unique)]
    pub sequence: i64,
    pub resource_kind: String,
    pub blood_group: String,
    pub organ_type: Option<String>,
    pub direction: String,
    pub quantity: i64,
    pub donor_ref: Option<String>,
    pub hospital_ref: Option<String>,
    #[sea_orm(column_type = "JsonBinary", nullable)]
    pub contact: Option<Json>,
    pub recorded_by: String,
    pub corrects_id: Option<Uuid>,
    pub created_at: DateTimeWithTimeZone,
    pub updated_at: DateTimeWithTimeZone,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(has_many = "super::ledger_attachments::Entity")]
    LedgerAttachments,
}

impl Related<super::ledger_attachments::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::LedgerAttachments.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
