//! Creates the append-only ledger tables.

use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(LedgerTransactions::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(LedgerTransactions::Id)
                            .uuid()
                            .not_null()
                            .primary_key(),
                    )
                    .col(
                        ColumnDef::new(LedgerTransactions::Sequence)
                            .big_integer()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(LedgerTransactions::ResourceKind)
                            .string_len(8)
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(LedgerTransactions::BloodGroup)
                            .string_len(3)
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(LedgerTransactions::OrganType)
                            .string_len(16)
                            .null(),
                    )
                    .col(
                        ColumnDef::new(LedgerTransactions::Direction)
                            .string_len(3)
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(LedgerTransactions::Quantity)
                            .big_integer()
                            .not_null()
                            .check(Expr::col(LedgerTransactions::Quantity).gt(0)),
                    )
                    .col(ColumnDef::new(LedgerTransactions::DonorRef).string().null())
                    .col(
                        ColumnDef::new(LedgerTransactions::HospitalRef)
                            .string()
                            .null(),
                    )
                    .col(
                        ColumnDef::new(LedgerTransactions::Contact)
                            .json_binary()
                            .null(),
                    )
                    .col(
                        ColumnDef::new(LedgerTransactions::RecordedBy)
                            .string()
                            .not_null(),
                    )
                    .col(ColumnDef::new(LedgerTransactions::CorrectsId).uuid().null())
                    .col(
                        ColumnDef::new(LedgerTransactions::CreatedAt)
                            .timestamp_with_time_zone()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(LedgerTransactions::UpdatedAt)
                            .timestamp_with_time_zone()
                            .not_null(),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_ledger_transactions_corrects")
                            .from(LedgerTransactions::Table, LedgerTransactions::CorrectsId)
                            .to(LedgerTransactions::Table, LedgerTransactions::Id)
                            .on_delete(ForeignKeyAction::Restrict),
                    )
                    .to_owned(),
            )
            .await?;

        // Cursor order
        manager
            .create_index(
                Index::create()
                    .name("idx_ledger_transactions_sequence")
                    .table(LedgerTransactions::Table)
                    .col(LedgerTransactions::Sequence)
                    .unique()
                    .to_owned(),
            )
            .await?;

        // Per-key history and recompute scans
        manager
            .create_index(
                Index::create()
                    .name("idx_ledger_transactions_key")
                    .table(LedgerTransactions::Table)
                    .col(LedgerTransactions::ResourceKind)
                    .col(LedgerTransactions::BloodGroup)
                    .col(LedgerTransactions::OrganType)
                    .col(LedgerTransactions::Sequence)
                    .to_owned(),
            )
            .await?;

        // Recent activity
        manager
            .create_index(
                Index::create()
                    .name("idx_ledger_transactions_recent")
                    .table(LedgerTransactions::Table)
                    .col(LedgerTransactions::ResourceKind)
                    .col(LedgerTransactions::CreatedAt)
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx_ledger_transactions_corrects")
                    .table(LedgerTransactions::Table)
                    .col(LedgerTransactions::CorrectsId)
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                Table::create()
                    .table(LedgerAttachments::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(LedgerAttachments::TransactionId)
                            .uuid()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(LedgerAttachments::Position)
                            .integer()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(LedgerAttachments::Kind)
                            .string_len(32)
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(LedgerAttachments::BlobRef)
                            .string()
                            .not_null(),
                    )
                    .primary_key(
                        Index::create()
                            .col(LedgerAttachments::TransactionId)
                            .col(LedgerAttachments::Position),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_ledger_attachments_transaction")
                            .from(LedgerAttachments::Table, LedgerAttachments::TransactionId)
                            .to(LedgerTransactions::Table, LedgerTransactions::Id)
                            .on_delete(ForeignKeyAction::Restrict),
                    )
                    .to_owned(),
            )
            .await?;

        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(LedgerAttachments::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(LedgerTransactions::Table).to_owned())
            .await
    }
}

#[derive(DeriveIden)]
enum LedgerTransactions {
    Table,
    Id,
    Sequence,
    ResourceKind,
    BloodGroup,
    OrganType,
    Direction,
    Quantity,
    DonorRef,
    HospitalRef,
    Contact,
    RecordedBy,
    CorrectsId,
    CreatedAt,
    UpdatedAt,
}

#[derive(DeriveIden)]
enum LedgerAttachments {
    Table,
    TransactionId,
    Position,
    Kind,
    BlobRef,
}
