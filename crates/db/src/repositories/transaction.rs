//! Durable transaction store backed by `SeaORM`.
//!
//! Rows are only ever inserted. A transaction and its attachment rows are
//! written in one database transaction, so a reader never sees a
//! transaction without its documents.

use std::collections::HashMap;
use std::sync::atomic::{AtomicI64, Ordering};

use chrono::Utc;
use lifeline_core::ledger::{
    AttachmentKind, AttachmentRef, BloodGroup, Contact, Counterparty, Direction, HistoryQuery,
    LedgerError, LedgerResult, NewTransaction, OrganType, ResourceKind, StockKey, Transaction,
    TransactionStore,
};
use lifeline_shared::types::{ActorId, CursorPage, CursorRequest, TransactionId};
use sea_orm::{
    ActiveValue::Set, ColumnTrait, Condition, DatabaseConnection, DbErr, EntityTrait,
    QueryFilter, QueryOrder, QuerySelect, RuntimeErr, TransactionTrait, sqlx,
};
use tracing::{debug, error, info};
use uuid::Uuid;

use crate::entities::{ledger_attachments, ledger_transactions};

/// A stored row that no longer maps onto the domain model.
#[derive(Debug, thiserror::Error)]
pub enum RowError {
    /// A catalog column holds a value outside its catalog.
    #[error("transaction {id}: unknown {column} '{value}'")]
    UnknownValue {
        /// Transaction id.
        id: Uuid,
        /// Offending column.
        column: &'static str,
        /// Stored value.
        value: String,
    },

    /// Neither or both counterparty columns are set.
    #[error("transaction {0}: expected exactly one of donor_ref and hospital_ref")]
    Counterparty(Uuid),

    /// The contact document cannot be decoded.
    #[error("transaction {id}: unreadable contact: {source}")]
    Contact {
        /// Transaction id.
        id: Uuid,
        /// Decoding error.
        #[source]
        source: serde_json::Error,
    },
}

impl From<RowError> for LedgerError {
    fn from(err: RowError) -> Self {
        error!(error = %err, "corrupt ledger row");
        Self::Internal(err.to_string())
    }
}

/// Maps a database error onto the ledger taxonomy. Connection problems are
/// retryable, including a connection lost or timed out mid-query; anything
/// else is an internal fault.
fn store_error(err: DbErr) -> LedgerError {
    let unavailable = match &err {
        DbErr::Conn(_) | DbErr::ConnectionAcquire(_) => true,
        DbErr::Query(RuntimeErr::SqlxError(inner)) | DbErr::Exec(RuntimeErr::SqlxError(inner)) => {
            connection_lost(inner)
        }
        _ => false,
    };
    if unavailable {
        LedgerError::StoreUnavailable(err.to_string())
    } else {
        LedgerError::Internal(err.to_string())
    }
}

fn connection_lost(err: &sqlx::Error) -> bool {
    matches!(
        err,
        sqlx::Error::Io(_)
            | sqlx::Error::PoolTimedOut
            | sqlx::Error::PoolClosed
            | sqlx::Error::WorkerCrashed
    )
}

/// `TransactionStore` over a `SeaORM` connection pool.
///
/// Sequence numbers are handed out by this process, starting after the
/// highest stored one, so a database has a single writing process.
#[derive(Debug)]
pub struct SeaOrmTransactionStore {
    db: DatabaseConnection,
    last_sequence: AtomicI64,
}

impl SeaOrmTransactionStore {
    /// Opens the store, resuming the sequence after the highest stored one.
    ///
    /// # Errors
    ///
    /// Returns `StoreUnavailable` if the database cannot be reached.
    pub async fn open(db: DatabaseConnection) -> LedgerResult<Self> {
        let last = ledger_transactions::Entity::find()
            .order_by_desc(ledger_transactions::Column::Sequence)
            .one(&db)
            .await
            .map_err(store_error)?
            .map_or(0, |row| row.sequence);
        info!(last_sequence = last, "transaction store opened");
        Ok(Self {
            db,
            last_sequence: AtomicI64::new(last),
        })
    }

    /// Loads attachments for `rows` and converts them, keeping row order.
    async fn hydrate(&self, rows: Vec<ledger_transactions::Model>) -> LedgerResult<Vec<Transaction>> {
        if rows.is_empty() {
            return Ok(Vec::new());
        }

        let ids: Vec<Uuid> = rows.iter().map(|row| row.id).collect();
        let attachment_rows = ledger_attachments::Entity::find()
            .filter(ledger_attachments::Column::TransactionId.is_in(ids))
            .order_by_asc(ledger_attachments::Column::TransactionId)
            .order_by_asc(ledger_attachments::Column::Position)
            .all(&self.db)
            .await
            .map_err(store_error)?;

        let mut attachments: HashMap<Uuid, Vec<AttachmentRef>> = HashMap::new();
        for row in attachment_rows {
            let kind = AttachmentKind::parse(&row.kind).ok_or_else(|| RowError::UnknownValue {
                id: row.transaction_id,
                column: "attachment kind",
                value: row.kind.clone(),
            })?;
            attachments
                .entry(row.transaction_id)
                .or_default()
                .push(AttachmentRef::new(kind, row.blob_ref));
        }

        rows.into_iter()
            .map(|row| {
                let documents = attachments.remove(&row.id).unwrap_or_default();
                into_transaction(row, documents).map_err(LedgerError::from)
            })
            .collect()
    }
}

impl TransactionStore for SeaOrmTransactionStore {
    async fn append(&self, tx: NewTransaction) -> LedgerResult<Transaction> {
        let sequence = self.last_sequence.fetch_add(1, Ordering::SeqCst) + 1;
        let row = transaction_row(&tx, sequence)?;
        let documents: Vec<ledger_attachments::ActiveModel> = (0_i32..)
            .zip(&tx.attachments)
            .map(|(position, attachment)| ledger_attachments::ActiveModel {
                transaction_id: Set(tx.id.into_inner()),
                position: Set(position),
                kind: Set(attachment.kind.as_str().to_string()),
                blob_ref: Set(attachment.blob_ref.clone()),
            })
            .collect();

        let txn = self.db.begin().await.map_err(store_error)?;
        ledger_transactions::Entity::insert(row)
            .exec_without_returning(&txn)
            .await
            .map_err(store_error)?;
        if !documents.is_empty() {
            ledger_attachments::Entity::insert_many(documents)
                .exec_without_returning(&txn)
                .await
                .map_err(store_error)?;
        }
        txn.commit().await.map_err(store_error)?;

        debug!(id = %tx.id, sequence, "transaction appended");
        Ok(Transaction::from_new(tx, sequence))
    }

    async fn get(&self, id: TransactionId) -> LedgerResult<Transaction> {
        let row = ledger_transactions::Entity::find_by_id(id.into_inner())
            .one(&self.db)
            .await
            .map_err(store_error)?
            .ok_or(LedgerError::TransactionNotFound(id))?;
        let mut found = self.hydrate(vec![row]).await?;
        found.pop().ok_or(LedgerError::TransactionNotFound(id))
    }

    async fn list(
        &self,
        query: &HistoryQuery,
        page: CursorRequest,
    ) -> LedgerResult<CursorPage<Transaction>> {
        let mut select = ledger_transactions::Entity::find().filter(history_condition(query));
        if let Some(after) = page.after {
            select = select.filter(ledger_transactions::Column::Sequence.gt(after));
        }
        let rows = select
            .order_by_asc(ledger_transactions::Column::Sequence)
            .limit(page.limit() + 1)
            .all(&self.db)
            .await
            .map_err(store_error)?;

        let items = self.hydrate(rows).await?;
        Ok(CursorPage::from_lookahead(items, page.limit, |tx| tx.sequence))
    }

    async fn recent(&self, kind: ResourceKind, limit: usize) -> LedgerResult<Vec<Transaction>> {
        if limit == 0 {
            return Ok(Vec::new());
        }
        let rows = ledger_transactions::Entity::find()
            .filter(ledger_transactions::Column::ResourceKind.eq(kind.as_str()))
            .order_by_desc(ledger_transactions::Column::CreatedAt)
            .order_by_desc(ledger_transactions::Column::Id)
            .limit(u64::try_from(limit).unwrap_or(u64::MAX))
            .all(&self.db)
            .await
            .map_err(store_error)?;
        self.hydrate(rows).await
    }

    async fn corrections_of(&self, id: TransactionId) -> LedgerResult<Vec<Transaction>> {
        let rows = ledger_transactions::Entity::find()
            .filter(ledger_transactions::Column::CorrectsId.eq(id.into_inner()))
            .order_by_asc(ledger_transactions::Column::Sequence)
            .all(&self.db)
            .await
            .map_err(store_error)?;
        self.hydrate(rows).await
    }
}

fn history_condition(query: &HistoryQuery) -> Condition {
    use ledger_transactions::Column;

    let mut condition = Condition::all();
    if let Some(kind) = query.kind {
        condition = condition.add(Column::ResourceKind.eq(kind.as_str()));
    }
    if let Some(group) = query.blood_group {
        condition = condition.add(Column::BloodGroup.eq(group.code()));
    }
    if let Some(organ) = query.organ_type {
        condition = condition.add(Column::OrganType.eq(organ.as_str()));
    }
    if let Some(direction) = query.direction {
        condition = condition.add(Column::Direction.eq(direction.as_str()));
    }
    if let Some(actor) = &query.recorded_by {
        condition = condition.add(Column::RecordedBy.eq(actor.as_str()));
    }
    if let Some(donor) = &query.donor_ref {
        condition = condition.add(Column::DonorRef.eq(donor.as_str()));
    }
    if let Some(hospital) = &query.hospital_ref {
        condition = condition.add(Column::HospitalRef.eq(hospital.as_str()));
    }
    if let Some(from) = query.created_from {
        condition = condition.add(Column::CreatedAt.gte(from.fixed_offset()));
    }
    if let Some(until) = query.created_until {
        condition = condition.add(Column::CreatedAt.lt(until.fixed_offset()));
    }
    condition
}

fn transaction_row(
    tx: &NewTransaction,
    sequence: i64,
) -> LedgerResult<ledger_transactions::ActiveModel> {
    let contact = tx
        .contact
        .as_ref()
        .map(serde_json::to_value)
        .transpose()
        .map_err(|err| LedgerError::Internal(format!("contact of {}: {err}", tx.id)))?;
    let created_at = tx.created_at.fixed_offset();

    Ok(ledger_transactions::ActiveModel {
        id: Set(tx.id.into_inner()),
        sequence: Set(sequence),
        resource_kind: Set(tx.key.kind().as_str().to_string()),
        blood_group: Set(tx.key.blood_group().code().to_string()),
        organ_type: Set(tx.key.organ_type().map(|organ| organ.as_str().to_string())),
        direction: Set(tx.direction.as_str().to_string()),
        quantity: Set(tx.quantity),
        donor_ref: Set(tx.counterparty.donor_ref().map(str::to_string)),
        hospital_ref: Set(tx.counterparty.hospital_ref().map(str::to_string)),
        contact: Set(contact),
        recorded_by: Set(tx.recorded_by.as_str().to_string()),
        corrects_id: Set(tx.corrects_id.map(TransactionId::into_inner)),
        created_at: Set(created_at),
        updated_at: Set(created_at),
    })
}

fn into_transaction(
    row: ledger_transactions::Model,
    attachments: Vec<AttachmentRef>,
) -> Result<Transaction, RowError> {
    let id = row.id;
    let unknown = |column: &'static str, value: &str| RowError::UnknownValue {
        id,
        column,
        value: value.to_string(),
    };

    let kind = ResourceKind::parse(&row.resource_kind)
        .ok_or_else(|| unknown("resource_kind", &row.resource_kind))?;
    let blood_group =
        BloodGroup::parse(&row.blood_group).ok_or_else(|| unknown("blood_group", &row.blood_group))?;
    let key = match (kind, row.organ_type.as_deref()) {
        (ResourceKind::Blood, None) => StockKey::blood(blood_group),
        (ResourceKind::Organ, Some(organ)) => StockKey::organ(
            OrganType::parse(organ).ok_or_else(|| unknown("organ_type", organ))?,
            blood_group,
        ),
        (_, organ) => return Err(unknown("organ_type", organ.unwrap_or("NULL"))),
    };
    let direction =
        Direction::parse(&row.direction).ok_or_else(|| unknown("direction", &row.direction))?;
    let counterparty = match (row.donor_ref, row.hospital_ref) {
        (Some(donor), None) => Counterparty::Donor(donor),
        (None, Some(hospital)) => Counterparty::Hospital(hospital),
        _ => return Err(RowError::Counterparty(id)),
    };
    let contact = row
        .contact
        .map(serde_json::from_value::<Contact>)
        .transpose()
        .map_err(|source| RowError::Contact { id, source })?;

    Ok(Transaction {
        id: TransactionId::from_uuid(id),
        sequence: row.sequence,
        key,
        direction,
        quantity: row.quantity,
        counterparty,
        contact,
        attachments,
        recorded_by: ActorId::new(row.recorded_by),
        corrects_id: row.corrects_id.map(TransactionId::from_uuid),
        created_at: row.created_at.with_timezone(&Utc),
        updated_at: row.updated_at.with_timezone(&Utc),
    })
}
