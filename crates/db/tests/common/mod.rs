//! Shared fixtures for db integration tests.

#![allow(dead_code)]

use std::path::PathBuf;

use lifeline_core::ledger::{AttachmentKind, Contact, Direction, TransactionDraft};
use lifeline_db::Migrator;
use lifeline_db::migration::MigratorTrait;
use lifeline_shared::DatabaseConfig;
use sea_orm::DatabaseConnection;
use uuid::Uuid;

/// Connects to a fresh in-memory SQLite database with the schema applied.
///
/// A single connection keeps every query on the same in-memory database.
pub async fn memory_db() -> DatabaseConnection {
    connect("sqlite::memory:".to_string(), 1).await
}

/// Connects to a fresh SQLite file under `target/test_dbs`.
pub async fn file_db(max_connections: u32) -> (DatabaseConnection, PathBuf) {
    let dir = PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("../../target/test_dbs");
    std::fs::create_dir_all(&dir).unwrap();
    let path = dir.join(format!("ledger-{}.db", Uuid::new_v4()));
    let db = connect(format!("sqlite:{}?mode=rwc", path.display()), max_connections).await;
    (db, path)
}

async fn connect(url: String, max_connections: u32) -> DatabaseConnection {
    let config = DatabaseConfig {
        url,
        max_connections,
        min_connections: 1,
        connect_timeout_secs: 5,
    };
    let db = lifeline_db::connect(&config).await.unwrap();
    Migrator::up(&db, None).await.unwrap();
    db
}

pub fn blood_in(group: &str, quantity: i64) -> TransactionDraft {
    TransactionDraft::blood(Direction::In, group, quantity).donor("donor-1")
}

pub fn blood_out(group: &str, quantity: i64) -> TransactionDraft {
    TransactionDraft::blood(Direction::Out, group, quantity).hospital("hospital-1")
}

pub fn organ(direction: Direction, organ_type: &str, group: &str) -> TransactionDraft {
    let draft = TransactionDraft::organ(direction, organ_type, group, 1)
        .contact(Contact {
            name: Some("Farah Khan".to_string()),
            age: Some(36),
            email: Some("farah@example.org".to_string()),
            phone: Some("+91 22 5550 1000".to_string()),
        })
        .attachment(AttachmentKind::MedicalDocument, "blob://medical/7")
        .attachment(AttachmentKind::IdentityProof, "blob://identity/7");
    match direction {
        Direction::In => draft.donor("donor-7"),
        Direction::Out => draft.hospital("hospital-7"),
    }
}
