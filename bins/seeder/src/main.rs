//! Demo ledger seeder for Lifeline development.
//!
//! Records a small history through the ledger service, so every rule runs
//! exactly as it would for real callers, then logs the stock breakdowns.
//!
//! Usage: cargo run --bin seeder

use std::sync::Arc;

use anyhow::Context;
use lifeline_core::analytics::AnalyticsReporter;
use lifeline_core::auth::{Caller, Role};
use lifeline_core::ledger::{
    AttachmentKind, Contact, Direction, HistoryQuery, LedgerService, ResourceKind,
    TransactionDraft, TransactionStore,
};
use lifeline_db::{Migrator, SeaOrmTransactionStore};
use lifeline_shared::AppConfig;
use lifeline_shared::types::CursorRequest;
use sea_orm_migration::MigratorTrait;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Organisation the demo history is recorded as.
const SEED_ORGANISATION: &str = "seed-organisation";

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "seeder=debug,lifeline_core=debug,lifeline_db=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = AppConfig::load().context("failed to load configuration")?;

    let db = lifeline_db::connect(&config.database)
        .await
        .context("failed to connect to database")?;
    Migrator::up(&db, None).await.context("failed to run migrations")?;
    info!("Connected to database");

    let store = Arc::new(SeaOrmTransactionStore::open(db).await?);
    let existing = store
        .list(&HistoryQuery::default(), CursorRequest::first(1))
        .await?;
    let ledger = Arc::new(LedgerService::open(store, config.ledger.clone()).await?);

    if existing.data.is_empty() {
        seed_history(&ledger).await?;
    } else {
        info!("Ledger already has history, skipping seed");
    }

    let reporter = AnalyticsReporter::new(ledger, config.analytics.clone());
    for row in reporter.blood_group_breakdown().await? {
        info!(
            group = %row.blood_group,
            total_in = row.total_in,
            total_out = row.total_out,
            available = row.available,
            "blood stock"
        );
    }
    for row in reporter.organ_breakdown().await? {
        info!(organ = %row.organ_type, available = row.available, "organ stock");
    }
    let recent = reporter.recent_transactions(ResourceKind::Blood, None).await?;
    info!(count = recent.len(), "recent blood transactions");

    info!("Seeding complete");
    Ok(())
}

/// Records intakes, a dispense, an organ intake with documents and a correction.
async fn seed_history(ledger: &LedgerService<SeaOrmTransactionStore>) -> anyhow::Result<()> {
    let org = Caller::new(SEED_ORGANISATION, Role::Organisation);

    for (group, quantity, donor) in [
        ("O+", 900, "donor-ravi"),
        ("A+", 450, "donor-anita"),
        ("B-", 350, "donor-joseph"),
        ("AB+", 300, "donor-lena"),
    ] {
        ledger
            .record_transaction(
                &org,
                TransactionDraft::blood(Direction::In, group, quantity).donor(donor),
            )
            .await?;
    }

    ledger
        .record_transaction(
            &org,
            TransactionDraft::blood(Direction::Out, "O+", 400).hospital("City General Hospital"),
        )
        .await?;

    ledger
        .record_transaction(
            &org,
            TransactionDraft::organ(Direction::In, "kidney", "A-", 1)
                .donor("donor-sameer")
                .contact(Contact {
                    name: Some("Sameer Patel".to_string()),
                    age: Some(34),
                    email: Some("sameer.patel@example.org".to_string()),
                    phone: Some("+91 98765 43210".to_string()),
                })
                .attachment(AttachmentKind::MedicalDocument, "blob://seed/medical/sameer.pdf")
                .attachment(AttachmentKind::IdentityProof, "blob://seed/identity/sameer.pdf"),
        )
        .await?;

    // The AB+ intake was entered twice by mistake upstream; reverse one.
    let mistaken = ledger
        .record_transaction(
            &org,
            TransactionDraft::blood(Direction::In, "AB+", 300).donor("donor-lena"),
        )
        .await?;
    let correction = ledger.record_correction(&org, mistaken.id).await?;
    info!(original = %mistaken.id, correction = %correction.id, "seeded correction");

    Ok(())
}
