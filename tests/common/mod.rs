#![allow(dead_code)]

use std::sync::Arc;

use rust_decimal::Decimal;
use sea_orm::DatabaseConnection;
use tempfile::TempDir;

use stocktake_api::db;
use stocktake_api::events::ChangeFeed;
use stocktake_api::models::NormalizedRecord;
use stocktake_api::store::InventoryStore;

/// Everything a test needs to talk to a fresh, migrated store. The tempdir
/// must stay alive for the lifetime of the database file.
pub struct TestContext {
    pub store: Arc<InventoryStore>,
    pub db: Arc<DatabaseConnection>,
    _dir: TempDir,
}

pub async fn setup() -> TestContext {
    setup_with_ceiling(1000).await
}

pub async fn setup_with_ceiling(max_rows_per_request: u64) -> TestContext {
    let dir = tempfile::tempdir().expect("tempdir");
    let url = format!(
        "sqlite://{}?mode=rwc",
        dir.path().join("stocktake.db").display()
    );

    // A single connection keeps the SQLite schema view consistent: with a
    // multi-connection pool, a connection opened while migrations run can
    // prepare statements against a stale schema and miss the barcode unique
    // index, failing upserts intermittently.
    let config = db::DbConfig {
        url,
        max_connections: 1,
        min_connections: 1,
        ..Default::default()
    };
    let pool = db::establish_connection_with_config(&config)
        .await
        .expect("db connect");
    db::run_migrations(&pool).await.expect("migrations");

    let db = Arc::new(pool);
    let store = Arc::new(InventoryStore::new(
        db.clone(),
        ChangeFeed::new(64),
        max_rows_per_request,
    ));

    TestContext {
        store,
        db,
        _dir: dir,
    }
}

pub fn record(barcode: &str, name: &str) -> NormalizedRecord {
    NormalizedRecord {
        barcode: barcode.to_string(),
        item_name: name.to_string(),
        status: "OK".to_string(),
        color: "Red".to_string(),
        brand: "Acme".to_string(),
        price: Decimal::from(10_000),
        item_type: "Shoes".to_string(),
    }
}

pub fn records(count: usize) -> Vec<NormalizedRecord> {
    (0..count)
        .map(|i| record(&format!("BC-{:04}", i), &format!("Item {}", i)))
        .collect()
}
