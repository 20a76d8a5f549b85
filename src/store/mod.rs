use std::sync::Arc;

use chrono::Utc;
use metrics::counter;
use sea_orm::sea_query::{Expr, OnConflict};
use sea_orm::{
    ColumnTrait, DatabaseConnection, EntityTrait, NotSet, PaginatorTrait, QueryFilter, QueryOrder,
    QuerySelect, Select, Set, Value,
};
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;
use tracing::{debug, info, instrument, warn};

use crate::entities::inventory_record::{
    self, Column as RecordColumn, Entity as InventoryRecords, Model as InventoryRecord,
};
use crate::errors::ServiceError;
use crate::events::{ChangeEvent, ChangeFeed};
use crate::models::NormalizedRecord;

/// Scan-state filter shared by counting, paging and export.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ScanFilter {
    All,
    Scanned,
    Pending,
}

impl ScanFilter {
    fn apply(self, query: Select<InventoryRecords>) -> Select<InventoryRecords> {
        match self {
            ScanFilter::All => query,
            ScanFilter::Scanned => query.filter(RecordColumn::IsScanned.eq(true)),
            ScanFilter::Pending => query.filter(RecordColumn::IsScanned.eq(false)),
        }
    }
}

/// The only component allowed to talk to storage. Every mutation publishes a
/// coarse change notification on the feed.
#[derive(Clone)]
pub struct InventoryStore {
    db: Arc<DatabaseConnection>,
    feed: ChangeFeed,
    /// Per-request row ceiling for chunked operations; an external backend
    /// constraint, enforced here as a hard bound.
    max_rows_per_request: u64,
}

impl InventoryStore {
    pub fn new(db: Arc<DatabaseConnection>, feed: ChangeFeed, max_rows_per_request: u64) -> Self {
        Self {
            db,
            feed,
            max_rows_per_request,
        }
    }

    pub fn max_rows_per_request(&self) -> u64 {
        self.max_rows_per_request
    }

    /// Subscribes to change notifications. The payload says only that
    /// something changed; callers refetch what they need.
    pub fn subscribe(&self) -> broadcast::Receiver<ChangeEvent> {
        self.feed.subscribe()
    }

    /// Exact row count for the filter; no row data is transferred.
    #[instrument(skip(self))]
    pub async fn count(&self, filter: ScanFilter) -> Result<u64, ServiceError> {
        let db = &*self.db;
        let total = filter
            .apply(InventoryRecords::find())
            .count(db)
            .await
            .map_err(ServiceError::DatabaseError)?;
        Ok(total)
    }

    /// Point lookup by the unique business key.
    #[instrument(skip(self))]
    pub async fn get_by_barcode(
        &self,
        barcode: &str,
    ) -> Result<Option<InventoryRecord>, ServiceError> {
        let db = &*self.db;
        let record = InventoryRecords::find()
            .filter(RecordColumn::Barcode.eq(barcode))
            .one(db)
            .await
            .map_err(ServiceError::DatabaseError)?;
        Ok(record)
    }

    /// Compare-and-swap scan transition: sets `is_scanned = true` and stamps
    /// the scan time only if the stored row's `is_scanned` still equals
    /// `expected_is_scanned` at update time. Returns `None` when the
    /// precondition failed, i.e. another device won the race. Keyed on row
    /// id, not barcode.
    #[instrument(skip(self))]
    pub async fn conditional_mark_scanned(
        &self,
        id: i64,
        expected_is_scanned: bool,
    ) -> Result<Option<InventoryRecord>, ServiceError> {
        let db = &*self.db;
        let now = Utc::now();

        let result = InventoryRecords::update_many()
            .col_expr(RecordColumn::IsScanned, Expr::value(true))
            .col_expr(RecordColumn::ScanTimestamp, Expr::value(now))
            .filter(RecordColumn::Id.eq(id))
            .filter(RecordColumn::IsScanned.eq(expected_is_scanned))
            .exec(db)
            .await
            .map_err(ServiceError::DatabaseError)?;

        if result.rows_affected == 0 {
            debug!(record_id = id, "Scan precondition failed; record already scanned");
            counter!("stocktake_store.scan_conflicts", 1);
            return Ok(None);
        }

        counter!("stocktake_store.scans_committed", 1);
        self.feed.publish(ChangeEvent::RecordScanned { id });

        let updated = InventoryRecords::find_by_id(id)
            .one(db)
            .await
            .map_err(ServiceError::DatabaseError)?
            .ok_or_else(|| {
                ServiceError::InternalError(format!("record {} vanished after scan update", id))
            })?;

        Ok(Some(updated))
    }

    /// Insert-or-update a bounded batch, keyed on barcode. Only descriptive
    /// columns are overwritten on conflict: `is_scanned`, `scan_timestamp`
    /// and `created_at` survive re-imports.
    #[instrument(skip(self, records), fields(rows = records.len()))]
    pub async fn upsert_chunk(&self, records: &[NormalizedRecord]) -> Result<u64, ServiceError> {
        if records.is_empty() {
            return Ok(0);
        }
        if records.len() as u64 > self.max_rows_per_request {
            return Err(ServiceError::InvalidInput(format!(
                "chunk of {} rows exceeds the per-request ceiling of {}",
                records.len(),
                self.max_rows_per_request
            )));
        }

        let db = &*self.db;
        let now = Utc::now();
        let rows = records.len() as u64;

        let models = records.iter().map(|r| inventory_record::ActiveModel {
            id: NotSet,
            barcode: Set(r.barcode.clone()),
            item_name: Set(r.item_name.clone()),
            status: Set(r.status.clone()),
            color: Set(r.color.clone()),
            brand: Set(r.brand.clone()),
            price: Set(r.price),
            item_type: Set(r.item_type.clone()),
            is_scanned: Set(false),
            scan_timestamp: Set(None),
            created_at: Set(now),
        });

        InventoryRecords::insert_many(models)
            .on_conflict(
                OnConflict::column(RecordColumn::Barcode)
                    .update_columns([
                        RecordColumn::ItemName,
                        RecordColumn::Status,
                        RecordColumn::Color,
                        RecordColumn::Brand,
                        RecordColumn::Price,
                        RecordColumn::ItemType,
                    ])
                    .to_owned(),
            )
            .exec_without_returning(db)
            .await
            .map_err(ServiceError::DatabaseError)?;

        counter!("stocktake_store.upserted_rows", rows);
        self.feed.publish(ChangeEvent::RecordsUpserted { rows });

        Ok(rows)
    }

    /// Deterministic pagination ordered by the stable monotonic id key, so
    /// windows never skip or duplicate rows even while scan state mutates.
    #[instrument(skip(self))]
    pub async fn read_range(
        &self,
        filter: ScanFilter,
        offset: u64,
        limit: u64,
    ) -> Result<Vec<InventoryRecord>, ServiceError> {
        if limit > self.max_rows_per_request {
            return Err(ServiceError::InvalidInput(format!(
                "page of {} rows exceeds the per-request ceiling of {}",
                limit, self.max_rows_per_request
            )));
        }

        let db = &*self.db;
        let records = filter
            .apply(InventoryRecords::find())
            .order_by_asc(RecordColumn::Id)
            .offset(offset)
            .limit(limit)
            .all(db)
            .await
            .map_err(ServiceError::DatabaseError)?;
        Ok(records)
    }

    /// Bounded newest-first window for the live view, with optional
    /// barcode/name substring search.
    #[instrument(skip(self))]
    pub async fn recent(
        &self,
        search: Option<&str>,
        limit: u64,
    ) -> Result<Vec<InventoryRecord>, ServiceError> {
        let db = &*self.db;

        let mut query = InventoryRecords::find();
        if let Some(term) = search.map(str::trim).filter(|t| !t.is_empty()) {
            query = query.filter(
                RecordColumn::Barcode
                    .contains(term)
                    .or(RecordColumn::ItemName.contains(term)),
            );
        }

        let records = query
            .order_by_desc(RecordColumn::ScanTimestamp)
            .order_by_desc(RecordColumn::CreatedAt)
            .limit(limit.min(self.max_rows_per_request))
            .all(db)
            .await
            .map_err(ServiceError::DatabaseError)?;
        Ok(records)
    }

    /// Wipes the stock list.
    #[instrument(skip(self))]
    pub async fn delete_all(&self) -> Result<u64, ServiceError> {
        let db = &*self.db;
        let result = InventoryRecords::delete_many()
            .exec(db)
            .await
            .map_err(ServiceError::DatabaseError)?;

        warn!(rows = result.rows_affected, "Stock list wiped");
        self.feed.publish(ChangeEvent::Cleared {
            rows: result.rows_affected,
        });
        Ok(result.rows_affected)
    }

    /// Explicit reset-all: the only path that takes records back from
    /// scanned to pending.
    #[instrument(skip(self))]
    pub async fn reset_scans(&self) -> Result<u64, ServiceError> {
        let db = &*self.db;
        let result = InventoryRecords::update_many()
            .col_expr(RecordColumn::IsScanned, Expr::value(false))
            .col_expr(
                RecordColumn::ScanTimestamp,
                Expr::value(Value::ChronoDateTimeUtc(None)),
            )
            .filter(RecordColumn::IsScanned.eq(true))
            .exec(db)
            .await
            .map_err(ServiceError::DatabaseError)?;

        info!(rows = result.rows_affected, "Scan state reset to pending");
        self.feed.publish(ChangeEvent::ScansReset {
            rows: result.rows_affected,
        });
        Ok(result.rows_affected)
    }
}
