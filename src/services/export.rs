//! Bulk export pipeline: pages through the store until exhaustion, then
//! serializes to delimited text.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use tracing::{info, instrument};

use crate::entities::inventory_record::Model as InventoryRecord;
use crate::errors::ServiceError;
use crate::store::{InventoryStore, ScanFilter};

/// Byte-order mark so spreadsheet applications pick up the UTF-8 encoding.
const UTF8_BOM: [u8; 3] = [0xEF, 0xBB, 0xBF];

const CSV_HEADER: [&str; 11] = [
    "Barcode",
    "Item Name",
    "Status",
    "Color",
    "Brand",
    "Price",
    "Type",
    "Is Scanned",
    "Scan Time",
    "Scan Date",
    "Scan Time (ISO)",
];

pub struct BulkExporter {
    store: Arc<InventoryStore>,
    page_size: u64,
}

impl BulkExporter {
    pub fn new(store: Arc<InventoryStore>, page_size: u64) -> Self {
        let page_size = page_size.clamp(1, store.max_rows_per_request());
        Self { store, page_size }
    }

    /// Fetches every matching row in id order. The upfront count only feeds
    /// the progress denominator; exhaustion is detected by a short page, so
    /// writes landing mid-export cannot truncate the result (the count being
    /// stale for progress purposes is an accepted staleness window).
    ///
    /// `on_progress` receives `(rows_so_far, total_known)` after every page,
    /// cumulative and non-decreasing.
    #[instrument(skip(self, on_progress))]
    pub async fn export_all<F>(
        &self,
        filter: ScanFilter,
        mut on_progress: F,
    ) -> Result<Vec<InventoryRecord>, ServiceError>
    where
        F: FnMut(u64, u64),
    {
        let total_known = self.store.count(filter).await?;
        if total_known == 0 {
            // Nothing to export is a result, not an error.
            return Ok(Vec::new());
        }

        let mut records: Vec<InventoryRecord> = Vec::with_capacity(total_known as usize);
        let mut page = 0u64;

        loop {
            let batch = self
                .store
                .read_range(filter, page * self.page_size, self.page_size)
                .await
                .map_err(|source| ServiceError::ChunkUpload {
                    index: page as usize,
                    source: Box::new(source),
                })?;

            let fetched = batch.len() as u64;
            records.extend(batch);

            info!(page, rows = records.len(), total_known, "Export page fetched");
            on_progress(records.len() as u64, total_known);

            // A short page signals exhaustion; the upfront count may be
            // stale by now.
            if fetched < self.page_size {
                break;
            }
            page += 1;
        }

        Ok(records)
    }
}

/// Serializes records to delimited text: UTF-8 BOM, fixed column order,
/// `YES`/`NO` booleans, human-readable scan time/date plus an ISO-8601
/// column for round-trip fidelity. Embedded delimiters and quotes in
/// free-text fields are neutralized here by the csv writer's quoting; the
/// normalizer deliberately does not.
pub fn write_csv(records: &[InventoryRecord]) -> Result<Vec<u8>, ServiceError> {
    let mut buf: Vec<u8> = UTF8_BOM.to_vec();

    {
        let mut writer = csv::Writer::from_writer(&mut buf);
        writer
            .write_record(CSV_HEADER)
            .map_err(csv_error)?;

        for record in records {
            let price = record.price.to_string();
            let time = scan_time(record.scan_timestamp);
            let date = scan_date(record.scan_timestamp);
            let iso = scan_iso(record.scan_timestamp);

            writer
                .write_record([
                    record.barcode.as_str(),
                    record.item_name.as_str(),
                    record.status.as_str(),
                    record.color.as_str(),
                    record.brand.as_str(),
                    price.as_str(),
                    record.item_type.as_str(),
                    yes_no(record.is_scanned),
                    time.as_str(),
                    date.as_str(),
                    iso.as_str(),
                ])
                .map_err(csv_error)?;
        }

        writer.flush().map_err(|e| {
            ServiceError::InternalError(format!("failed to flush csv output: {}", e))
        })?;
    }

    Ok(buf)
}

fn csv_error(err: csv::Error) -> ServiceError {
    ServiceError::InternalError(format!("failed to serialize csv row: {}", err))
}

fn yes_no(value: bool) -> &'static str {
    if value {
        "YES"
    } else {
        "NO"
    }
}

fn scan_time(ts: Option<DateTime<Utc>>) -> String {
    ts.map(|t| t.format("%H:%M:%S").to_string())
        .unwrap_or_default()
}

fn scan_date(ts: Option<DateTime<Utc>>) -> String {
    ts.map(|t| t.format("%d/%m/%Y").to_string())
        .unwrap_or_default()
}

fn scan_iso(ts: Option<DateTime<Utc>>) -> String {
    ts.map(|t| t.to_rfc3339()).unwrap_or_default()
}
