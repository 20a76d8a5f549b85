//! Bulk import pipeline: submits normalized records to the store in
//! fixed-size sequential chunks with fractional progress reporting.

use std::sync::Arc;

use tracing::{info, instrument};

use crate::errors::ServiceError;
use crate::models::{ImportSummary, NormalizedRecord};
use crate::store::InventoryStore;

pub struct BulkImporter {
    store: Arc<InventoryStore>,
    chunk_size: u64,
}

impl BulkImporter {
    pub fn new(store: Arc<InventoryStore>, chunk_size: u64) -> Self {
        // The store rejects chunks above the backend ceiling; stay under it.
        let chunk_size = chunk_size.clamp(1, store.max_rows_per_request());
        Self { store, chunk_size }
    }

    /// Imports the record set. Chunks are submitted sequentially; concurrent
    /// submission against the same upsert-by-barcode target risks write
    /// contention and out-of-order application, so throughput is traded for
    /// determinism. The first failing chunk aborts the remainder; chunks
    /// already committed stay committed (at-least-once, not transactional).
    ///
    /// `on_progress` receives a rounded percentage after each committed
    /// chunk, non-decreasing and terminating at 100.
    #[instrument(skip(self, records, on_progress), fields(rows = records.len()))]
    pub async fn import<F>(
        &self,
        records: Vec<NormalizedRecord>,
        mut on_progress: F,
    ) -> Result<ImportSummary, ServiceError>
    where
        F: FnMut(u8),
    {
        let total = records.len() as u64;
        if total == 0 {
            return Ok(ImportSummary { rows: 0, chunks: 0 });
        }

        let mut rows_so_far = 0u64;
        let mut chunks = 0u64;

        for (index, chunk) in records.chunks(self.chunk_size as usize).enumerate() {
            self.store
                .upsert_chunk(chunk)
                .await
                .map_err(|source| ServiceError::ChunkUpload {
                    index,
                    source: Box::new(source),
                })?;

            rows_so_far += chunk.len() as u64;
            chunks += 1;

            let percent = ((rows_so_far as f64 / total as f64) * 100.0).round() as u8;
            let percent = percent.min(100);
            info!(chunk = index, rows = rows_so_far, percent, "Import chunk committed");
            on_progress(percent);
        }

        Ok(ImportSummary {
            rows: rows_so_far,
            chunks,
        })
    }
}
