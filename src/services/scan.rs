//! Scan reconciler: classifies one scanned code against the stock list and
//! attempts the conflict-safe pending -> scanned transition.

use std::sync::Arc;

use metrics::counter;
use serde::Serialize;
use tokio::sync::Mutex;
use tracing::{debug, error, info, instrument};
use utoipa::ToSchema;

use crate::entities::inventory_record::Model as InventoryRecord;
use crate::errors::ServiceError;
use crate::store::InventoryStore;

/// Classification of one scan attempt. Ephemeral and UI-facing; never
/// persisted.
#[derive(Debug, Clone, Serialize, ToSchema)]
#[serde(tag = "status", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ScanOutcome {
    /// The pending -> scanned transition succeeded
    Found { record: InventoryRecord },
    /// The record exists but was already scanned (possibly by a concurrent
    /// device that won the race between lookup and commit)
    Duplicate { record: InventoryRecord },
    /// No record carries this barcode
    NotFound { barcode: String },
    /// Storage failure; the same code may be resubmitted immediately
    Error { message: String },
}

/// Per-scan state machine. Holds a try-lock so at most one scan is in
/// flight: a fast scanner gun firing while a scan is being processed is
/// ignored, not queued.
pub struct ScanReconciler {
    store: Arc<InventoryStore>,
    in_flight: Mutex<()>,
}

impl ScanReconciler {
    pub fn new(store: Arc<InventoryStore>) -> Self {
        Self {
            store,
            in_flight: Mutex::new(()),
        }
    }

    /// Submits one raw scan. Returns `None` when the submission was ignored:
    /// empty/whitespace-only input, or another scan is still in flight. All
    /// other paths produce an outcome synchronously.
    #[instrument(skip(self, raw))]
    pub async fn submit(&self, raw: &str) -> Option<ScanOutcome> {
        let code = raw.trim();
        if code.is_empty() {
            return None;
        }

        let _guard = match self.in_flight.try_lock() {
            Ok(guard) => guard,
            Err(_) => {
                debug!(barcode = code, "Scan ignored; another scan is in flight");
                counter!("stocktake_scan.ignored_busy", 1);
                return None;
            }
        };

        Some(self.reconcile(code).await)
    }

    async fn reconcile(&self, code: &str) -> ScanOutcome {
        let record = match self.store.get_by_barcode(code).await {
            Ok(record) => record,
            Err(err) => return Self::transport_failure(code, err),
        };

        let Some(record) = record else {
            info!(barcode = code, "Scan miss; no record with this barcode");
            counter!("stocktake_scan.not_found", 1);
            return ScanOutcome::NotFound {
                barcode: code.to_string(),
            };
        };

        if record.is_scanned {
            info!(barcode = code, record_id = record.id, "Scan duplicate");
            counter!("stocktake_scan.duplicates", 1);
            return ScanOutcome::Duplicate { record };
        }

        match self.store.conditional_mark_scanned(record.id, false).await {
            Ok(Some(updated)) => {
                info!(barcode = code, record_id = updated.id, "Scan committed");
                counter!("stocktake_scan.found", 1);
                ScanOutcome::Found { record: updated }
            }
            // Lost the race between lookup and commit: someone else scanned
            // this record first. Re-fetch so the caller can display the
            // current row.
            Ok(None) => match self.store.get_by_barcode(code).await {
                Ok(Some(current)) => {
                    info!(
                        barcode = code,
                        record_id = current.id,
                        "Scan conflict; reclassified as duplicate"
                    );
                    counter!("stocktake_scan.duplicates", 1);
                    ScanOutcome::Duplicate { record: current }
                }
                Ok(None) => ScanOutcome::NotFound {
                    barcode: code.to_string(),
                },
                Err(err) => Self::transport_failure(code, err),
            },
            Err(err) => Self::transport_failure(code, err),
        }
    }

    fn transport_failure(code: &str, err: ServiceError) -> ScanOutcome {
        error!(barcode = code, error = %err, "Scan failed");
        counter!("stocktake_scan.errors", 1);
        ScanOutcome::Error {
            message: err.response_message(),
        }
    }
}
