use utoipa::OpenApi;

use crate::entities::inventory_record;
use crate::errors::ErrorResponse;
use crate::handlers::scan::ScanRequest;
use crate::models::{ImportSummary, NormalizedRecord, StockStats};
use crate::services::scan::ScanOutcome;
use crate::services::sync::ViewState;

/// Schema document for the stock-take API surface.
#[derive(OpenApi)]
#[openapi(
    info(
        title = "stocktake-api",
        description = "Stock-take audits: barcode scan reconciliation, chunked spreadsheet import/export, live progress view"
    ),
    components(schemas(
        inventory_record::Model,
        NormalizedRecord,
        StockStats,
        ImportSummary,
        ScanRequest,
        ScanOutcome,
        ViewState,
        ErrorResponse,
    ))
)]
pub struct ApiDoc;
