use axum::{
    extract::{Multipart, Query, State},
    http::header,
    response::{IntoResponse, Response},
    Json,
};
use chrono::Utc;
use serde::Deserialize;
use tracing::info;

use crate::errors::ServiceError;
use crate::models::ImportSummary;
use crate::services::export::write_csv;
use crate::services::normalizer::normalize_workbook;
use crate::store::ScanFilter;
use crate::{ApiResponse, AppState};

/// Accepts a multipart upload with a `file` field holding the workbook,
/// normalizes it off the async runtime, then runs the chunked import.
pub async fn import_spreadsheet(
    State(state): State<AppState>,
    mut multipart: Multipart,
) -> Result<Json<ApiResponse<ImportSummary>>, ServiceError> {
    let mut upload: Option<bytes::Bytes> = None;

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| ServiceError::InvalidInput(format!("malformed multipart body: {}", e)))?
    {
        if field.name() == Some("file") {
            let data = field
                .bytes()
                .await
                .map_err(|e| ServiceError::InvalidInput(format!("failed to read upload: {}", e)))?;
            upload = Some(data);
        }
    }

    let bytes = upload.ok_or_else(|| {
        ServiceError::InvalidInput("multipart upload must carry a 'file' field".to_string())
    })?;

    // Workbook parsing is CPU-bound; keep it off the async workers.
    let synonyms = state.config.columns.clone();
    let records = tokio::task::spawn_blocking(move || normalize_workbook(&bytes, &synonyms))
        .await
        .map_err(|e| ServiceError::InternalError(format!("normalizer task failed: {}", e)))??;

    info!(rows = records.len(), "Spreadsheet normalized; starting import");

    let summary = state
        .importer
        .import(records, |percent| {
            info!(percent, "Import progress");
        })
        .await?;

    Ok(Json(ApiResponse::success(summary)))
}

#[derive(Debug, Deserialize)]
pub struct ExportParams {
    pub filter: Option<ScanFilter>,
}

/// Streams nothing fancy: pages the full filtered set into memory, then
/// hands it back as a CSV attachment.
pub async fn export_csv(
    State(state): State<AppState>,
    Query(params): Query<ExportParams>,
) -> Result<Response, ServiceError> {
    let filter = params.filter.unwrap_or(ScanFilter::All);

    let records = state
        .exporter
        .export_all(filter, |rows_so_far, total_known| {
            info!(rows_so_far, total_known, "Export progress");
        })
        .await?;

    let body = write_csv(&records)?;
    let filename = format!("stock_take_{}.csv", Utc::now().format("%Y%m%d_%H%M%S"));

    Ok((
        [
            (
                header::CONTENT_TYPE,
                "text/csv; charset=utf-8".to_string(),
            ),
            (
                header::CONTENT_DISPOSITION,
                format!("attachment; filename=\"{}\"", filename),
            ),
        ],
        body,
    )
        .into_response())
}
