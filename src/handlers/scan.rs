use axum::{extract::State, Json};
use serde::Deserialize;
use utoipa::ToSchema;

use crate::errors::ServiceError;
use crate::services::scan::ScanOutcome;
use crate::{ApiResponse, AppState};

#[derive(Debug, Deserialize, ToSchema)]
pub struct ScanRequest {
    /// Raw decoded string from the scanner/camera; treated as untrusted input
    pub barcode: String,
}

/// Submits one scan. Ignored submissions (empty input, or another scan still
/// in flight) are reported in the envelope with `success = false` rather
/// than as transport errors, so a scanner UI can resubmit immediately.
pub async fn submit_scan(
    State(state): State<AppState>,
    Json(req): Json<ScanRequest>,
) -> Result<Json<ApiResponse<ScanOutcome>>, ServiceError> {
    match state.reconciler.submit(&req.barcode).await {
        Some(outcome) => Ok(Json(ApiResponse::success(outcome))),
        None => Ok(Json(ApiResponse::error(
            "scan ignored: empty input or another scan is in flight".to_string(),
        ))),
    }
}
