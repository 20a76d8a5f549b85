use axum::{
    extract::{Query, State},
    Json,
};
use serde::Deserialize;
use serde_json::{json, Value};

use crate::entities::inventory_record::Model as InventoryRecord;
use crate::errors::ServiceError;
use crate::models::StockStats;
use crate::services::sync::ViewState;
use crate::store::ScanFilter;
use crate::{ApiResponse, AppState};

/// Exact progress counters, no row data transferred.
pub async fn get_stats(
    State(state): State<AppState>,
) -> Result<Json<ApiResponse<StockStats>>, ServiceError> {
    let total = state.store.count(ScanFilter::All).await?;
    let scanned = state.store.count(ScanFilter::Scanned).await?;
    Ok(Json(ApiResponse::success(StockStats::new(total, scanned))))
}

#[derive(Debug, Deserialize)]
pub struct RecentParams {
    pub search: Option<String>,
    pub limit: Option<u64>,
}

/// Bounded newest-first window, optionally filtered by a barcode/name
/// substring.
pub async fn get_recent(
    State(state): State<AppState>,
    Query(params): Query<RecentParams>,
) -> Result<Json<ApiResponse<Vec<InventoryRecord>>>, ServiceError> {
    let limit = params.limit.unwrap_or(state.config.view.recent_window);
    let records = state.store.recent(params.search.as_deref(), limit).await?;
    Ok(Json(ApiResponse::success(records)))
}

/// Current live-view snapshot as maintained by the synchronizer.
pub async fn get_view(
    State(state): State<AppState>,
) -> Result<Json<ApiResponse<ViewState>>, ServiceError> {
    let view = state.view.borrow().clone();
    Ok(Json(ApiResponse::success(view)))
}

/// Wipes the stock list. Destructive; meant for starting a fresh audit.
pub async fn wipe_inventory(
    State(state): State<AppState>,
) -> Result<Json<ApiResponse<Value>>, ServiceError> {
    let rows = state.store.delete_all().await?;
    Ok(Json(ApiResponse::success(json!({ "deleted": rows }))))
}

/// Resets every scanned record back to pending; the only path from
/// scanned to unscanned.
pub async fn reset_scans(
    State(state): State<AppState>,
) -> Result<Json<ApiResponse<Value>>, ServiceError> {
    let rows = state.store.reset_scans().await?;
    Ok(Json(ApiResponse::success(json!({ "reset": rows }))))
}
