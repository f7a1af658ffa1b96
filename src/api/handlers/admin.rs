use axum::extract::State;
use axum::Json;

use crate::alerts::SweepSummary;
use crate::api::ApiResponse;
use crate::errors::AppError;
use crate::services::jobs::MaintenanceSummary;
use crate::AppState;

/// POST /admin/maintenance/alerts/run: sweep all active alerts now.
pub async fn run_alert_sweep(
    State(state): State<AppState>,
) -> Result<Json<ApiResponse<SweepSummary>>, AppError> {
    let summary = state.alert_sweep.run_now().await?;
    Ok(ApiResponse::ok(summary))
}

/// POST /admin/maintenance/prune/run: prune history and purge expired offers now.
pub async fn run_prune(
    State(state): State<AppState>,
) -> Result<Json<ApiResponse<MaintenanceSummary>>, AppError> {
    let summary = state.maintenance.run_now().await?;
    Ok(ApiResponse::ok(summary))
}
