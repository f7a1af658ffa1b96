use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::Json;
use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::Deserialize;
use serde_json::{json, Value};
use uuid::Uuid;

use crate::api::auth::CurrentUser;
use crate::api::ApiResponse;
use crate::errors::AppError;
use crate::models::{Alert, AlertKind, DailyPrice, NewAlert, PriceStatistics, RouteKey};
use crate::AppState;

const DEFAULT_TREND_DAYS: u32 = 30;
const MAX_TREND_DAYS: u32 = 365;

// ---------------------------------------------------------------------------
// DTOs
// ---------------------------------------------------------------------------

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateAlertRequest {
    pub origin: String,
    pub destination: String,
    pub alert_type: String,
    pub max_price: Option<Decimal>,
    pub price_drop_percent: Option<Decimal>,
    pub departure_date: Option<NaiveDate>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateAlertRequest {
    pub is_active: bool,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StatsParams {
    pub current_price: Option<Decimal>,
}

#[derive(Deserialize)]
pub struct TrendParams {
    pub days: Option<u32>,
}

// ---------------------------------------------------------------------------
// Handlers
// ---------------------------------------------------------------------------

/// GET /alerts: the caller's alerts, newest first
pub async fn list(
    State(state): State<AppState>,
    CurrentUser(user_id): CurrentUser,
) -> Result<Json<ApiResponse<Vec<Alert>>>, AppError> {
    let alerts = state.components.alerts.list(&user_id).await?;
    Ok(ApiResponse::ok(alerts))
}

/// POST /alerts: create an alert for the caller
pub async fn create(
    State(state): State<AppState>,
    CurrentUser(user_id): CurrentUser,
    Json(req): Json<CreateAlertRequest>,
) -> Result<(StatusCode, Json<ApiResponse<Alert>>), AppError> {
    let kind = AlertKind::from_parts(&req.alert_type, req.max_price, req.price_drop_percent)?;
    let alert = state
        .components
        .alerts
        .create(NewAlert {
            user_id,
            origin: req.origin,
            destination: req.destination,
            departure_date: req.departure_date,
            kind,
        })
        .await?;

    Ok((StatusCode::CREATED, ApiResponse::ok(alert)))
}

/// PATCH /alerts/{id}: activate or pause an alert
pub async fn update(
    State(state): State<AppState>,
    CurrentUser(user_id): CurrentUser,
    Path(id): Path<Uuid>,
    Json(req): Json<UpdateAlertRequest>,
) -> Result<Json<ApiResponse<Alert>>, AppError> {
    let alert = state
        .components
        .alerts
        .set_active(&user_id, id, req.is_active)
        .await?;
    Ok(ApiResponse::ok(alert))
}

/// DELETE /alerts/{id}
pub async fn remove(
    State(state): State<AppState>,
    CurrentUser(user_id): CurrentUser,
    Path(id): Path<Uuid>,
) -> Result<Json<Value>, AppError> {
    state.components.alerts.delete(&user_id, id).await?;
    Ok(Json(json!({ "success": true })))
}

/// GET /alerts/price-stats/{routeKey}?currentPrice=: `data` is null without history
pub async fn price_stats(
    State(state): State<AppState>,
    Path(route_key): Path<String>,
    Query(params): Query<StatsParams>,
) -> Result<Json<ApiResponse<Option<PriceStatistics>>>, AppError> {
    let route_key = RouteKey::parse(&route_key)?;
    if params.current_price.is_some_and(|p| p.is_sign_negative()) {
        return Err(AppError::BadRequest("currentPrice must not be negative".into()));
    }

    let stats = state
        .components
        .cache
        .history()
        .statistics(&route_key, params.current_price)
        .await?;
    Ok(ApiResponse::ok(stats))
}

/// GET /alerts/price-trend/{routeKey}?days=: daily aggregates, oldest first
pub async fn price_trend(
    State(state): State<AppState>,
    Path(route_key): Path<String>,
    Query(params): Query<TrendParams>,
) -> Result<Json<ApiResponse<Vec<DailyPrice>>>, AppError> {
    let route_key = RouteKey::parse(&route_key)?;
    let days = params.days.unwrap_or(DEFAULT_TREND_DAYS);
    if days == 0 || days > MAX_TREND_DAYS {
        return Err(AppError::BadRequest(format!(
            "days must be between 1 and {MAX_TREND_DAYS}"
        )));
    }

    let daily = state.components.cache.history().trend(&route_key, days).await?;
    Ok(ApiResponse::ok(daily))
}
