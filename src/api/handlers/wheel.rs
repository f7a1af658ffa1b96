use axum::extract::State;
use axum::Json;

use crate::api::auth::CurrentUser;
use crate::api::ApiResponse;
use crate::errors::AppError;
use crate::wheel::{SpinRequest, SpinResult};
use crate::AppState;

/// POST /wheel/spin: draw destinations and price them. Anonymous spins are allowed.
pub async fn spin(
    State(state): State<AppState>,
    user: Option<CurrentUser>,
    Json(mut request): Json<SpinRequest>,
) -> Result<Json<ApiResponse<SpinResult>>, AppError> {
    request.user_id = user.map(|u| u.0);
    let result = state.components.wheel.spin(request).await?;
    Ok(ApiResponse::ok(result))
}
