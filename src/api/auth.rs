use axum::{
    async_trait,
    extract::{FromRequestParts, Request, State},
    http::request::Parts,
    middleware::Next,
    response::{IntoResponse, Response},
};

use crate::errors::AppError;
use crate::AppState;

/// Header set by the upstream authentication gateway.
pub const USER_ID_HEADER: &str = "x-user-id";

/// Bearer-token authentication for admin routes.
///
/// Every request must carry `Authorization: Bearer <ADMIN_TOKEN>`.
/// With no `ADMIN_TOKEN` configured the admin routes are closed.
pub async fn require_admin(State(state): State<AppState>, req: Request, next: Next) -> Response {
    let Some(expected) = state.config.admin_token.as_deref() else {
        tracing::warn!(path = %req.uri().path(), "Admin route called but ADMIN_TOKEN is not set");
        return AppError::Unauthorized.into_response();
    };

    let token = req
        .headers()
        .get("authorization")
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "));

    match token {
        Some(token) if token == expected => next.run(req).await,
        _ => AppError::Unauthorized.into_response(),
    }
}

/// The caller's user id, taken from the `X-User-Id` header.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CurrentUser(pub String);

#[async_trait]
impl<S> FromRequestParts<S> for CurrentUser
where
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .headers
            .get(USER_ID_HEADER)
            .and_then(|v| v.to_str().ok())
            .map(str::trim)
            .filter(|v| !v.is_empty())
            .map(|v| CurrentUser(v.to_string()))
            .ok_or(AppError::Unauthorized)
    }
}
