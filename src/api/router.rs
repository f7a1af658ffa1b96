use axum::middleware;
use axum::routing::{get, patch, post};
use axum::Router;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use crate::AppState;
use super::auth::require_admin;
use super::handlers;

pub fn create_router(state: AppState) -> Router {
    // Public routes; alert routes identify the caller via X-User-Id
    let public = Router::new()
        .route("/health", get(handlers::health::health_check))
        .route("/metrics", get(handlers::metrics::render))
        // Wheel
        .route("/wheel/spin", post(handlers::wheel::spin))
        // Alerts
        .route("/alerts", get(handlers::alerts::list).post(handlers::alerts::create))
        .route(
            "/alerts/:id",
            patch(handlers::alerts::update).delete(handlers::alerts::remove),
        )
        .route("/alerts/price-stats/:route_key", get(handlers::alerts::price_stats))
        .route("/alerts/price-trend/:route_key", get(handlers::alerts::price_trend));

    // Admin routes, require Bearer ADMIN_TOKEN
    let admin = Router::new()
        .route("/admin/maintenance/alerts/run", post(handlers::admin::run_alert_sweep))
        .route("/admin/maintenance/prune/run", post(handlers::admin::run_prune))
        .layer(middleware::from_fn_with_state(state.clone(), require_admin));

    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    public
        .merge(admin)
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
