use axum::http::{HeaderName, Method, header};
use axum::routing::{get, post};
use axum::{Router, middleware};
use std::sync::Arc;
use tower_http::cors::{AllowOrigin, CorsLayer};

use crate::handlers::{
    analytics_handler, health_handler, metrics_handler, qr_handler, redirect_handler,
    shorten_handler,
};
use crate::rate_limit::rate_limit_middleware;
use crate::state::AppState;

/// Builds the full application router.
///
/// The rate limiter wraps every route, so a denied client never reaches a
/// handler. CORS sits outside the limiter and decorates 429s as well.
/// Callers must serve it with connect info (`into_make_service_with_connect_info`).
pub fn build(state: Arc<AppState>) -> Router {
    let limiter = Arc::clone(&state.limiter);

    Router::new()
        .route("/health", get(health_handler))
        .route("/metrics", get(metrics_handler))
        .route("/shorten", post(shorten_handler))
        .route("/analytics", get(analytics_handler))
        .route("/qr", get(qr_handler))
        .route("/{code}", get(redirect_handler))
        .layer(middleware::from_fn_with_state(limiter, rate_limit_middleware))
        .layer(cors_layer())
        .with_state(state)
}

// Mirror the caller's origin, the frontend lives on another host
fn cors_layer() -> CorsLayer {
    let allowed_headers: [HeaderName; 2] = [header::CONTENT_TYPE, header::AUTHORIZATION];

    CorsLayer::new()
        .allow_origin(AllowOrigin::mirror_request())
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers(allowed_headers)
}
