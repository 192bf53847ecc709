use axum::{
    extract::{ConnectInfo, Path, State},
    http::{HeaderMap, StatusCode, header},
    response::{IntoResponse, Response},
};
use chrono::Utc;
use std::net::SocketAddr;
use std::sync::Arc;
use crate::codegen::is_reserved;
use crate::error::AppError;
use crate::metrics::{CLICKS_DROPPED, REDIRECTS_TOTAL};
use crate::models::ClickJob;
use crate::rate_limit::client_key;
use crate::state::AppState;

// GET /{code} -> 302 to the original url, click is recorded in the background
pub async fn redirect_handler(
    State(state): State<Arc<AppState>>,
    Path(code): Path<String>,
    ConnectInfo(addr): ConnectInfo<SocketAddr>,
    headers: HeaderMap,
) -> Result<Response, AppError> {
    if code.is_empty() || is_reserved(&code) {
        return Err(AppError::NotFound("not found"));
    }

    let short = state
        .store
        .find_by_code(&code)
        .await?
        .ok_or(AppError::NotFound("not found"))?;

    let now = Utc::now();
    if short.is_expired_at(now) {
        return Err(AppError::Gone);
    }

    let user_agent = headers
        .get(header::USER_AGENT)
        .and_then(|v| v.to_str().ok())
        .unwrap_or_default()
        .to_string();

    let job = ClickJob {
        short_url_id: short.id,
        ip_address: client_key(&addr.to_string()),
        user_agent,
        clicked_at: now,
    };

    // a full queue costs us the click, never the redirect
    if let Err(e) = state.click_tx.try_send(job) {
        CLICKS_DROPPED.inc();
        tracing::warn!(%code, error = %e, "click event dropped");
    }

    REDIRECTS_TOTAL.inc();
    Ok((StatusCode::FOUND, [(header::LOCATION, short.original_url)]).into_response())
}
