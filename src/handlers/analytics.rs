use axum::{Json, extract::{Query, State}};
use std::sync::Arc;
use super::required_code;
use crate::error::AppError;
use crate::models::{AnalyticsResponse, CodeQuery};
use crate::state::AppState;

// GET /analytics?code=abc1234
pub async fn analytics_handler(
    State(state): State<Arc<AppState>>,
    Query(query): Query<CodeQuery>,
) -> Result<Json<AnalyticsResponse>, AppError> {
    let code = required_code(query)?;

    let short = state
        .store
        .find_by_code(&code)
        .await?
        .ok_or(AppError::NotFound("short url not found"))?;

    let stats = state.store.stats(short.id).await?;

    Ok(Json(AnalyticsResponse {
        code: short.code,
        original_url: short.original_url,
        total_clicks: stats.total_clicks,
        unique_ips: stats.unique_ips,
        clicks_by_country: stats.clicks_by_country,
    }))
}
