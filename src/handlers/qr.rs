use axum::{
    extract::{Query, State},
    http::header,
    response::{IntoResponse, Response},
};
use std::sync::Arc;
use super::required_code;
use crate::error::AppError;
use crate::models::CodeQuery;
use crate::qr::render_svg;
use crate::state::AppState;

// GET /qr?code=abc1234 -> svg of the short link
pub async fn qr_handler(
    State(state): State<Arc<AppState>>,
    Query(query): Query<CodeQuery>,
) -> Result<Response, AppError> {
    let code = required_code(query)?;

    if state.store.find_by_code(&code).await?.is_none() {
        return Err(AppError::NotFound("short url not found"));
    }

    let svg = render_svg(&state.short_url(&code))?;
    Ok(([(header::CONTENT_TYPE, "image/svg+xml")], svg).into_response())
}
