use axum::{Json, body::Bytes, extract::State};
use std::sync::Arc;
use crate::codegen::{generate_code, is_reserved, is_valid_custom};
use crate::error::{AppError, StoreError};
use crate::metrics::URLS_CREATED;
use crate::models::{ShortenRequest, ShortenResponse, ShortUrl};
use crate::state::AppState;

// Generated codes retried this many times before giving up
const GENERATE_ATTEMPTS: usize = 5;

// POST /shorten, the body is read as JSON whatever the content type says
pub async fn shorten_handler(
    State(state): State<Arc<AppState>>,
    body: Bytes,
) -> Result<Json<ShortenResponse>, AppError> {
    let req: ShortenRequest = serde_json::from_slice(&body)
        .map_err(|_| AppError::BadRequest("Invalid JSON".to_string()))?;

    let url = req.url.trim();
    if url.is_empty() {
        return Err(AppError::BadRequest("url is required".to_string()));
    }

    let custom = req
        .custom
        .as_deref()
        .map(|c| c.trim().to_lowercase())
        .filter(|c| !c.is_empty());

    let short = match custom {
        Some(code) => {
            if !is_valid_custom(&code) {
                return Err(AppError::BadRequest("invalid custom code".to_string()));
            }
            if is_reserved(&code) {
                return Err(StoreError::CodeTaken(code).into());
            }
            state.store.insert_url(&code, url, req.expires_at).await?
        }
        None => insert_generated(&state, url, &req).await?,
    };

    URLS_CREATED.inc();
    tracing::info!(code = %short.code, url = %short.original_url, "short url created");

    Ok(Json(ShortenResponse {
        short_url: state.short_url(&short.code),
        code: short.code,
    }))
}

async fn insert_generated(state: &AppState, url: &str, req: &ShortenRequest) -> Result<ShortUrl, AppError> {
    for _ in 0..GENERATE_ATTEMPTS {
        let code = generate_code(url);
        match state.store.insert_url(&code, url, req.expires_at).await {
            Ok(short) => return Ok(short),
            Err(StoreError::CodeTaken(code)) => {
                tracing::warn!(%code, "generated code collided, retrying");
            }
            Err(e) => return Err(e.into()),
        }
    }
    Err(AppError::Internal("could not allocate a unique code".to_string()))
}
