use axum::extract::State;
use prometheus::{Encoder, TextEncoder};
use std::sync::Arc;
use crate::error::AppError;
use crate::metrics::RATE_LIMITER_KEYS;
use crate::state::AppState;

pub async fn metrics_handler(State(state): State<Arc<AppState>>) -> Result<String, AppError> {
    RATE_LIMITER_KEYS.set(state.limiter.tracked_keys() as f64);

    let encoder = TextEncoder::new();
    let metric_families = prometheus::gather();
    let mut buffer = Vec::new();
    encoder
        .encode(&metric_families, &mut buffer)
        .map_err(|e| AppError::Internal(e.to_string()))?;
    String::from_utf8(buffer).map_err(|e| AppError::Internal(e.to_string()))
}
