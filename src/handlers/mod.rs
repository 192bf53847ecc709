mod analytics;
mod health;
mod metrics;
mod qr;
mod redirect;
mod shorten;

pub use analytics::analytics_handler;
pub use health::health_handler;
pub use metrics::metrics_handler;
pub use qr::qr_handler;
pub use redirect::redirect_handler;
pub use shorten::shorten_handler;

use crate::error::AppError;
use crate::models::CodeQuery;

// Pull a non-empty ?code= out of the query
fn required_code(query: CodeQuery) -> Result<String, AppError> {
    match query.code.map(|c| c.trim().to_string()) {
        Some(code) if !code.is_empty() => Ok(code),
        _ => Err(AppError::BadRequest("code is required".to_string())),
    }
}
