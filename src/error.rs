use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use thiserror::Error;

// Errors returned by request handlers, rendered as plain text
#[derive(Error, Debug)]
pub enum AppError {
    #[error("{0}")]
    BadRequest(String),

    #[error("{0}")]
    NotFound(&'static str),

    #[error("{0}")]
    Conflict(String),

    #[error("link expired")]
    Gone,

    #[error("internal error: {0}")]
    Internal(String),
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = match &self {
            AppError::BadRequest(_) => StatusCode::BAD_REQUEST,
            AppError::NotFound(_) => StatusCode::NOT_FOUND,
            AppError::Conflict(_) => StatusCode::CONFLICT,
            AppError::Gone => StatusCode::GONE,
            AppError::Internal(e) => {
                tracing::error!(error = %e, "internal error");
                return (StatusCode::INTERNAL_SERVER_ERROR, "internal server error").into_response();
            }
        };

        (status, self.to_string()).into_response()
    }
}

#[derive(Error, Debug)]
pub enum StoreError {
    #[error("code already exists")]
    CodeTaken(String),

    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
}

impl From<StoreError> for AppError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::CodeTaken(_) => AppError::Conflict("code already exists".to_string()),
            StoreError::Database(e) => AppError::Internal(format!("database error: {}", e)),
        }
    }
}

#[derive(Error, Debug, PartialEq, Eq)]
pub enum ConfigError {
    #[error("rate limit must be greater than zero")]
    ZeroRateLimit,

    #[error("rate window must be greater than zero")]
    ZeroRateWindow,

    #[error("click queue capacity must be greater than zero")]
    ZeroClickQueue,

    #[error("base url must not be empty")]
    EmptyBaseUrl,
}

// Failures that stop the process before or while serving
#[derive(Error, Debug)]
pub enum StartupError {
    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("migration error: {0}")]
    Migrate(#[from] sqlx::migrate::MigrateError),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}
