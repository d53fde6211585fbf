//! API Error Handling
//!
//! Unified error type and conversion for API responses.

use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use harvester_ledger::LedgerError;

/// API error type
#[derive(Debug)]
pub enum ApiError {
    NotFound(String),
    Ledger(LedgerError),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            ApiError::NotFound(msg) => (StatusCode::NOT_FOUND, msg),
            ApiError::Ledger(err) if err.is_unreachable() => {
                tracing::warn!("Ledger unreachable: {}", err);
                (
                    StatusCode::SERVICE_UNAVAILABLE,
                    "Ledger store unreachable".to_string(),
                )
            }
            ApiError::Ledger(err) => {
                tracing::error!("Ledger error: {:?}", err);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "Internal server error".to_string(),
                )
            }
        };

        (status, Json(serde_json::json!({ "error": message }))).into_response()
    }
}

impl From<LedgerError> for ApiError {
    fn from(err: LedgerError) -> Self {
        ApiError::Ledger(err)
    }
}

pub type ApiResult<T> = Result<T, ApiError>;
