//! Engine error taxonomy and its HTTP mapping.
//!
//! Authorization failures short-circuit before any classification or
//! persistence work. A classification failure is surfaced as-is: degrading
//! it into a "no risk detected" result is the one behavior this engine
//! must never exhibit.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde::Serialize;
use thiserror::Error;

use crate::store::StoreError;

#[derive(Debug, Error)]
pub enum EngineError {
    /// Missing or malformed required fields.
    #[error("bad input: {0}")]
    BadInput(String),

    /// Caller identity could not be established or does not match.
    #[error("unauthorized")]
    Unauthorized,

    /// Caller authenticated but not entitled to act on this subject.
    #[error("forbidden")]
    Forbidden,

    /// Referenced session or context absent.
    #[error("not found: {0}")]
    NotFound(String),

    /// External text-completion failure, timeout, or malformed output.
    #[error("classification unavailable: {0}")]
    ClassificationUnavailable(String),

    /// Data-store write failure for a primary record.
    #[error("persistence error: {0}")]
    Persistence(#[from] StoreError),
}

#[derive(Debug, Serialize)]
struct ErrorBody {
    error: String,
}

impl IntoResponse for EngineError {
    fn into_response(self) -> Response {
        let status = match &self {
            EngineError::BadInput(_) => StatusCode::BAD_REQUEST,
            EngineError::Unauthorized => StatusCode::UNAUTHORIZED,
            EngineError::Forbidden => StatusCode::FORBIDDEN,
            EngineError::NotFound(_) => StatusCode::NOT_FOUND,
            EngineError::ClassificationUnavailable(_) | EngineError::Persistence(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        };
        let body = ErrorBody {
            error: self.to_string(),
        };
        (status, axum::Json(body)).into_response()
    }
}

pub type Result<T> = std::result::Result<T, EngineError>;
