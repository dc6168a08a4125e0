//! Translation of pipeline failures into HTTP responses.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use rl_core::{AggregateError, LedgerError};
use thiserror::Error;

pub const NO_POSTS_MESSAGE: &str = "No posts found for the given date";

#[derive(Debug, Error)]
pub enum ApiError {
    #[error("No posts found for the given date")]
    NoPosts,

    #[error("ledger error: {0}")]
    Ledger(#[from] LedgerError),

    #[error("ledger did not answer in time")]
    Timeout,

    #[error("{0}")]
    BadRequest(String),

    #[error("failed to render page: {0}")]
    Render(#[from] askama::Error),
}

impl From<AggregateError> for ApiError {
    fn from(err: AggregateError) -> Self {
        match err {
            AggregateError::NoPosts { .. } => ApiError::NoPosts,
            AggregateError::Ledger(e) => ApiError::Ledger(e),
        }
    }
}

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::NoPosts => StatusCode::NOT_FOUND,
            ApiError::Ledger(_) => StatusCode::BAD_GATEWAY,
            ApiError::Timeout => StatusCode::GATEWAY_TIMEOUT,
            ApiError::BadRequest(_) => StatusCode::BAD_REQUEST,
            ApiError::Render(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        let body = match &self {
            ApiError::NoPosts | ApiError::BadRequest(_) => self.to_string(),
            ApiError::Ledger(e) => {
                tracing::error!(error = %e, "ledger read failed");
                "Failed to read from the ledger".to_string()
            }
            ApiError::Timeout => {
                tracing::warn!("ledger read timed out");
                "The ledger did not answer in time".to_string()
            }
            ApiError::Render(e) => {
                tracing::error!(error = %e, "template rendering failed");
                "Internal server error".to_string()
            }
        };
        (status, body).into_response()
    }
}
