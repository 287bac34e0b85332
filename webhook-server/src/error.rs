//! Error taxonomy shared by the server.
//!
//! - [`ConfigError`]: startup failures; fatal for the affected listener only.
//! - [`ValidationError`]: malformed caller input, answered with 400.
//! - [`AppError`]: what a handler returns; maps each class to its HTTP status.

use std::path::PathBuf;

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use tracing::error;

/// Certificate material could not be loaded or assembled into a TLS config.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read {path}: {source}")]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("no certificate found in {0}")]
    NoCertificates(PathBuf),

    #[error("no private key found in {0}")]
    NoPrivateKey(PathBuf),

    #[error("no usable CA certificate for client verification")]
    NoClientRoots,

    #[error("TLS configuration error: {0}")]
    Tls(String),
}

/// Caller input that does not match the expected shape.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ValidationError {
    #[error("invalid JSON body: {0}")]
    InvalidJson(String),

    #[error("invalid payload: field \"pix\" is missing or is not an array")]
    MissingPixArray,

    #[error("invalid payload: pix[{index}]: {reason}")]
    InvalidRecord { index: usize, reason: String },

    #[error("invalid date \"{0}\", expected YYYY-MM-DD")]
    InvalidDate(String),
}

/// Error returned from request handlers.
#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error("{error}: {details}")]
    Unauthorized { error: String, details: String },

    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error("not found")]
    NotFound,

    #[error(transparent)]
    Internal(#[from] anyhow::Error),
}

impl AppError {
    pub fn unauthorized(error: impl Into<String>, details: impl Into<String>) -> Self {
        AppError::Unauthorized {
            error: error.into(),
            details: details.into(),
        }
    }
}

/// JSON error body.
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<String>,
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, body) = match self {
            AppError::Unauthorized { error, details } => (
                StatusCode::UNAUTHORIZED,
                ErrorResponse {
                    error,
                    details: Some(details),
                },
            ),
            AppError::Validation(e) => (
                StatusCode::BAD_REQUEST,
                ErrorResponse {
                    error: e.to_string(),
                    details: None,
                },
            ),
            AppError::NotFound => (
                StatusCode::NOT_FOUND,
                ErrorResponse {
                    error: "Not found".to_string(),
                    details: None,
                },
            ),
            AppError::Internal(e) => {
                // Detail stays in the logs
                error!(error = ?e, "internal_error");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    ErrorResponse {
                        error: "Internal server error".to_string(),
                        details: None,
                    },
                )
            }
        };

        (status, Json(body)).into_response()
    }
}
