// Webtask Error Types
// Configuration, authentication, storage and upstream failures with HTTP status mapping

use axum::{
    Json,
    http::{StatusCode, header},
    response::{IntoResponse, Response},
};
use serde::Serialize;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum WebtaskError {
    // Misconfiguration of options, secrets or claims
    #[error("{0}")]
    Config(String),

    #[error("{0}")]
    Unauthorized(String),

    #[error("{0}")]
    Forbidden(String),

    // Storage
    #[error("Storage is not available in this context")]
    StorageUnavailable,

    #[error("Upstream request failed with status {status}: {message}")]
    Upstream { status: u16, message: String },

    // Network/HTTP errors
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("JSON parsing error: {0}")]
    Json(#[from] serde_json::Error),
}

impl WebtaskError {
    pub fn config(message: impl Into<String>) -> Self {
        WebtaskError::Config(message.into())
    }

    pub fn status_code(&self) -> u16 {
        match self {
            WebtaskError::Config(_) => 400,
            WebtaskError::Unauthorized(_) => 401,
            WebtaskError::Forbidden(_) => 403,
            WebtaskError::StorageUnavailable => 412,
            WebtaskError::Upstream { status, .. } => *status,
            WebtaskError::Http(_) | WebtaskError::Json(_) => 502,
        }
    }
}

/// JSON body written for errors that bypass the login error responder
#[derive(Debug, Serialize)]
pub struct ErrorBody<'a> {
    pub code: u16,
    pub message: &'a str,
}

impl IntoResponse for WebtaskError {
    fn into_response(self) -> Response {
        let code = self.status_code();
        let message = match &self {
            WebtaskError::Upstream { message, .. } => message.clone(),
            other => other.to_string(),
        };
        let status = StatusCode::from_u16(code).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);

        (
            status,
            [(header::CACHE_CONTROL, "no-cache")],
            Json(ErrorBody {
                code,
                message: &message,
            }),
        )
            .into_response()
    }
}
