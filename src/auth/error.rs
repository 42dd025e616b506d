// Login Error Payload
// The single error value funneled through the `login_error` responder

use serde::Serialize;
use serde_json::{Map, Value};
use thiserror::Error;

use crate::error::WebtaskError;

/// Error handed to `login_error`; serialized as the JSON error body.
#[derive(Debug, Clone, Serialize, Error)]
#[error("{message}")]
pub struct LoginError {
    /// HTTP status to respond with
    pub code: u16,

    pub message: String,

    /// Underlying cause, when there is one
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,

    /// Where a browser should be sent to recover (the login route)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub redirect: Option<String>,

    /// Extra diagnostic fields (`callbackQuery`, `auth0Status`, ...)
    #[serde(flatten)]
    pub details: Map<String, Value>,
}

impl LoginError {
    pub fn new(code: u16, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
            error: None,
            redirect: None,
            details: Map::new(),
        }
    }

    pub fn unauthorized(message: impl Into<String>) -> Self {
        Self::new(401, message)
    }

    pub fn forbidden() -> Self {
        Self::new(403, "Forbidden.")
    }

    pub fn config(message: impl Into<String>) -> Self {
        Self::new(400, message)
    }

    pub fn with_error(mut self, error: impl Into<String>) -> Self {
        self.error = Some(error.into());
        self
    }

    pub fn with_redirect(mut self, redirect: impl Into<String>) -> Self {
        self.redirect = Some(redirect.into());
        self
    }

    pub fn with_detail(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.details.insert(key.into(), value.into());
        self
    }
}

impl From<WebtaskError> for LoginError {
    fn from(err: WebtaskError) -> Self {
        LoginError::new(err.status_code(), err.to_string())
    }
}
