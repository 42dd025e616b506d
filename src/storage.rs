//! Storage helpers proxying `read`/`write` to the external blob store named
//! by the `EXT_STORAGE_URL` secret.

use reqwest::{Method, RequestBuilder, Response, StatusCode};
use serde_json::Value;
use std::collections::HashMap;
use tracing::{debug, warn};
use url::Url;

use crate::HTTP_CLIENT;
use crate::context::WebtaskContext;
use crate::error::WebtaskError;

/// Secret naming the storage proxy endpoint
pub const STORAGE_URL_SECRET: &str = "EXT_STORAGE_URL";

/// Options for [`Storage::read_with`]
#[derive(Debug, Clone, Default)]
pub struct ReadOptions {
    /// Extra headers sent to the storage endpoint
    pub headers: HashMap<String, String>,

    /// Value returned instead of an error when the path does not exist
    pub default_value: Option<Value>,
}

impl ReadOptions {
    pub fn with_default(default_value: Value) -> Self {
        Self {
            default_value: Some(default_value),
            ..Default::default()
        }
    }
}

/// Options for [`Storage::write_with`]
#[derive(Debug, Clone, Default)]
pub struct WriteOptions {
    pub headers: HashMap<String, String>,
}

/// Read/write access to the storage proxy; unavailable when no endpoint is configured
#[derive(Debug, Clone, Default)]
pub struct Storage {
    endpoint: Option<Url>,
}

impl Storage {
    pub fn new(endpoint: Url) -> Self {
        Self {
            endpoint: Some(endpoint),
        }
    }

    pub fn unavailable() -> Self {
        Self { endpoint: None }
    }

    pub fn is_available(&self) -> bool {
        self.endpoint.is_some()
    }

    pub async fn read(&self, path: &str) -> Result<Value, WebtaskError> {
        self.read_with(path, ReadOptions::default()).await
    }

    /// GET `{endpoint}?path={path}`. A 404 yields `default_value` when one is set.
    pub async fn read_with(&self, path: &str, options: ReadOptions) -> Result<Value, WebtaskError> {
        let request = self.request(Method::GET, path, &options.headers)?;
        let response = request.send().await?;
        let status = response.status();

        if status == StatusCode::NOT_FOUND {
            if let Some(default_value) = options.default_value {
                debug!("Storage path {} not found, using default value", path);
                return Ok(default_value);
            }
        }

        if status.as_u16() >= 400 {
            return Err(upstream_error(response).await);
        }

        let text = response.text().await?;
        if text.is_empty() {
            return Ok(Value::Null);
        }

        Ok(serde_json::from_str(&text).unwrap_or(Value::String(text)))
    }

    pub async fn write(
        &self,
        path: &str,
        data: impl Into<reqwest::Body>,
    ) -> Result<(), WebtaskError> {
        self.write_with(path, data, WriteOptions::default()).await
    }

    /// PUT the raw payload to `{endpoint}?path={path}`
    pub async fn write_with(
        &self,
        path: &str,
        data: impl Into<reqwest::Body>,
        options: WriteOptions,
    ) -> Result<(), WebtaskError> {
        let request = self.request(Method::PUT, path, &options.headers)?;
        let response = request.body(data).send().await?;

        if response.status().as_u16() >= 400 {
            return Err(upstream_error(response).await);
        }

        Ok(())
    }

    fn request(
        &self,
        method: Method,
        path: &str,
        headers: &HashMap<String, String>,
    ) -> Result<RequestBuilder, WebtaskError> {
        let endpoint = self
            .endpoint
            .as_ref()
            .ok_or(WebtaskError::StorageUnavailable)?;

        let mut url = endpoint.clone();
        url.query_pairs_mut().append_pair("path", path);

        debug!("Storage {} {}", method, url);
        let mut request = HTTP_CLIENT.request(method, url);
        for (name, value) in headers {
            request = request.header(name.as_str(), value.as_str());
        }

        Ok(request)
    }
}

async fn upstream_error(response: Response) -> WebtaskError {
    let status = response.status();
    let message = response
        .json::<Value>()
        .await
        .ok()
        .and_then(|body| body.get("message").and_then(Value::as_str).map(str::to_string))
        .unwrap_or_else(|| status.canonical_reason().unwrap_or("Error").to_string());

    warn!("Storage request failed with status {}: {}", status, message);
    WebtaskError::Upstream {
        status: status.as_u16(),
        message,
    }
}

/// Decorate the context with storage helpers bound to `EXT_STORAGE_URL`
pub fn attach_storage_helpers(mut context: WebtaskContext) -> WebtaskContext {
    context.storage = match context.secret(STORAGE_URL_SECRET) {
        Some(raw) => match Url::parse(raw) {
            Ok(endpoint) => Storage::new(endpoint),
            Err(e) => {
                warn!("Ignoring invalid {}: {}", STORAGE_URL_SECRET, e);
                Storage::unavailable()
            }
        },
        None => Storage::unavailable(),
    };

    context
}
