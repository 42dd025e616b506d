//! Execution context and platform claims handed to every webtask invocation.

use serde::Deserialize;
use serde_json::Value;
use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;

use crate::error::WebtaskError;
use crate::storage::Storage;

/// Per-invocation bag created by the host and threaded through adapters and handlers.
#[derive(Debug, Clone, Default)]
pub struct WebtaskContext {
    /// Secrets configured on the webtask (`AUTH0_CLIENT_ID`, `EXT_STORAGE_URL`, ...)
    pub secrets: HashMap<String, String>,

    /// Storage helpers; unavailable until an adapter attaches them
    pub storage: Storage,

    /// Identity claims of the authenticated caller
    pub user: Option<Value>,

    /// Token that authenticated the caller, or the token issued at login
    pub access_token: Option<String>,
}

impl WebtaskContext {
    pub fn new(secrets: HashMap<String, String>) -> Self {
        Self {
            secrets,
            ..Default::default()
        }
    }

    /// Look up a secret, treating empty values as unset
    pub fn secret(&self, name: &str) -> Option<&str> {
        self.secrets
            .get(name)
            .map(String::as_str)
            .filter(|value| !value.is_empty())
    }
}

/// URL convention the platform used to route the request to the webtask
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(try_from = "String")]
pub enum UrlFormat {
    /// `/api/run/{container}/{jtn}`
    #[default]
    SharedDomain,
    /// `/{container}/{jtn}`
    CustomDomain,
    /// `{container}.host/{jtn}`
    WildcardDomain,
}

impl UrlFormat {
    pub fn as_str(&self) -> &'static str {
        match self {
            UrlFormat::SharedDomain => "shared-domain",
            UrlFormat::CustomDomain => "custom-domain",
            UrlFormat::WildcardDomain => "wildcard-domain",
        }
    }
}

impl fmt::Display for UrlFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for UrlFormat {
    type Err = WebtaskError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value {
            "shared-domain" => Ok(UrlFormat::SharedDomain),
            "custom-domain" => Ok(UrlFormat::CustomDomain),
            "wildcard-domain" => Ok(UrlFormat::WildcardDomain),
            other => Err(WebtaskError::config(format!(
                "Unsupported url_format \"{}\" in webtask claims",
                other
            ))),
        }
    }
}

impl TryFrom<String> for UrlFormat {
    type Error = WebtaskError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

/// Decoded `x_wt` token claims identifying the webtask; inserted into request
/// extensions by the host.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct WebtaskClaims {
    pub container: String,

    #[serde(default)]
    pub jtn: Option<String>,

    #[serde(default)]
    pub url_format: UrlFormat,
}

impl WebtaskClaims {
    pub fn new(container: impl Into<String>, jtn: Option<&str>, url_format: UrlFormat) -> Self {
        Self {
            container: container.into(),
            jtn: jtn.map(str::to_string),
            url_format,
        }
    }

    /// Named webtasks carry both a container and a job/task name
    pub fn is_named(&self) -> bool {
        !self.container.is_empty() && self.jtn.as_deref().is_some_and(|jtn| !jtn.is_empty())
    }
}
