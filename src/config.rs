use figment::{
    Figment,
    providers::{Env, Format, Serialized, Toml},
};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::net::SocketAddr;
use std::path::Path;

use crate::context::{WebtaskClaims, WebtaskContext};
use crate::error::WebtaskError;

pub const DEFAULT_CONFIG_FILE: &str = "webtask.toml";

/// Configuration of the local webtask host
#[derive(Debug, Clone, Deserialize)]
pub struct HostConfig {
    pub host: String,
    pub port: u16,

    /// Claims inserted into every request, as the platform would
    pub claims: WebtaskClaims,

    /// Secrets exposed through the webtask context; keys are upper case
    #[serde(default)]
    pub secrets: HashMap<String, String>,
}

#[derive(Serialize)]
struct Defaults {
    host: &'static str,
    port: u16,
}

impl Default for Defaults {
    fn default() -> Self {
        Self {
            host: "0.0.0.0",
            port: 8080,
        }
    }
}

impl HostConfig {
    /// Load from `path` (or `webtask.toml`) merged with `WEBTASK_`-prefixed
    /// environment variables; `__` separates nested keys.
    pub fn load(path: Option<&Path>) -> Result<Self, WebtaskError> {
        let file = path.unwrap_or_else(|| Path::new(DEFAULT_CONFIG_FILE));
        Self::from_figment(
            Figment::from(Serialized::defaults(Defaults::default()))
                .merge(Toml::file(file))
                .merge(Env::prefixed("WEBTASK_").split("__")),
        )
    }

    pub fn from_figment(figment: Figment) -> Result<Self, WebtaskError> {
        let mut config: HostConfig = figment
            .extract()
            .map_err(|e| WebtaskError::config(format!("Invalid host configuration: {}", e)))?;

        config.secrets = config
            .secrets
            .into_iter()
            .map(|(key, value)| (key.to_uppercase(), value))
            .collect();
        Ok(config)
    }

    pub fn server_addr(&self) -> Result<SocketAddr, WebtaskError> {
        format!("{}:{}", self.host, self.port)
            .parse()
            .map_err(|e| WebtaskError::config(format!("Invalid listen address: {}", e)))
    }

    /// Fresh context for one invocation
    pub fn context(&self) -> WebtaskContext {
        WebtaskContext::new(self.secrets.clone())
    }
}
