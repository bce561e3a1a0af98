//! Service configuration
//!
//! Settings come from an optional TOML file overridden by
//! `AGENT_RESOLVER`-prefixed environment variables. A missing file means
//! defaults; a file that exists but cannot be parsed aborts startup.

use anyhow::{bail, Context};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use url::Url;

#[derive(Debug, Clone, Default, Deserialize)]
pub struct Settings {
    #[serde(default)]
    pub server: ServerSettings,
    #[serde(default)]
    pub chain: ChainSettings,
    #[serde(default)]
    pub content_store: ContentStoreSettings,
    #[serde(default)]
    pub storage: StorageSettings,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ServerSettings {
    #[serde(default = "default_port")]
    pub port: u16,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ChainSettings {
    /// Explicit JSON-RPC endpoint; wins over `network` + `api_key`.
    pub rpc_endpoint: Option<String>,
    pub network: Option<String>,
    pub api_key: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ContentStoreSettings {
    #[serde(default = "default_store_endpoint")]
    pub endpoint: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct StorageSettings {
    #[serde(default = "default_cache_dir")]
    pub cache_dir: PathBuf,
}

impl Default for ServerSettings {
    fn default() -> Self {
        Self {
            port: default_port(),
        }
    }
}

impl Default for ContentStoreSettings {
    fn default() -> Self {
        Self {
            endpoint: default_store_endpoint(),
        }
    }
}

impl Default for StorageSettings {
    fn default() -> Self {
        Self {
            cache_dir: default_cache_dir(),
        }
    }
}

fn default_port() -> u16 {
    7000
}

fn default_store_endpoint() -> String {
    "http://localhost:5001".to_string()
}

fn default_cache_dir() -> PathBuf {
    PathBuf::from("cache")
}

impl Settings {
    pub fn load(config_path: &Path) -> anyhow::Result<Self> {
        let loaded = config::Config::builder()
            .add_source(config::File::from(config_path).required(false))
            .add_source(config::Environment::with_prefix("AGENT_RESOLVER").separator("__"))
            .build()
            .with_context(|| format!("loading configuration from {}", config_path.display()))?;
        loaded
            .try_deserialize()
            .context("configuration does not match the expected schema")
    }

    /// JSON-RPC endpoint for the registry chain.
    ///
    /// Either configured directly or composed from a hosted-provider network
    /// name and API key. Having neither is a startup failure.
    pub fn chain_endpoint(&self) -> anyhow::Result<String> {
        if let Some(endpoint) = &self.chain.rpc_endpoint {
            return Ok(endpoint.clone());
        }
        match (&self.chain.network, &self.chain.api_key) {
            (Some(network), Some(key)) => Ok(format!("https://{network}.infura.io/v3/{key}")),
            _ => bail!("chain.rpc_endpoint or chain.network plus chain.api_key must be configured"),
        }
    }

    /// Content-store endpoint, validated to carry scheme, host and an
    /// explicit port.
    pub fn content_store_endpoint(&self) -> anyhow::Result<String> {
        let raw = &self.content_store.endpoint;
        let url = Url::parse(raw)
            .with_context(|| format!("content_store.endpoint {raw:?} is not a valid URL"))?;
        if !matches!(url.scheme(), "http" | "https") {
            bail!("content_store.endpoint {raw:?} must use http or https");
        }
        if url.host_str().is_none() {
            bail!("content_store.endpoint {raw:?} is missing a hostname");
        }
        if url.port().is_none() {
            bail!("content_store.endpoint {raw:?} must name an explicit port");
        }
        Ok(raw.clone())
    }
}
