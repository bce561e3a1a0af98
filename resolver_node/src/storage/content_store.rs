//! HTTP client for the content-addressed store

use anyhow::Context;
use log::debug;
use reqwest::Client;
use std::time::Duration;

/// Client for a content-addressed store exposing an IPFS-style gateway.
#[derive(Debug, Clone)]
pub struct ContentStoreClient {
    client: Client,
    endpoint: String,
}

impl ContentStoreClient {
    pub fn new(endpoint: &str) -> anyhow::Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(30))
            .build()
            .map_err(|e| anyhow::anyhow!(format!("Failed to create HTTP client: {e}")))?;

        Ok(Self {
            client,
            endpoint: endpoint.trim_end_matches('/').to_string(),
        })
    }

    fn object_url(&self, hash: &str) -> String {
        format!("{}/ipfs/{}", self.endpoint, hash)
    }

    /// Fetch the object stored under `hash`, returning its raw bytes.
    ///
    /// Any failure (unreachable store, non-success status, truncated body)
    /// is an internal error; a hash the store cannot serve does not mean the
    /// agent does not exist.
    pub async fn fetch(&self, hash: &str) -> anyhow::Result<Vec<u8>> {
        let url = self.object_url(hash);
        let response = self
            .client
            .get(&url)
            .send()
            .await
            .with_context(|| format!("content store request failed: {url}"))?;

        let status = response.status();
        if !status.is_success() {
            anyhow::bail!("content store returned {status} for {url}");
        }

        let bytes = response
            .bytes()
            .await
            .with_context(|| format!("reading content store body for {hash}"))?;
        debug!("fetched {} from content store ({} bytes)", hash, bytes.len());
        Ok(bytes.to_vec())
    }
}
