//! Agent metadata stage: fetch, cache and read the metadata document

use crate::storage::{CacheStore, ContentStoreClient};
use anyhow::Context;
use log::debug;
use serde::Deserialize;
use std::fs;

/// The slice of an agent metadata document the resolver cares about. All
/// other fields pass through the cache untouched.
#[derive(Debug, Deserialize)]
pub struct AgentMetadata {
    #[serde(rename = "modelURI")]
    pub model_uri: String,
}

/// Return the metadata document stored under `hash`, fetching it from the
/// content store on first sight and persisting it verbatim.
pub async fn ensure_metadata(
    cache: &CacheStore,
    store: &ContentStoreClient,
    hash: &str,
) -> anyhow::Result<Vec<u8>> {
    let path = cache.metadata_path(hash);
    if path.exists() {
        debug!("metadata cache hit for {}", hash);
        return fs::read(&path)
            .with_context(|| format!("reading cached metadata {}", path.display()));
    }
    let bytes = store.fetch(hash).await?;
    CacheStore::write_atomic(&path, &bytes)?;
    Ok(bytes)
}

/// Extract the model archive locator from a metadata document.
pub fn model_locator(metadata: &[u8]) -> anyhow::Result<String> {
    let parsed: AgentMetadata = serde_json::from_slice(metadata)
        .context("agent metadata is not a JSON document with a modelURI field")?;
    Ok(parsed.model_uri)
}
