//! Model archive stage: fetch the gzipped tarball and unpack it
//!
//! Both the archive file and the unpacked tree are keyed by the agent's
//! metadata hash, so later stages never need to re-derive the model locator.

use crate::registry;
use crate::resolver::metadata;
use crate::storage::{CacheStore, ContentStoreClient};
use anyhow::Context;
use flate2::read::GzDecoder;
use log::debug;
use std::fs;
use std::path::{Path, PathBuf};

/// Make sure the unpacked model tree for `hash` exists and return its path.
///
/// Walks back through the caches as far as needed: tree, then archive, then
/// metadata, fetching from the content store only for what is missing.
pub async fn ensure_unpacked(
    cache: &CacheStore,
    store: &ContentStoreClient,
    hash: &str,
) -> anyhow::Result<PathBuf> {
    let tree = cache.tree_path(hash);
    if tree.exists() {
        debug!("model tree cache hit for {}", hash);
        return Ok(tree);
    }

    let archive_path = cache.archive_path(hash);
    let archive = if archive_path.exists() {
        debug!("model archive cache hit for {}", hash);
        fs::read(&archive_path)
            .with_context(|| format!("reading cached archive {}", archive_path.display()))?
    } else {
        let metadata = metadata::ensure_metadata(cache, store, hash).await?;
        let locator = metadata::model_locator(&metadata)
            .with_context(|| format!("resolving model locator for {hash}"))?;
        let model_hash = registry::hash_from_locator(&locator);
        let bytes = store.fetch(model_hash).await?;
        CacheStore::write_atomic(&archive_path, &bytes)?;
        bytes
    };

    unpack(&archive, &tree).with_context(|| format!("unpacking model archive for {hash}"))?;
    Ok(tree)
}

/// Gunzip and untar `archive` into a fresh directory at `tree`.
///
/// Extraction happens in a staging directory that is renamed into place only
/// once every entry has been written, so `tree` never exists half-built.
fn unpack(archive: &[u8], tree: &Path) -> anyhow::Result<()> {
    let staging = CacheStore::staging_path(tree);
    if staging.exists() {
        fs::remove_dir_all(&staging)
            .with_context(|| format!("clearing stale staging dir {}", staging.display()))?;
    }
    fs::create_dir_all(&staging)
        .with_context(|| format!("creating staging dir {}", staging.display()))?;

    let mut tarball = tar::Archive::new(GzDecoder::new(archive));
    tarball
        .unpack(&staging)
        .context("archive is not a readable gzipped tarball")?;

    CacheStore::promote(&staging, tree)?;
    Ok(())
}
