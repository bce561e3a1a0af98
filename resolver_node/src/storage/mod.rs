//! Disk-backed artifact cache
//!
//! Every pipeline stage persists its output under one of four directories
//! keyed by content hash, so a restart never repeats completed work:
//!
//!   metadata/   raw agent metadata JSON, as fetched
//!   archives/   model archives (gzipped tarballs), as fetched
//!   trees/      unpacked model archives
//!   compiled/   interface descriptors, JSON-encoded
//!
//! Writes go through a staging path (`<target>.partial`) and a rename, so
//! an existence check never observes a half-written artifact.

use anyhow::Context;
use log::debug;
use std::fs;
use std::path::{Path, PathBuf};

pub mod content_store;

pub use content_store::ContentStoreClient;

/// Filesystem cache rooted at the configured cache directory.
#[derive(Debug, Clone)]
pub struct CacheStore {
    root: PathBuf,
}

impl CacheStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Create the four artifact directories if they are missing.
    pub fn ensure_layout(&self) -> anyhow::Result<()> {
        for dir in ["metadata", "archives", "trees", "compiled"] {
            let path = self.root.join(dir);
            if !path.exists() {
                fs::create_dir_all(&path)
                    .with_context(|| format!("creating cache directory {}", path.display()))?;
            }
        }
        debug!("cache layout ready at {}", self.root.display());
        Ok(())
    }

    pub fn metadata_path(&self, hash: &str) -> PathBuf {
        self.root.join("metadata").join(hash)
    }

    pub fn archive_path(&self, hash: &str) -> PathBuf {
        self.root.join("archives").join(hash)
    }

    pub fn tree_path(&self, hash: &str) -> PathBuf {
        self.root.join("trees").join(hash)
    }

    pub fn compiled_path(&self, hash: &str) -> PathBuf {
        self.root.join("compiled").join(hash)
    }

    /// Staging sibling for an in-progress write of `target`.
    pub fn staging_path(target: &Path) -> PathBuf {
        let mut name = target.as_os_str().to_os_string();
        name.push(".partial");
        PathBuf::from(name)
    }

    /// Write `bytes` to `target` so that `target` either does not exist or
    /// holds the complete content.
    pub fn write_atomic(target: &Path, bytes: &[u8]) -> anyhow::Result<()> {
        let staging = Self::staging_path(target);
        fs::write(&staging, bytes)
            .with_context(|| format!("writing {}", staging.display()))?;
        fs::rename(&staging, target)
            .with_context(|| format!("committing {}", target.display()))?;
        Ok(())
    }

    /// Publish a fully-built staging directory or file at its final path.
    pub fn promote(staging: &Path, target: &Path) -> anyhow::Result<()> {
        fs::rename(staging, target)
            .with_context(|| format!("committing {}", target.display()))?;
        Ok(())
    }
}

/// Whether `hash` is usable as a cache file name.
///
/// Content hashes arrive inside locators fetched from the chain; anything
/// other than plain alphanumeric text could escape the cache directories.
pub fn is_safe_key(hash: &str) -> bool {
    !hash.is_empty() && hash.bytes().all(|b| b.is_ascii_alphanumeric())
}
