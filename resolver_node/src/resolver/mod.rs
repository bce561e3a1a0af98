//! Resolution pipeline
//!
//! `Resolver` owns everything a request needs once a content hash is known:
//! the disk cache, the content-store client, the in-memory service-name
//! cache and the per-hash in-flight locks. One instance is built at startup
//! and shared across handlers behind an `Arc`.

use crate::api::errors::Result;
use crate::storage::{self, CacheStore, ContentStoreClient};
use anyhow::{anyhow, Context};
use log::debug;
use std::collections::HashMap;
use std::fs;
use std::path::Path;
use std::sync::Arc;
use tokio::sync::{Mutex, OwnedMutexGuard, RwLock};

pub mod archive;
pub mod compile;
pub mod discovery;
pub mod metadata;

/// Per-hash mutual exclusion for pipeline runs.
///
/// Entries are never removed; hashes are content-derived, so the map grows
/// with the set of distinct models seen, like the disk caches do.
struct InflightLocks {
    inflight: Mutex<HashMap<String, Arc<Mutex<()>>>>,
}

impl InflightLocks {
    fn new() -> Self {
        Self {
            inflight: Mutex::new(HashMap::new()),
        }
    }

    async fn acquire(&self, key: &str) -> OwnedMutexGuard<()> {
        let lock = {
            let mut inflight = self.inflight.lock().await;
            Arc::clone(
                inflight
                    .entry(key.to_string())
                    .or_insert_with(|| Arc::new(Mutex::new(()))),
            )
        };
        lock.lock_owned().await
    }
}

/// Pipeline context shared by all requests.
pub struct Resolver {
    cache: CacheStore,
    store: ContentStoreClient,
    service_names: RwLock<HashMap<String, String>>,
    inflight: InflightLocks,
}

impl Resolver {
    pub fn new(cache: CacheStore, store: ContentStoreClient) -> Self {
        Self {
            cache,
            store,
            service_names: RwLock::new(HashMap::new()),
            inflight: InflightLocks::new(),
        }
    }

    /// Resolve `hash` to its compiled interface descriptor.
    ///
    /// The compiled artifact is the terminal cache: when it exists no other
    /// stage runs. Otherwise the stages execute in order behind the per-hash
    /// lock, each consulting its own cache, so concurrent requests for one
    /// hash do the work once while distinct hashes proceed in parallel.
    pub async fn resolve(&self, hash: &str) -> Result<Vec<u8>> {
        if !storage::is_safe_key(hash) {
            return Err(anyhow!("content hash {:?} is not usable as a cache key", hash).into());
        }

        let compiled = self.cache.compiled_path(hash);
        if compiled.exists() {
            debug!("compiled descriptor cache hit for {}", hash);
            return Ok(read_compiled(&compiled)?);
        }

        let _guard = self.inflight.acquire(hash).await;
        if compiled.exists() {
            debug!("compiled descriptor appeared while waiting on {}", hash);
            return Ok(read_compiled(&compiled)?);
        }

        let tree = archive::ensure_unpacked(&self.cache, &self.store, hash).await?;
        let service = self.service_name(hash, &tree).await?;
        let bytes = compile::ensure_compiled(&self.cache, &tree, &service, hash)?;
        Ok(bytes)
    }

    async fn service_name(&self, hash: &str, tree: &Path) -> Result<String> {
        if let Some(name) = self.service_names.read().await.get(hash) {
            debug!("service name cache hit for {}", hash);
            return Ok(name.clone());
        }
        let name = discovery::discover_service_name(tree)?;
        self.service_names
            .write()
            .await
            .insert(hash.to_string(), name.clone());
        Ok(name)
    }
}

fn read_compiled(path: &Path) -> anyhow::Result<Vec<u8>> {
    fs::read(path).with_context(|| format!("reading compiled descriptor {}", path.display()))
}
