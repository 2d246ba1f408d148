//! A file-backed cache store.
//!
//! Each namespace is one json object file, `{dir}/{namespace}.json`,
//! mapping fingerprints to [CacheEntry] values. Every mutation rewrites the
//! whole file through a temporary sibling, so a reader never observes a
//! partially written file.

use crate::common::*;
use rpc_cache_api::{config::*, *};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::sync::Mutex;


type FileCacheMap = BTreeMap<Fingerprint, CacheEntry>;

/// A factory for creating [FileCacheStore] instances rooted in one
/// directory.
#[derive(Debug)]
pub struct FileCacheStoreFactory {
    dir: PathBuf,
    // serializes read-modify-write cycles of every store from this factory
    io_lock: Arc<Mutex<()>>,
}

impl FileCacheStoreFactory {
    /// Construct a new FileCacheStoreFactory storing files in `dir`.
    /// The directory is created on first use.
    pub fn create(dir: impl Into<PathBuf>) -> DynCacheStoreFactory {
        let out: DynCacheStoreFactory = Arc::new(Self {
            dir: dir.into(),
            io_lock: Arc::new(Mutex::new(())),
        });
        out
    }
}

impl CacheStoreFactory for FileCacheStoreFactory {
    fn default_config(&self, _config: &mut Config) -> CacheResult<()> {
        Ok(())
    }

    fn create(
        &self,
        _builder: Arc<builder::Builder>,
        namespace: String,
    ) -> BoxFut<'static, CacheResult<DynCacheStore>> {
        let dir = self.dir.clone();
        let io_lock = self.io_lock.clone();
        Box::pin(async move {
            let path = json_path(&dir, &namespace)?;
            tokio::fs::create_dir_all(&dir).await.map_err(|e| {
                CacheError::other_src(format!("create {}", dir.display()), e)
            })?;
            tracing::debug!(path = %path.display(), "opened file cache store");
            let out: DynCacheStore = Arc::new(FileCacheStore { path, io_lock });
            Ok(out)
        })
    }
}

/// A [CacheStore] persisted as a json file.
#[derive(Debug)]
pub struct FileCacheStore {
    path: PathBuf,
    io_lock: Arc<Mutex<()>>,
}

async fn load(path: &Path) -> CacheResult<FileCacheMap> {
    match read_optional(path).await? {
        None => Ok(FileCacheMap::new()),
        Some(data) => serde_json::from_str(&data).map_err(|e| {
            CacheError::serialization_src(
                format!("cache file {}", path.display()),
                e,
            )
        }),
    }
}

async fn save(path: &Path, map: &FileCacheMap) -> CacheResult<()> {
    let data = serde_json::to_string(map)
        .map_err(|e| CacheError::serialization_src("cache file", e))?;
    write_replace(path, data).await
}

impl FileCacheStore {
    async fn modify<F>(&self, f: F) -> CacheResult<()>
    where
        F: FnOnce(&mut FileCacheMap) -> bool + Send,
    {
        let _g = self.io_lock.lock().await;
        let mut map = load(&self.path).await?;
        if f(&mut map) {
            save(&self.path, &map).await?;
        }
        Ok(())
    }
}

impl CacheStore for FileCacheStore {
    fn get(
        &self,
        key: Fingerprint,
    ) -> BoxFut<'_, CacheResult<Option<CacheEntry>>> {
        Box::pin(async move {
            let _g = self.io_lock.lock().await;
            Ok(load(&self.path).await?.remove(&key))
        })
    }

    fn set(
        &self,
        key: Fingerprint,
        entry: CacheEntry,
    ) -> BoxFut<'_, CacheResult<()>> {
        Box::pin(async move {
            self.modify(move |map| {
                map.insert(key, entry);
                true
            })
            .await
        })
    }

    fn iterate<'a>(
        &'a self,
        visit: CacheVisitor<'a>,
    ) -> BoxFut<'a, CacheResult<()>> {
        Box::pin(async move {
            let map = {
                let _g = self.io_lock.lock().await;
                load(&self.path).await?
            };
            for (key, entry) in map.iter() {
                visit(key, entry);
            }
            Ok(())
        })
    }

    fn remove(&self, key: Fingerprint) -> BoxFut<'_, CacheResult<()>> {
        Box::pin(async move {
            self.modify(move |map| map.remove(&key).is_some()).await
        })
    }

    fn clear(&self) -> BoxFut<'_, CacheResult<()>> {
        Box::pin(async move {
            self.modify(|map| {
                let had = !map.is_empty();
                map.clear();
                had
            })
            .await
        })
    }
}
