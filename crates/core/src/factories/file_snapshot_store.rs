//! A file-backed snapshot store.
//!
//! Each key is stored as `{dir}/{key}.json`. Access is blocking, matching
//! the synchronous [SnapshotStore] contract.

use crate::common::*;
use rpc_cache_api::{config::*, *};
use std::path::PathBuf;
use std::sync::{Arc, Mutex};


/// A factory for creating [FileSnapshotStore] instances rooted in one
/// directory.
#[derive(Debug)]
pub struct FileSnapshotStoreFactory {
    dir: PathBuf,
    io_lock: Arc<Mutex<()>>,
}

impl FileSnapshotStoreFactory {
    /// Construct a new FileSnapshotStoreFactory storing files in `dir`.
    pub fn create(dir: impl Into<PathBuf>) -> DynSnapshotStoreFactory {
        let out: DynSnapshotStoreFactory = Arc::new(Self {
            dir: dir.into(),
            io_lock: Arc::new(Mutex::new(())),
        });
        out
    }
}

impl SnapshotStoreFactory for FileSnapshotStoreFactory {
    fn default_config(&self, _config: &mut Config) -> CacheResult<()> {
        Ok(())
    }

    fn create(
        &self,
        _builder: Arc<builder::Builder>,
    ) -> BoxFut<'static, CacheResult<DynSnapshotStore>> {
        let dir = self.dir.clone();
        let io_lock = self.io_lock.clone();
        Box::pin(async move {
            std::fs::create_dir_all(&dir).map_err(|e| {
                CacheError::other_src(format!("create {}", dir.display()), e)
            })?;
            let out: DynSnapshotStore =
                Arc::new(FileSnapshotStore { dir, io_lock });
            Ok(out)
        })
    }
}

/// A [SnapshotStore] persisted as one file per key.
///
/// Reads and writes block the calling thread and may run while the request
/// cache holds its state lock. Snapshots are a few fingerprints, so keep
/// `dir` on a local filesystem where that I/O stays small and fast.
#[derive(Debug)]
pub struct FileSnapshotStore {
    dir: PathBuf,
    io_lock: Arc<Mutex<()>>,
}

impl SnapshotStore for FileSnapshotStore {
    fn get(&self, key: &str) -> CacheResult<Option<String>> {
        let path = json_path(&self.dir, key)?;
        let _g = self.io_lock.lock().unwrap_or_else(|p| p.into_inner());
        read_optional_sync(&path)
    }

    fn set(&self, key: &str, value: String) -> CacheResult<()> {
        let path = json_path(&self.dir, key)?;
        let _g = self.io_lock.lock().unwrap_or_else(|p| p.into_inner());
        write_replace_sync(&path, value)
    }
}
