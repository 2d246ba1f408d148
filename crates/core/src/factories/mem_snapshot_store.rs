//! The in-memory snapshot store provided by rpc_cache.

use rpc_cache_api::{config::*, *};
use std::collections::HashMap;
use std::sync::{Arc, Mutex};


type MemSnapshotInner = Arc<Mutex<HashMap<String, String>>>;

/// A factory for creating [MemSnapshotStore] instances.
///
/// Stores created from one factory share their keys.
#[derive(Debug)]
pub struct MemSnapshotStoreFactory {
    inner: MemSnapshotInner,
}

impl MemSnapshotStoreFactory {
    /// Construct a new MemSnapshotStoreFactory with empty shared state.
    pub fn create() -> DynSnapshotStoreFactory {
        let out: DynSnapshotStoreFactory = Arc::new(Self {
            inner: Arc::new(Mutex::new(HashMap::new())),
        });
        out
    }
}

impl SnapshotStoreFactory for MemSnapshotStoreFactory {
    fn default_config(&self, _config: &mut Config) -> CacheResult<()> {
        Ok(())
    }

    fn create(
        &self,
        _builder: Arc<builder::Builder>,
    ) -> BoxFut<'static, CacheResult<DynSnapshotStore>> {
        let inner = self.inner.clone();
        Box::pin(async move {
            let out: DynSnapshotStore = Arc::new(MemSnapshotStore { inner });
            Ok(out)
        })
    }
}

/// An in-memory implementation of the [SnapshotStore].
#[derive(Debug)]
pub struct MemSnapshotStore {
    inner: MemSnapshotInner,
}

impl MemSnapshotStore {
    fn lock(&self) -> std::sync::MutexGuard<'_, HashMap<String, String>> {
        self.inner.lock().unwrap_or_else(|p| p.into_inner())
    }
}

impl SnapshotStore for MemSnapshotStore {
    fn get(&self, key: &str) -> CacheResult<Option<String>> {
        Ok(self.lock().get(key).cloned())
    }

    fn set(&self, key: &str, value: String) -> CacheResult<()> {
        self.lock().insert(key.to_string(), value);
        Ok(())
    }
}
