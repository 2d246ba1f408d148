//! The in-memory cache store provided by rpc_cache.

use rpc_cache_api::{config::*, *};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::Mutex;

#[cfg(test)]
mod test;

type MemCacheInner = HashMap<String, HashMap<Fingerprint, CacheEntry>>;

/// A factory for creating [MemCacheStore] instances.
///
/// Every store created from one factory instance sees the same data for
/// the same namespace, the way the contexts of one origin share a
/// persistent store.
#[derive(Debug)]
pub struct MemCacheStoreFactory {
    inner: Arc<Mutex<MemCacheInner>>,
}

impl MemCacheStoreFactory {
    /// Construct a new MemCacheStoreFactory with empty shared state.
    pub fn create() -> DynCacheStoreFactory {
        let out: DynCacheStoreFactory = Arc::new(Self {
            inner: Arc::new(Mutex::new(HashMap::new())),
        });
        out
    }
}

impl CacheStoreFactory for MemCacheStoreFactory {
    fn default_config(&self, _config: &mut Config) -> CacheResult<()> {
        Ok(())
    }

    fn create(
        &self,
        _builder: Arc<builder::Builder>,
        namespace: String,
    ) -> BoxFut<'static, CacheResult<DynCacheStore>> {
        let inner = self.inner.clone();
        Box::pin(async move {
            let out: DynCacheStore =
                Arc::new(MemCacheStore { inner, namespace });
            Ok(out)
        })
    }
}

/// An in-memory implementation of the [CacheStore].
///
/// This is useful for testing, but cached results are supposed to be
/// persistent in a real deployment.
#[derive(Debug)]
pub struct MemCacheStore {
    inner: Arc<Mutex<MemCacheInner>>,
    namespace: String,
}

impl CacheStore for MemCacheStore {
    fn get(
        &self,
        key: Fingerprint,
    ) -> BoxFut<'_, CacheResult<Option<CacheEntry>>> {
        Box::pin(async move {
            let inner = self.inner.lock().await;
            Ok(inner
                .get(&self.namespace)
                .and_then(|ns| ns.get(&key).cloned()))
        })
    }

    fn set(
        &self,
        key: Fingerprint,
        entry: CacheEntry,
    ) -> BoxFut<'_, CacheResult<()>> {
        Box::pin(async move {
            let mut inner = self.inner.lock().await;
            inner
                .entry(self.namespace.clone())
                .or_default()
                .insert(key, entry);
            Ok(())
        })
    }

    fn iterate<'a>(
        &'a self,
        visit: CacheVisitor<'a>,
    ) -> BoxFut<'a, CacheResult<()>> {
        Box::pin(async move {
            let inner = self.inner.lock().await;
            if let Some(ns) = inner.get(&self.namespace) {
                for (key, entry) in ns {
                    visit(key, entry);
                }
            }
            Ok(())
        })
    }

    fn remove(&self, key: Fingerprint) -> BoxFut<'_, CacheResult<()>> {
        Box::pin(async move {
            let mut inner = self.inner.lock().await;
            if let Some(ns) = inner.get_mut(&self.namespace) {
                ns.remove(&key);
            }
            Ok(())
        })
    }

    fn clear(&self) -> BoxFut<'_, CacheResult<()>> {
        Box::pin(async move {
            self.inner.lock().await.remove(&self.namespace);
            Ok(())
        })
    }
}
