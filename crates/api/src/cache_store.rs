//! Cache-store related types.

use crate::{builder::Builder, config::Config, *};
use std::sync::Arc;

/// A cached fetch result along with its expiry.
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CacheEntry {
    /// The successful result of the fetch.
    pub result: serde_json::Value,

    /// The entry is valid strictly before this instant.
    pub expires_at: Timestamp,
}

impl CacheEntry {
    /// Construct a new cache entry.
    pub fn new(result: serde_json::Value, expires_at: Timestamp) -> Self {
        Self { result, expires_at }
    }

    /// Is this entry still usable at `now`?
    pub fn is_valid_at(&self, now: Timestamp) -> bool {
        self.expires_at > now
    }
}

/// Callback handed to [CacheStore::iterate].
pub type CacheVisitor<'a> =
    &'a mut (dyn FnMut(&Fingerprint, &CacheEntry) + Send);

/// Represents the ability to persist cached results.
///
/// The store is assumed durable but not transactional. Concurrent writers
/// (e.g. two contexts settling the same fingerprint) resolve as
/// last-write-wins.
pub trait CacheStore: 'static + Send + Sync + std::fmt::Debug {
    /// Get an entry, whether or not it has expired.
    fn get(
        &self,
        key: Fingerprint,
    ) -> BoxFut<'_, CacheResult<Option<CacheEntry>>>;

    /// Insert or overwrite an entry.
    fn set(
        &self,
        key: Fingerprint,
        entry: CacheEntry,
    ) -> BoxFut<'_, CacheResult<()>>;

    /// Visit every entry in the store.
    fn iterate<'a>(
        &'a self,
        visit: CacheVisitor<'a>,
    ) -> BoxFut<'a, CacheResult<()>>;

    /// Remove an entry. Removing a missing key is not an error.
    fn remove(&self, key: Fingerprint) -> BoxFut<'_, CacheResult<()>>;

    /// Remove every entry.
    fn clear(&self) -> BoxFut<'_, CacheResult<()>>;
}

/// Trait-object [CacheStore].
pub type DynCacheStore = Arc<dyn CacheStore>;

/// A factory for constructing [CacheStore] instances.
pub trait CacheStoreFactory: 'static + Send + Sync + std::fmt::Debug {
    /// Help the builder construct a default config from the chosen
    /// module factories.
    fn default_config(&self, config: &mut Config) -> CacheResult<()>;

    /// Construct a cache store instance for the given namespace.
    fn create(
        &self,
        builder: Arc<Builder>,
        namespace: String,
    ) -> BoxFut<'static, CacheResult<DynCacheStore>>;
}

/// Trait-object [CacheStoreFactory].
pub type DynCacheStoreFactory = Arc<dyn CacheStoreFactory>;
