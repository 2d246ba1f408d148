//! Snapshot-store related types.

use crate::{builder::Builder, config::Config, *};
use std::sync::Arc;

/// A small synchronous key-value store of serialized blobs.
///
/// Used to persist which fingerprints are in flight so that a reloaded
/// context can pick up waiting where it left off. Writes must be visible
/// to a subsequent [SnapshotStore::get] as soon as `set` returns.
pub trait SnapshotStore: 'static + Send + Sync + std::fmt::Debug {
    /// Read the blob stored under `key`.
    fn get(&self, key: &str) -> CacheResult<Option<String>>;

    /// Overwrite the blob stored under `key`.
    fn set(&self, key: &str, value: String) -> CacheResult<()>;
}

/// Trait-object [SnapshotStore].
pub type DynSnapshotStore = Arc<dyn SnapshotStore>;

/// A factory for constructing [SnapshotStore] instances.
pub trait SnapshotStoreFactory: 'static + Send + Sync + std::fmt::Debug {
    /// Help the builder construct a default config from the chosen
    /// module factories.
    fn default_config(&self, config: &mut Config) -> CacheResult<()>;

    /// Construct a snapshot store instance.
    fn create(
        &self,
        builder: Arc<Builder>,
    ) -> BoxFut<'static, CacheResult<DynSnapshotStore>>;
}

/// Trait-object [SnapshotStoreFactory].
pub type DynSnapshotStoreFactory = Arc<dyn SnapshotStoreFactory>;
