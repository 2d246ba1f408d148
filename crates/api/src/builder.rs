//! Builder-related types.

use crate::*;
use std::sync::Arc;

/// The general rpc_cache builder.
/// This contains both configuration and factory instances,
/// allowing construction of runtime module instances.
///
/// All contexts opened from one frozen builder share whatever state the
/// factories share, i.e. they behave like several contexts of one origin.
#[derive(Debug)]
pub struct Builder {
    /// The module configuration to be used when building modules.
    /// This can be loaded from disk or modified before freezing the builder.
    pub config: crate::config::Config,

    /// The [cache_store::CacheStoreFactory] to be used for creating
    /// [cache_store::CacheStore] instances.
    pub cache_store: cache_store::DynCacheStoreFactory,

    /// The [snapshot_store::SnapshotStoreFactory] to be used for creating
    /// [snapshot_store::SnapshotStore] instances.
    pub snapshot_store: snapshot_store::DynSnapshotStoreFactory,

    /// The [broadcast::BroadcastFactory] to be used for creating
    /// [broadcast::BroadcastChannel] instances.
    pub broadcast: broadcast::DynBroadcastFactory,

    /// The [request_cache::RequestCacheFactory] to be used for creating
    /// [request_cache::RequestCache] instances.
    pub request_cache: request_cache::DynRequestCacheFactory,
}

impl Builder {
    /// Construct a default config given the configured module factories.
    /// Note, this should be called before freezing the Builder instance
    /// in an Arc<>.
    pub fn set_default_config(&mut self) -> CacheResult<()> {
        let Self {
            config,
            cache_store,
            snapshot_store,
            broadcast,
            request_cache,
        } = self;

        cache_store.default_config(config)?;
        snapshot_store.default_config(config)?;
        broadcast.default_config(config)?;
        request_cache.default_config(config)?;

        Ok(())
    }

    /// Chainable form of [Builder::set_default_config].
    pub fn with_default_config(mut self) -> CacheResult<Self> {
        self.set_default_config()?;
        Ok(self)
    }

    /// Freeze this builder so it can be shared by the modules it creates.
    pub fn build(self) -> Arc<Self> {
        Arc::new(self)
    }

    /// Open a new execution context, i.e. construct a new
    /// [request_cache::RequestCache] from this builder.
    pub fn open_context(
        self: &Arc<Self>,
    ) -> BoxFut<'static, CacheResult<DynRequestCache>> {
        self.request_cache.create(self.clone())
    }
}
