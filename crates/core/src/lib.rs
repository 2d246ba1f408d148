#![deny(missing_docs)]
//! rpc_cache core and testing modules.
//!
//! Provides [factories::CoreRequestCacheFactory], the request cache
//! implementation, along with in-memory and file-backed implementations of
//! the stores and an in-process broadcast hub.

use rpc_cache_api::{builder::Builder, config::Config};
use std::path::PathBuf;

/// Construct a default builder backed entirely by memory.
///
/// - `cache_store` - The default cache store is
///   [factories::MemCacheStoreFactory].
/// - `snapshot_store` - The default snapshot store is
///   [factories::MemSnapshotStoreFactory].
/// - `broadcast` - The default broadcast is
///   [factories::MemBroadcastFactory].
/// - `request_cache` - The default request cache is
///   [factories::CoreRequestCacheFactory].
///
/// Every context opened from the built builder shares the same stores and
/// hub, so they act as several contexts of one application.
pub fn default_builder() -> Builder {
    Builder {
        config: Config::default(),
        cache_store: factories::MemCacheStoreFactory::create(),
        snapshot_store: factories::MemSnapshotStoreFactory::create(),
        broadcast: factories::MemBroadcastFactory::create(),
        request_cache: factories::CoreRequestCacheFactory::create(),
    }
}

/// Construct a builder whose stores persist under `dir`.
///
/// Both [factories::FileCacheStoreFactory] and
/// [factories::FileSnapshotStoreFactory] write into `dir`, so a builder
/// created later on the same directory sees the same data.
/// Broadcast stays in-process via [factories::MemBroadcastFactory].
pub fn file_builder(dir: impl Into<PathBuf>) -> Builder {
    let dir = dir.into();
    Builder {
        config: Config::default(),
        cache_store: factories::FileCacheStoreFactory::create(dir.clone()),
        snapshot_store: factories::FileSnapshotStoreFactory::create(dir),
        broadcast: factories::MemBroadcastFactory::create(),
        request_cache: factories::CoreRequestCacheFactory::create(),
    }
}

mod common;

pub mod factories;
