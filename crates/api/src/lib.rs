#![deny(missing_docs)]
//! rpc_cache API contains the capability traits and the basic types
//! required to deduplicate and cache requests across several independently
//! running execution contexts of one application.
//!
//! The contexts share no memory. They coordinate through a persistent
//! [CacheStore], a small synchronous [SnapshotStore] and a named
//! [BroadcastChannel]. The [RequestCache] trait is the public entry point.
//!
//! If you want working implementations, please see the rpc_cache_core crate.

/// Boxed future type.
pub type BoxFut<'a, T> =
    std::pin::Pin<Box<dyn std::future::Future<Output = T> + Send + 'a>>;

pub mod builder;
pub mod config;

mod error;
pub use error::*;

pub mod fingerprint;
pub use fingerprint::Fingerprint;

mod timestamp;
pub use timestamp::*;

pub mod cache_store;
pub use cache_store::*;

pub mod snapshot_store;
pub use snapshot_store::*;

pub mod broadcast;
pub use broadcast::*;

pub mod fetch;
pub use fetch::*;

pub mod request_cache;
pub use request_cache::*;
