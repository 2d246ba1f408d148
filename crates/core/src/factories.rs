//! Factories for generating instances of rpc_cache modules.

pub mod core_request_cache;
pub use core_request_cache::{CoreRequestCache, CoreRequestCacheFactory};

mod mem_cache_store;
pub use mem_cache_store::*;

mod file_cache_store;
pub use file_cache_store::*;

mod mem_snapshot_store;
pub use mem_snapshot_store::*;

mod file_snapshot_store;
pub use file_snapshot_store::*;

mod mem_broadcast;
pub use mem_broadcast::*;
