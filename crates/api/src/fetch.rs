//! Fetch capability types.
//!
//! The cache never performs network access itself. Callers hand it a
//! [Fetcher] which is invoked at most once per cache miss.

use crate::*;
use std::sync::Arc;

/// The ability to retrieve a result for a locator and payload.
pub trait Fetcher: 'static + Send + Sync {
    /// Perform the request.
    fn fetch(
        &self,
        locator: String,
        payload: Option<serde_json::Value>,
    ) -> BoxFut<'_, CacheResult<serde_json::Value>>;
}

/// Trait-object [Fetcher].
pub type DynFetcher = Arc<dyn Fetcher>;

struct FnFetcher<F, T> {
    f: F,
    _p: std::marker::PhantomData<fn() -> T>,
}

impl<F, Fut, T> Fetcher for FnFetcher<F, T>
where
    F: Fn(String, Option<serde_json::Value>) -> Fut + 'static + Send + Sync,
    Fut: std::future::Future<Output = CacheResult<T>> + 'static + Send,
    T: serde::Serialize + 'static,
{
    fn fetch(
        &self,
        locator: String,
        payload: Option<serde_json::Value>,
    ) -> BoxFut<'_, CacheResult<serde_json::Value>> {
        let fut = (self.f)(locator, payload);
        Box::pin(async move {
            let out = fut.await?;
            serde_json::to_value(out)
                .map_err(|e| CacheError::serialization_src("fetch result", e))
        })
    }
}

/// Turn an async closure into a [DynFetcher].
///
/// ```
/// # use rpc_cache_api::*;
/// let fetcher = fetch_fn(|locator, _payload| async move {
///     CacheResult::Ok(format!("fetched {locator}"))
/// });
/// # let _ = fetcher;
/// ```
pub fn fetch_fn<F, Fut, T>(f: F) -> DynFetcher
where
    F: Fn(String, Option<serde_json::Value>) -> Fut + 'static + Send + Sync,
    Fut: std::future::Future<Output = CacheResult<T>> + 'static + Send,
    T: serde::Serialize + 'static,
{
    Arc::new(FnFetcher {
        f,
        _p: std::marker::PhantomData,
    })
}
