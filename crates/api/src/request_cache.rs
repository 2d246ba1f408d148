//! Request-cache related types.
//!
//! A [RequestCache] is one execution context. Several request caches built
//! from the same [Builder] coordinate through their shared stores and
//! broadcast channel so that, as far as possible, a logical request is
//! fetched once and then served from the cache.

use crate::{builder::Builder, config::Config, *};
use std::sync::Arc;
use std::time::Duration;

/// Options describing one logical request.
#[derive(Debug, Clone, PartialEq)]
pub struct RequestOptions {
    /// Where to fetch from. Passed through to the [Fetcher].
    pub locator: String,

    /// Lifetime of the cached result. `None` uses the configured default.
    pub expires: Option<Duration>,

    /// Request body. Passed through to the [Fetcher] and part of the
    /// fingerprint.
    pub payload: Option<serde_json::Value>,

    /// Extra fingerprint input for requests that would otherwise collide.
    pub disambiguator: Option<String>,

    /// When false, always fetch: skip the cache lookup and do not join
    /// requests in flight. The result is still cached.
    pub cache: bool,
}

impl RequestOptions {
    /// Options for a cached request to `locator`.
    pub fn new(locator: impl Into<String>) -> Self {
        Self {
            locator: locator.into(),
            expires: None,
            payload: None,
            disambiguator: None,
            cache: true,
        }
    }

    /// Set the request payload.
    pub fn with_payload(mut self, payload: serde_json::Value) -> Self {
        self.payload = Some(payload);
        self
    }

    /// Set an explicit cache lifetime.
    pub fn with_expires(mut self, expires: Duration) -> Self {
        self.expires = Some(expires);
        self
    }

    /// Set the fingerprint disambiguator.
    pub fn with_disambiguator(mut self, extra: impl Into<String>) -> Self {
        self.disambiguator = Some(extra.into());
        self
    }

    /// Bypass the cache lookup and dedup.
    pub fn without_cache(mut self) -> Self {
        self.cache = false;
        self
    }

    /// The fingerprint of the request these options describe.
    pub fn fingerprint(&self) -> CacheResult<Fingerprint> {
        Fingerprint::calculate(
            &self.locator,
            self.payload.as_ref(),
            self.disambiguator.as_deref().unwrap_or_default(),
        )
    }
}

/// Deduplicating, caching request resolver for one execution context.
pub trait RequestCache: 'static + Send + Sync + std::fmt::Debug {
    /// Resolve a request from the cache, by joining an identical request
    /// already in flight, or by invoking `fetch`.
    ///
    /// A missing `fetch` fails with [CacheError::InvalidFetchFunction]
    /// without touching any state.
    fn resolve_request(
        &self,
        fetch: Option<DynFetcher>,
        options: RequestOptions,
    ) -> BoxFut<'_, CacheResult<serde_json::Value>>;

    /// Remove every cached entry that has expired.
    fn clear_expired_entries(&self) -> BoxFut<'_, CacheResult<()>>;

    /// Remove every cached entry.
    fn clear_all_entries(&self) -> BoxFut<'_, CacheResult<()>>;

    /// Sweep expired entries, stop waiting on other contexts and reset the
    /// persisted wait snapshot. Safe to call more than once.
    fn shutdown(&self) -> BoxFut<'_, CacheResult<()>>;
}

/// Trait-object [RequestCache].
pub type DynRequestCache = Arc<dyn RequestCache>;

/// A factory for constructing [RequestCache] instances.
pub trait RequestCacheFactory: 'static + Send + Sync + std::fmt::Debug {
    /// Help the builder construct a default config from the chosen
    /// module factories.
    fn default_config(&self, config: &mut Config) -> CacheResult<()>;

    /// Construct a request cache instance.
    fn create(
        &self,
        builder: Arc<Builder>,
    ) -> BoxFut<'static, CacheResult<DynRequestCache>>;
}

/// Trait-object [RequestCacheFactory].
pub type DynRequestCacheFactory = Arc<dyn RequestCacheFactory>;

/// Typed helpers on top of [RequestCache].
pub trait RequestCacheExt: RequestCache {
    /// [RequestCache::resolve_request] with the result deserialized
    /// into `T`.
    fn resolve<T: serde::de::DeserializeOwned + 'static>(
        &self,
        fetch: DynFetcher,
        options: RequestOptions,
    ) -> BoxFut<'_, CacheResult<T>> {
        let fut = self.resolve_request(Some(fetch), options);
        Box::pin(async move {
            serde_json::from_value(fut.await?)
                .map_err(|e| CacheError::serialization_src("typed result", e))
        })
    }
}

impl<C: RequestCache + ?Sized> RequestCacheExt for C {}
