//! The core request cache implementation provided by rpc_cache.
//!
//! A [CoreRequestCache] is one execution context. It resolves a request
//! by trying, in order:
//!
//! - to join a request that another context was fetching when this one
//!   started (recovered from the persisted [WaitSnapshot])
//! - an unexpired entry in the shared cache store
//! - to join an identical request already being fetched by this context
//! - finally to invoke the caller's fetcher
//!
//! Every settled fetch fans out to the local waiters, to the cache store
//! and to sibling contexts through the broadcast channel. The snapshot is
//! rewritten whenever the set of fingerprints in flight changes, so a
//! context that reloads mid-fetch can resume waiting for it.
//!
//! Steps one to three are skipped for requests made without the cache.

use rpc_cache_api::{config::*, *};
use std::sync::{Arc, Mutex, MutexGuard};
use tokio::task::AbortHandle;

mod coordinator;
mod registry;
mod snapshot;

pub use snapshot::WaitSnapshot;

use registry::*;

/// CoreRequestCache configuration types.
pub mod config {
    use std::time::Duration;

    /// Configuration parameters for
    /// [CoreRequestCacheFactory](super::CoreRequestCacheFactory).
    #[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
    #[serde(rename_all = "camelCase", default)]
    pub struct CoreRequestCacheConfig {
        /// How long a fetched result stays cached when the request does not
        /// say otherwise. Default: 24 h.
        pub expires_ms: u64,

        /// How long to wait for requests recovered from the snapshot to
        /// settle in another context. Default: 30 s.
        pub wait_timeout_ms: u64,

        /// The cache store namespace. Default: "RpcCache".
        pub namespace: String,

        /// The broadcast channel name. Default: "RpcCache-message".
        pub channel_name: String,

        /// The snapshot store key. Default: "RpcCache-state".
        pub snapshot_key: String,
    }

    impl Default for CoreRequestCacheConfig {
        fn default() -> Self {
            Self {
                expires_ms: 1000 * 60 * 60 * 24,
                wait_timeout_ms: 1000 * 30,
                namespace: "RpcCache".into(),
                channel_name: "RpcCache-message".into(),
                snapshot_key: "RpcCache-state".into(),
            }
        }
    }

    impl CoreRequestCacheConfig {
        /// The default cache lifetime.
        pub fn expires(&self) -> Duration {
            Duration::from_millis(self.expires_ms)
        }

        /// The cross-context wait window.
        pub fn wait_timeout(&self) -> Duration {
            Duration::from_millis(self.wait_timeout_ms)
        }
    }

    /// Module-level configuration for CoreRequestCache.
    #[derive(Debug, Default, Clone, serde::Serialize, serde::Deserialize)]
    #[serde(rename_all = "camelCase", default)]
    pub struct CoreRequestCacheModConfig {
        /// CoreRequestCache configuration.
        pub core_request_cache: CoreRequestCacheConfig,
    }

    impl rpc_cache_api::config::ModConfig for CoreRequestCacheModConfig {}
}

pub use config::*;

/// The production request cache module.
#[derive(Debug)]
pub struct CoreRequestCacheFactory {}

impl CoreRequestCacheFactory {
    /// Construct a new CoreRequestCacheFactory.
    pub fn create() -> DynRequestCacheFactory {
        let out: DynRequestCacheFactory = Arc::new(Self {});
        out
    }
}

impl RequestCacheFactory for CoreRequestCacheFactory {
    fn default_config(&self, config: &mut Config) -> CacheResult<()> {
        config.add_default_module_config(
            &CoreRequestCacheModConfig::default(),
        )
    }

    fn create(
        &self,
        builder: Arc<builder::Builder>,
    ) -> BoxFut<'static, CacheResult<DynRequestCache>> {
        Box::pin(async move {
            let config: CoreRequestCacheModConfig =
                builder.config.get_module_config()?;
            let config = config.core_request_cache;

            let cache_store = builder
                .cache_store
                .create(builder.clone(), config.namespace.clone())
                .await?;
            let snapshot_store =
                builder.snapshot_store.create(builder.clone()).await?;
            let channel = builder
                .broadcast
                .create(builder.clone(), config.channel_name.clone())
                .await?;

            let out: DynRequestCache = Arc::new(CoreRequestCache::new(
                config,
                cache_store,
                snapshot_store,
                channel,
            )?);
            Ok(out)
        })
    }
}

#[derive(Debug, Default)]
struct State {
    /// Fetches running in this context.
    tasks: TaskRegistry,
    /// Fetches recovered as running in another context.
    waiting: TaskRegistry,
    next_token: u64,
}

impl State {
    fn token(&mut self) -> u64 {
        let token = self.next_token;
        self.next_token += 1;
        token
    }
}

#[derive(Debug)]
struct Inner {
    config: CoreRequestCacheConfig,
    cache_store: DynCacheStore,
    snapshot_store: DynSnapshotStore,
    channel: DynBroadcastChannel,
    state: Mutex<State>,
}

enum Admission {
    /// Wait for the fetch already running in this context.
    Join(WaitHandle),
    /// Run the fetch and settle the registry entry.
    Lead(InFlight),
    /// Run the fetch without touching the registry.
    Detached,
}

/// Registry ownership of one running fetch. Dropping it unsettled
/// releases the waiters as abandoned.
struct InFlight {
    inner: Arc<Inner>,
    fingerprint: Fingerprint,
    settled: bool,
}

impl InFlight {
    fn settle(mut self, outcome: &Outcome) {
        self.settled = true;
        self.inner.end_fetch(&self.fingerprint, outcome);
    }
}

impl Drop for InFlight {
    fn drop(&mut self) {
        if !self.settled {
            tracing::debug!(
                fingerprint = %self.fingerprint,
                "fetch abandoned before it settled"
            );
            self.inner.end_fetch(
                &self.fingerprint,
                &Err(CacheError::other("request abandoned before it settled")),
            );
        }
    }
}

impl Inner {
    fn state(&self) -> MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(|p| p.into_inner())
    }

    fn persist(&self, state: &State) -> CacheResult<()> {
        WaitSnapshot::capture(&state.tasks, &state.waiting)
            .persist(&*self.snapshot_store, &self.config.snapshot_key)
    }

    fn persist_or_warn(&self, state: &State) {
        if let Err(err) = self.persist(state) {
            tracing::warn!(?err, "failed to persist wait snapshot");
        }
    }

    /// Join a fetch recovered as running in another context.
    fn join_waiting(&self, fingerprint: &Fingerprint) -> Option<WaitHandle> {
        let mut state = self.state();
        let token = state.token();
        let handle = state.waiting.enqueue(fingerprint, token)?;
        self.persist_or_warn(&state);
        Some(handle)
    }

    fn admit(
        self: &Arc<Self>,
        fingerprint: &Fingerprint,
        cache: bool,
    ) -> CacheResult<Admission> {
        let mut state = self.state();

        if cache {
            let token = state.token();
            if let Some(handle) = state.tasks.enqueue(fingerprint, token) {
                self.persist_or_warn(&state);
                return Ok(Admission::Join(handle));
            }
        } else if state.tasks.contains(fingerprint) {
            return Ok(Admission::Detached);
        }

        state.tasks.begin(fingerprint.clone())?;
        if let Err(err) = self.persist(&state) {
            state.tasks.end(fingerprint);
            return Err(err);
        }

        Ok(Admission::Lead(InFlight {
            inner: self.clone(),
            fingerprint: fingerprint.clone(),
            settled: false,
        }))
    }

    /// Remove a settled fetch from the registry and hand its outcome to
    /// everyone waiting on the fingerprint in this context.
    fn end_fetch(&self, fingerprint: &Fingerprint, outcome: &Outcome) {
        let mut guard = self.state();
        let state = &mut *guard;
        for registry in [&mut state.tasks, &mut state.waiting] {
            registry.settle(fingerprint, outcome);
            registry.end(fingerprint);
        }
        self.persist_or_warn(state);
    }

    async fn run_fetch(
        &self,
        lead: Option<InFlight>,
        fetch: DynFetcher,
        options: RequestOptions,
        fingerprint: Fingerprint,
    ) -> Outcome {
        let start = Timestamp::now();
        tracing::debug!(
            %fingerprint,
            locator = %options.locator,
            detached = lead.is_none(),
            "fetch start"
        );

        let outcome = match fetch.fetch(options.locator, options.payload).await
        {
            Ok(result) => {
                let expires_at =
                    start + options.expires.unwrap_or(self.config.expires());
                self.cache_store
                    .set(
                        fingerprint.clone(),
                        CacheEntry::new(result.clone(), expires_at),
                    )
                    .await
                    .map(|_| result)
            }
            Err(err) => Err(err),
        };

        tracing::debug!(%fingerprint, ok = outcome.is_ok(), "fetch settled");

        if let Some(lead) = lead {
            lead.settle(&outcome);
        }

        self.announce(&fingerprint, &outcome).await;

        outcome
    }

    async fn announce(&self, fingerprint: &Fingerprint, outcome: &Outcome) {
        let message = match outcome {
            Ok(result) => BroadcastMessage::success(fingerprint.clone(), result),
            Err(err) => BroadcastMessage::failure(fingerprint.clone(), err),
        };

        let res = match message {
            Ok(message) => self.channel.send(message).await,
            Err(err) => Err(err),
        };

        if let Err(err) = res {
            tracing::warn!(?err, %fingerprint, "failed to broadcast settlement");
        }
    }

    async fn clear_expired_entries(&self) -> CacheResult<()> {
        let now = Timestamp::now();
        let mut expired = Vec::new();
        self.cache_store
            .iterate(&mut |fingerprint: &Fingerprint, entry: &CacheEntry| {
                if !entry.is_valid_at(now) {
                    expired.push(fingerprint.clone());
                }
            })
            .await?;

        let count = expired.len();
        for fingerprint in expired {
            self.cache_store.remove(fingerprint).await?;
        }

        tracing::debug!(count, "cleared expired cache entries");
        Ok(())
    }
}

/// A request cache for one execution context.
#[derive(Debug)]
pub struct CoreRequestCache {
    inner: Arc<Inner>,
    listener: Mutex<Option<AbortHandle>>,
}

impl Drop for CoreRequestCache {
    fn drop(&mut self) {
        if let Some(listener) = self.listener().take() {
            listener.abort();
        }
    }
}

impl CoreRequestCache {
    /// Construct a new CoreRequestCache.
    ///
    /// Fingerprints found in the persisted snapshot are treated as being
    /// fetched by another context. If there are any, a listener task is
    /// spawned, so this must be called within a tokio runtime.
    pub fn new(
        config: CoreRequestCacheConfig,
        cache_store: DynCacheStore,
        snapshot_store: DynSnapshotStore,
        channel: DynBroadcastChannel,
    ) -> CacheResult<Self> {
        let recovered =
            match WaitSnapshot::load(&*snapshot_store, &config.snapshot_key) {
                Ok(recovered) => recovered,
                Err(err) => {
                    tracing::warn!(?err, "discarding unreadable wait snapshot");
                    WaitSnapshot::default()
                }
            };

        let mut state = State::default();
        for fingerprint in recovered.fingerprints() {
            state.waiting.begin(fingerprint.clone())?;
        }

        let deadline = tokio::time::Instant::now() + config.wait_timeout();
        let inner = Arc::new(Inner {
            config,
            cache_store,
            snapshot_store,
            channel,
            state: Mutex::new(state),
        });

        let listener = if recovered.is_empty() {
            None
        } else {
            tracing::info!(
                count = recovered.len(),
                "waiting on requests in flight in other contexts"
            );
            let recv = inner.channel.on_message()?;
            Some(
                tokio::spawn(coordinator::await_settlements(
                    inner.clone(),
                    recv,
                    deadline,
                ))
                .abort_handle(),
            )
        };

        Ok(Self {
            inner,
            listener: Mutex::new(listener),
        })
    }

    fn listener(&self) -> MutexGuard<'_, Option<AbortHandle>> {
        self.listener.lock().unwrap_or_else(|p| p.into_inner())
    }
}

impl RequestCache for CoreRequestCache {
    fn resolve_request(
        &self,
        fetch: Option<DynFetcher>,
        options: RequestOptions,
    ) -> BoxFut<'_, CacheResult<serde_json::Value>> {
        Box::pin(async move {
            let fetch = fetch.ok_or(CacheError::InvalidFetchFunction)?;
            let fingerprint = options.fingerprint()?;
            let inner = &self.inner;

            if options.cache {
                if let Some(handle) = inner.join_waiting(&fingerprint) {
                    tracing::debug!(
                        %fingerprint,
                        "waiting on request in another context"
                    );
                    return handle.wait().await;
                }

                if let Some(entry) =
                    inner.cache_store.get(fingerprint.clone()).await?
                {
                    if entry.is_valid_at(Timestamp::now()) {
                        tracing::trace!(%fingerprint, "cache hit");
                        return Ok(entry.result);
                    }
                }
            }

            match inner.admit(&fingerprint, options.cache)? {
                Admission::Join(handle) => {
                    tracing::trace!(%fingerprint, "joining local fetch");
                    handle.wait().await
                }
                Admission::Lead(lead) => {
                    inner.run_fetch(Some(lead), fetch, options, fingerprint).await
                }
                Admission::Detached => {
                    inner.run_fetch(None, fetch, options, fingerprint).await
                }
            }
        })
    }

    fn clear_expired_entries(&self) -> BoxFut<'_, CacheResult<()>> {
        Box::pin(self.inner.clear_expired_entries())
    }

    fn clear_all_entries(&self) -> BoxFut<'_, CacheResult<()>> {
        Box::pin(async move {
            self.inner.cache_store.clear().await?;
            tracing::debug!("cleared all cache entries");
            Ok(())
        })
    }

    fn shutdown(&self) -> BoxFut<'_, CacheResult<()>> {
        Box::pin(async move {
            let swept = self.inner.clear_expired_entries().await;

            if let Some(listener) = self.listener().take() {
                listener.abort();
            }
            self.inner.channel.close();

            let drained = self.inner.state().waiting.drain_all();
            let shut_down = Err(CacheError::other("request cache shut down"));
            for (_, waiters) in drained {
                resolve(waiters, &shut_down);
            }

            WaitSnapshot::default().persist(
                &*self.inner.snapshot_store,
                &self.inner.config.snapshot_key,
            )?;

            swept
        })
    }
}
