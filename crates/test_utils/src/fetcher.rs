//! A scriptable [Fetcher] for tests.

use rpc_cache_api::*;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tokio::sync::watch;

#[derive(Debug, Clone)]
enum Respond {
    Echo,
    Fail(CacheError),
}

#[derive(Debug)]
struct Inner {
    respond: Respond,
    calls: AtomicUsize,
    gate: watch::Sender<bool>,
}

/// A fetcher that counts its invocations.
///
/// An echo fetcher answers `{"locator": .., "payload": .., "call": n}`
/// where `n` counts calls from 1. A gated fetcher holds every call until
/// [TestFetcher::release] is called.
#[derive(Debug, Clone)]
pub struct TestFetcher(Arc<Inner>);

impl TestFetcher {
    fn new(respond: Respond) -> Self {
        let (gate, _) = watch::channel(true);
        Self(Arc::new(Inner {
            respond,
            calls: AtomicUsize::new(0),
            gate,
        }))
    }

    /// A fetcher that succeeds by echoing its input.
    pub fn echo() -> Self {
        Self::new(Respond::Echo)
    }

    /// A fetcher that fails with an upstream error carrying `message`.
    pub fn failing(message: impl Into<String>) -> Self {
        Self::failing_with(CacheError::upstream(message.into()))
    }

    /// A fetcher that fails with a clone of `err`.
    pub fn failing_with(err: CacheError) -> Self {
        Self::new(Respond::Fail(err))
    }

    /// Hold calls until [TestFetcher::release].
    pub fn gated(self) -> Self {
        self.0.gate.send_replace(false);
        self
    }

    /// Let held and future calls complete.
    pub fn release(&self) {
        self.0.gate.send_replace(true);
    }

    /// How many times the fetcher was invoked.
    pub fn calls(&self) -> usize {
        self.0.calls.load(Ordering::SeqCst)
    }

    /// This fetcher as a trait object.
    pub fn as_dyn(&self) -> DynFetcher {
        Arc::new(self.clone())
    }
}

impl Fetcher for TestFetcher {
    fn fetch(
        &self,
        locator: String,
        payload: Option<serde_json::Value>,
    ) -> BoxFut<'_, CacheResult<serde_json::Value>> {
        Box::pin(async move {
            let call = self.0.calls.fetch_add(1, Ordering::SeqCst) + 1;

            let mut gate = self.0.gate.subscribe();
            let released = gate.wait_for(|open| *open).await.is_ok();
            if !released {
                return Err(CacheError::other("test fetcher gate dropped"));
            }

            match &self.0.respond {
                Respond::Echo => Ok(serde_json::json!({
                    "locator": locator,
                    "payload": payload,
                    "call": call,
                })),
                Respond::Fail(err) => Err(err.clone()),
            }
        })
    }
}
