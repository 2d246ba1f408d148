//! Per-context bookkeeping of callers blocked on a fingerprint.

use rpc_cache_api::*;
use std::collections::HashMap;
use tokio::sync::oneshot;

/// What every waiter of a fingerprint eventually receives.
pub(super) type Outcome = CacheResult<serde_json::Value>;

/// One caller waiting on the outcome of a fingerprint.
#[derive(Debug)]
pub(super) struct Waiter {
    token: u64,
    send: oneshot::Sender<Outcome>,
}

/// The receiving side of a [Waiter].
pub(super) struct WaitHandle(oneshot::Receiver<Outcome>);

impl WaitHandle {
    /// Wait for the outcome. A waiter dropped without an outcome counts
    /// as abandoned.
    pub async fn wait(self) -> Outcome {
        match self.0.await {
            Ok(outcome) => outcome,
            Err(_) => {
                Err(CacheError::other("request abandoned before it settled"))
            }
        }
    }
}

/// Resolve or reject every waiter with a clone of `outcome`.
pub(super) fn resolve(waiters: Vec<Waiter>, outcome: &Outcome) {
    for waiter in waiters {
        // the receiver may have been dropped by a cancelled caller
        let _ = waiter.send.send(outcome.clone());
    }
}

/// Fingerprint to waiter list. A fingerprint is a key at most once.
#[derive(Debug, Default)]
pub(super) struct TaskRegistry {
    entries: HashMap<Fingerprint, Vec<Waiter>>,
}

impl TaskRegistry {
    pub fn contains(&self, fingerprint: &Fingerprint) -> bool {
        self.entries.contains_key(fingerprint)
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Start tracking a fingerprint with no waiters.
    pub fn begin(&mut self, fingerprint: Fingerprint) -> CacheResult<()> {
        if self.entries.contains_key(&fingerprint) {
            return Err(CacheError::other(format!(
                "{fingerprint} is already registered"
            )));
        }
        self.entries.insert(fingerprint, Vec::new());
        Ok(())
    }

    /// Append a waiter to a tracked fingerprint.
    /// Returns `None` if the fingerprint is not tracked.
    pub fn enqueue(
        &mut self,
        fingerprint: &Fingerprint,
        token: u64,
    ) -> Option<WaitHandle> {
        let waiters = self.entries.get_mut(fingerprint)?;
        let (send, recv) = oneshot::channel();
        waiters.push(Waiter { token, send });
        Some(WaitHandle(recv))
    }

    /// Resolve or reject every waiter of a fingerprint, leaving it
    /// tracked with no waiters.
    pub fn settle(&mut self, fingerprint: &Fingerprint, outcome: &Outcome) {
        if let Some(waiters) = self.entries.get_mut(fingerprint) {
            resolve(std::mem::take(waiters), outcome);
        }
    }

    /// Stop tracking a fingerprint. Waiters that were not settled are
    /// dropped and observe the request as abandoned.
    pub fn end(&mut self, fingerprint: &Fingerprint) -> bool {
        self.entries.remove(fingerprint).is_some()
    }

    /// Waiter tokens per tracked fingerprint.
    pub fn tokens(&self) -> impl Iterator<Item = (&Fingerprint, Vec<u64>)> {
        self.entries
            .iter()
            .map(|(fp, waiters)| (fp, waiters.iter().map(|w| w.token).collect()))
    }

    /// Stop tracking everything.
    pub fn drain_all(&mut self) -> Vec<(Fingerprint, Vec<Waiter>)> {
        self.entries.drain().collect()
    }
}
