//! Settlement of requests that were in flight in another context when this
//! context started.
//!
//! The recovered fingerprints are settled by the first matching broadcast
//! from a sibling, or rejected with a timeout once the wait window that
//! started at construction has passed.

use super::registry::Outcome;
use super::Inner;
use rpc_cache_api::*;
use std::sync::Arc;
use tokio::time::Instant;

impl Inner {
    /// Apply a sibling's settlement. Returns true once nothing recovered
    /// is left to wait for.
    pub(super) async fn apply_settlement(
        &self,
        message: BroadcastMessage,
    ) -> bool {
        let fingerprint = message.fingerprint.clone();
        let tracked = self.state().waiting.contains(&fingerprint);
        if !tracked {
            tracing::trace!(%fingerprint, "ignoring untracked settlement");
            return false;
        }

        let outcome: Outcome = message.outcome();
        tracing::debug!(
            %fingerprint,
            ok = outcome.is_ok(),
            "received settlement from another context"
        );

        if let Ok(result) = &outcome {
            let entry = CacheEntry::new(
                result.clone(),
                Timestamp::now() + self.config.expires(),
            );
            if let Err(err) =
                self.cache_store.set(fingerprint.clone(), entry).await
            {
                tracing::warn!(
                    ?err,
                    %fingerprint,
                    "failed to cache broadcast result"
                );
            }
        }

        let mut state = self.state();
        state.waiting.settle(&fingerprint, &outcome);
        state.waiting.end(&fingerprint);
        self.persist_or_warn(&state);
        state.waiting.is_empty()
    }

    /// Reject everything still recovered with a timeout.
    pub(super) fn expire_waits(&self) {
        let after = self.config.wait_timeout();
        let mut state = self.state();
        let drained = state.waiting.drain_all();
        if drained.is_empty() {
            return;
        }
        self.persist_or_warn(&state);
        drop(state);

        for (fingerprint, waiters) in drained {
            tracing::warn!(
                %fingerprint,
                ?after,
                "request in another context did not settle in time"
            );
            super::registry::resolve(
                waiters,
                &Err(CacheError::Timeout { fingerprint, after }),
            );
        }
    }
}

/// Listen for sibling settlements until every recovered fingerprint has
/// settled or `deadline` passes.
pub(super) async fn await_settlements(
    inner: Arc<Inner>,
    mut recv: BroadcastRecv,
    deadline: Instant,
) {
    let timeout = tokio::time::sleep_until(deadline);
    tokio::pin!(timeout);

    loop {
        tokio::select! {
            message = recv.recv() => match message {
                Some(message) => {
                    if inner.apply_settlement(message).await {
                        tracing::debug!("all recovered requests settled");
                        break;
                    }
                }
                None => {
                    (&mut timeout).await;
                    inner.expire_waits();
                    break;
                }
            },
            _ = &mut timeout => {
                inner.expire_waits();
                break;
            }
        }
    }

    inner.channel.close();
}
