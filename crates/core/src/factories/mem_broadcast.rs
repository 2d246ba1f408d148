//! The in-process broadcast hub provided by rpc_cache.
//!
//! This is NOT a production module. It only connects channels opened from
//! the same factory instance within one process, which is enough to run
//! several contexts of one application side by side in tests.

use rpc_cache_api::{config::*, *};
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use tokio::sync::mpsc::{unbounded_channel, UnboundedSender};

#[cfg(test)]
mod test;

type Listeners =
    HashMap<String, HashMap<u64, UnboundedSender<BroadcastMessage>>>;

#[derive(Debug, Default)]
struct Hub {
    next_id: AtomicU64,
    listeners: Mutex<Listeners>,
}

impl Hub {
    fn listeners(&self) -> std::sync::MutexGuard<'_, Listeners> {
        self.listeners.lock().unwrap_or_else(|p| p.into_inner())
    }

    fn listen(&self, name: &str, id: u64) -> BroadcastRecv {
        let (send, recv) = unbounded_channel();
        self.listeners()
            .entry(name.to_string())
            .or_default()
            .insert(id, send);
        recv
    }

    fn unlisten(&self, name: &str, id: u64) {
        let mut listeners = self.listeners();
        if let Some(named) = listeners.get_mut(name) {
            named.remove(&id);
            if named.is_empty() {
                listeners.remove(name);
            }
        }
    }

    fn publish(&self, name: &str, from: u64, message: BroadcastMessage) {
        let mut listeners = self.listeners();
        if let Some(named) = listeners.get_mut(name) {
            named.retain(|id, send| {
                *id == from || send.send(message.clone()).is_ok()
            });
        }
    }
}

/// A factory for creating [MemBroadcastChannel] instances.
///
/// Channels with the same name opened from one factory instance hear each
/// other.
#[derive(Debug)]
pub struct MemBroadcastFactory {
    hub: Arc<Hub>,
}

impl MemBroadcastFactory {
    /// Construct a new MemBroadcastFactory with its own hub.
    pub fn create() -> DynBroadcastFactory {
        let out: DynBroadcastFactory = Arc::new(Self {
            hub: Arc::new(Hub::default()),
        });
        out
    }
}

impl BroadcastFactory for MemBroadcastFactory {
    fn default_config(&self, _config: &mut Config) -> CacheResult<()> {
        Ok(())
    }

    fn create(
        &self,
        _builder: Arc<builder::Builder>,
        name: String,
    ) -> BoxFut<'static, CacheResult<DynBroadcastChannel>> {
        let hub = self.hub.clone();
        Box::pin(async move {
            let id = hub.next_id.fetch_add(1, Ordering::Relaxed);
            let out: DynBroadcastChannel =
                Arc::new(MemBroadcastChannel { hub, name, id });
            Ok(out)
        })
    }
}

/// One endpoint of a named in-process broadcast channel.
#[derive(Debug)]
pub struct MemBroadcastChannel {
    hub: Arc<Hub>,
    name: String,
    id: u64,
}

impl Drop for MemBroadcastChannel {
    fn drop(&mut self) {
        self.hub.unlisten(&self.name, self.id);
    }
}

impl BroadcastChannel for MemBroadcastChannel {
    fn name(&self) -> &str {
        &self.name
    }

    fn send(&self, message: BroadcastMessage) -> BoxFut<'_, CacheResult<()>> {
        Box::pin(async move {
            self.hub.publish(&self.name, self.id, message);
            Ok(())
        })
    }

    fn on_message(&self) -> CacheResult<BroadcastRecv> {
        Ok(self.hub.listen(&self.name, self.id))
    }

    fn close(&self) {
        self.hub.unlisten(&self.name, self.id);
    }
}
