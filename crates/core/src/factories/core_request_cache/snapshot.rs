use super::registry::TaskRegistry;
use rpc_cache_api::*;
use std::collections::BTreeMap;

/// The persisted record of fingerprints in flight, with the tokens of the
/// waiters blocked on each.
///
/// Stored as a json object, e.g. `{"<fingerprint>":[0,3]}`.
#[derive(
    Debug, Default, Clone, PartialEq, serde::Serialize, serde::Deserialize,
)]
#[serde(transparent)]
pub struct WaitSnapshot(BTreeMap<Fingerprint, Vec<u64>>);

impl WaitSnapshot {
    /// Read the snapshot stored under `key`. A missing key is an empty
    /// snapshot.
    pub fn load(store: &dyn SnapshotStore, key: &str) -> CacheResult<Self> {
        match store.get(key)? {
            None => Ok(Self::default()),
            Some(data) => serde_json::from_str(&data).map_err(|e| {
                CacheError::serialization_src("wait snapshot", e)
            }),
        }
    }

    /// Overwrite the snapshot stored under `key`.
    pub fn persist(
        &self,
        store: &dyn SnapshotStore,
        key: &str,
    ) -> CacheResult<()> {
        let data = serde_json::to_string(self)
            .map_err(|e| CacheError::serialization_src("wait snapshot", e))?;
        store.set(key, data)
    }

    /// The union of two registries.
    pub(super) fn capture(tasks: &TaskRegistry, waiting: &TaskRegistry) -> Self {
        let mut out = BTreeMap::new();
        for (fp, tokens) in tasks.tokens().chain(waiting.tokens()) {
            out.entry(fp.clone())
                .or_insert_with(Vec::new)
                .extend(tokens);
        }
        Self(out)
    }

    /// Fingerprints recorded as in flight.
    pub fn fingerprints(&self) -> impl Iterator<Item = &Fingerprint> {
        self.0.keys()
    }

    /// Number of fingerprints recorded.
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// True if nothing is in flight.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Is `fingerprint` recorded as in flight?
    pub fn contains(&self, fingerprint: &Fingerprint) -> bool {
        self.0.contains_key(fingerprint)
    }

    /// Waiter tokens recorded for `fingerprint`.
    pub fn tokens(&self, fingerprint: &Fingerprint) -> Option<&[u64]> {
        self.0.get(fingerprint).map(|t| t.as_slice())
    }

    /// Record `fingerprint` as in flight with no known waiters.
    pub fn insert(&mut self, fingerprint: Fingerprint) {
        self.0.entry(fingerprint).or_default();
    }
}
