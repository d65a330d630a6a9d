//! Layered cache with atomic mutations
//!
//! Reads consult the open layers from the innermost outwards, then the base
//! store. While a mutation runs, every write lands in its layer; the base is
//! only touched when the outermost mutation succeeds, in a single batch.

use crate::memory::MemoryStore;
use crate::{BoxError, Json, KeyValueStore, StorageError, StorageResult, StorageStats, WriteBatch};
use std::collections::BTreeMap;
use std::panic::{self, AssertUnwindSafe};
use tracing::{debug, warn};

/// Key/value cache that runs mutations all-or-nothing
#[derive(Debug, Clone, Default)]
pub struct LayeredCache<S: KeyValueStore = MemoryStore> {
    base: S,
    /// Open layers, innermost last
    layers: Vec<WriteBatch>,
}

impl LayeredCache<MemoryStore> {
    pub fn new() -> Self {
        Self::with_store(MemoryStore::new())
    }
}

impl<S: KeyValueStore> LayeredCache<S> {
    pub fn with_store(base: S) -> Self {
        Self {
            base,
            layers: Vec::new(),
        }
    }

    /// Borrow the committed store
    pub fn store(&self) -> &S {
        &self.base
    }

    /// Give back the committed store
    pub fn into_store(self) -> S {
        self.base
    }

    /// Current value for `key`, pending writes included
    pub fn get(&self, key: &str) -> Option<Json> {
        for layer in self.layers.iter().rev() {
            if let Some(entry) = layer.get(key) {
                return entry.clone();
            }
        }
        self.base.get(key)
    }

    /// Current value for `key` if it is a number
    pub fn get_number(&self, key: &str) -> Option<f64> {
        self.get(key).and_then(|v| v.as_f64())
    }

    pub fn has(&self, key: &str) -> bool {
        self.get(key).is_some()
    }

    /// Write `value`. Outside a mutation this goes straight to the base store.
    pub fn set(&mut self, key: impl Into<String>, value: impl Into<Json>) {
        let key = key.into();
        match self.layers.last_mut() {
            Some(layer) => {
                layer.insert(key, Some(value.into()));
            }
            None => self.base.set(key, value.into()),
        }
    }

    /// Remove `key`. Outside a mutation this goes straight to the base store.
    pub fn delete(&mut self, key: &str) {
        match self.layers.last_mut() {
            Some(layer) => {
                layer.insert(key.to_string(), None);
            }
            None => {
                self.base.delete(key);
            }
        }
    }

    /// Visible keys, sorted
    pub fn keys(&self) -> Vec<String> {
        self.snapshot().into_keys().collect()
    }

    pub fn len(&self) -> usize {
        self.keys().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Visible data as an ordered map
    pub fn snapshot(&self) -> BTreeMap<String, Json> {
        let mut data: BTreeMap<String, Json> = self
            .base
            .keys()
            .into_iter()
            .filter_map(|key| self.base.get(&key).map(|v| (key, v)))
            .collect();

        for layer in &self.layers {
            for (key, value) in layer {
                match value {
                    Some(value) => {
                        data.insert(key.clone(), value.clone());
                    }
                    None => {
                        data.remove(key);
                    }
                }
            }
        }
        data
    }

    /// MessagePack encoding of [`LayeredCache::snapshot`]
    pub fn encode_snapshot(&self) -> StorageResult<Vec<u8>> {
        rmp_serde::to_vec(&self.snapshot()).map_err(|e| StorageError::Serialization(e.to_string()))
    }

    /// Number of mutations currently running
    pub fn depth(&self) -> usize {
        self.layers.len()
    }

    pub fn stats(&self) -> StorageStats {
        self.base.stats()
    }

    /// Run `f` as one atomic mutation.
    ///
    /// Writes made by `f` are buffered in a fresh layer. If `f` returns `Ok`
    /// the layer is merged into the enclosing mutation's layer, or into the
    /// base store when this is the outermost mutation. If `f` returns `Err`
    /// the layer is dropped and the cache is exactly as it was before the
    /// call. A panic in `f` drops the layer too and is then resumed.
    pub fn run_mutation<T, E, F>(&mut self, name: &str, f: F) -> StorageResult<T>
    where
        F: FnOnce(&mut Self) -> Result<T, E>,
        E: Into<BoxError>,
    {
        let depth = self.layers.len();
        self.layers.push(WriteBatch::new());

        let result = match panic::catch_unwind(AssertUnwindSafe(|| f(&mut *self))) {
            Ok(result) => result,
            Err(payload) => {
                // A panic discards the layer just like an error, then keeps unwinding.
                self.layers.truncate(depth);
                warn!(mutation = %name, "Mutation panicked, rolled back");
                panic::resume_unwind(payload);
            }
        };

        self.layers.truncate(depth + 1);
        let layer = self.layers.pop().unwrap_or_default();

        match result {
            Ok(value) => {
                let writes = layer.len();
                match self.layers.last_mut() {
                    Some(parent) => parent.extend(layer),
                    None => self.base.apply_batch(layer),
                }
                debug!(mutation = %name, writes, depth, "Committed mutation");
                Ok(value)
            }
            Err(e) => {
                let source = e.into();
                warn!(mutation = %name, discarded = layer.len(), error = %source, "Mutation failed, rolled back");
                Err(StorageError::MutationFailed {
                    name: name.to_string(),
                    source,
                })
            }
        }
    }
}
