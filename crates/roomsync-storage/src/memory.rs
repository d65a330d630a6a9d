//! In-memory key/value store

use crate::{Json, KeyValueStore, StorageStats, WriteBatch};
use std::collections::BTreeMap;

/// In-memory storage backend
///
/// Keys are kept sorted so snapshots and their encodings are deterministic.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MemoryStore {
    data: BTreeMap<String, Json>,
    /// Total size tracking
    total_size: usize,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Borrow the committed data
    pub fn data(&self) -> &BTreeMap<String, Json> {
        &self.data
    }
}

fn entry_size(key: &str, value: &Json) -> usize {
    key.len() + value.to_string().len()
}

impl KeyValueStore for MemoryStore {
    fn get(&self, key: &str) -> Option<Json> {
        self.data.get(key).cloned()
    }

    fn set(&mut self, key: String, value: Json) {
        let new_size = entry_size(&key, &value);

        // Update size tracking
        if let Some(existing) = self.data.get(&key) {
            self.total_size -= entry_size(&key, existing);
        }
        self.total_size += new_size;

        self.data.insert(key, value);
    }

    fn delete(&mut self, key: &str) -> bool {
        match self.data.remove(key) {
            Some(value) => {
                self.total_size -= entry_size(key, &value);
                true
            }
            None => false,
        }
    }

    fn keys(&self) -> Vec<String> {
        self.data.keys().cloned().collect()
    }

    fn apply_batch(&mut self, batch: WriteBatch) {
        for (key, value) in batch {
            match value {
                Some(value) => self.set(key, value),
                None => {
                    self.delete(&key);
                }
            }
        }
    }

    fn stats(&self) -> StorageStats {
        StorageStats {
            key_count: self.data.len(),
            total_size_bytes: self.total_size,
        }
    }
}
