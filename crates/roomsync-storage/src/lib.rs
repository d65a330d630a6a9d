//! roomsync storage - transactional key-value cache
//!
//! - [`MemoryStore`]: committed key/value data
//! - [`LayeredCache`]: buffers the writes of a running mutation in a layer
//!   and commits or discards that layer as a whole
//! - [`MutationRegistry`]: named mutation procedures run through the cache

pub mod layered;
pub mod memory;
pub mod mutations;

use std::collections::BTreeMap;

/// Values stored in the cache
pub type Json = serde_json::Value;

/// Error returned by a mutation procedure
pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Pending writes keyed by key; `None` deletes the key
pub type WriteBatch = BTreeMap<String, Option<Json>>;

/// Committed key/value storage underneath a [`LayeredCache`]
pub trait KeyValueStore {
    /// Read a committed value
    fn get(&self, key: &str) -> Option<Json>;

    /// Write a value
    fn set(&mut self, key: String, value: Json);

    /// Remove a key; returns true if it existed
    fn delete(&mut self, key: &str) -> bool;

    /// All keys, sorted
    fn keys(&self) -> Vec<String>;

    /// Apply every write in `batch` as one indivisible step
    fn apply_batch(&mut self, batch: WriteBatch);

    /// Get storage statistics
    fn stats(&self) -> StorageStats;
}

/// Storage error types
#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    #[error("Mutation '{name}' failed: {source}")]
    MutationFailed {
        name: String,
        #[source]
        source: BoxError,
    },

    #[error("Unknown mutation: {0}")]
    UnknownMutation(String),

    #[error("Invalid argument {index}: {reason}")]
    InvalidArgument { index: usize, reason: String },

    #[error("Serialization error: {0}")]
    Serialization(String),
}

/// Result type for storage operations
pub type StorageResult<T> = Result<T, StorageError>;

/// Storage statistics
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StorageStats {
    pub key_count: usize,
    pub total_size_bytes: usize,
}

pub use layered::LayeredCache;
pub use memory::MemoryStore;
pub use mutations::{MutationFn, MutationRegistry};
