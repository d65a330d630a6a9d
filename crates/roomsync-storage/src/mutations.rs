//! Named mutation procedures

use crate::layered::LayeredCache;
use crate::memory::MemoryStore;
use crate::{BoxError, Json, KeyValueStore, StorageError, StorageResult};
use std::collections::HashMap;
use tracing::trace;

/// A mutation procedure: receives the cache and its JSON arguments
pub type MutationFn<S> = Box<dyn Fn(&mut LayeredCache<S>, &[Json]) -> Result<(), BoxError> + Send + Sync>;

/// Mutations callable by name
pub struct MutationRegistry<S: KeyValueStore = MemoryStore> {
    mutations: HashMap<String, MutationFn<S>>,
}

impl<S: KeyValueStore> MutationRegistry<S> {
    pub fn new() -> Self {
        Self {
            mutations: HashMap::new(),
        }
    }

    /// Register `f` under `name`, replacing any earlier registration
    pub fn register<F>(&mut self, name: impl Into<String>, f: F) -> &mut Self
    where
        F: Fn(&mut LayeredCache<S>, &[Json]) -> Result<(), BoxError> + Send + Sync + 'static,
    {
        self.mutations.insert(name.into(), Box::new(f));
        self
    }

    pub fn contains(&self, name: &str) -> bool {
        self.mutations.contains_key(name)
    }

    /// Registered names, sorted
    pub fn names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.mutations.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }

    /// Run the mutation registered as `name` atomically against `cache`.
    ///
    /// An unknown name fails before anything is written.
    pub fn run(&self, cache: &mut LayeredCache<S>, name: &str, args: &[Json]) -> StorageResult<()> {
        let mutation = self
            .mutations
            .get(name)
            .ok_or_else(|| StorageError::UnknownMutation(name.to_string()))?;

        trace!(mutation = %name, args = args.len(), "Running mutation");
        cache.run_mutation(name, |c| mutation(c, args))
    }
}

impl<S: KeyValueStore> Default for MutationRegistry<S> {
    fn default() -> Self {
        Self::new()
    }
}

impl<S: KeyValueStore> std::fmt::Debug for MutationRegistry<S> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MutationRegistry")
            .field("mutations", &self.names())
            .finish()
    }
}

/// Argument `index`, which must be present
pub fn arg(args: &[Json], index: usize) -> StorageResult<&Json> {
    args.get(index).ok_or_else(|| StorageError::InvalidArgument {
        index,
        reason: "missing".into(),
    })
}

/// Argument `index` as a string
pub fn arg_str(args: &[Json], index: usize) -> StorageResult<&str> {
    arg(args, index)?
        .as_str()
        .ok_or_else(|| StorageError::InvalidArgument {
            index,
            reason: "expected a string".into(),
        })
}
