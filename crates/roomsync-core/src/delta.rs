//! Applying authoritative delta batches to the thread table

use crate::error::Result;
use crate::table::ThreadTable;
use crate::thread::{Thread, ThreadDeleteInfo};
use serde::{Deserialize, Serialize};
use tracing::debug;

/// A batch of server changes, as received from an update or a query result
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ThreadDeltaUpdates {
    #[serde(default)]
    pub new_threads: Vec<Thread>,
    #[serde(default)]
    pub deleted_threads: Vec<ThreadDeleteInfo>,
}

impl ThreadDeltaUpdates {
    /// Parse a batch from its JSON wire form
    pub fn from_json(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }

    pub fn is_empty(&self) -> bool {
        self.new_threads.is_empty() && self.deleted_threads.is_empty()
    }
}

/// Upsert every new thread, then apply every tombstone.
///
/// Tombstones go through [`ThreadTable::apply_delete`] so that comments are
/// cleared. Applying the same batch twice leaves the table and its version
/// unchanged the second time. Returns the number of threads that changed.
pub fn apply_thread_delta_updates(table: &mut ThreadTable, updates: &ThreadDeltaUpdates) -> usize {
    let mut changed = 0;

    for thread in &updates.new_threads {
        if table.upsert(thread.clone()) {
            changed += 1;
        }
    }

    for info in &updates.deleted_threads {
        if table.apply_delete(info) {
            changed += 1;
        }
    }

    if changed > 0 {
        debug!(
            new = updates.new_threads.len(),
            deleted = updates.deleted_threads.len(),
            changed,
            version = table.version(),
            "Applied thread delta"
        );
    }
    changed
}
