//! Versioned table of server-confirmed threads

use crate::query::{self, SortOrder, ThreadQuery};
use crate::thread::{compare_threads, Thread, ThreadDeleteInfo};
use std::cmp::Ordering;
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::{debug, trace};

/// Threads by id. Values are shared, so cloning the map is cheap and later
/// table writes never show through an earlier clone.
pub type ThreadMap = BTreeMap<String, Arc<Thread>>;

/// Authoritative thread table
///
/// Threads are never removed: deletion is a soft transition recorded in
/// `deleted_at`. The version counter moves only when stored content changes.
#[derive(Debug, Clone, Default)]
pub struct ThreadTable {
    threads: ThreadMap,
    version: u64,
}

impl ThreadTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Current version; starts at 0
    pub fn version(&self) -> u64 {
        self.version
    }

    /// Number of known threads, deleted ones included
    pub fn len(&self) -> usize {
        self.threads.len()
    }

    pub fn is_empty(&self) -> bool {
        self.threads.is_empty()
    }

    /// Insert `thread`, or replace the stored one if `thread` is strictly newer.
    ///
    /// A deleted thread is final: later upserts for its id are ignored.
    /// Returns true if the table changed.
    pub fn upsert(&mut self, thread: Thread) -> bool {
        if let Some(existing) = self.threads.get(&thread.id) {
            if existing.is_deleted() {
                trace!(thread_id = %thread.id, "Ignoring upsert of deleted thread");
                return false;
            }
            if compare_threads(&thread, existing) != Ordering::Greater {
                trace!(thread_id = %thread.id, "Skipping stale thread");
                return false;
            }
        }
        self.store(thread)
    }

    /// Apply a server tombstone.
    ///
    /// Unknown ids and threads already deleted at the same or a later time
    /// are left alone. Returns true if the table changed.
    pub fn apply_delete(&mut self, info: &ThreadDeleteInfo) -> bool {
        let Some(existing) = self.threads.get(&info.id) else {
            trace!(thread_id = %info.id, "Ignoring delete for unknown thread");
            return false;
        };

        if let Some(deleted_at) = existing.deleted_at {
            if deleted_at >= info.deleted_at {
                trace!(thread_id = %info.id, "Thread already deleted");
                return false;
            }
        }

        let mut deleted = Thread::clone(existing);
        deleted.mark_deleted(info.deleted_at);
        self.store(deleted)
    }

    /// Live thread by id
    pub fn get(&self, id: &str) -> Option<Arc<Thread>> {
        self.threads.get(id).filter(|t| !t.is_deleted()).cloned()
    }

    /// Thread by id regardless of deletion state
    pub fn get_even_if_deleted(&self, id: &str) -> Option<Arc<Thread>> {
        self.threads.get(id).cloned()
    }

    /// Live threads, optionally restricted to one room and filtered by `query`
    pub fn find_many(&self, room_id: Option<&str>, query: &ThreadQuery, order: SortOrder) -> Vec<Arc<Thread>> {
        query::select(self.threads.values(), room_id, query, order)
    }

    /// Copy of every stored thread, deleted ones included
    pub fn snapshot(&self) -> ThreadMap {
        self.threads.clone()
    }

    /// Forget every thread. The version still moves forward so it is never
    /// reused for different contents.
    pub fn clear(&mut self) {
        self.threads.clear();
        self.version += 1;
        debug!(version = self.version, "Cleared thread table");
    }

    fn store(&mut self, thread: Thread) -> bool {
        if let Some(existing) = self.threads.get(&thread.id) {
            if **existing == thread {
                return false;
            }
        }

        self.version += 1;
        debug!(thread_id = %thread.id, version = self.version, deleted = thread.is_deleted(), "Stored thread");
        self.threads.insert(thread.id.clone(), Arc::new(thread));
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{DateTime, TimeZone, Utc};

    fn at(day: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 1, day, 0, 0, 0).unwrap()
    }

    #[test]
    fn test_upsert_inserts_and_bumps_version() {
        let mut table = ThreadTable::new();
        assert!(table.upsert(Thread::new("th_1", "room_1", at(1))));
        assert_eq!(table.version(), 1);
        assert_eq!(table.len(), 1);
    }

    #[test]
    fn test_upsert_same_thread_is_noop() {
        let mut table = ThreadTable::new();
        let thread = Thread::new("th_1", "room_1", at(1));
        table.upsert(thread.clone());
        assert!(!table.upsert(thread));
        assert_eq!(table.version(), 1);
    }

    #[test]
    fn test_upsert_keeps_newer() {
        let mut table = ThreadTable::new();
        let mut newer = Thread::new("th_1", "room_1", at(1));
        newer.updated_at = Some(at(3));
        newer.metadata.insert("pinned".into(), true.into());
        let mut older = Thread::new("th_1", "room_1", at(1));
        older.updated_at = Some(at(2));

        table.upsert(newer.clone());
        assert!(!table.upsert(older));
        assert_eq!(*table.get("th_1").unwrap(), newer);
    }

    #[test]
    fn test_equal_timestamps_keep_existing() {
        let mut table = ThreadTable::new();
        let first = Thread::new("th_1", "room_1", at(1));
        let mut second = first.clone();
        second.resolved = true;

        table.upsert(first.clone());
        assert!(!table.upsert(second));
        assert_eq!(*table.get("th_1").unwrap(), first);
    }

    #[test]
    fn test_apply_delete_soft_deletes() {
        let mut table = ThreadTable::new();
        table.upsert(Thread::new("th_1", "room_1", at(1)));

        let info = ThreadDeleteInfo {
            id: "th_1".into(),
            room_id: "room_1".into(),
            deleted_at: at(2),
        };
        assert!(table.apply_delete(&info));
        assert!(table.get("th_1").is_none());

        let deleted = table.get_even_if_deleted("th_1").unwrap();
        assert_eq!(deleted.deleted_at, Some(at(2)));
        assert_eq!(deleted.updated_at, Some(at(2)));

        // same tombstone again changes nothing
        assert!(!table.apply_delete(&info));
        assert_eq!(table.version(), 2);
    }

    #[test]
    fn test_stale_upsert_does_not_resurrect() {
        let mut table = ThreadTable::new();
        let thread = Thread::new("th_1", "room_1", at(1));
        table.upsert(thread.clone());
        table.apply_delete(&ThreadDeleteInfo {
            id: "th_1".into(),
            room_id: "room_1".into(),
            deleted_at: at(2),
        });

        assert!(!table.upsert(thread));
        assert!(table.get("th_1").is_none());

        let mut newer = Thread::new("th_1", "room_1", at(1));
        newer.updated_at = Some(at(9));
        assert!(!table.upsert(newer));
        assert!(table.get("th_1").is_none());
        assert_eq!(table.version(), 2);
    }

    #[test]
    fn test_snapshot_is_isolated_from_later_writes() {
        let mut table = ThreadTable::new();
        table.upsert(Thread::new("th_1", "room_1", at(1)));
        let snapshot = table.snapshot();

        let mut updated = Thread::new("th_1", "room_1", at(1));
        updated.updated_at = Some(at(5));
        updated.resolved = true;
        table.upsert(updated);
        table.upsert(Thread::new("th_2", "room_1", at(2)));

        assert_eq!(snapshot.len(), 1);
        assert!(!snapshot["th_1"].resolved);
    }

    #[test]
    fn test_clear_moves_version_forward() {
        let mut table = ThreadTable::new();
        table.upsert(Thread::new("th_1", "room_1", at(1)));
        assert_eq!(table.version(), 1);

        table.clear();
        assert!(table.is_empty());
        assert_eq!(table.version(), 2);

        table.upsert(Thread::new("th_1", "room_1", at(1)));
        assert_eq!(table.version(), 3);
    }
}
