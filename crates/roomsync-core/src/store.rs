//! Client store - confirmed threads, pending local changes and notifications

use crate::delta::{apply_thread_delta_updates, ThreadDeltaUpdates};
use crate::error::{Error, Result};
use crate::id::OpId;
use crate::notifications::{merge_notifications, InboxNotification, InboxNotificationMap};
use crate::optimistic::{OptimisticQueue, OptimisticUpdate, Projection};
use crate::query::{self, SortOrder, ThreadQuery};
use crate::table::ThreadTable;
use crate::thread::Thread;
use parking_lot::RwLock;
use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;
use tokio::sync::broadcast;
use tracing::{debug, info};

/// Change notification sent to subscribers
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StoreEvent {
    /// Confirmed threads changed; carries the new table version
    ThreadsChanged { version: u64 },
    /// An optimistic update was queued or removed
    OptimisticUpdatesChanged { pending: usize },
    /// Confirmed inbox notifications changed
    InboxNotificationsChanged,
    /// A threads query finished loading
    QueryLoaded { key: String },
}

/// How to list threads
#[derive(Debug, Clone, Default)]
pub struct ThreadsOptions {
    pub room_id: Option<String>,
    pub query: ThreadQuery,
    pub order: SortOrder,
}

impl ThreadsOptions {
    pub fn in_room(room_id: impl Into<String>) -> Self {
        Self {
            room_id: Some(room_id.into()),
            ..Self::default()
        }
    }
}

#[derive(Debug, Default)]
struct StoreState {
    table: ThreadTable,
    optimistic: OptimisticQueue,
    inbox_notifications: InboxNotificationMap,
    /// Loading state per query key
    queries: HashMap<String, bool>,
}

impl StoreState {
    fn projection(&self) -> Projection {
        self.optimistic.project_with(&self.table, &self.inbox_notifications)
    }
}

/// Owns one thread table and one optimistic queue.
///
/// Writes are serialized through an internal lock; every read returns a
/// freshly projected snapshot.
pub struct ClientStore {
    state: RwLock<StoreState>,
    update_sender: broadcast::Sender<StoreEvent>,
}

impl ClientStore {
    /// Create an empty store
    pub fn new() -> Self {
        let (update_sender, _) = broadcast::channel(1024);

        Self {
            state: RwLock::new(StoreState::default()),
            update_sender,
        }
    }

    /// Subscribe to change events
    pub fn subscribe(&self) -> broadcast::Receiver<StoreEvent> {
        self.update_sender.subscribe()
    }

    fn publish(&self, event: StoreEvent) {
        let _ = self.update_sender.send(event);
    }

    /// Merge an authoritative delta into the confirmed threads.
    ///
    /// Returns the number of threads that changed.
    pub fn apply_delta(&self, updates: &ThreadDeltaUpdates) -> usize {
        let (changed, version) = {
            let mut state = self.state.write();
            let changed = apply_thread_delta_updates(&mut state.table, updates);
            (changed, state.table.version())
        };

        if changed > 0 {
            self.publish(StoreEvent::ThreadsChanged { version });
        }
        changed
    }

    /// Merge a server response carrying threads and notifications.
    ///
    /// When `query_key` is given the query is marked as loaded.
    pub fn update_threads_and_notifications(
        &self,
        updates: &ThreadDeltaUpdates,
        inbox_notifications: BTreeMap<String, Option<InboxNotification>>,
        query_key: Option<&str>,
    ) {
        let mut events = Vec::new();
        {
            let mut state = self.state.write();
            if apply_thread_delta_updates(&mut state.table, updates) > 0 {
                events.push(StoreEvent::ThreadsChanged {
                    version: state.table.version(),
                });
            }
            if merge_notifications(&mut state.inbox_notifications, inbox_notifications) {
                events.push(StoreEvent::InboxNotificationsChanged);
            }
            if let Some(key) = query_key {
                state.queries.insert(key.to_string(), false);
                events.push(StoreEvent::QueryLoaded { key: key.to_string() });
            }
        }

        for event in events {
            self.publish(event);
        }
    }

    /// Mark a query as in flight. Returns false if it was already known.
    pub fn set_query_loading(&self, key: &str) -> bool {
        let mut state = self.state.write();
        if state.queries.contains_key(key) {
            return false;
        }
        state.queries.insert(key.to_string(), true);
        debug!(query = %key, "Query loading");
        true
    }

    /// Loading state of a query; `None` if never requested
    pub fn is_query_loading(&self, key: &str) -> Option<bool> {
        self.state.read().queries.get(key).copied()
    }

    /// Queue a local change for immediate display.
    pub fn push_optimistic_update(&self, update: OptimisticUpdate) {
        let pending = {
            let mut state = self.state.write();
            state.optimistic.push(update);
            state.optimistic.len()
        };
        self.publish(StoreEvent::OptimisticUpdatesChanged { pending });
    }

    /// Drop a local change once the server confirmed or rejected it.
    pub fn remove_optimistic_update(&self, id: &OpId) -> Option<OptimisticUpdate> {
        let (removed, pending) = {
            let mut state = self.state.write();
            let removed = state.optimistic.remove(id);
            (removed, state.optimistic.len())
        };

        if removed.is_some() {
            self.publish(StoreEvent::OptimisticUpdatesChanged { pending });
        }
        removed
    }

    /// Queued local changes in application order
    pub fn optimistic_updates(&self) -> Vec<OptimisticUpdate> {
        self.state.read().optimistic.iter().cloned().collect()
    }

    /// Projected live threads
    pub fn threads(&self, options: &ThreadsOptions) -> Vec<Arc<Thread>> {
        let projection = self.state.read().projection();
        query::select(
            projection.threads.values(),
            options.room_id.as_deref(),
            &options.query,
            options.order,
        )
    }

    /// Projected live thread by id
    pub fn thread(&self, id: &str) -> Option<Arc<Thread>> {
        let projection = self.state.read().projection();
        projection.threads.get(id).filter(|t| !t.is_deleted()).cloned()
    }

    /// Like [`ClientStore::thread`], but a missing thread is an error.
    pub fn require_thread(&self, id: &str) -> Result<Arc<Thread>> {
        self.thread(id).ok_or_else(|| Error::ThreadNotFound(id.to_string()))
    }

    /// Confirmed thread regardless of deletion state, without local changes
    pub fn confirmed_thread_even_if_deleted(&self, id: &str) -> Option<Arc<Thread>> {
        self.state.read().table.get_even_if_deleted(id)
    }

    /// Projected notifications, most recent first
    pub fn inbox_notifications(&self) -> Vec<Arc<InboxNotification>> {
        let projection = self.state.read().projection();
        let mut notifications: Vec<_> = projection.inbox_notifications.into_values().collect();
        notifications.sort_by(|a, b| b.notified_at.cmp(&a.notified_at).then_with(|| a.id.cmp(&b.id)));
        notifications
    }

    /// Number of projected unread notifications
    pub fn unread_inbox_notifications_count(&self) -> usize {
        self.inbox_notifications().iter().filter(|n| n.is_unread()).count()
    }

    /// Table version; moves only when confirmed threads change
    pub fn version(&self) -> u64 {
        self.state.read().table.version()
    }

    /// Get statistics
    pub fn stats(&self) -> StoreStats {
        let state = self.state.read();
        StoreStats {
            thread_count: state.table.len(),
            pending_updates: state.optimistic.len(),
            notification_count: state.inbox_notifications.len(),
            version: state.table.version(),
            subscriber_count: self.update_sender.receiver_count(),
        }
    }

    /// Drop everything, e.g. when the session ends
    pub fn clear(&self) {
        let stats = self.stats();
        let version = {
            let mut state = self.state.write();
            let mut table = std::mem::take(&mut state.table);
            table.clear();
            *state = StoreState {
                table,
                ..StoreState::default()
            };
            state.table.version()
        };
        info!(
            threads = stats.thread_count,
            pending = stats.pending_updates,
            version,
            "Cleared client store"
        );
        self.publish(StoreEvent::ThreadsChanged { version });
    }
}

impl Default for ClientStore {
    fn default() -> Self {
        Self::new()
    }
}

/// Store statistics
#[derive(Debug, Clone)]
pub struct StoreStats {
    pub thread_count: usize,
    pub pending_updates: usize,
    pub notification_count: usize,
    pub version: u64,
    pub subscriber_count: usize,
}
