//! Inbox notifications

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::Arc;

/// A thread notification in a user's inbox
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InboxNotification {
    pub id: String,
    pub thread_id: String,
    pub room_id: String,
    pub notified_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub read_at: Option<DateTime<Utc>>,
}

impl InboxNotification {
    pub fn is_unread(&self) -> bool {
        match self.read_at {
            None => true,
            Some(read_at) => read_at < self.notified_at,
        }
    }
}

/// Notifications by id
pub type InboxNotificationMap = BTreeMap<String, Arc<InboxNotification>>;

/// Merge incoming notifications into `existing`.
///
/// Incoming entries replace existing ones with the same id; `None` entries
/// remove them. Returns true if anything changed.
pub fn merge_notifications(
    existing: &mut InboxNotificationMap,
    incoming: BTreeMap<String, Option<InboxNotification>>,
) -> bool {
    let mut changed = false;

    for (id, notification) in incoming {
        match notification {
            Some(notification) => {
                if existing.get(&id).map_or(true, |n| **n != notification) {
                    existing.insert(id, Arc::new(notification));
                    changed = true;
                }
            }
            None => {
                changed |= existing.remove(&id).is_some();
            }
        }
    }

    changed
}

/// Mark one notification read in a projected map. No-op if missing.
pub(crate) fn mark_read(map: &mut InboxNotificationMap, id: &str, read_at: DateTime<Utc>) {
    if let Some(notification) = map.get_mut(id) {
        Arc::make_mut(notification).read_at = Some(read_at);
    }
}

/// Mark every notification read in a projected map.
pub(crate) fn mark_all_read(map: &mut InboxNotificationMap, read_at: DateTime<Utc>) {
    for notification in map.values_mut() {
        Arc::make_mut(notification).read_at = Some(read_at);
    }
}
