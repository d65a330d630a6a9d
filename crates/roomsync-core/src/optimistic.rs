//! Optimistic updates: local changes not yet confirmed by the server
//!
//! Updates are queued in the order the user made them and replayed on top of
//! the confirmed [`ThreadTable`] every time state is read. The table itself
//! is never touched; the server's delta eventually carries the same change,
//! at which point the caller removes the update by its [`OpId`].

use crate::id::OpId;
use crate::metadata::{self, MetadataPatch};
use crate::notifications::{self, InboxNotificationMap};
use crate::table::{ThreadMap, ThreadTable};
use crate::thread::{Comment, CommentBody, Reaction, Thread};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, VecDeque};
use std::sync::Arc;
use tracing::debug;

/// A local change, one variant per action kind
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "kebab-case", rename_all_fields = "camelCase")]
pub enum OptimisticUpdate {
    CreateThread {
        id: OpId,
        thread: Thread,
    },
    EditThreadMetadata {
        id: OpId,
        thread_id: String,
        metadata: MetadataPatch,
    },
    MarkThreadAsResolved {
        id: OpId,
        thread_id: String,
        updated_at: DateTime<Utc>,
    },
    MarkThreadAsUnresolved {
        id: OpId,
        thread_id: String,
        updated_at: DateTime<Utc>,
    },
    DeleteThread {
        id: OpId,
        thread_id: String,
        deleted_at: DateTime<Utc>,
    },
    CreateComment {
        id: OpId,
        comment: Comment,
    },
    EditComment {
        id: OpId,
        thread_id: String,
        comment_id: String,
        edited_at: DateTime<Utc>,
        body: CommentBody,
    },
    DeleteComment {
        id: OpId,
        thread_id: String,
        comment_id: String,
        deleted_at: DateTime<Utc>,
    },
    AddReaction {
        id: OpId,
        thread_id: String,
        comment_id: String,
        emoji: String,
        created_at: DateTime<Utc>,
        user_id: String,
    },
    RemoveReaction {
        id: OpId,
        thread_id: String,
        comment_id: String,
        emoji: String,
        user_id: String,
    },
    MarkInboxNotificationAsRead {
        id: OpId,
        inbox_notification_id: String,
        read_at: DateTime<Utc>,
    },
    MarkAllInboxNotificationsAsRead {
        id: OpId,
        read_at: DateTime<Utc>,
    },
}

impl OptimisticUpdate {
    /// Operation id used to remove the update once acknowledged
    pub fn id(&self) -> &OpId {
        match self {
            OptimisticUpdate::CreateThread { id, .. }
            | OptimisticUpdate::EditThreadMetadata { id, .. }
            | OptimisticUpdate::MarkThreadAsResolved { id, .. }
            | OptimisticUpdate::MarkThreadAsUnresolved { id, .. }
            | OptimisticUpdate::DeleteThread { id, .. }
            | OptimisticUpdate::CreateComment { id, .. }
            | OptimisticUpdate::EditComment { id, .. }
            | OptimisticUpdate::DeleteComment { id, .. }
            | OptimisticUpdate::AddReaction { id, .. }
            | OptimisticUpdate::RemoveReaction { id, .. }
            | OptimisticUpdate::MarkInboxNotificationAsRead { id, .. }
            | OptimisticUpdate::MarkAllInboxNotificationsAsRead { id, .. } => id,
        }
    }

    /// Kebab-case kind name, as on the wire
    pub fn kind(&self) -> &'static str {
        match self {
            OptimisticUpdate::CreateThread { .. } => "create-thread",
            OptimisticUpdate::EditThreadMetadata { .. } => "edit-thread-metadata",
            OptimisticUpdate::MarkThreadAsResolved { .. } => "mark-thread-as-resolved",
            OptimisticUpdate::MarkThreadAsUnresolved { .. } => "mark-thread-as-unresolved",
            OptimisticUpdate::DeleteThread { .. } => "delete-thread",
            OptimisticUpdate::CreateComment { .. } => "create-comment",
            OptimisticUpdate::EditComment { .. } => "edit-comment",
            OptimisticUpdate::DeleteComment { .. } => "delete-comment",
            OptimisticUpdate::AddReaction { .. } => "add-reaction",
            OptimisticUpdate::RemoveReaction { .. } => "remove-reaction",
            OptimisticUpdate::MarkInboxNotificationAsRead { .. } => "mark-inbox-notification-as-read",
            OptimisticUpdate::MarkAllInboxNotificationsAsRead { .. } => {
                "mark-all-inbox-notifications-as-read"
            }
        }
    }
}

/// Projected state: confirmed data with every queued update replayed
#[derive(Debug, Clone, Default)]
pub struct Projection {
    pub threads: ThreadMap,
    pub inbox_notifications: InboxNotificationMap,
}

/// FIFO queue of unacknowledged updates
///
/// `push` and `remove` are O(1) amortized: a removed update leaves an empty
/// slot that is reclaimed once it reaches the head of the queue.
#[derive(Debug, Clone, Default)]
pub struct OptimisticQueue {
    /// Updates in insertion order; `None` marks a removed update
    slots: VecDeque<Option<OptimisticUpdate>>,
    /// Operation id -> sequence number of its slot
    index: HashMap<OpId, u64>,
    /// Sequence number of `slots[0]`
    head: u64,
}

impl OptimisticQueue {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.index.len()
    }

    pub fn is_empty(&self) -> bool {
        self.index.is_empty()
    }

    /// Append `update` to the tail.
    ///
    /// Pushing an id that is already queued replaces the earlier update,
    /// which moves to the tail.
    pub fn push(&mut self, update: OptimisticUpdate) {
        let seq = self.head + self.slots.len() as u64;

        if let Some(previous) = self.index.insert(update.id().clone(), seq) {
            self.take_slot(previous);
        }
        debug!(op_id = %update.id(), kind = update.kind(), "Queued optimistic update");
        self.slots.push_back(Some(update));
        self.reclaim();
    }

    /// Remove the update with `id`, returning it if it was queued.
    pub fn remove(&mut self, id: &OpId) -> Option<OptimisticUpdate> {
        let seq = self.index.remove(id)?;
        let update = self.take_slot(seq);
        self.reclaim();
        if update.is_some() {
            debug!(op_id = %id, "Removed optimistic update");
        }
        update
    }

    fn take_slot(&mut self, seq: u64) -> Option<OptimisticUpdate> {
        let offset = usize::try_from(seq.checked_sub(self.head)?).ok()?;
        self.slots.get_mut(offset)?.take()
    }

    fn reclaim(&mut self) {
        while matches!(self.slots.front(), Some(None)) {
            self.slots.pop_front();
            self.head += 1;
        }
    }

    pub fn contains(&self, id: &OpId) -> bool {
        self.index.contains_key(id)
    }

    /// Queued updates in application order
    pub fn iter(&self) -> impl Iterator<Item = &OptimisticUpdate> {
        self.slots.iter().flatten()
    }

    /// Threads with every queued update applied, in order.
    pub fn project(&self, table: &ThreadTable) -> ThreadMap {
        self.project_with(table, &InboxNotificationMap::new()).threads
    }

    /// Threads and notifications with every queued update applied.
    ///
    /// Starts from shared copies of the inputs; only threads an update
    /// touches are cloned.
    pub fn project_with(&self, table: &ThreadTable, inbox_notifications: &InboxNotificationMap) -> Projection {
        let mut projection = Projection {
            threads: table.snapshot(),
            inbox_notifications: inbox_notifications.clone(),
        };
        for update in self.iter() {
            apply_optimistic_update(&mut projection, update);
        }
        projection
    }
}

/// Apply one update to `projection`.
///
/// Updates whose target thread, comment or reaction is missing are ignored:
/// the server may already have moved on (for example another client deleted
/// the thread).
pub fn apply_optimistic_update(projection: &mut Projection, update: &OptimisticUpdate) {
    let threads = &mut projection.threads;

    match update {
        OptimisticUpdate::CreateThread { thread, .. } => {
            threads.insert(thread.id.clone(), Arc::new(thread.clone()));
        }
        OptimisticUpdate::EditThreadMetadata {
            thread_id, metadata, ..
        } => {
            with_thread(threads, thread_id, |thread| {
                metadata::apply_patch(&mut thread.metadata, metadata);
            });
        }
        OptimisticUpdate::MarkThreadAsResolved {
            thread_id, updated_at, ..
        } => {
            with_thread(threads, thread_id, |thread| {
                thread.resolved = true;
                thread.updated_at = Some(*updated_at);
            });
        }
        OptimisticUpdate::MarkThreadAsUnresolved {
            thread_id, updated_at, ..
        } => {
            with_thread(threads, thread_id, |thread| {
                thread.resolved = false;
                thread.updated_at = Some(*updated_at);
            });
        }
        OptimisticUpdate::DeleteThread {
            thread_id, deleted_at, ..
        } => {
            with_thread(threads, thread_id, |thread| {
                thread.mark_deleted(*deleted_at);
            });
        }
        OptimisticUpdate::CreateComment { comment, .. } => {
            with_thread(threads, &comment.thread_id, |thread| {
                thread.comments.push(comment.clone());
            });
        }
        OptimisticUpdate::EditComment {
            thread_id,
            comment_id,
            edited_at,
            body,
            ..
        } => {
            with_comment(threads, thread_id, comment_id, |comment| {
                comment.edited_at = Some(*edited_at);
                comment.body = Some(body.clone());
            });
        }
        OptimisticUpdate::DeleteComment {
            thread_id,
            comment_id,
            deleted_at,
            ..
        } => {
            with_comment(threads, thread_id, comment_id, |comment| {
                comment.deleted_at = Some(*deleted_at);
                comment.body = None;
            });
        }
        OptimisticUpdate::AddReaction {
            thread_id,
            comment_id,
            emoji,
            created_at,
            user_id,
            ..
        } => {
            with_comment(threads, thread_id, comment_id, |comment| {
                match comment.reactions.iter_mut().find(|r| &r.emoji == emoji) {
                    Some(reaction) => reaction.users.push(user_id.clone()),
                    None => comment.reactions.push(Reaction {
                        emoji: emoji.clone(),
                        created_at: *created_at,
                        users: vec![user_id.clone()],
                    }),
                }
            });
        }
        OptimisticUpdate::RemoveReaction {
            thread_id,
            comment_id,
            emoji,
            user_id,
            ..
        } => {
            let reacted = threads
                .get(thread_id)
                .and_then(|t| t.comment(comment_id))
                .and_then(|c| c.reaction(emoji))
                .is_some_and(|r| r.has_user(user_id));
            if !reacted {
                debug!(thread_id = %thread_id, comment_id = %comment_id, emoji = %emoji, "Reaction to remove not found");
                return;
            }

            with_comment(threads, thread_id, comment_id, |comment| {
                if let Some(index) = comment.reactions.iter().position(|r| &r.emoji == emoji) {
                    let reaction = &mut comment.reactions[index];
                    reaction.users.retain(|u| u != user_id);
                    if reaction.users.is_empty() {
                        comment.reactions.remove(index);
                    }
                }
            });
        }
        OptimisticUpdate::MarkInboxNotificationAsRead {
            inbox_notification_id,
            read_at,
            ..
        } => {
            notifications::mark_read(&mut projection.inbox_notifications, inbox_notification_id, *read_at);
        }
        OptimisticUpdate::MarkAllInboxNotificationsAsRead { read_at, .. } => {
            notifications::mark_all_read(&mut projection.inbox_notifications, *read_at);
        }
    }
}

/// Run `f` on a private copy of the thread. No-op if the thread is missing.
fn with_thread(threads: &mut ThreadMap, thread_id: &str, f: impl FnOnce(&mut Thread)) {
    match threads.get_mut(thread_id) {
        Some(thread) => f(Arc::make_mut(thread)),
        None => debug!(thread_id = %thread_id, "Optimistic update targets unknown thread"),
    }
}

/// Run `f` on a private copy of one comment. No-op if the thread or comment
/// is missing; the thread is only copied when the comment exists.
fn with_comment(threads: &mut ThreadMap, thread_id: &str, comment_id: &str, f: impl FnOnce(&mut Comment)) {
    let exists = threads
        .get(thread_id)
        .is_some_and(|t| t.comment(comment_id).is_some());
    if !exists {
        debug!(thread_id = %thread_id, comment_id = %comment_id, "Optimistic update targets unknown comment");
        return;
    }

    with_thread(threads, thread_id, |thread| {
        if let Some(comment) = thread.comment_mut(comment_id) {
            f(comment);
        }
    });
}
