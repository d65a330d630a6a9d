//! roomsync core - thread reconciliation and optimistic updates
//!
//! This crate keeps a client's view of collaborative threads consistent:
//! - A versioned table of server-confirmed threads with "newer wins" upserts
//!   and soft deletion
//! - Delta reconciliation of server batches into that table
//! - A queue of local, unacknowledged changes replayed on every read
//! - A client store tying both together with change notifications

pub mod delta;
pub mod error;
pub mod id;
pub mod metadata;
pub mod notifications;
pub mod optimistic;
pub mod query;
pub mod store;
pub mod table;
pub mod thread;

pub use delta::{apply_thread_delta_updates, ThreadDeltaUpdates};
pub use error::{Error, Result};
pub use id::OpId;
pub use metadata::{Metadata, MetadataPatch, MetadataValue};
pub use notifications::{merge_notifications, InboxNotification};
pub use optimistic::{OptimisticQueue, OptimisticUpdate, Projection};
pub use query::{SortOrder, ThreadQuery};
pub use store::{ClientStore, StoreEvent, StoreStats, ThreadsOptions};
pub use table::{ThreadMap, ThreadTable};
pub use thread::{compare_threads, Comment, CommentBody, Reaction, Thread, ThreadDeleteInfo};
