//! Feeding a recorded event script through a client store

use std::collections::BTreeMap;
use std::io::BufRead;

use anyhow::{Context, Result};
use roomsync_core::{ClientStore, InboxNotification, OpId, OptimisticUpdate, ThreadDeltaUpdates};
use roomsync_storage::mutations::{arg, arg_str};
use roomsync_storage::{Json, LayeredCache, MutationRegistry};
use serde::Deserialize;
use tracing::{debug, warn};

/// One line of a replay script
#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "type", rename_all = "kebab-case", rename_all_fields = "camelCase")]
pub enum ReplayEvent {
    /// Authoritative server batch
    Delta(ThreadDeltaUpdates),
    /// Local change queued before the server round trip
    Optimistic { update: OptimisticUpdate },
    /// Server confirmed or rejected a local change
    Ack { id: OpId },
    /// Server response carrying notifications, optionally closing a query
    Notifications {
        #[serde(default)]
        notifications: BTreeMap<String, Option<InboxNotification>>,
        #[serde(default)]
        query_key: Option<String>,
    },
    /// Named mutation against the key/value cache
    Mutation {
        name: String,
        #[serde(default)]
        args: Vec<Json>,
    },
}

/// Counters reported after a replay
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReplaySummary {
    pub events: usize,
    pub changed_threads: usize,
    pub acked: usize,
    pub unknown_acks: usize,
    pub failed_mutations: usize,
}

/// Mutations available to scripts
pub fn builtin_mutations() -> MutationRegistry {
    let mut registry = MutationRegistry::new();
    registry
        .register("put", |c, args| {
            c.set(arg_str(args, 0)?, arg(args, 1)?.clone());
            Ok(())
        })
        .register("del", |c, args| {
            c.delete(arg_str(args, 0)?);
            Ok(())
        })
        .register("inc", |c, args| {
            let key = arg_str(args, 0)?;
            let count = c.get_number(key).unwrap_or(0.0);
            c.set(key, count + 1.0);
            Ok(())
        })
        .register("dec", |c, args| {
            let key = arg_str(args, 0)?;
            let count = c.get_number(key).unwrap_or(0.0);
            if count <= 0.0 {
                return Err("Cannot decrement beyond 0".into());
            }
            c.set(key, count - 1.0);
            Ok(())
        });
    registry
}

/// Replays events into a store and a cache
pub struct Replayer {
    pub store: ClientStore,
    pub cache: LayeredCache,
    mutations: MutationRegistry,
    summary: ReplaySummary,
}

impl Replayer {
    pub fn new() -> Self {
        Self {
            store: ClientStore::new(),
            cache: LayeredCache::new(),
            mutations: builtin_mutations(),
            summary: ReplaySummary::default(),
        }
    }

    pub fn summary(&self) -> &ReplaySummary {
        &self.summary
    }

    /// Apply one event. Failed mutations are counted, not fatal.
    pub fn apply(&mut self, event: ReplayEvent) {
        self.summary.events += 1;

        match event {
            ReplayEvent::Delta(updates) => {
                self.summary.changed_threads += self.store.apply_delta(&updates);
            }
            ReplayEvent::Optimistic { update } => {
                self.store.push_optimistic_update(update);
            }
            ReplayEvent::Ack { id } => {
                if self.store.remove_optimistic_update(&id).is_some() {
                    self.summary.acked += 1;
                } else {
                    warn!(op_id = %id, "Ack for unknown optimistic update");
                    self.summary.unknown_acks += 1;
                }
            }
            ReplayEvent::Notifications {
                notifications,
                query_key,
            } => {
                self.store.update_threads_and_notifications(
                    &ThreadDeltaUpdates::default(),
                    notifications,
                    query_key.as_deref(),
                );
            }
            ReplayEvent::Mutation { name, args } => {
                if let Err(e) = self.mutations.run(&mut self.cache, &name, &args) {
                    warn!(error = %e, "Mutation rejected");
                    self.summary.failed_mutations += 1;
                }
            }
        }
    }

    /// Read a JSON-lines script; blank lines and `#` comments are skipped.
    pub fn run<R: BufRead>(&mut self, reader: R) -> Result<()> {
        for (index, line) in reader.lines().enumerate() {
            let line = line.with_context(|| format!("Failed to read line {}", index + 1))?;
            let trimmed = line.trim();
            if trimmed.is_empty() || trimmed.starts_with('#') {
                continue;
            }

            let event: ReplayEvent =
                serde_json::from_str(trimmed).with_context(|| format!("Invalid event on line {}", index + 1))?;
            debug!(line = index + 1, "Replaying event");
            self.apply(event);
        }
        Ok(())
    }
}

impl Default for Replayer {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use roomsync_core::ThreadsOptions;
    use serde_json::json;

    const SCRIPT: &str = r#"
# server snapshot
{"type":"delta","newThreads":[{"id":"th_1","roomId":"room_1","createdAt":"2024-01-01T00:00:00Z","comments":[{"id":"cm_1","threadId":"th_1","roomId":"room_1","userId":"user_1","createdAt":"2024-01-01T00:00:00Z","body":{"version":1,"content":[{"type":"paragraph","children":[{"text":"hi"}]}]}}]}],"deletedThreads":[]}
{"type":"optimistic","update":{"type":"add-reaction","id":"op_aaaa","threadId":"th_1","commentId":"cm_1","emoji":"👍","createdAt":"2024-01-02T00:00:00Z","userId":"user_2"}}
{"type":"optimistic","update":{"type":"edit-thread-metadata","id":"op_bbbb","threadId":"th_1","metadata":{"pinned":true}}}
{"type":"ack","id":"op_bbbb"}
{"type":"ack","id":"op_zzzz"}
{"type":"mutation","name":"inc","args":["views"]}
{"type":"mutation","name":"dec","args":["missing"]}
{"type":"notifications","notifications":{"in_1":{"id":"in_1","threadId":"th_1","roomId":"room_1","notifiedAt":"2024-01-02T00:00:00Z"}},"queryKey":"inbox"}
"#;

    #[test]
    fn test_replay_script() {
        let mut replayer = Replayer::new();
        replayer.run(SCRIPT.as_bytes()).unwrap();

        assert_eq!(
            *replayer.summary(),
            ReplaySummary {
                events: 8,
                changed_threads: 1,
                acked: 1,
                unknown_acks: 1,
                failed_mutations: 1,
            }
        );

        let threads = replayer.store.threads(&ThreadsOptions::default());
        assert_eq!(threads.len(), 1);
        assert!(threads[0].metadata.is_empty());
        assert_eq!(threads[0].comments[0].reactions[0].users, vec!["user_2"]);

        assert_eq!(replayer.cache.get("views"), Some(json!(1.0)));
        assert!(!replayer.cache.has("missing"));
        assert_eq!(replayer.store.inbox_notifications().len(), 1);
        assert_eq!(replayer.store.is_query_loading("inbox"), Some(false));
    }

    #[test]
    fn test_bad_line_reports_line_number() {
        let mut replayer = Replayer::new();
        let err = replayer
            .run("{\"type\":\"ack\",\"id\":\"op_1\"}\n{\"type\":\"bogus\"}\n".as_bytes())
            .unwrap_err();
        assert!(err.to_string().contains("line 2"));
    }
}
