//! Printing the replayed state

use std::collections::BTreeMap;
use std::fmt::Write;

use anyhow::Result;
use colored::*;
use roomsync_core::{InboxNotification, OptimisticUpdate, Thread, ThreadsOptions};
use roomsync_storage::Json;
use serde::Serialize;

use crate::config::{OutputFormat, ReplayConfig};
use crate::replay::{ReplaySummary, Replayer};

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct Report<'a> {
    version: u64,
    threads: Vec<&'a Thread>,
    pending_updates: &'a [OptimisticUpdate],
    inbox_notifications: Vec<&'a InboxNotification>,
    cache: BTreeMap<String, Json>,
}

/// Render the replayer's final state in the configured format
pub fn render(replayer: &Replayer, config: &ReplayConfig) -> Result<String> {
    let options = ThreadsOptions {
        room_id: config.room.clone(),
        query: config.query.clone(),
        order: config.order,
    };
    let threads = replayer.store.threads(&options);
    let pending = replayer.store.optimistic_updates();
    let notifications = replayer.store.inbox_notifications();

    match config.format {
        OutputFormat::Json => {
            let report = Report {
                version: replayer.store.version(),
                threads: threads.iter().map(|t| t.as_ref()).collect(),
                pending_updates: &pending,
                inbox_notifications: notifications.iter().map(|n| n.as_ref()).collect(),
                cache: replayer.cache.snapshot(),
            };
            Ok(serde_json::to_string_pretty(&report)?)
        }
        OutputFormat::Pretty => {
            let mut out = String::new();
            write_threads(&mut out, &threads)?;
            write_pending(&mut out, &pending)?;
            write_notifications(&mut out, &notifications)?;
            write_cache(&mut out, &replayer.cache.snapshot())?;
            write_summary(&mut out, replayer.summary(), replayer.store.version())?;
            Ok(out)
        }
    }
}

fn write_threads<T: AsRef<Thread>>(out: &mut String, threads: &[T]) -> std::fmt::Result {
    writeln!(out, "{} ({})", "Threads".cyan().bold(), threads.len())?;
    for thread in threads {
        let thread = thread.as_ref();
        let status = if thread.resolved { "resolved".green() } else { "open".yellow() };
        writeln!(
            out,
            "  {} [{}] room={} created={}",
            thread.id.bold(),
            status,
            thread.room_id,
            thread.created_at.to_rfc3339()
        )?;
        for (key, value) in &thread.metadata {
            writeln!(out, "    {} = {}", key.dimmed(), serde_json::to_string(value).unwrap_or_default())?;
        }
        for comment in &thread.comments {
            if comment.is_deleted() {
                writeln!(out, "    {} {}", comment.id, "(deleted)".red())?;
                continue;
            }
            let text = comment.body.as_ref().map(|b| b.to_plain_text()).unwrap_or_default();
            writeln!(out, "    {} {}: {}", comment.id, comment.user_id.blue(), text)?;
            for reaction in &comment.reactions {
                writeln!(out, "      {} {}", reaction.emoji, reaction.users.join(", "))?;
            }
        }
    }
    Ok(())
}

fn write_pending(out: &mut String, pending: &[OptimisticUpdate]) -> std::fmt::Result {
    writeln!(out, "{} ({})", "Pending updates".cyan().bold(), pending.len())?;
    for update in pending {
        writeln!(out, "  {} {}", update.id(), update.kind())?;
    }
    Ok(())
}

fn write_notifications<T: AsRef<InboxNotification>>(out: &mut String, notifications: &[T]) -> std::fmt::Result {
    writeln!(out, "{} ({})", "Inbox".cyan().bold(), notifications.len())?;
    for notification in notifications {
        let notification = notification.as_ref();
        let marker = if notification.is_unread() { "unread".yellow() } else { "read".normal() };
        writeln!(
            out,
            "  {} thread={} [{}]",
            notification.id, notification.thread_id, marker
        )?;
    }
    Ok(())
}

fn write_cache(out: &mut String, cache: &BTreeMap<String, Json>) -> std::fmt::Result {
    writeln!(out, "{} ({})", "Cache".cyan().bold(), cache.len())?;
    for (key, value) in cache {
        writeln!(out, "  {} = {}", key, value)?;
    }
    Ok(())
}

fn write_summary(out: &mut String, summary: &ReplaySummary, version: u64) -> std::fmt::Result {
    writeln!(
        out,
        "{} events={} changed={} acked={} unknown_acks={} failed_mutations={} version={}",
        "Replayed".green().bold(),
        summary.events,
        summary.changed_threads,
        summary.acked,
        summary.unknown_acks,
        summary.failed_mutations,
        version
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use roomsync_core::{SortOrder, ThreadQuery};

    const SCRIPT: &str = r#"
{"type":"delta","newThreads":[{"id":"th_a","roomId":"room_1","createdAt":"2024-01-01T00:00:00Z"},{"id":"th_b","roomId":"room_2","createdAt":"2024-01-02T00:00:00Z"}]}
{"type":"optimistic","update":{"type":"mark-thread-as-resolved","id":"op_1","threadId":"th_a","updatedAt":"2024-01-03T00:00:00Z"}}
{"type":"mutation","name":"put","args":["greeting","hello"]}
"#;

    fn replayed() -> Replayer {
        let mut replayer = Replayer::new();
        replayer.run(SCRIPT.as_bytes()).unwrap();
        replayer
    }

    #[test]
    fn test_json_report() {
        let config = ReplayConfig {
            format: OutputFormat::Json,
            order: SortOrder::Desc,
            ..ReplayConfig::default()
        };

        let out = render(&replayed(), &config).unwrap();
        let value: serde_json::Value = serde_json::from_str(&out).unwrap();

        assert_eq!(value["threads"][0]["id"], "th_b");
        assert_eq!(value["threads"][1]["id"], "th_a");
        assert_eq!(value["threads"][1]["resolved"], true);
        assert_eq!(value["pendingUpdates"][0]["type"], "mark-thread-as-resolved");
        assert_eq!(value["cache"]["greeting"], "hello");
        assert_eq!(value["version"], 2);
    }

    #[test]
    fn test_room_filter() {
        let config = ReplayConfig {
            format: OutputFormat::Json,
            room: Some("room_2".into()),
            ..ReplayConfig::default()
        };

        let out = render(&replayed(), &config).unwrap();
        let value: serde_json::Value = serde_json::from_str(&out).unwrap();
        assert_eq!(value["threads"].as_array().map(Vec::len), Some(1));
        assert_eq!(value["threads"][0]["id"], "th_b");
    }

    #[test]
    fn test_query_filter() {
        let config = ReplayConfig {
            format: OutputFormat::Json,
            query: ThreadQuery::default().with_resolved(true),
            ..ReplayConfig::default()
        };

        let out = render(&replayed(), &config).unwrap();
        let value: serde_json::Value = serde_json::from_str(&out).unwrap();
        assert_eq!(value["threads"].as_array().map(Vec::len), Some(1));
        assert_eq!(value["threads"][0]["id"], "th_a");
    }

    #[test]
    fn test_pretty_report() {
        let out = render(&replayed(), &ReplayConfig::default()).unwrap();

        assert!(out.contains("th_a"));
        assert!(out.contains("resolved"));
        assert!(out.contains("op_1"));
        assert!(out.contains("greeting"));
        assert!(out.contains("events=3"));
    }
}
