//! roomsync - replay recorded client events
//!
//! Reads a JSON-lines script of server deltas, optimistic updates, acks,
//! notification responses and cache mutations, feeds it through a client
//! store and prints the resulting state.
//!
//! # Usage
//!
//! ```bash
//! # Replay a script and print a colored summary
//! roomsync session.jsonl
//!
//! # Read from stdin, only room_1, newest first, as JSON
//! cat session.jsonl | roomsync - --room room_1 --order desc --format json
//!
//! # Only unresolved threads pinned via metadata
//! roomsync session.jsonl --query '{"metadata":{"pinned":true},"resolved":false}'
//!
//! # With configuration file
//! roomsync session.jsonl --config roomsync.toml
//! ```

mod config;
mod render;
mod replay;

use std::fs::File;
use std::io::{self, BufReader};
use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;
use roomsync_core::SortOrder;
use tracing::{info, Level};
use tracing_subscriber::FmtSubscriber;

use config::{FileConfig, OutputFormat, ReplayConfig};
use replay::Replayer;

/// Replay roomsync event scripts against an in-memory client store
#[derive(Parser, Debug)]
#[command(name = "roomsync")]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Script to replay, `-` for stdin
    script: PathBuf,

    /// Configuration file path
    #[arg(short, long, env = "ROOMSYNC_CONFIG")]
    config: Option<PathBuf>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, env = "ROOMSYNC_LOG_LEVEL")]
    log_level: Option<String>,

    /// Only list threads of this room
    #[arg(long)]
    room: Option<String>,

    /// Thread order by creation time (asc, desc)
    #[arg(long)]
    order: Option<SortOrder>,

    /// Output format
    #[arg(long, value_enum)]
    format: Option<OutputFormat>,

    /// Thread filter as JSON, e.g. '{"metadata":{"pinned":true},"resolved":false}'
    #[arg(long)]
    query: Option<String>,
}

fn parse_level(level: &str) -> Level {
    match level.to_lowercase().as_str() {
        "trace" => Level::TRACE,
        "debug" => Level::DEBUG,
        "info" => Level::INFO,
        "warn" => Level::WARN,
        "error" => Level::ERROR,
        _ => Level::INFO,
    }
}

fn main() -> Result<()> {
    let args = Args::parse();

    let file_config = match &args.config {
        Some(path) => FileConfig::load(path)?,
        None => FileConfig::default(),
    };
    let query = args.query.as_deref().map(config::parse_query).transpose()?;
    let config = ReplayConfig::resolve(
        file_config,
        args.log_level,
        args.format,
        args.order,
        args.room,
        query,
    );

    // Logs go to stderr so JSON output stays clean
    FmtSubscriber::builder()
        .with_max_level(parse_level(&config.log_level))
        .with_target(false)
        .with_thread_ids(false)
        .with_file(false)
        .with_line_number(false)
        .with_writer(io::stderr)
        .init();

    let mut replayer = Replayer::new();
    if args.script.as_os_str() == "-" {
        info!("Replaying from stdin");
        replayer.run(io::stdin().lock())?;
    } else {
        info!(path = %args.script.display(), "Replaying script");
        let file = File::open(&args.script)
            .with_context(|| format!("Failed to open script {}", args.script.display()))?;
        replayer.run(BufReader::new(file))?;
    }

    let summary = replayer.summary();
    info!(
        events = summary.events,
        changed = summary.changed_threads,
        acked = summary.acked,
        "Replay finished"
    );

    println!("{}", render::render(&replayer, &config)?);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_args_valid() {
        Args::command().debug_assert();
    }

    #[test]
    fn test_parse_args() {
        let args = Args::try_parse_from([
            "roomsync", "-", "--room", "room_1", "--order", "desc", "--format", "json", "--query",
            r#"{"resolved":true}"#,
        ])
        .unwrap();

        assert_eq!(args.script, PathBuf::from("-"));
        assert_eq!(args.room.as_deref(), Some("room_1"));
        assert_eq!(args.order, Some(SortOrder::Desc));
        assert_eq!(args.format, Some(OutputFormat::Json));
        assert_eq!(args.query.as_deref(), Some(r#"{"resolved":true}"#));
    }

    #[test]
    fn test_parse_level() {
        assert_eq!(parse_level("DEBUG"), Level::DEBUG);
        assert_eq!(parse_level("nonsense"), Level::INFO);
    }
}
