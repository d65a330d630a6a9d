//! Configuration file support
//!
//! ```toml
//! log_level = "debug"
//!
//! [output]
//! format = "json"
//! order = "desc"
//! room = "room_1"
//! ```

use std::path::Path;

use anyhow::{Context, Result};
use roomsync_core::{SortOrder, ThreadQuery};
use serde::Deserialize;

/// How the final state is printed
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    #[default]
    Pretty,
    Json,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct OutputConfig {
    pub format: Option<OutputFormat>,
    pub order: Option<SortOrder>,
    pub room: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct FileConfig {
    pub log_level: Option<String>,
    #[serde(default)]
    pub output: OutputConfig,
}

impl FileConfig {
    pub fn load(path: &Path) -> Result<Self> {
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file {}", path.display()))?;
        toml::from_str(&raw).with_context(|| format!("Invalid config file {}", path.display()))
    }
}

/// Settings after merging flags over the config file over defaults
#[derive(Debug, Clone, PartialEq)]
pub struct ReplayConfig {
    pub log_level: String,
    pub format: OutputFormat,
    pub order: SortOrder,
    pub room: Option<String>,
    pub query: ThreadQuery,
}

impl Default for ReplayConfig {
    fn default() -> Self {
        Self {
            log_level: "info".into(),
            format: OutputFormat::Pretty,
            order: SortOrder::Asc,
            room: None,
            query: ThreadQuery::default(),
        }
    }
}

impl ReplayConfig {
    /// Layer `file` over the defaults, then every `Some` flag over that.
    pub fn resolve(
        file: FileConfig,
        log_level: Option<String>,
        format: Option<OutputFormat>,
        order: Option<SortOrder>,
        room: Option<String>,
        query: Option<ThreadQuery>,
    ) -> Self {
        let defaults = Self::default();
        Self {
            log_level: log_level.or(file.log_level).unwrap_or(defaults.log_level),
            format: format.or(file.output.format).unwrap_or(defaults.format),
            order: order.or(file.output.order).unwrap_or(defaults.order),
            room: room.or(file.output.room),
            query: query.unwrap_or_default(),
        }
    }
}

/// Parse a `--query` filter such as `{"metadata": {"pinned": true}}`
pub fn parse_query(raw: &str) -> Result<ThreadQuery> {
    let value: serde_json::Value = serde_json::from_str(raw).context("Query is not valid JSON")?;
    ThreadQuery::from_json(&value).context("Invalid query")
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_load_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(
            file,
            "log_level = \"debug\"\n[output]\nformat = \"json\"\norder = \"desc\"\nroom = \"room_1\""
        )
        .unwrap();

        let config = FileConfig::load(file.path()).unwrap();
        assert_eq!(config.log_level.as_deref(), Some("debug"));
        assert_eq!(config.output.format, Some(OutputFormat::Json));
        assert_eq!(config.output.order, Some(SortOrder::Desc));
        assert_eq!(config.output.room.as_deref(), Some("room_1"));
    }

    #[test]
    fn test_unknown_keys_rejected() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "verbose = true").unwrap();
        assert!(FileConfig::load(file.path()).is_err());
    }

    #[test]
    fn test_missing_file() {
        assert!(FileConfig::load(Path::new("/definitely/not/here.toml")).is_err());
    }

    #[test]
    fn test_flags_override_file() {
        let file = FileConfig {
            log_level: Some("debug".into()),
            output: OutputConfig {
                format: Some(OutputFormat::Json),
                order: Some(SortOrder::Desc),
                room: Some("room_1".into()),
            },
        };

        let config = ReplayConfig::resolve(file, Some("warn".into()), None, Some(SortOrder::Asc), None, None);
        assert_eq!(config.log_level, "warn");
        assert_eq!(config.format, OutputFormat::Json);
        assert_eq!(config.order, SortOrder::Asc);
        assert_eq!(config.room.as_deref(), Some("room_1"));
    }

    #[test]
    fn test_defaults() {
        let config = ReplayConfig::resolve(FileConfig::default(), None, None, None, None, None);
        assert_eq!(config, ReplayConfig::default());
    }

    #[test]
    fn test_parse_query() {
        let query = parse_query(r#"{"metadata": {"pinned": true}, "resolved": false}"#).unwrap();
        assert_eq!(query, ThreadQuery::default().with_metadata("pinned", true).with_resolved(false));

        let err = parse_query(r#"{"metadata": {"pinned": {"deep": 1}}}"#).unwrap_err();
        assert!(format!("{:#}", err).contains("Invalid metadata value for key 'pinned'"));
        assert!(parse_query("not json").is_err());
    }
}
