//! Read-time thread filtering and ordering

use crate::error::{self, Error};
use crate::metadata::{self, Metadata};
use crate::thread::Thread;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// Ordering of listed threads by creation time
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SortOrder {
    #[default]
    Asc,
    Desc,
}

impl std::fmt::Display for SortOrder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SortOrder::Asc => write!(f, "asc"),
            SortOrder::Desc => write!(f, "desc"),
        }
    }
}

impl std::str::FromStr for SortOrder {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "asc" => Ok(SortOrder::Asc),
            "desc" => Ok(SortOrder::Desc),
            _ => Err(format!("Unknown sort order: {}", s)),
        }
    }
}

/// Filter applied when listing threads
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ThreadQuery {
    /// Every key must be present on the thread with an equal value
    #[serde(default)]
    pub metadata: Metadata,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub resolved: Option<bool>,
}

impl ThreadQuery {
    pub fn with_metadata(mut self, key: impl Into<String>, value: impl Into<metadata::MetadataValue>) -> Self {
        self.metadata.insert(key.into(), value.into());
        self
    }

    pub fn with_resolved(mut self, resolved: bool) -> Self {
        self.resolved = Some(resolved);
        self
    }

    /// Parse a filter such as `{"metadata": {"pinned": true}, "resolved": false}`.
    ///
    /// Metadata values must be scalars; anything else is
    /// [`Error::InvalidMetadata`].
    pub fn from_json(value: &serde_json::Value) -> error::Result<Self> {
        let object = value.as_object().ok_or_else(|| Error::InvalidMetadata {
            key: String::new(),
            reason: "query must be a JSON object".into(),
        })?;

        let mut query = ThreadQuery::default();
        for (key, value) in object {
            match key.as_str() {
                "metadata" => query.metadata = metadata::metadata_from_json(value)?,
                "resolved" => match value {
                    serde_json::Value::Null => query.resolved = None,
                    serde_json::Value::Bool(b) => query.resolved = Some(*b),
                    _ => return Err(Error::Serialization("resolved must be a boolean".into())),
                },
                other => return Err(Error::Serialization(format!("unknown query field '{}'", other))),
            }
        }
        Ok(query)
    }

    pub fn matches(&self, thread: &Thread) -> bool {
        if let Some(resolved) = self.resolved {
            if thread.resolved != resolved {
                return false;
            }
        }
        metadata::matches(&thread.metadata, &self.metadata)
    }
}

/// Keep live threads in `room_id` (any room when `None`) that match
/// `query`, ordered by creation time then id.
pub fn select<'a, I>(threads: I, room_id: Option<&str>, query: &ThreadQuery, order: SortOrder) -> Vec<Arc<Thread>>
where
    I: IntoIterator<Item = &'a Arc<Thread>>,
{
    let mut selected: Vec<Arc<Thread>> = threads
        .into_iter()
        .filter(|t| !t.is_deleted())
        .filter(|t| room_id.map_or(true, |room| t.room_id == room))
        .filter(|t| query.matches(t))
        .cloned()
        .collect();

    selected.sort_by(|a, b| a.created_at.cmp(&b.created_at).then_with(|| a.id.cmp(&b.id)));
    if order == SortOrder::Desc {
        selected.reverse();
    }
    selected
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};

    fn thread(id: &str, room: &str, day: u32) -> Arc<Thread> {
        Arc::new(Thread::new(id, room, Utc.with_ymd_and_hms(2024, 1, day, 0, 0, 0).unwrap()))
    }

    #[test]
    fn test_select_orders_and_filters_room() {
        let threads = vec![
            thread("th_b", "room_1", 2),
            thread("th_a", "room_1", 1),
            thread("th_c", "room_2", 3),
        ];

        let asc: Vec<_> = select(&threads, Some("room_1"), &ThreadQuery::default(), SortOrder::Asc)
            .iter()
            .map(|t| t.id.clone())
            .collect();
        assert_eq!(asc, vec!["th_a", "th_b"]);

        let desc: Vec<_> = select(&threads, None, &ThreadQuery::default(), SortOrder::Desc)
            .iter()
            .map(|t| t.id.clone())
            .collect();
        assert_eq!(desc, vec!["th_c", "th_b", "th_a"]);
    }

    #[test]
    fn test_select_by_metadata_and_resolved() {
        let mut pinned = Thread::new("th_1", "room_1", Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap());
        pinned.metadata.insert("pinned".into(), true.into());
        pinned.resolved = true;
        let threads = vec![Arc::new(pinned), thread("th_2", "room_1", 2)];

        let query = ThreadQuery::default().with_metadata("pinned", true);
        assert_eq!(select(&threads, None, &query, SortOrder::Asc).len(), 1);

        let unresolved = ThreadQuery::default().with_resolved(false);
        let result = select(&threads, None, &unresolved, SortOrder::Asc);
        assert_eq!(result.len(), 1);
        assert_eq!(result[0].id, "th_2");
    }

    #[test]
    fn test_query_from_json() {
        let query = ThreadQuery::from_json(&serde_json::json!({
            "metadata": {"pinned": true, "priority": 2},
            "resolved": false
        }))
        .unwrap();
        assert_eq!(
            query,
            ThreadQuery::default()
                .with_metadata("pinned", true)
                .with_metadata("priority", 2i64)
                .with_resolved(false)
        );

        let err = ThreadQuery::from_json(&serde_json::json!({"metadata": {"tags": ["a"]}})).unwrap_err();
        assert!(matches!(err, Error::InvalidMetadata { ref key, .. } if key == "tags"));

        assert!(ThreadQuery::from_json(&serde_json::json!({"resolved": "yes"})).is_err());
        assert!(ThreadQuery::from_json(&serde_json::json!({"room": "room_1"})).is_err());
        assert!(ThreadQuery::from_json(&serde_json::json!([])).is_err());
    }

    #[test]
    fn test_sort_order_parse() {
        assert_eq!("DESC".parse::<SortOrder>().unwrap(), SortOrder::Desc);
        assert!("sideways".parse::<SortOrder>().is_err());
    }
}
