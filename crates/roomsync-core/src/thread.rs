//! Thread, comment and reaction types

use crate::metadata::Metadata;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;

/// A discussion thread: the unit of reconciliation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Thread {
    pub id: String,
    pub room_id: String,
    pub created_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub deleted_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub metadata: Metadata,
    #[serde(default)]
    pub resolved: bool,
    #[serde(default)]
    pub comments: Vec<Comment>,
}

impl Thread {
    pub fn new(id: impl Into<String>, room_id: impl Into<String>, created_at: DateTime<Utc>) -> Self {
        Self {
            id: id.into(),
            room_id: room_id.into(),
            created_at,
            updated_at: None,
            deleted_at: None,
            metadata: Metadata::new(),
            resolved: false,
            comments: Vec::new(),
        }
    }

    pub fn is_deleted(&self) -> bool {
        self.deleted_at.is_some()
    }

    pub fn comment(&self, comment_id: &str) -> Option<&Comment> {
        self.comments.iter().find(|c| c.id == comment_id)
    }

    pub fn comment_mut(&mut self, comment_id: &str) -> Option<&mut Comment> {
        self.comments.iter_mut().find(|c| c.id == comment_id)
    }

    /// Soft-delete at `deleted_at`: comments are dropped, the thread stays.
    pub(crate) fn mark_deleted(&mut self, deleted_at: DateTime<Utc>) {
        self.deleted_at = Some(deleted_at);
        self.updated_at = Some(deleted_at);
        self.comments.clear();
    }
}

/// A comment inside a thread
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Comment {
    pub id: String,
    pub thread_id: String,
    pub room_id: String,
    pub user_id: String,
    pub created_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub edited_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub deleted_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub body: Option<CommentBody>,
    #[serde(default)]
    pub reactions: Vec<Reaction>,
}

impl Comment {
    pub fn is_deleted(&self) -> bool {
        self.deleted_at.is_some()
    }

    pub fn reaction(&self, emoji: &str) -> Option<&Reaction> {
        self.reactions.iter().find(|r| r.emoji == emoji)
    }
}

/// Users who reacted to a comment with one emoji.
///
/// Never empty: removing the last user removes the reaction.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Reaction {
    pub emoji: String,
    pub created_at: DateTime<Utc>,
    pub users: Vec<String>,
}

impl Reaction {
    pub fn has_user(&self, user_id: &str) -> bool {
        self.users.iter().any(|u| u == user_id)
    }
}

/// Tombstone for a thread deleted on the server
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ThreadDeleteInfo {
    pub id: String,
    pub room_id: String,
    pub deleted_at: DateTime<Utc>,
}

/// Rich-text comment body
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CommentBody {
    pub version: u32,
    pub content: Vec<CommentBodyBlock>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "kebab-case")]
pub enum CommentBodyBlock {
    Paragraph { children: Vec<CommentBodyInline> },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum CommentBodyInline {
    Element(CommentBodyElement),
    Text(CommentBodyText),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "kebab-case")]
pub enum CommentBodyElement {
    Mention { id: String },
    Link {
        url: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        text: Option<String>,
    },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CommentBodyText {
    pub text: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bold: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub italic: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub strikethrough: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub code: Option<bool>,
}

impl CommentBody {
    /// A body made of one paragraph of plain text.
    pub fn plain(text: impl Into<String>) -> Self {
        Self {
            version: 1,
            content: vec![CommentBodyBlock::Paragraph {
                children: vec![CommentBodyInline::Text(CommentBodyText {
                    text: text.into(),
                    bold: None,
                    italic: None,
                    strikethrough: None,
                    code: None,
                })],
            }],
        }
    }

    /// Plain-text rendering; paragraphs are joined with newlines, mentions
    /// render as `@id`.
    pub fn to_plain_text(&self) -> String {
        self.content
            .iter()
            .map(|block| match block {
                CommentBodyBlock::Paragraph { children } => children
                    .iter()
                    .map(|inline| match inline {
                        CommentBodyInline::Text(t) => t.text.clone(),
                        CommentBodyInline::Element(CommentBodyElement::Mention { id }) => {
                            format!("@{}", id)
                        }
                        CommentBodyInline::Element(CommentBodyElement::Link { url, text }) => {
                            text.clone().unwrap_or_else(|| url.clone())
                        }
                    })
                    .collect::<String>(),
            })
            .collect::<Vec<_>>()
            .join("\n")
    }

    /// User ids mentioned in the body, in order of first appearance.
    pub fn mentioned_user_ids(&self) -> Vec<&str> {
        let mut ids: Vec<&str> = Vec::new();
        for block in &self.content {
            let CommentBodyBlock::Paragraph { children } = block;
            for inline in children {
                if let CommentBodyInline::Element(CommentBodyElement::Mention { id }) = inline {
                    if !ids.contains(&id.as_str()) {
                        ids.push(id.as_str());
                    }
                }
            }
        }
        ids
    }
}

/// Three-way "newer wins" comparison.
///
/// `Greater` means `a` is newer than `b`. `updated_at` decides when both
/// have it; a thread with `updated_at` beats one without; otherwise
/// `created_at` decides.
pub fn compare_threads(a: &Thread, b: &Thread) -> Ordering {
    match (a.updated_at, b.updated_at) {
        (Some(ua), Some(ub)) => ua.cmp(&ub),
        (Some(_), None) => Ordering::Greater,
        (None, Some(_)) => Ordering::Less,
        (None, None) => a.created_at.cmp(&b.created_at),
    }
}
