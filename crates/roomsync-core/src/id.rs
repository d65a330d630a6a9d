//! Operation and entity identifiers
//!
//! Ids are short random tokens drawn from a 64-symbol URL-safe alphabet
//! (`0-9`, `a-z`, `A-Z`, `_`, `-`). Random bytes come from the operating
//! system's CSPRNG; if that source is unavailable generation panics, there
//! is no fallback.

use crate::error::{Error, Result};
use rand_core::{OsRng, RngCore};
use serde::{Deserialize, Serialize};

/// Length of an operation id
pub const OP_ID_LEN: usize = 7;

/// Length of the random part of a thread/comment/notification id
const ENTITY_ID_LEN: usize = 21;

pub const THREAD_ID_PREFIX: &str = "th_";
pub const COMMENT_ID_PREFIX: &str = "cm_";
pub const INBOX_NOTIFICATION_ID_PREFIX: &str = "in_";

/// Map the low 6 bits of a random byte onto the alphabet.
fn symbol(byte: u8) -> char {
    let b = byte & 63;
    match b {
        0..=9 => (b'0' + b) as char,
        10..=35 => (b'a' + (b - 10)) as char,
        36..=61 => (b'A' + (b - 36)) as char,
        62 => '_',
        _ => '-',
    }
}

fn is_symbol(c: char) -> bool {
    c.is_ascii_alphanumeric() || c == '_' || c == '-'
}

/// Generate a random token of `len` symbols.
///
/// # Panics
///
/// Panics if the OS random source fails.
pub fn generate_with_len(len: usize) -> String {
    let mut bytes = vec![0u8; len];
    OsRng.fill_bytes(&mut bytes);
    bytes.into_iter().map(symbol).collect()
}

/// Operation identifier tagging an optimistic update
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct OpId(String);

impl OpId {
    /// Generate a fresh operation id.
    pub fn generate() -> Self {
        Self(generate_with_len(OP_ID_LEN))
    }

    /// Wrap an id received from elsewhere (e.g. an acknowledgment),
    /// validating its alphabet.
    pub fn parse(id: impl Into<String>) -> Result<Self> {
        let id = id.into();

        if id.is_empty() {
            return Err(Error::InvalidOpId("Operation ID cannot be empty".into()));
        }

        if !id.chars().all(is_symbol) {
            return Err(Error::InvalidOpId(format!(
                "Operation ID '{}' contains characters outside [0-9a-zA-Z_-]",
                id
            )));
        }

        Ok(Self(id))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for OpId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Id for a thread created locally, before the server has seen it.
pub fn thread_id() -> String {
    format!("{}{}", THREAD_ID_PREFIX, generate_with_len(ENTITY_ID_LEN))
}

/// Id for a comment created locally.
pub fn comment_id() -> String {
    format!("{}{}", COMMENT_ID_PREFIX, generate_with_len(ENTITY_ID_LEN))
}

/// Id for an inbox notification.
pub fn inbox_notification_id() -> String {
    format!(
        "{}{}",
        INBOX_NOTIFICATION_ID_PREFIX,
        generate_with_len(ENTITY_ID_LEN)
    )
}
