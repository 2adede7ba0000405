use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// One timestamped note in the log book.
///
/// Entries are grouped by `session` (one unit of work), carry free-form
/// tags, and are immutable: occlusion replaces an entry with a flipped-flag
/// copy via [`LogEntry::with_occlude`].
///
/// On disk an entry is one JSON object per line with short keys (`s`, `t`,
/// `m`, `tags`, `meta`). The `occlude` flag is not part of the wire format;
/// it is encoded by which file partition the entry lives in.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LogEntry {
    #[serde(rename = "s")]
    pub session: String,
    #[serde(rename = "t")]
    pub timestamp: DateTime<Utc>,
    #[serde(rename = "m")]
    pub message: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tags: Vec<String>,
    #[serde(
        rename = "meta",
        default,
        skip_serializing_if = "BTreeMap::is_empty"
    )]
    pub metadata: BTreeMap<String, String>,
    #[serde(skip)]
    pub occlude: bool,
}

impl LogEntry {
    pub fn new(
        session: impl Into<String>,
        timestamp: DateTime<Utc>,
        message: impl Into<String>,
    ) -> Self {
        Self {
            session: session.into(),
            timestamp,
            message: message.into(),
            tags: Vec::new(),
            metadata: BTreeMap::new(),
            occlude: false,
        }
    }

    pub fn with_tags(mut self, tags: Vec<String>) -> Self {
        self.tags = tags;
        self
    }

    pub fn with_metadata(mut self, metadata: BTreeMap<String, String>) -> Self {
        self.metadata = metadata;
        self
    }

    pub fn with_occlude(mut self, occlude: bool) -> Self {
        self.occlude = occlude;
        self
    }

    /// Whether the entry carries `tag`.
    pub fn has_tag(&self, tag: &str) -> bool {
        self.tags.iter().any(|t| t == tag)
    }
}
