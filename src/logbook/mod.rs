//! The log book: a time-ordered collection of [`LogEntry`] records with
//! session/tag/date queries and its own occlusion mechanism.
//!
//! Entries stay sorted by timestamp; insertion finds its spot by binary
//! search. Queries read the active partition (occluded entries are excluded
//! from default views, same as items). Occlusion selects candidates with a
//! [`LogSelector`], and runs in dry-run or live mode through the same code
//! path, so a preview always reports exactly what the live run would do.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};

use crate::models::LogEntry;

/// Which entries an occlusion (or analysis) pass should touch.
#[derive(Debug, Clone)]
pub enum LogSelector {
    /// All entries of one session.
    Session(String),
    /// Entries carrying at least one of the tags.
    TagsAny(Vec<String>),
    /// Entries carrying every one of the tags.
    TagsAll(Vec<String>),
    /// Entries with `from <= timestamp <= to`.
    DateRange {
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    },
}

impl LogSelector {
    fn matches(&self, entry: &LogEntry) -> bool {
        match self {
            Self::Session(session) => entry.session == *session,
            Self::TagsAny(tags) => tags.iter().any(|t| entry.has_tag(t)),
            Self::TagsAll(tags) => tags.iter().all(|t| entry.has_tag(t)),
            Self::DateRange { from, to } => *from <= entry.timestamp && entry.timestamp <= *to,
        }
    }
}

/// Candidate counts for an occlusion preview, broken down for the UI.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct OcclusionAnalysis {
    pub total: usize,
    pub by_session: BTreeMap<String, usize>,
    pub by_tag: BTreeMap<String, usize>,
}

/// Timestamp-ordered log collection.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct LogBook {
    entries: Vec<LogEntry>,
}

impl LogBook {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_entries(entries: impl IntoIterator<Item = LogEntry>) -> Self {
        let mut book = Self::new();
        for entry in entries {
            book.insert(entry);
        }
        book
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Insert keeping timestamp order; equal timestamps keep insertion
    /// order.
    pub fn insert(&mut self, entry: LogEntry) {
        let at = self
            .entries
            .partition_point(|existing| existing.timestamp <= entry.timestamp);
        self.entries.insert(at, entry);
    }

    /// Every entry, oldest first, both partitions.
    pub fn entries(&self) -> &[LogEntry] {
        &self.entries
    }

    pub fn active(&self) -> impl Iterator<Item = &LogEntry> {
        self.entries.iter().filter(|e| !e.occlude)
    }

    pub fn occluded(&self) -> impl Iterator<Item = &LogEntry> {
        self.entries.iter().filter(|e| e.occlude)
    }

    // ============================================================
    // Queries (active partition)
    // ============================================================

    pub fn by_session(&self, session: &str) -> Vec<&LogEntry> {
        self.active().filter(|e| e.session == session).collect()
    }

    pub fn by_tags_any(&self, tags: &[String]) -> Vec<&LogEntry> {
        self.active()
            .filter(|e| tags.iter().any(|t| e.has_tag(t)))
            .collect()
    }

    pub fn by_tags_all(&self, tags: &[String]) -> Vec<&LogEntry> {
        self.active()
            .filter(|e| tags.iter().all(|t| e.has_tag(t)))
            .collect()
    }

    pub fn by_range(&self, from: DateTime<Utc>, to: DateTime<Utc>) -> Vec<&LogEntry> {
        self.active()
            .filter(|e| from <= e.timestamp && e.timestamp <= to)
            .collect()
    }

    /// Case-insensitive substring match against the message.
    pub fn by_substring(&self, query: &str) -> Vec<&LogEntry> {
        let needle = query.to_lowercase();
        self.active()
            .filter(|e| e.message.to_lowercase().contains(&needle))
            .collect()
    }

    // ============================================================
    // Occlusion
    // ============================================================

    /// Occlude every active entry the selector matches. Dry-run reports the
    /// candidate count without touching anything; live mode replaces each
    /// candidate with a flipped-flag copy.
    pub fn occlude_where(&mut self, selector: &LogSelector, dry_run: bool) -> usize {
        self.flip_where(selector, true, dry_run)
    }

    /// Restore (un-occlude) every occluded entry the selector matches.
    pub fn restore_where(&mut self, selector: &LogSelector, dry_run: bool) -> usize {
        self.flip_where(selector, false, dry_run)
    }

    fn flip_where(&mut self, selector: &LogSelector, occlude: bool, dry_run: bool) -> usize {
        let candidates: Vec<usize> = self
            .entries
            .iter()
            .enumerate()
            .filter(|(_, e)| e.occlude != occlude && selector.matches(e))
            .map(|(i, _)| i)
            .collect();
        if !dry_run {
            for &i in &candidates {
                let replacement = self.entries[i].clone().with_occlude(occlude);
                self.entries[i] = replacement;
            }
        }
        candidates.len()
    }

    /// Report what an occlusion pass would touch, broken down by session and
    /// tag, without mutating anything.
    pub fn analyze(&self, selector: &LogSelector) -> OcclusionAnalysis {
        let mut analysis = OcclusionAnalysis::default();
        for entry in self.active().filter(|e| selector.matches(e)) {
            analysis.total += 1;
            *analysis.by_session.entry(entry.session.clone()).or_insert(0) += 1;
            for tag in &entry.tags {
                *analysis.by_tag.entry(tag.clone()).or_insert(0) += 1;
            }
        }
        analysis
    }
}
