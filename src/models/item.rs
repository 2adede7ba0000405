use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use super::{Duration, RelationKind, TimeConstraint};

/// One entry in the task graph.
///
/// Items are **immutable value objects**: the graph holds them by value and
/// every "mutation" produces a new item through a `with_*` constructor. This
/// keeps the graph a plain id-keyed collection with no shared mutable state,
/// and makes dry-run commands trivial (build the replacement, throw it away).
///
/// An item serializes to exactly one line of the workspace file; see the
/// `format` module for the grammar.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Item {
    /// Unique identifier: lowercase letters, digits, underscores.
    pub id: String,
    pub title: String,
    pub status: Status,
    pub priority: Priority,
    /// Effort estimate. Absent means no estimate recorded.
    pub duration: Option<Duration>,
    /// Ordered chart (grouping) labels this item appears under.
    pub charts: Vec<String>,
    /// Ordered free-form labels.
    pub tags: Vec<String>,
    /// Typed edges to other items, keyed by relation kind, targets ordered.
    pub relations: BTreeMap<RelationKind, Vec<String>>,
    /// Scheduling constraints (due dates, windows, recurrence).
    pub constraints: Vec<TimeConstraint>,
    /// Free-text comment written by the owner (`# ...` on disk).
    pub user_comment: Option<String>,
    /// Machine-written comment (`### ...` on disk), e.g. health-check notes.
    pub auto_comment: Option<String>,
    /// Archived flag. Occluded items live in the occluded file partition and
    /// are excluded from default views.
    pub occlude: bool,
}

impl Item {
    /// Create a minimal active item with neutral priority and no estimate.
    pub fn new(id: impl Into<String>, title: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            title: title.into(),
            status: Status::NotStarted,
            priority: Priority::Neutral,
            duration: None,
            charts: Vec::new(),
            tags: Vec::new(),
            relations: BTreeMap::new(),
            constraints: Vec::new(),
            user_comment: None,
            auto_comment: None,
            occlude: false,
        }
    }

    pub fn with_status(mut self, status: Status) -> Self {
        self.status = status;
        self
    }

    pub fn with_priority(mut self, priority: Priority) -> Self {
        self.priority = priority;
        self
    }

    pub fn with_duration(mut self, duration: Option<Duration>) -> Self {
        self.duration = duration;
        self
    }

    pub fn with_charts(mut self, charts: Vec<String>) -> Self {
        self.charts = charts;
        self
    }

    pub fn with_tags(mut self, tags: Vec<String>) -> Self {
        self.tags = tags;
        self
    }

    pub fn with_constraints(mut self, constraints: Vec<TimeConstraint>) -> Self {
        self.constraints = constraints;
        self
    }

    pub fn with_user_comment(mut self, comment: Option<String>) -> Self {
        self.user_comment = comment;
        self
    }

    pub fn with_auto_comment(mut self, comment: Option<String>) -> Self {
        self.auto_comment = comment;
        self
    }

    pub fn with_occlude(mut self, occlude: bool) -> Self {
        self.occlude = occlude;
        self
    }

    /// Copy with one relation target appended (deduplicated).
    pub fn with_relation(mut self, kind: RelationKind, target: impl Into<String>) -> Self {
        let target = target.into();
        let targets = self.relations.entry(kind).or_default();
        if !targets.contains(&target) {
            targets.push(target);
        }
        self
    }

    /// Copy with one relation target removed. Empty target lists are dropped
    /// so serialization never emits an empty group.
    pub fn without_relation(mut self, kind: RelationKind, target: &str) -> Self {
        if let Some(targets) = self.relations.get_mut(&kind) {
            targets.retain(|t| t != target);
            if targets.is_empty() {
                self.relations.remove(&kind);
            }
        }
        self
    }

    /// Targets of one relation kind, empty when the kind is absent.
    pub fn relation_targets(&self, kind: RelationKind) -> &[String] {
        self.relations.get(&kind).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Whether `id` is a well-formed item identifier: non-empty, lowercase
    /// letters, digits, and underscores only.
    pub fn valid_id(id: &str) -> bool {
        !id.is_empty()
            && id
                .chars()
                .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '_')
    }
}

/// The work status of an item.
///
/// - `NotStarted` `○`: no work done yet
/// - `InProgress` `◑`: actively being worked
/// - `Blocked` `⊘`: waiting on something else
/// - `Completed` `●`: done
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum Status {
    NotStarted,
    InProgress,
    Blocked,
    Completed,
}

impl Status {
    pub fn symbol(&self) -> char {
        match self {
            Self::NotStarted => '○',
            Self::InProgress => '◑',
            Self::Blocked => '⊘',
            Self::Completed => '●',
        }
    }

    pub fn from_symbol(c: char) -> Option<Self> {
        match c {
            '○' => Some(Self::NotStarted),
            '◑' => Some(Self::InProgress),
            '⊘' => Some(Self::Blocked),
            '●' => Some(Self::Completed),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::NotStarted => "not_started",
            Self::InProgress => "in_progress",
            Self::Blocked => "blocked",
            Self::Completed => "completed",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "not_started" => Some(Self::NotStarted),
            "in_progress" => Some(Self::InProgress),
            "blocked" => Some(Self::Blocked),
            "completed" => Some(Self::Completed),
            _ => None,
        }
    }
}

/// Urgency of an item, ordered from least to most pressing.
///
/// `Unsure` sits outside the urgency scale: it marks an item whose priority
/// has not been decided. On disk the priority is a symbol suffixed to the
/// item id (`write_tests!!` is High); `Neutral` has no symbol at all.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord)]
#[serde(rename_all = "snake_case")]
pub enum Priority {
    Lowest,
    Low,
    Neutral,
    Medium,
    High,
    Critical,
    Unsure,
}

impl Priority {
    pub fn symbol(&self) -> &'static str {
        match self {
            Self::Lowest => ",,,",
            Self::Low => "...",
            Self::Neutral => "",
            Self::Medium => "!",
            Self::High => "!!",
            Self::Critical => "!!!",
            Self::Unsure => "?",
        }
    }

    /// Split a priority symbol off the end of an id token, longest match
    /// first so `!!!` is not read as `!` + `!!`.
    pub fn split_suffix(token: &str) -> (&str, Self) {
        const SYMBOLS: &[(&str, Priority)] = &[
            ("!!!", Priority::Critical),
            (",,,", Priority::Lowest),
            ("...", Priority::Low),
            ("!!", Priority::High),
            ("!", Priority::Medium),
            ("?", Priority::Unsure),
        ];
        for (symbol, priority) in SYMBOLS {
            if let Some(rest) = token.strip_suffix(symbol) {
                return (rest, *priority);
            }
        }
        (token, Priority::Neutral)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Lowest => "lowest",
            Self::Low => "low",
            Self::Neutral => "neutral",
            Self::Medium => "medium",
            Self::High => "high",
            Self::Critical => "critical",
            Self::Unsure => "unsure",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "lowest" => Some(Self::Lowest),
            "low" => Some(Self::Low),
            "neutral" => Some(Self::Neutral),
            "medium" => Some(Self::Medium),
            "high" => Some(Self::High),
            "critical" => Some(Self::Critical),
            "unsure" => Some(Self::Unsure),
            _ => None,
        }
    }
}
