//! Persistence: workspace layout, dual-file repository, atomic writes,
//! numbered backups.
//!
//! A workspace is a directory holding the active files and an `occlude/`
//! subdirectory mirroring them for archived records:
//!
//! ```text
//! <root>/items.txt            active items, one per line
//! <root>/occlude/items.txt    occluded (archived) items
//! <root>/logs.txt             active log entries, JSONL
//! <root>/occlude/logs.txt     occluded log entries
//! ```
//!
//! Item files may begin with `#include <path>` directives that merge another
//! file's items in before the file's own lines are parsed. Saving always
//! writes the active/occluded pair through [`AtomicWriter`] as one
//! transaction, after a topological sort proves the graph is still acyclic.

mod atomic;
mod backup;

pub use atomic::AtomicWriter;
pub use backup::{BackupManager, DEFAULT_RETENTION};

use std::collections::HashSet;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use anyhow::Context;
use thiserror::Error;

use crate::format::{parse_lines, serialize_item};
use crate::graph::{GraphError, TaskGraph};
use crate::logbook::LogBook;
use crate::models::LogEntry;

/// Storage failures, each carrying a human-readable cause chain.
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("file not found: {}", path.display())]
    NotFound { path: PathBuf },
    #[error("cannot read {}", path.display())]
    ReadFailed {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("cannot write {}", path.display())]
    WriteFailed {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("circular include: {} is already being loaded", path.display())]
    CircularInclude { path: PathBuf },
    #[error("refusing to save an unhealthy graph")]
    Unsaveable(#[from] GraphError),
}

// ============================================================
// Workspace layout
// ============================================================

/// Paths of one workspace on disk.
#[derive(Debug, Clone)]
pub struct Workspace {
    root: PathBuf,
}

impl Workspace {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// The platform data directory, for when no workspace path is given.
    pub fn default_root() -> anyhow::Result<PathBuf> {
        let dirs = directories::ProjectDirs::from("", "", "taskloom")
            .context("could not determine data directory")?;
        Ok(dirs.data_dir().to_path_buf())
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn items_file(&self) -> PathBuf {
        self.root.join("items.txt")
    }

    pub fn occluded_items_file(&self) -> PathBuf {
        self.root.join("occlude").join("items.txt")
    }

    pub fn logs_file(&self) -> PathBuf {
        self.root.join("logs.txt")
    }

    pub fn occluded_logs_file(&self) -> PathBuf {
        self.root.join("occlude").join("logs.txt")
    }

    /// Whether `root` already holds a workspace: either the `include/` and
    /// `occlude/` subdirectories, or all four workspace files.
    pub fn is_present(&self) -> bool {
        let dirs = self.root.join("include").is_dir() && self.root.join("occlude").is_dir();
        let files = self.items_file().is_file()
            && self.occluded_items_file().is_file()
            && self.logs_file().is_file()
            && self.occluded_logs_file().is_file();
        dirs || files
    }
}

// ============================================================
// Dual-file repository
// ============================================================

const ITEMS_BANNER: &str = "# TaskLoom items. One item per line; edit freely.\n\
                            # Order follows the dependency graph: requirements come first.\n";
const OCCLUDED_BANNER: &str = "# TaskLoom occluded items. Archived, excluded from default views.\n";

/// Loads and saves the task graph split across the active and occluded
/// files, resolving `#include` directives on the way in.
pub struct Repository {
    workspace: Workspace,
    writer: AtomicWriter,
}

impl Repository {
    pub fn open(workspace: Workspace) -> Self {
        Self::with_retention(workspace, DEFAULT_RETENTION)
    }

    pub fn with_retention(workspace: Workspace, retention: usize) -> Self {
        Self {
            workspace,
            writer: AtomicWriter::new(BackupManager::new(retention)),
        }
    }

    pub fn workspace(&self) -> &Workspace {
        &self.workspace
    }

    /// Load the whole graph. Missing workspace files mean an empty
    /// partition; a missing *included* file is an error, since something
    /// explicitly referenced it.
    pub fn load(&self) -> Result<TaskGraph, StorageError> {
        let mut graph = TaskGraph::new();
        let mut loaded = HashSet::new();
        for (path, occlude) in [
            (self.workspace.items_file(), false),
            (self.workspace.occluded_items_file(), true),
        ] {
            if path.exists() {
                let mut stack = Vec::new();
                load_item_file(&path, occlude, &mut graph, &mut stack, &mut loaded)?;
            }
        }
        Ok(graph)
    }

    /// Save the whole graph as one atomic two-file transaction. Fails
    /// without touching disk when the graph holds a dependency cycle.
    pub fn save(&self, graph: &TaskGraph) -> Result<(), StorageError> {
        let sorted = graph.topological_sort()?;

        let mut active = String::from(ITEMS_BANNER);
        let mut occluded = String::from(OCCLUDED_BANNER);
        for item in sorted {
            let buffer = if item.occlude { &mut occluded } else { &mut active };
            buffer.push_str(&serialize_item(item));
            buffer.push('\n');
        }

        self.writer.write_files(&[
            (self.workspace.items_file(), active),
            (self.workspace.occluded_items_file(), occluded),
        ])
    }

    /// Load the log book from both partitions. Missing files mean an empty
    /// partition; malformed lines are skipped with a warning.
    pub fn load_logs(&self) -> Result<LogBook, StorageError> {
        let mut book = LogBook::new();
        for (path, occlude) in [
            (self.workspace.logs_file(), false),
            (self.workspace.occluded_logs_file(), true),
        ] {
            if !path.exists() {
                continue;
            }
            let text = read_file(&path)?;
            for (number, line) in text.lines().enumerate() {
                if line.trim().is_empty() {
                    continue;
                }
                match serde_json::from_str::<LogEntry>(line) {
                    Ok(entry) => book.insert(entry.with_occlude(occlude)),
                    Err(error) => {
                        tracing::warn!(
                            path = %path.display(),
                            line = number + 1,
                            %error,
                            "skipping malformed log line"
                        );
                    }
                }
            }
        }
        Ok(book)
    }

    /// Save the log book as one atomic two-file transaction.
    pub fn save_logs(&self, book: &LogBook) -> Result<(), StorageError> {
        let mut active = String::new();
        let mut occluded = String::new();
        for entry in book.entries() {
            let line = serde_json::to_string(entry).expect("log entries always serialize");
            let buffer = if entry.occlude { &mut occluded } else { &mut active };
            buffer.push_str(&line);
            buffer.push('\n');
        }
        self.writer.write_files(&[
            (self.workspace.logs_file(), active),
            (self.workspace.occluded_logs_file(), occluded),
        ])
    }
}

// ============================================================
// Include resolution
// ============================================================

/// Load one item file, depth-first through its `#include` directives.
///
/// Directives are only recognized in the unbroken leading run of comment and
/// directive lines; the first blank or item line ends directive scanning.
/// Included files merge in before the file's own items, so the including
/// file's items overwrite included ones with the same id. `stack` holds the
/// canonical paths currently being loaded (a recurrence is a circular
/// include); `loaded` holds everything finished (a recurrence is a harmless
/// diamond and is skipped).
fn load_item_file(
    path: &Path,
    occlude: bool,
    graph: &mut TaskGraph,
    stack: &mut Vec<PathBuf>,
    loaded: &mut HashSet<PathBuf>,
) -> Result<(), StorageError> {
    let canonical = fs::canonicalize(path).map_err(|source| match source.kind() {
        io::ErrorKind::NotFound => StorageError::NotFound {
            path: path.to_path_buf(),
        },
        _ => StorageError::ReadFailed {
            path: path.to_path_buf(),
            source,
        },
    })?;
    if stack.contains(&canonical) {
        return Err(StorageError::CircularInclude { path: canonical });
    }
    if !loaded.insert(canonical.clone()) {
        return Ok(());
    }
    stack.push(canonical);

    let text = read_file(path)?;
    let directory = path.parent().unwrap_or_else(|| Path::new("."));
    let mut body = String::new();
    let mut in_directives = true;
    for line in text.lines() {
        let trimmed = line.trim();
        if in_directives {
            if let Some(target) = include_target(trimmed) {
                let target = directory.join(target);
                load_item_file(&target, occlude, graph, stack, loaded)?;
                continue;
            }
            if trimmed.starts_with('#') {
                continue;
            }
            in_directives = false;
        }
        body.push_str(line);
        body.push('\n');
    }

    for item in parse_lines(&body) {
        graph.insert(item.with_occlude(occlude));
    }

    stack.pop();
    Ok(())
}

/// The path argument of a `#include <path>` directive, or `None` when the
/// line is not a directive.
fn include_target(line: &str) -> Option<&str> {
    let rest = line.strip_prefix("#include")?;
    let target = rest.trim();
    if rest.starts_with(char::is_whitespace) && !target.is_empty() {
        Some(target)
    } else {
        None
    }
}

fn read_file(path: &Path) -> Result<String, StorageError> {
    fs::read_to_string(path).map_err(|source| match source.kind() {
        io::ErrorKind::NotFound => StorageError::NotFound {
            path: path.to_path_buf(),
        },
        _ => StorageError::ReadFailed {
            path: path.to_path_buf(),
            source,
        },
    })
}
