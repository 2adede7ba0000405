//! The command/result boundary.
//!
//! Presentation layers (views, interpreters, exporters) drive the engine
//! through these functions and get back a [`CommandOutcome`]: success or
//! failure plus a message, never a panic. Each command is one load → mutate
//! → persist cycle; callers serialize access to a workspace themselves (one
//! in-flight command per workspace).
//!
//! Mutations that would break the dependency invariant are undone in memory
//! before the failure surfaces, so the persisted files never regress. Where
//! a command supports dry-run, the dry and live passes share one code path,
//! and a dry-run failure reads exactly like the live one would.

use crate::graph::TaskGraph;
use crate::logbook::LogSelector;
use crate::models::{Item, LogEntry, Priority, RelationKind, Status};
use crate::storage::Repository;
use crate::sync::{migrate_graph, FlowClient};

/// What a command did (or would do, for dry runs).
#[derive(Debug, Clone, PartialEq)]
pub struct CommandOutcome {
    pub success: bool,
    pub message: String,
    /// Ids of the items (or count descriptions) the command touched.
    pub changed: Vec<String>,
}

impl CommandOutcome {
    fn ok(message: impl Into<String>) -> Self {
        Self {
            success: true,
            message: message.into(),
            changed: Vec::new(),
        }
    }

    fn ok_with(message: impl Into<String>, changed: Vec<String>) -> Self {
        Self {
            success: true,
            message: message.into(),
            changed,
        }
    }

    fn failed(message: impl Into<String>) -> Self {
        Self {
            success: false,
            message: message.into(),
            changed: Vec::new(),
        }
    }
}

/// Which items an occlusion command should touch.
#[derive(Debug, Clone)]
pub enum ItemSelector {
    Ids(Vec<String>),
    Tag(String),
}

fn run(body: impl FnOnce() -> anyhow::Result<CommandOutcome>) -> CommandOutcome {
    body().unwrap_or_else(|error| CommandOutcome::failed(format!("{error:#}")))
}

// ============================================================
// Item commands
// ============================================================

/// Add a new item. Rejects a duplicate id, a title collision with an
/// existing item, and any relation wiring that would create a cycle, all
/// before anything is persisted.
pub fn add_item(repo: &Repository, item: Item) -> CommandOutcome {
    run(|| {
        let mut graph = repo.load()?;
        if graph.contains(&item.id) {
            return Ok(CommandOutcome::failed(format!(
                "item {:?} already exists",
                item.id
            )));
        }
        if let Some(existing) = graph.iter().find(|e| e.title == item.title) {
            return Ok(CommandOutcome::failed(format!(
                "item {:?} already has this title",
                existing.id
            )));
        }

        let id = item.id.clone();
        graph.insert(item);
        if let Err(error) = graph.check_acyclic() {
            return Ok(CommandOutcome::failed(error.to_string()));
        }
        repo.save(&graph)?;
        Ok(CommandOutcome::ok_with(format!("added {id}"), vec![id]))
    })
}

/// Remove the item matching `query` (substring of id or title).
pub fn remove_item(repo: &Repository, query: &str) -> CommandOutcome {
    run(|| {
        let mut graph = repo.load()?;
        let id = match graph.find(query) {
            Ok(item) => item.id.clone(),
            Err(error) => return Ok(CommandOutcome::failed(error.to_string())),
        };
        graph.remove(&id);
        repo.save(&graph)?;
        Ok(CommandOutcome::ok_with(format!("removed {id}"), vec![id]))
    })
}

pub fn set_status(repo: &Repository, query: &str, status: Status) -> CommandOutcome {
    update_item(repo, query, |item| item.with_status(status))
}

pub fn set_priority(repo: &Repository, query: &str, priority: Priority) -> CommandOutcome {
    update_item(repo, query, |item| item.with_priority(priority))
}

fn update_item(
    repo: &Repository,
    query: &str,
    change: impl FnOnce(Item) -> Item,
) -> CommandOutcome {
    run(|| {
        let mut graph = repo.load()?;
        let item = match graph.find(query) {
            Ok(item) => item.clone(),
            Err(error) => return Ok(CommandOutcome::failed(error.to_string())),
        };
        let id = item.id.clone();
        graph.insert(change(item));
        repo.save(&graph)?;
        Ok(CommandOutcome::ok_with(format!("updated {id}"), vec![id]))
    })
}

/// Add one relation edge. A REQUIRES/ANYOF edge that would create a cycle is
/// undone in memory and rejected before persistence.
pub fn add_relation(
    repo: &Repository,
    from_query: &str,
    kind: RelationKind,
    target_id: &str,
) -> CommandOutcome {
    run(|| {
        let mut graph = repo.load()?;
        let from = match graph.find(from_query) {
            Ok(item) => item.clone(),
            Err(error) => return Ok(CommandOutcome::failed(error.to_string())),
        };
        if !graph.contains(target_id) {
            return Ok(CommandOutcome::failed(format!(
                "no item matches {target_id:?}"
            )));
        }
        let id = from.id.clone();
        let previous = from.clone();
        graph.insert(from.with_relation(kind, target_id));
        if let Err(error) = graph.check_acyclic() {
            graph.insert(previous);
            return Ok(CommandOutcome::failed(error.to_string()));
        }
        repo.save(&graph)?;
        Ok(CommandOutcome::ok_with(
            format!("{id} {} {target_id}", kind.as_str()),
            vec![id],
        ))
    })
}

pub fn remove_relation(
    repo: &Repository,
    from_query: &str,
    kind: RelationKind,
    target_id: &str,
) -> CommandOutcome {
    run(|| {
        let mut graph = repo.load()?;
        let from = match graph.find(from_query) {
            Ok(item) => item.clone(),
            Err(error) => return Ok(CommandOutcome::failed(error.to_string())),
        };
        let id = from.id.clone();
        graph.insert(from.without_relation(kind, target_id));
        repo.save(&graph)?;
        Ok(CommandOutcome::ok_with(format!("updated {id}"), vec![id]))
    })
}

/// Add `item` into the REQUIRES chain between two existing items.
pub fn insert_between(
    repo: &Repository,
    item: Item,
    before_query: &str,
    after_query: &str,
) -> CommandOutcome {
    run(|| {
        let mut graph = repo.load()?;
        let before_id = match graph.find(before_query) {
            Ok(found) => found.id.clone(),
            Err(error) => return Ok(CommandOutcome::failed(error.to_string())),
        };
        let after_id = match graph.find(after_query) {
            Ok(found) => found.id.clone(),
            Err(error) => return Ok(CommandOutcome::failed(error.to_string())),
        };
        let id = item.id.clone();
        if let Err(error) = graph.insert_between(item, &before_id, &after_id) {
            return Ok(CommandOutcome::failed(error.to_string()));
        }
        repo.save(&graph)?;
        Ok(CommandOutcome::ok_with(
            format!("inserted {id} between {before_id} and {after_id}"),
            vec![before_id, id, after_id],
        ))
    })
}

// ============================================================
// Occlusion commands
// ============================================================

/// Occlude (archive) items by ids or tag. Dry-run reports the same items
/// and the same failures without mutating or saving.
pub fn occlude_items(repo: &Repository, selector: &ItemSelector, dry_run: bool) -> CommandOutcome {
    flip_items(repo, selector, true, dry_run)
}

/// Bring occluded items back into the active partition.
pub fn include_items(repo: &Repository, selector: &ItemSelector, dry_run: bool) -> CommandOutcome {
    flip_items(repo, selector, false, dry_run)
}

fn flip_items(
    repo: &Repository,
    selector: &ItemSelector,
    occlude: bool,
    dry_run: bool,
) -> CommandOutcome {
    run(|| {
        let mut graph = repo.load()?;
        let candidates = match select_items(&graph, selector, occlude) {
            Ok(ids) => ids,
            Err(message) => return Ok(CommandOutcome::failed(message)),
        };
        if candidates.is_empty() {
            return Ok(CommandOutcome::failed("no items matched"));
        }

        if !dry_run {
            for id in &candidates {
                let item = graph.get(id).expect("candidate exists").clone();
                graph.insert(item.with_occlude(occlude));
            }
            repo.save(&graph)?;
        }

        let verb = match (occlude, dry_run) {
            (true, false) => "occluded",
            (true, true) => "would occlude",
            (false, false) => "included",
            (false, true) => "would include",
        };
        Ok(CommandOutcome::ok_with(
            format!("{verb} {} item(s)", candidates.len()),
            candidates,
        ))
    })
}

/// Resolve a selector against the partition currently holding the opposite
/// flag, so occluding only sees active items and including only occluded
/// ones.
fn select_items(
    graph: &TaskGraph,
    selector: &ItemSelector,
    occlude: bool,
) -> Result<Vec<String>, String> {
    match selector {
        ItemSelector::Ids(ids) => {
            let mut candidates = Vec::new();
            for id in ids {
                match graph.get(id) {
                    Some(item) if item.occlude != occlude => candidates.push(item.id.clone()),
                    Some(_) => {}
                    None => return Err(format!("no item matches {id:?}")),
                }
            }
            Ok(candidates)
        }
        ItemSelector::Tag(tag) => Ok(graph
            .iter()
            .filter(|item| item.occlude != occlude && item.tags.iter().any(|t| t == tag))
            .map(|item| item.id.clone())
            .collect()),
    }
}

/// Occlude log entries matching the selector. Same shape as the item
/// version: dry-run previews, live mode flips and saves.
pub fn occlude_logs(repo: &Repository, selector: &LogSelector, dry_run: bool) -> CommandOutcome {
    flip_logs(repo, selector, true, dry_run)
}

pub fn restore_logs(repo: &Repository, selector: &LogSelector, dry_run: bool) -> CommandOutcome {
    flip_logs(repo, selector, false, dry_run)
}

fn flip_logs(
    repo: &Repository,
    selector: &LogSelector,
    occlude: bool,
    dry_run: bool,
) -> CommandOutcome {
    run(|| {
        let mut book = repo.load_logs()?;
        let matched = if occlude {
            book.occlude_where(selector, dry_run)
        } else {
            book.restore_where(selector, dry_run)
        };
        if matched == 0 {
            return Ok(CommandOutcome::failed("no log entries matched"));
        }
        if !dry_run {
            repo.save_logs(&book)?;
        }
        let verb = match (occlude, dry_run) {
            (true, false) => "occluded",
            (true, true) => "would occlude",
            (false, false) => "restored",
            (false, true) => "would restore",
        };
        Ok(CommandOutcome::ok(format!("{verb} {matched} log entr{}", {
            if matched == 1 {
                "y"
            } else {
                "ies"
            }
        })))
    })
}

/// Append one log entry.
pub fn append_log(repo: &Repository, entry: LogEntry) -> CommandOutcome {
    run(|| {
        let mut book = repo.load_logs()?;
        let session = entry.session.clone();
        book.insert(entry);
        repo.save_logs(&book)?;
        Ok(CommandOutcome::ok(format!("logged to session {session}")))
    })
}

// ============================================================
// Health check and migration
// ============================================================

/// Non-mutating health check: counts, the dependency invariant, and
/// dangling relation targets.
pub fn check(repo: &Repository) -> CommandOutcome {
    run(|| {
        let graph = repo.load()?;
        let mut report = format!(
            "{} items ({} active, {} occluded)",
            graph.len(),
            graph.active().count(),
            graph.occluded().count(),
        );

        let dangling = graph.dangling_targets();
        for (id, kind, target) in &dangling {
            report.push_str(&format!(
                "\ndangling target: {id} {} {target}",
                kind.as_str()
            ));
        }

        if let Err(error) = graph.check_acyclic() {
            report.push_str(&format!("\n{error}"));
            return Ok(CommandOutcome {
                success: false,
                message: report,
                changed: Vec::new(),
            });
        }

        if dangling.is_empty() {
            report.push_str("\ngraph is healthy");
        }
        Ok(CommandOutcome::ok(report))
    })
}

/// One-time migration: translate the whole file-based graph into an
/// operation sequence and hand it to the caller's flow client.
pub fn migrate(repo: &Repository, client: &mut dyn FlowClient) -> CommandOutcome {
    run(|| {
        let graph = repo.load()?;
        let ops = match migrate_graph(&graph) {
            Ok(ops) => ops,
            Err(error) => return Ok(CommandOutcome::failed(error.to_string())),
        };
        let count = ops.len();
        client.append(&ops)?;
        Ok(CommandOutcome::ok(format!(
            "migrated {} item(s) as {count} operation(s)",
            graph.len()
        )))
    })
}
