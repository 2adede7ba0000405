//! The operation-log bridge for multi-device sync.
//!
//! Graph edits map onto a small vocabulary of convergent operations
//! (add/remove item, set a scalar field, add to / remove from a set) that an
//! external replicated-document engine merges across devices. This module
//! only *produces* well-formed, causally-annotated operations (and replays a
//! stream into an [`ObservedAdds`] index); merge logic lives in that engine,
//! not here.
//!
//! Removal is **informed**: a `RemoveFromSet` names the add-operation ids
//! the remover had observed, so it only suppresses those additions. A
//! concurrent add on another device, unseen at removal time, survives the
//! merge (add-wins per causally-unseen addition).
//!
//! The wire format is one JSON object per operation, keyed by the variant
//! name; scalar values are themselves tagged (`{"String": ...}`,
//! `{"Int": ...}`, `{"Bool": ...}`, `{"Null": null}`).

use std::collections::HashMap;
use std::fs::OpenOptions;
use std::io::Write;
use std::path::PathBuf;

use anyhow::Context;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::graph::{GraphError, TaskGraph};
use crate::models::Item;

/// A tagged scalar in the operation wire format.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum FieldValue {
    String(String),
    Int(i64),
    Bool(bool),
    Null(()),
}

impl FieldValue {
    pub fn null() -> Self {
        Self::Null(())
    }

    fn optional_string(value: &Option<String>) -> Self {
        match value {
            Some(s) => Self::String(s.clone()),
            None => Self::null(),
        }
    }
}

impl From<&str> for FieldValue {
    fn from(value: &str) -> Self {
        Self::String(value.to_string())
    }
}

/// One replicable graph edit.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Operation {
    AddItem {
        item_id: String,
    },
    SetField {
        item_id: String,
        field: String,
        value: FieldValue,
    },
    AddToSet {
        item_id: String,
        set_name: String,
        element: FieldValue,
        /// Identity of this addition, cited by informed removes.
        op_id: Uuid,
    },
    RemoveFromSet {
        item_id: String,
        set_name: String,
        element: FieldValue,
        /// The additions this remove had observed; only those are
        /// suppressed.
        observed_add_ids: Vec<Uuid>,
    },
    RemoveItem {
        item_id: String,
    },
}

/// Mint an `AddToSet` with a fresh operation id.
pub fn add_to_set(item_id: &str, set_name: &str, element: FieldValue) -> Operation {
    Operation::AddToSet {
        item_id: item_id.to_string(),
        set_name: set_name.to_string(),
        element,
        op_id: Uuid::new_v4(),
    }
}

/// Build an informed remove: it cites exactly the surviving additions of
/// `element` that `observed` knows about.
pub fn remove_from_set(
    item_id: &str,
    set_name: &str,
    element: FieldValue,
    observed: &ObservedAdds,
) -> Operation {
    Operation::RemoveFromSet {
        observed_add_ids: observed.observed(item_id, set_name, &element).to_vec(),
        item_id: item_id.to_string(),
        set_name: set_name.to_string(),
        element,
    }
}

// ============================================================
// Item → operation mapping
// ============================================================

/// The scalar fields of an item, in wire order.
fn scalar_fields(item: &Item) -> Vec<(&'static str, FieldValue)> {
    vec![
        ("title", FieldValue::String(item.title.clone())),
        ("status", item.status.as_str().into()),
        ("priority", item.priority.as_str().into()),
        (
            "duration",
            match &item.duration {
                Some(duration) => FieldValue::String(duration.to_string()),
                None => FieldValue::null(),
            },
        ),
        ("user_comment", FieldValue::optional_string(&item.user_comment)),
        ("auto_comment", FieldValue::optional_string(&item.auto_comment)),
        ("occlude", FieldValue::Bool(item.occlude)),
    ]
}

/// Map a whole item to its equivalent creation sequence: `AddItem`, one
/// `SetField` per scalar, one `AddToSet` per chart, tag, relation target,
/// and constraint.
pub fn creation_ops(item: &Item) -> Vec<Operation> {
    let mut ops = vec![Operation::AddItem {
        item_id: item.id.clone(),
    }];
    for (field, value) in scalar_fields(item) {
        ops.push(Operation::SetField {
            item_id: item.id.clone(),
            field: field.to_string(),
            value,
        });
    }
    for chart in &item.charts {
        ops.push(add_to_set(&item.id, "charts", chart.as_str().into()));
    }
    for tag in &item.tags {
        ops.push(add_to_set(&item.id, "tags", tag.as_str().into()));
    }
    for (kind, targets) in &item.relations {
        let set_name = format!("relations/{}", kind.as_str());
        for target in targets {
            ops.push(add_to_set(&item.id, &set_name, target.as_str().into()));
        }
    }
    for constraint in &item.constraints {
        ops.push(add_to_set(
            &item.id,
            "constraints",
            constraint.to_string().as_str().into(),
        ));
    }
    ops
}

/// Translate a whole legacy graph into an operation sequence for one-time
/// migration, in topological order so every relation target is created
/// before something references it.
pub fn migrate_graph(graph: &TaskGraph) -> Result<Vec<Operation>, GraphError> {
    let mut ops = Vec::new();
    for item in graph.topological_sort()? {
        ops.extend(creation_ops(item));
    }
    Ok(ops)
}

// ============================================================
// Observed-add index
// ============================================================

/// Which additions of each (item, set, element) are still standing, replayed
/// from an operation stream. Backs informed removal.
#[derive(Debug, Default)]
pub struct ObservedAdds {
    adds: HashMap<(String, String, String), Vec<Uuid>>,
}

impl ObservedAdds {
    /// Replay a stream: additions accumulate, an informed remove suppresses
    /// exactly the add ids it observed, removing an item forgets all its
    /// sets.
    pub fn from_operations(ops: &[Operation]) -> Self {
        let mut index = Self::default();
        for op in ops {
            match op {
                Operation::AddToSet {
                    item_id,
                    set_name,
                    element,
                    op_id,
                } => {
                    index
                        .adds
                        .entry(key(item_id, set_name, element))
                        .or_default()
                        .push(*op_id);
                }
                Operation::RemoveFromSet {
                    item_id,
                    set_name,
                    element,
                    observed_add_ids,
                } => {
                    if let Some(ids) = index.adds.get_mut(&key(item_id, set_name, element)) {
                        ids.retain(|id| !observed_add_ids.contains(id));
                    }
                }
                Operation::RemoveItem { item_id } => {
                    index.adds.retain(|(item, _, _), _| item != item_id);
                }
                Operation::AddItem { .. } | Operation::SetField { .. } => {}
            }
        }
        index
    }

    /// Surviving add ids for one element.
    pub fn observed(&self, item_id: &str, set_name: &str, element: &FieldValue) -> &[Uuid] {
        self.adds
            .get(&key(item_id, set_name, element))
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    /// Whether the element is present (has at least one surviving add).
    pub fn contains(&self, item_id: &str, set_name: &str, element: &FieldValue) -> bool {
        !self.observed(item_id, set_name, element).is_empty()
    }
}

fn key(item_id: &str, set_name: &str, element: &FieldValue) -> (String, String, String) {
    let element = serde_json::to_string(element).expect("field values always serialize");
    (item_id.to_string(), set_name.to_string(), element)
}

// ============================================================
// Flow client
// ============================================================

/// Caller-owned handle to the external replicated-document engine. Passed
/// into whatever needs to emit operations; there is no process-wide
/// registry.
pub trait FlowClient {
    fn append(&mut self, ops: &[Operation]) -> anyhow::Result<()>;
}

/// Appends operations as JSONL to a local file for the document engine to
/// pick up.
#[derive(Debug, Clone)]
pub struct JsonlFlowClient {
    path: PathBuf,
}

impl JsonlFlowClient {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

impl FlowClient for JsonlFlowClient {
    fn append(&mut self, ops: &[Operation]) -> anyhow::Result<()> {
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .with_context(|| format!("cannot open operation log {}", self.path.display()))?;
        for op in ops {
            let line = serde_json::to_string(op).context("operation serialization failed")?;
            writeln!(file, "{line}")
                .with_context(|| format!("cannot append to {}", self.path.display()))?;
        }
        Ok(())
    }
}
