pub mod tree;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

use crate::model::Observation;

pub use tree::{assemble_tree, drop_duplicate_ids};

#[derive(Debug, Error)]
pub enum TraceLoadError {
    #[error("invalid JSON: {0}")]
    Json(#[from] serde_json::Error),
    #[error("observation {index}: {source}")]
    Observation {
        index: usize,
        #[source]
        source: serde_json::Error,
    },
    #[error("unrecognised trace shape: {0}")]
    UnknownShape(&'static str),
}

/// Trace-level metadata from a trace-detail document.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TraceInfo {
    #[serde(default)]
    pub id: Option<String>,
    #[serde(default, alias = "project_id")]
    pub project_id: Option<String>,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default, alias = "user_id")]
    pub user_id: Option<String>,
    #[serde(default, alias = "session_id")]
    pub session_id: Option<String>,
    #[serde(default)]
    pub timestamp: Option<String>,
}

/// A loaded trace: optional metadata plus the root observations.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TraceDocument {
    pub trace: Option<TraceInfo>,
    pub observations: Vec<Observation>,
}

/// Parse a trace and return only its root observations.
pub fn load_trace(data: &[u8]) -> Result<Vec<Observation>, TraceLoadError> {
    load_trace_document(data).map(|doc| doc.observations)
}

/// Detect the trace shape and parse it.
///
/// Accepted shapes:
/// 1. an array of root observations with nested `children`;
/// 2. `{ "trace": {...}, "tree": [...] }`;
/// 3. `{ "observations": [...] }` or a flat array whose records link to
///    their parent by id, assembled into a tree.
pub fn load_trace_document(data: &[u8]) -> Result<TraceDocument, TraceLoadError> {
    let value: Value = serde_json::from_slice(data)?;

    let (trace, items) = match value {
        Value::Array(items) => (None, items),
        Value::Object(mut obj) => {
            let trace = match obj.remove("trace") {
                Some(t) if !t.is_null() => Some(serde_json::from_value::<TraceInfo>(t)?),
                _ => None,
            };
            let items = match (obj.remove("tree"), obj.remove("observations")) {
                (Some(Value::Array(tree)), _) => tree,
                (_, Some(Value::Array(flat))) => flat,
                _ => return Err(TraceLoadError::UnknownShape("expected a `tree` or `observations` array")),
            };
            (trace, items)
        }
        _ => return Err(TraceLoadError::UnknownShape("expected a JSON array or object")),
    };

    let mut observations = parse_records(items)?;
    if is_flat(&observations) {
        tracing::debug!(records = observations.len(), "assembling flat observation list");
        observations = assemble_tree(observations);
    } else {
        observations = tree::drop_duplicate_ids(observations);
    }
    for root in &mut observations {
        tree::fill_latency(root);
    }

    tracing::debug!(
        roots = observations.len(),
        nodes = observations.iter().map(Observation::subtree_len).sum::<usize>(),
        "loaded trace"
    );
    Ok(TraceDocument { trace, observations })
}

fn parse_records(items: Vec<Value>) -> Result<Vec<Observation>, TraceLoadError> {
    items
        .into_iter()
        .enumerate()
        .map(|(index, item)| {
            serde_json::from_value(item).map_err(|source| TraceLoadError::Observation { index, source })
        })
        .collect()
}

/// No record nests children but at least one points at a parent.
fn is_flat(records: &[Observation]) -> bool {
    records.iter().all(|o| o.children.is_empty()) && records.iter().any(|o| o.parent_id.is_some())
}
