use std::collections::{HashMap, HashSet};

use crate::model::Observation;
use crate::time::{millis_between, parse_timestamp};

/// Assemble flat observation records into a forest by `parent_id`.
///
/// Records without a parent, or whose parent is not in the list, become
/// roots. A record whose id was already seen is dropped. Siblings (and
/// roots) are ordered by start time; ties and unparseable start times keep
/// input order, with unparseable ones last. Any `children` already present
/// on a record are kept and the assembled children appended after them.
pub fn assemble_tree(records: Vec<Observation>) -> Vec<Observation> {
    let mut seen = HashSet::with_capacity(records.len());
    let mut unique = Vec::with_capacity(records.len());
    for record in records {
        if seen.insert(record.id.clone()) {
            unique.push(record);
        } else {
            tracing::warn!(id = %record.id, "duplicate observation id, dropping later record");
        }
    }

    let mut roots = Vec::new();
    let mut children_of: HashMap<String, Vec<Observation>> = HashMap::new();
    for record in unique {
        match record.parent_id.as_deref() {
            Some(parent) if parent == record.id => {
                tracing::warn!(id = %record.id, "observation is its own parent, promoted to root");
                roots.push(record);
            }
            Some(parent) if seen.contains(parent) => {
                children_of.entry(parent.to_string()).or_default().push(record);
            }
            Some(parent) => {
                tracing::warn!(id = %record.id, parent_id = %parent, "parent not in trace, promoted to root");
                roots.push(record);
            }
            None => roots.push(record),
        }
    }

    sort_by_start(&mut roots);
    let mut out: Vec<Observation> = roots
        .into_iter()
        .map(|root| attach(root, &mut children_of))
        .collect();

    // Whatever is left hangs off a cycle that no root reaches.
    if !children_of.is_empty() {
        let mut stranded: Vec<Observation> = children_of.into_values().flatten().collect();
        for o in &stranded {
            tracing::warn!(id = %o.id, "observation unreachable from any root, promoted to root");
        }
        sort_by_start(&mut stranded);
        for mut o in stranded {
            o.parent_id = None;
            out.push(o);
        }
    }
    out
}

fn attach(mut node: Observation, children_of: &mut HashMap<String, Vec<Observation>>) -> Observation {
    if let Some(mut kids) = children_of.remove(&node.id) {
        sort_by_start(&mut kids);
        for kid in kids {
            node.children.push(attach(kid, children_of));
        }
    }
    node
}

fn sort_by_start(nodes: &mut [Observation]) {
    nodes.sort_by_cached_key(|o| {
        let start = o.start_time.as_deref().and_then(parse_timestamp);
        (start.is_none(), start)
    });
}

/// Drop nodes whose id already appeared earlier in pre-order.
///
/// The first occurrence wins. A dropped node's children take its place
/// under its parent, so only the duplicate record itself is lost.
pub fn drop_duplicate_ids(roots: Vec<Observation>) -> Vec<Observation> {
    let mut seen = HashSet::new();
    dedupe_level(roots, None, &mut seen)
}

fn dedupe_level(nodes: Vec<Observation>, parent: Option<&str>, seen: &mut HashSet<String>) -> Vec<Observation> {
    let mut out = Vec::with_capacity(nodes.len());
    for mut node in nodes {
        let children = std::mem::take(&mut node.children);
        if seen.insert(node.id.clone()) {
            node.children = dedupe_level(children, Some(&node.id), seen);
            out.push(node);
        } else {
            tracing::warn!(id = %node.id, "duplicate observation id, dropping later record");
            for mut child in dedupe_level(children, parent, seen) {
                child.parent_id = parent.map(String::from);
                out.push(child);
            }
        }
    }
    out
}

/// Fill `latency_ms` from the start/end timestamps where the record lacks
/// it, across the whole subtree.
pub fn fill_latency(node: &mut Observation) {
    if node.latency_ms.is_none() {
        let start = node.start_time.as_deref().and_then(parse_timestamp);
        let end = node.end_time.as_deref().and_then(parse_timestamp);
        if let (Some(start), Some(end)) = (start, end) {
            node.latency_ms = Some(millis_between(start, end));
        }
    }
    for child in &mut node.children {
        fill_latency(child);
    }
}
