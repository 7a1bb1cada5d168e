use std::collections::HashMap;

use crate::model::TimelineData;

/// Expand/collapse bookkeeping over a flattened timeline.
///
/// Nodes live in one flat arena (`TimelineData::nodes`) indexed by id. A
/// toggle flips one flag and re-runs visibility propagation over that
/// node's subtree only; callers get fresh snapshots so nothing they hold is
/// mutated behind their back.
#[derive(Debug, Clone)]
pub struct TimelineState {
    data: TimelineData,
    index: HashMap<String, usize>,
    /// Bumped on every effective toggle; renderers compare it to decide
    /// whether a cached layout is stale.
    revision: u64,
}

impl TimelineState {
    pub fn new(data: TimelineData) -> Self {
        let mut index = HashMap::with_capacity(data.nodes.len());
        for (i, node) in data.nodes.iter().enumerate() {
            if index.insert(node.id.clone(), i).is_some() {
                tracing::warn!(id = %node.id, "duplicate node id, later node shadows earlier");
            }
        }
        Self {
            data,
            index,
            revision: 0,
        }
    }

    pub fn data(&self) -> &TimelineData {
        &self.data
    }

    /// Owned copy of the current timeline.
    pub fn snapshot(&self) -> TimelineData {
        self.data.clone()
    }

    pub fn revision(&self) -> u64 {
        self.revision
    }

    pub fn contains(&self, id: &str) -> bool {
        self.index.contains_key(id)
    }

    pub fn is_expanded(&self, id: &str) -> Option<bool> {
        self.index.get(id).map(|&i| self.data.nodes[i].is_expanded)
    }

    pub fn is_visible(&self, id: &str) -> Option<bool> {
        self.index.get(id).map(|&i| self.data.nodes[i].is_visible)
    }

    /// Flip a node's expanded flag and recompute visibility below it.
    ///
    /// Unknown ids and leaf nodes are a no-op. Returns whether anything
    /// changed.
    pub fn toggle(&mut self, id: &str) -> bool {
        let Some(&idx) = self.index.get(id) else {
            tracing::debug!(id, "toggle ignored: unknown node");
            return false;
        };
        if self.data.nodes[idx].child_ids.is_empty() {
            return false;
        }

        let node = &mut self.data.nodes[idx];
        node.is_expanded = !node.is_expanded;
        tracing::debug!(id, expanded = node.is_expanded, "toggled node");

        self.propagate_from(idx);
        self.revision += 1;
        true
    }

    /// Set every node's expanded flag at once and recompute visibility for
    /// the whole tree. Returns whether anything changed.
    pub fn set_all_expanded(&mut self, expanded: bool) -> bool {
        let mut changed = false;
        for node in &mut self.data.nodes {
            if node.has_children() && node.is_expanded != expanded {
                node.is_expanded = expanded;
                changed = true;
            }
        }
        if changed {
            let roots: Vec<usize> = self
                .data
                .nodes
                .iter()
                .enumerate()
                .filter(|(_, n)| n.parent_id.is_none())
                .map(|(i, _)| i)
                .collect();
            for root in roots {
                self.data.nodes[root].is_visible = true;
                self.propagate_from(root);
            }
            self.revision += 1;
        }
        changed
    }

    /// A child is visible iff its parent is visible and expanded, applied
    /// transitively below `idx`. `idx` itself keeps its visibility.
    fn propagate_from(&mut self, idx: usize) {
        let mut stack = vec![idx];
        while let Some(parent) = stack.pop() {
            let parent_node = &self.data.nodes[parent];
            let show = parent_node.is_visible && parent_node.is_expanded;
            let children: Vec<usize> = parent_node
                .child_ids
                .iter()
                .filter_map(|cid| self.index.get(cid).copied())
                .collect();
            for child in children {
                self.data.nodes[child].is_visible = show;
                stack.push(child);
            }
        }
    }
}

/// Functional toggle over a timeline snapshot: returns a new timeline with
/// `node_id` flipped, or an unchanged copy when the id is unknown or a leaf.
pub fn toggle_node_expansion(data: &TimelineData, node_id: &str) -> TimelineData {
    let mut state = TimelineState::new(data.clone());
    state.toggle(node_id);
    state.data
}
