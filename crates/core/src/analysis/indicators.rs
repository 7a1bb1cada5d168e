use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use super::diff::values_equal;
use crate::model::{Level, Observation, ObservationType};

/// Boolean signals shown next to a node.
///
/// Everything is local to the node except `has_state_change`, which is
/// true when the node or any descendant changed state.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IndicatorSet {
    pub has_state_change: bool,
    pub has_prompt: bool,
    pub has_tool: bool,
    pub has_error: bool,
    pub has_warning: bool,
}

/// One active indicator, in display order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Indicator {
    StateChange,
    Prompt,
    Tool,
    Error,
    Warning,
}

impl Indicator {
    pub fn tooltip(&self) -> &'static str {
        match self {
            Self::StateChange => "State changed during execution",
            Self::Prompt => "Contains LLM prompt and response",
            Self::Tool => "Contains tool call and response",
            Self::Error => "Error occurred during execution",
            Self::Warning => "Warning during execution",
        }
    }
}

impl IndicatorSet {
    /// Active flags in display order.
    pub fn active(&self) -> Vec<Indicator> {
        let flags = [
            (self.has_state_change, Indicator::StateChange),
            (self.has_prompt, Indicator::Prompt),
            (self.has_tool, Indicator::Tool),
            (self.has_error, Indicator::Error),
            (self.has_warning, Indicator::Warning),
        ];
        flags
            .into_iter()
            .filter_map(|(on, indicator)| on.then_some(indicator))
            .collect()
    }

    pub fn any(&self) -> bool {
        self.has_state_change || self.has_prompt || self.has_tool || self.has_error || self.has_warning
    }
}

/// Memo of already-computed sets, keyed by observation id.
///
/// One cache is meant to live for one render pass over one trace.
#[derive(Debug, Clone, Default)]
pub struct IndicatorCache {
    sets: HashMap<String, IndicatorSet>,
}

impl IndicatorCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, id: &str) -> Option<IndicatorSet> {
        self.sets.get(id).copied()
    }

    pub fn len(&self) -> usize {
        self.sets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sets.is_empty()
    }

    pub fn into_map(self) -> HashMap<String, IndicatorSet> {
        self.sets
    }
}

/// Whether an observation's input and output differ.
///
/// Absent on both sides is "no change", absent on exactly one side is a
/// change. A comparison that cannot be evaluated counts as a change.
pub fn local_state_changed(node: &Observation) -> bool {
    match (&node.input, &node.output) {
        (None, None) => false,
        (Some(_), None) | (None, Some(_)) => true,
        (Some(input), Some(output)) => !values_equal(input, output),
    }
}

/// Indicators for a single node, memoized through `cache`.
///
/// Each subtree is evaluated once per cache, so walking a whole trace with
/// a shared cache is linear in the number of nodes.
pub fn indicators_cached(node: &Observation, cache: &mut IndicatorCache) -> IndicatorSet {
    if let Some(hit) = cache.get(&node.id) {
        return hit;
    }

    let mut has_state_change = local_state_changed(node);
    for child in &node.children {
        has_state_change |= indicators_cached(child, cache).has_state_change;
    }

    let set = IndicatorSet {
        has_state_change,
        has_prompt: node.observation_type == ObservationType::Generation,
        has_tool: node.observation_type == ObservationType::Tool,
        has_error: node.level == Level::Error,
        has_warning: node.level == Level::Warning,
    };
    cache.sets.insert(node.id.clone(), set);
    set
}

/// Indicators for a single node with a fresh cache.
pub fn indicators(node: &Observation) -> IndicatorSet {
    indicators_cached(node, &mut IndicatorCache::new())
}

/// Indicators for every node of a trace in one pass.
pub fn indicators_for_trace(roots: &[Observation]) -> HashMap<String, IndicatorSet> {
    let mut cache = IndicatorCache::new();
    for root in roots {
        indicators_cached(root, &mut cache);
    }
    cache.into_map()
}
