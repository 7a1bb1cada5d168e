use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracelens_protocol::ThemeToken;

use super::observation::{Level, ObservationType};

/// Bar color for an observation type.
pub fn color_for_type(observation_type: ObservationType) -> ThemeToken {
    match observation_type {
        ObservationType::Span => ThemeToken::SpanBar,
        ObservationType::Generation => ThemeToken::GenerationBar,
        ObservationType::Tool => ThemeToken::ToolBar,
        ObservationType::Agent => ThemeToken::AgentBar,
        ObservationType::Event => ThemeToken::EventBar,
        ObservationType::System => ThemeToken::SystemBar,
        ObservationType::Unknown => ThemeToken::UnknownBar,
    }
}

/// One observation positioned on the trace timeline.
///
/// Offsets are milliseconds from the trace origin. `is_expanded` and
/// `is_visible` are the only fields that change after flattening.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TimelineNode {
    pub id: String,
    pub name: String,
    #[serde(rename = "type")]
    pub observation_type: ObservationType,
    pub level: Level,
    pub start_offset_ms: f64,
    /// Always `start_offset_ms + duration_ms`.
    pub end_offset_ms: f64,
    /// At least 1ms.
    pub duration_ms: f64,
    pub depth: u32,
    pub parent_id: Option<String>,
    pub child_ids: Vec<String>,
    pub color: ThemeToken,
    pub is_expanded: bool,
    pub is_visible: bool,
    pub prompt_tokens: Option<i64>,
    pub completion_tokens: Option<i64>,
    pub total_tokens: Option<i64>,
    pub total_cost: Option<String>,
    pub model: Option<String>,
    pub has_error: bool,
}

impl TimelineNode {
    pub fn has_children(&self) -> bool {
        !self.child_ids.is_empty()
    }
}

/// The flattened trace: every node in pre-order plus the time frame.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TimelineData {
    pub nodes: Vec<TimelineNode>,
    pub trace_start: DateTime<Utc>,
    pub trace_end: DateTime<Utc>,
    pub total_duration_ms: f64,
    pub max_depth: u32,
    pub node_count: usize,
}

impl TimelineData {
    /// A timeline with no nodes anchored at `now`.
    pub fn empty(now: DateTime<Utc>) -> Self {
        Self {
            nodes: Vec::new(),
            trace_start: now,
            trace_end: now,
            total_duration_ms: 0.0,
            max_depth: 0,
            node_count: 0,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn node(&self, id: &str) -> Option<&TimelineNode> {
        self.nodes.iter().find(|n| n.id == id)
    }

    /// Visible nodes in flatten order; row `i` of the waterfall is the
    /// `i`-th item.
    pub fn visible_nodes(&self) -> impl Iterator<Item = &TimelineNode> {
        self.nodes.iter().filter(|n| n.is_visible)
    }

    pub fn visible_count(&self) -> usize {
        self.visible_nodes().count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn colors_are_distinct_per_known_type() {
        let types = [
            ObservationType::Span,
            ObservationType::Generation,
            ObservationType::Tool,
            ObservationType::Agent,
            ObservationType::Event,
            ObservationType::System,
        ];
        let mut colors: Vec<_> = types.iter().map(|t| color_for_type(*t)).collect();
        colors.dedup();
        assert_eq!(colors.len(), types.len());
    }

    #[test]
    fn empty_timeline() {
        let now = Utc::now();
        let data = TimelineData::empty(now);
        assert!(data.is_empty());
        assert_eq!(data.visible_count(), 0);
        assert_eq!(data.trace_start, data.trace_end);
    }
}
