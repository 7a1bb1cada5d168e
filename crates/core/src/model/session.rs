use std::collections::HashMap;

use tracelens_protocol::{HitTarget, Point, RenderCommand, Viewport};

use crate::analysis::{IndicatorSet, NodeDetails, TraceSummary, indicators_for_trace, node_details};
use crate::config::ViewerConfig;
use crate::model::{Observation, ObservationIndex, TimelineData};
use crate::parsers::{TraceDocument, TraceInfo, TraceLoadError, drop_duplicate_ids, load_trace_document};
use crate::timeline::{TimelineBuilder, TimelineState};
use crate::views::{WaterfallLayout, WaterfallState, ZoomState, ZoomTransform, hit_test, render_with_layout};

/// What a click on the waterfall did.
#[derive(Debug, Clone, PartialEq)]
pub enum ClickOutcome {
    Toggled(String),
    Selected(Box<NodeDetails>),
}

/// One open trace with all of its view state.
///
/// Loading replaces everything: timeline, selection, hover and zoom. All
/// id-based calls treat unknown ids as a no-op so stale references from a
/// previous load are harmless.
#[derive(Debug, Clone)]
pub struct TraceView {
    config: ViewerConfig,
    trace: Option<TraceInfo>,
    roots: Vec<Observation>,
    index: ObservationIndex,
    state: TimelineState,
    indicators: HashMap<String, IndicatorSet>,
    selected: Option<String>,
    hovered: Option<String>,
    zoom: ZoomState,
    viewport: Viewport,
    layout: Option<(u64, WaterfallLayout)>,
}

impl TraceView {
    pub fn new(config: ViewerConfig) -> Self {
        let builder = TimelineBuilder::from_config(&config.timeline);
        let zoom = ZoomState::new(config.zoom.clone());
        Self {
            state: TimelineState::new(builder.build(&[])),
            config,
            trace: None,
            roots: Vec::new(),
            index: ObservationIndex::default(),
            indicators: HashMap::new(),
            selected: None,
            hovered: None,
            zoom,
            viewport: Viewport::sized(0.0, 0.0),
            layout: None,
        }
    }

    pub fn config(&self) -> &ViewerConfig {
        &self.config
    }

    /// Replace the current trace.
    pub fn load(&mut self, roots: Vec<Observation>) {
        self.load_document(TraceDocument {
            trace: None,
            observations: roots,
        });
    }

    /// Replace the current trace. Later nodes reusing an id are dropped.
    pub fn load_document(&mut self, mut doc: TraceDocument) {
        doc.observations = drop_duplicate_ids(doc.observations);
        let builder = TimelineBuilder::from_config(&self.config.timeline);
        let data = builder.build(&doc.observations);
        tracing::info!(
            nodes = data.node_count,
            duration_ms = data.total_duration_ms,
            "trace loaded"
        );
        self.indicators = indicators_for_trace(&doc.observations);
        self.index = ObservationIndex::build(&doc.observations);
        self.roots = doc.observations;
        self.trace = doc.trace;
        self.state = TimelineState::new(data);
        self.selected = None;
        self.hovered = None;
        self.zoom.reset();
        self.layout = None;
    }

    /// Parse and load trace JSON. On error the current trace is kept.
    pub fn load_json(&mut self, data: &[u8]) -> Result<(), TraceLoadError> {
        let doc = load_trace_document(data)?;
        self.load_document(doc);
        Ok(())
    }

    pub fn trace_info(&self) -> Option<&TraceInfo> {
        self.trace.as_ref()
    }

    pub fn roots(&self) -> &[Observation] {
        &self.roots
    }

    pub fn timeline(&self) -> &TimelineData {
        self.state.data()
    }

    pub fn snapshot(&self) -> TimelineData {
        self.state.snapshot()
    }

    pub fn summary(&self) -> TraceSummary {
        TraceSummary::from_timeline(self.state.data())
    }

    pub fn indicators(&self, id: &str) -> Option<IndicatorSet> {
        self.indicators.get(id).copied()
    }

    pub fn observation(&self, id: &str) -> Option<&Observation> {
        self.index.get(&self.roots, id)
    }

    /// Flip a node's expanded flag. Returns whether anything changed.
    pub fn toggle(&mut self, id: &str) -> bool {
        self.state.toggle(id)
    }

    pub fn set_all_expanded(&mut self, expanded: bool) -> bool {
        self.state.set_all_expanded(expanded)
    }

    /// Select a node and build its details. Unknown ids leave the current
    /// selection as it was and return `None`.
    pub fn select(&mut self, id: &str) -> Option<NodeDetails> {
        let details = node_details(&self.roots, &self.index, id)?;
        tracing::debug!(id, "selected node");
        self.selected = Some(id.to_string());
        Some(details)
    }

    pub fn clear_selection(&mut self) {
        self.selected = None;
    }

    pub fn selected_id(&self) -> Option<&str> {
        self.selected.as_deref()
    }

    pub fn selected_details(&self) -> Option<NodeDetails> {
        let id = self.selected.as_deref()?;
        node_details(&self.roots, &self.index, id)
    }

    /// Set or clear the hovered node. Returns whether it changed.
    pub fn hover(&mut self, id: Option<&str>) -> bool {
        let next = id.filter(|id| self.state.contains(id)).map(String::from);
        if next == self.hovered {
            return false;
        }
        self.hovered = next;
        true
    }

    pub fn hovered_id(&self) -> Option<&str> {
        self.hovered.as_deref()
    }

    pub fn viewport(&self) -> Viewport {
        self.viewport
    }

    pub fn set_viewport(&mut self, viewport: Viewport) {
        if viewport != self.viewport {
            self.viewport = viewport;
            self.layout = None;
        }
    }

    pub fn zoom_in(&mut self, now_ms: f64) {
        let center = self.viewport.center();
        self.zoom.zoom_in(center, now_ms);
    }

    pub fn zoom_out(&mut self, now_ms: f64) {
        let center = self.viewport.center();
        self.zoom.zoom_out(center, now_ms);
    }

    pub fn fit(&mut self, now_ms: f64) {
        self.zoom.fit(now_ms);
    }

    pub fn pan(&mut self, dx: f64, dy: f64, now_ms: f64) {
        self.zoom.pan(dx, dy, now_ms);
    }

    pub fn zoom_at(&mut self, point: Point, factor: f64, now_ms: f64) {
        self.zoom.zoom_at(point, factor, now_ms);
    }

    /// Advance animations. Returns whether another frame is needed.
    pub fn tick(&mut self, now_ms: f64) -> bool {
        self.zoom.tick(now_ms)
    }

    pub fn transform(&self, now_ms: f64) -> ZoomTransform {
        self.zoom.sample(now_ms)
    }

    /// Layout for the current viewport width, rebuilt only after a toggle
    /// or a resize.
    pub fn layout(&mut self) -> &WaterfallLayout {
        let revision = self.state.revision();
        let width = self.viewport.width;
        if !matches!(&self.layout, Some((rev, l)) if *rev == revision && l.width == width) {
            self.layout = None;
        }
        let (_, layout) = self
            .layout
            .get_or_insert_with(|| (revision, WaterfallLayout::compute(self.state.data(), width, &self.config.layout)));
        layout
    }

    pub fn content_height(&mut self) -> f64 {
        self.layout().content_height()
    }

    /// Full frame of render commands at `now_ms`.
    pub fn render(&mut self, now_ms: f64) -> Vec<RenderCommand> {
        let transform = self.zoom.sample(now_ms);
        self.layout();
        let Some((_, layout)) = &self.layout else {
            return Vec::new();
        };
        let state = WaterfallState {
            selected: self.selected.as_deref(),
            hovered: self.hovered.as_deref(),
            transform,
        };
        render_with_layout(self.state.data(), layout, &self.viewport, &state)
    }

    /// Interactive target under a screen point.
    pub fn target_at(&mut self, point: Point, now_ms: f64) -> Option<HitTarget> {
        let commands = self.render(now_ms);
        hit_test(&commands, point)
    }

    /// Dispatch a click: toggles on the expand affordance, selects anywhere
    /// else on a row.
    pub fn click(&mut self, point: Point, now_ms: f64) -> Option<ClickOutcome> {
        match self.target_at(point, now_ms)? {
            HitTarget::Toggle(id) => self.toggle(&id).then_some(ClickOutcome::Toggled(id)),
            HitTarget::Select(id) => self.select(&id).map(|d| ClickOutcome::Selected(Box::new(d))),
        }
    }

    /// Update hover from a pointer position. Returns whether it changed.
    pub fn hover_at(&mut self, point: Option<Point>, now_ms: f64) -> bool {
        let id = point
            .and_then(|p| self.target_at(p, now_ms))
            .map(|t| t.node_id().to_string());
        self.hover(id.as_deref())
    }
}

impl Default for TraceView {
    fn default() -> Self {
        Self::new(ViewerConfig::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{Level, ObservationType};
    use serde_json::json;

    fn view() -> TraceView {
        let mut g = Observation::new("g", ObservationType::Generation);
        g.name = Some("llm".into());
        g.start_time = Some("2025-01-01T00:00:00.100Z".into());
        g.end_time = Some("2025-01-01T00:00:00.400Z".into());
        g.level = Level::Error;
        g.input = Some(json!({"x": 1}));
        g.output = Some(json!({"x": 2}));
        let mut root = Observation::new("root", ObservationType::Agent);
        root.name = Some("agent".into());
        root.start_time = Some("2025-01-01T00:00:00Z".into());
        root.end_time = Some("2025-01-01T00:00:01Z".into());
        root.children.push(g);
        let mut e = Observation::new("e", ObservationType::Event);
        e.start_time = Some("2025-01-01T00:00:00.500Z".into());
        root.children.push(e);

        let mut v = TraceView::default();
        v.set_viewport(Viewport::sized(1270.0, 600.0));
        v.load(vec![root]);
        v
    }

    #[test]
    fn click_on_icon_toggles_and_elsewhere_selects() {
        let mut v = view();
        // Row 0 spans y 40..72; the icon sits at x 5.
        assert_eq!(v.click(Point::new(6.0, 50.0), 0.0), Some(ClickOutcome::Toggled("root".into())));
        assert_eq!(v.timeline().visible_count(), 1);
        assert_eq!(v.click(Point::new(6.0, 50.0), 0.0), Some(ClickOutcome::Toggled("root".into())));
        assert_eq!(v.timeline().visible_count(), 3);

        match v.click(Point::new(600.0, 80.0), 0.0) {
            Some(ClickOutcome::Selected(d)) => {
                assert_eq!(d.id, "g");
                assert!(d.indicators.has_state_change && d.indicators.has_error);
                assert!(d.diff.changed.contains_key("x"));
            }
            other => panic!("expected selection, got {other:?}"),
        }
        assert_eq!(v.selected_id(), Some("g"));
        assert_eq!(v.click(Point::new(600.0, 500.0), 0.0), None);
    }

    #[test]
    fn repeated_nested_id_resolves_to_one_node() {
        let doc = br#"[{"id": "root", "type": "AGENT", "startTime": "2025-01-01T00:00:00Z",
            "endTime": "2025-01-01T00:00:01Z",
            "children": [
                {"id": "dup", "type": "GENERATION", "name": "first",
                 "startTime": "2025-01-01T00:00:00.100Z"},
                {"id": "dup", "type": "SPAN", "name": "second", "level": "ERROR",
                 "startTime": "2025-01-01T00:00:00.200Z",
                 "children": [{"id": "leaf", "type": "EVENT",
                               "startTime": "2025-01-01T00:00:00.300Z"}]}
            ]}]"#;
        let mut v = TraceView::default();
        assert!(v.load_json(doc).is_ok());

        assert_eq!(v.timeline().node_count, 3);
        assert_eq!(v.timeline().node("dup").map(|n| n.name.as_str()), Some("first"));
        assert_eq!(v.timeline().node("leaf").and_then(|n| n.parent_id.as_deref()), Some("root"));
        assert_eq!(v.select("dup").map(|d| d.name), Some("first".to_string()));
        let flags = v.indicators("dup").unwrap_or_default();
        assert!(flags.has_prompt && !flags.has_error);
        assert!(!v.toggle("dup"));
        assert_eq!(v.summary().error_count, 0);
    }

    #[test]
    fn unknown_ids_are_noops() {
        let mut v = view();
        v.select("g");
        assert!(v.select("nope").is_none());
        assert_eq!(v.selected_id(), Some("g"));
        assert!(!v.toggle("nope"));
        assert!(!v.hover(Some("nope")));
        assert!(v.hovered_id().is_none());
    }

    #[test]
    fn reload_resets_view_state() {
        let mut v = view();
        v.select("g");
        v.hover(Some("root"));
        v.zoom_in(0.0);
        v.load(vec![Observation::new("other", ObservationType::Span)]);
        assert!(v.selected_id().is_none());
        assert!(v.hovered_id().is_none());
        assert_eq!(v.transform(10_000.0), ZoomTransform::IDENTITY);
        assert!(v.select("g").is_none());
        assert_eq!(v.timeline().node_count, 1);
    }

    #[test]
    fn failed_load_keeps_current_trace() {
        let mut v = view();
        assert!(v.load_json(b"{oops").is_err());
        assert_eq!(v.timeline().node_count, 3);
    }

    #[test]
    fn layout_follows_toggle_and_resize() {
        let mut v = view();
        assert_eq!(v.layout().row_count(), 3);
        v.toggle("root");
        assert_eq!(v.layout().row_count(), 1);
        v.set_viewport(Viewport::sized(800.0, 600.0));
        assert!((v.layout().scale.range_end - 780.0).abs() < 1e-9);
    }

    #[test]
    fn hover_at_tracks_pointer() {
        let mut v = view();
        assert!(v.hover_at(Some(Point::new(600.0, 110.0)), 0.0));
        assert_eq!(v.hovered_id(), Some("e"));
        assert!(!v.hover_at(Some(Point::new(700.0, 110.0)), 0.0));
        assert!(v.hover_at(None, 0.0));
        assert!(v.hovered_id().is_none());
    }

    #[test]
    fn summary_and_indicators() {
        let v = view();
        let s = v.summary();
        assert_eq!(s.node_count, 3);
        assert_eq!(s.error_count, 1);
        assert!(v.indicators("root").is_some_and(|i| i.has_state_change));
        assert!(v.indicators("e").is_some_and(|i| !i.has_state_change));
    }
}
