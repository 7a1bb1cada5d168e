use thiserror::Error;
use tracelens_protocol::{HitTarget, Point, Rect, RenderCommand, Stroke, TextAlign, ThemeToken, Viewport};

use super::scale::TimeScale;
use super::time_axis::{render_time_axis, tick_count};
use super::zoom::ZoomTransform;
use crate::analysis::metrics::format_cost;
use crate::config::LayoutConfig;
use crate::model::{TimelineData, TimelineNode};
use crate::time::format_bar_duration;

const ICON_FONT_SIZE: f64 = 10.0;
const MARKER_FONT_SIZE: f64 = 14.0;
const DURATION_FONT_SIZE: f64 = 11.0;
const BAR_CORNER_RADIUS: f64 = 3.0;
const DURATION_LABEL_GAP: f64 = 8.0;
const ICON_OFFSET: f64 = 5.0;
const ICON_HIT_WIDTH: f64 = 16.0;
const MARKER_OFFSET: f64 = 18.0;
const TEXT_BASELINE_OFFSET: f64 = 5.0;

/// Contained draw-pass failure. Never escapes [`render_waterfall`].
#[derive(Debug, Error, PartialEq)]
pub enum RenderError {
    #[error("non-finite scale: width {width}, duration {duration_ms}ms")]
    NonFiniteScale { width: f64, duration_ms: f64 },
    #[error("non-finite geometry for node {0}")]
    NonFiniteGeometry(String),
    #[error("non-finite zoom transform")]
    NonFiniteTransform,
}

/// Geometry of one waterfall frame: the x-scale and which node sits on
/// which row.
///
/// Rows are the visible nodes in flatten order, so collapsing a subtree
/// compacts the list with no gaps.
#[derive(Debug, Clone)]
pub struct WaterfallLayout {
    pub scale: TimeScale,
    pub width: f64,
    pub config: LayoutConfig,
    rows: Vec<usize>,
}

impl WaterfallLayout {
    /// Recompute for a canvas `width`. Must be redone whenever the width or
    /// the timeline changes.
    pub fn compute(data: &TimelineData, width: f64, config: &LayoutConfig) -> Self {
        let scale = TimeScale::new(
            data.total_duration_ms,
            config.margin.left,
            width - config.margin.right,
        );
        let rows = data
            .nodes
            .iter()
            .enumerate()
            .filter(|(_, n)| n.is_visible)
            .map(|(i, _)| i)
            .collect();
        Self {
            scale,
            width,
            config: config.clone(),
            rows,
        }
    }

    pub fn row_count(&self) -> usize {
        self.rows.len()
    }

    /// Index into `TimelineData::nodes` for each row.
    pub fn rows(&self) -> &[usize] {
        &self.rows
    }

    pub fn content_height(&self) -> f64 {
        self.rows.len() as f64 * self.config.row_height + self.config.margin.top + self.config.margin.bottom
    }

    pub fn inner_width(&self) -> f64 {
        self.scale.range_width()
    }

    pub fn row_y(&self, row: usize) -> f64 {
        self.config.margin.top + row as f64 * self.config.row_height
    }

    /// Row under a content-space y coordinate.
    pub fn row_at(&self, y: f64) -> Option<usize> {
        let offset = y - self.config.margin.top;
        if offset < 0.0 || self.config.row_height <= 0.0 {
            return None;
        }
        let row = (offset / self.config.row_height).floor() as usize;
        (row < self.rows.len()).then_some(row)
    }

    pub fn row_of(&self, data: &TimelineData, id: &str) -> Option<usize> {
        self.rows.iter().position(|&i| data.nodes.get(i).is_some_and(|n| n.id == id))
    }

    pub fn expand_icon_x(&self, node: &TimelineNode) -> f64 {
        self.config.indent_per_level * f64::from(node.depth) + ICON_OFFSET
    }

    pub fn label_x(&self, node: &TimelineNode) -> f64 {
        let base = self.config.indent_per_level * f64::from(node.depth);
        base + if node.has_children() { 20.0 } else { 10.0 }
    }

    /// Bar rectangle on `row`, never narrower than the minimum bar width.
    pub fn bar_rect(&self, node: &TimelineNode, row: usize) -> Rect {
        let x0 = self.scale.x(node.start_offset_ms);
        let x1 = self.scale.x(node.end_offset_ms);
        let y = self.row_y(row) + (self.config.row_height - self.config.bar_height) / 2.0;
        Rect::new(x0, y, (x1 - x0).max(self.config.min_bar_width), self.config.bar_height)
    }

    fn text_baseline(&self, row: usize) -> f64 {
        self.row_y(row) + self.config.row_height / 2.0 + TEXT_BASELINE_OFFSET
    }
}

/// Selection, hover and pan/zoom for one frame.
#[derive(Debug, Clone, Copy, Default)]
pub struct WaterfallState<'a> {
    pub selected: Option<&'a str>,
    pub hovered: Option<&'a str>,
    pub transform: ZoomTransform,
}

/// Bar outline: selection beats error beats hover.
pub fn bar_stroke(node: &TimelineNode, selected: bool, hovered: bool) -> Option<Stroke> {
    if selected {
        Some(Stroke::new(ThemeToken::SelectionStroke, 3.0))
    } else if node.has_error {
        Some(Stroke::new(ThemeToken::ErrorMarker, 2.0))
    } else if hovered {
        Some(Stroke::new(ThemeToken::HoverStroke, 1.0))
    } else {
        None
    }
}

/// Hover text for a bar.
pub fn tooltip_lines(node: &TimelineNode) -> Vec<String> {
    let mut lines = vec![
        node.name.clone(),
        format!("Type: {}", node.observation_type),
        format!("Duration: {:.3}s", node.duration_ms / 1000.0),
    ];
    if let Some(cost) = node.total_cost.as_deref().and_then(|c| c.trim().parse::<f64>().ok()) {
        lines.push(format!("Cost: {}", format_cost(cost)));
    }
    if let Some(tokens) = node.total_tokens.filter(|t| *t != 0) {
        lines.push(format!("Tokens: {}", group_thousands(tokens)));
    }
    if let Some(model) = &node.model {
        lines.push(format!("Model: {model}"));
    }
    lines
}

fn group_thousands(n: i64) -> String {
    let digits = n.unsigned_abs().to_string();
    let mut out = String::with_capacity(digits.len() + digits.len() / 3 + 1);
    if n < 0 {
        out.push('-');
    }
    for (i, ch) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            out.push(',');
        }
        out.push(ch);
    }
    out
}

/// Render the waterfall for `data` into `viewport`.
///
/// Any fault in the draw pass yields an empty list and an error log
/// instead of propagating.
pub fn render_waterfall(
    data: &TimelineData,
    viewport: &Viewport,
    config: &LayoutConfig,
    state: &WaterfallState<'_>,
) -> Vec<RenderCommand> {
    let layout = WaterfallLayout::compute(data, viewport.width, config);
    render_with_layout(data, &layout, viewport, state)
}

/// [`render_waterfall`] with a layout the caller already holds.
pub fn render_with_layout(
    data: &TimelineData,
    layout: &WaterfallLayout,
    viewport: &Viewport,
    state: &WaterfallState<'_>,
) -> Vec<RenderCommand> {
    if data.is_empty() {
        return Vec::new();
    }
    try_render(data, layout, viewport, state).unwrap_or_else(|err| {
        tracing::error!(error = %err, "waterfall render failed, drawing nothing");
        Vec::new()
    })
}

fn try_render(
    data: &TimelineData,
    layout: &WaterfallLayout,
    viewport: &Viewport,
    state: &WaterfallState<'_>,
) -> Result<Vec<RenderCommand>, RenderError> {
    if !layout.width.is_finite() || !data.total_duration_ms.is_finite() {
        return Err(RenderError::NonFiniteScale {
            width: layout.width,
            duration_ms: data.total_duration_ms,
        });
    }
    let t = state.transform;
    if !(t.x.is_finite() && t.y.is_finite() && t.k.is_finite()) || t.k <= 0.0 {
        return Err(RenderError::NonFiniteTransform);
    }

    let cfg = &layout.config;
    let mut commands = Vec::with_capacity(layout.row_count() * 9 + 32);

    commands.push(RenderCommand::BeginGroup {
        id: "timeline-main".to_string(),
        label: None,
    });
    commands.push(RenderCommand::PushTransform {
        translate: Point::new(t.x, t.y),
        scale: Point::new(t.k, t.k),
    });

    let ticks = tick_count(layout.inner_width(), cfg.max_ticks, cfg.min_tick_spacing);
    let grid_height = layout.row_count() as f64 * cfg.row_height;
    commands.extend(render_time_axis(&layout.scale, cfg.margin.top, ticks, grid_height));

    // Rows entirely outside the viewport are culled.
    let content_top = (viewport.y - t.y) / t.k;
    let content_bottom = (viewport.y + viewport.height - t.y) / t.k;

    commands.push(RenderCommand::BeginGroup {
        id: "rows".to_string(),
        label: None,
    });
    for (row, &idx) in layout.rows().iter().enumerate() {
        let y0 = layout.row_y(row);
        if y0 + cfg.row_height < content_top || y0 > content_bottom {
            continue;
        }
        let Some(node) = data.nodes.get(idx) else {
            continue;
        };
        push_row(&mut commands, layout, node, row, state)?;
    }
    commands.push(RenderCommand::EndGroup);

    commands.push(RenderCommand::PopTransform);
    commands.push(RenderCommand::EndGroup);
    Ok(commands)
}

fn push_row(
    commands: &mut Vec<RenderCommand>,
    layout: &WaterfallLayout,
    node: &TimelineNode,
    row: usize,
    state: &WaterfallState<'_>,
) -> Result<(), RenderError> {
    let cfg = &layout.config;
    let selected = state.selected == Some(node.id.as_str());
    let hovered = state.hovered == Some(node.id.as_str());
    let y0 = layout.row_y(row);
    let baseline = layout.text_baseline(row);
    let bar = layout.bar_rect(node, row);
    if !(bar.x.is_finite() && bar.w.is_finite() && bar.y.is_finite()) {
        return Err(RenderError::NonFiniteGeometry(node.id.clone()));
    }
    let tooltip = tooltip_lines(node).join("\n");

    commands.push(RenderCommand::BeginGroup {
        id: node.id.clone(),
        label: Some(tooltip.clone()),
    });

    let band = Rect::new(0.0, y0, layout.width, cfg.row_height);
    if hovered {
        commands.push(RenderCommand::DrawRect {
            rect: band,
            color: ThemeToken::RowHover,
            stroke: None,
            corner_radius: 0.0,
            label: None,
        });
    }
    commands.push(RenderCommand::HitRegion {
        rect: band,
        target: HitTarget::Select(node.id.clone()),
    });

    if node.has_children() {
        let icon_x = layout.expand_icon_x(node);
        commands.push(RenderCommand::DrawText {
            position: Point::new(icon_x, baseline),
            text: (if node.is_expanded { "▼" } else { "▶" }).to_string(),
            color: ThemeToken::ExpandIcon,
            font_size: ICON_FONT_SIZE,
            bold: false,
            align: TextAlign::Left,
        });
        commands.push(RenderCommand::HitRegion {
            rect: Rect::new(icon_x - ICON_OFFSET, y0, ICON_HIT_WIDTH, cfg.row_height),
            target: HitTarget::Toggle(node.id.clone()),
        });
    }

    let label_x = layout.label_x(node);
    if node.has_error {
        commands.push(RenderCommand::DrawText {
            position: Point::new(label_x - MARKER_OFFSET, baseline),
            text: "⚠".to_string(),
            color: ThemeToken::ErrorMarker,
            font_size: MARKER_FONT_SIZE,
            bold: false,
            align: TextAlign::Left,
        });
    }

    let root = node.depth == 0;
    commands.push(RenderCommand::DrawText {
        position: Point::new(label_x, baseline),
        text: node.name.clone(),
        color: ThemeToken::TextPrimary,
        font_size: if root { cfg.root_font_size } else { cfg.font_size },
        bold: root,
        align: TextAlign::Left,
    });

    commands.push(RenderCommand::DrawRect {
        rect: bar,
        color: node.color,
        stroke: bar_stroke(node, selected, hovered),
        corner_radius: BAR_CORNER_RADIUS,
        label: Some(tooltip),
    });

    commands.push(RenderCommand::DrawText {
        position: Point::new(layout.scale.x(node.end_offset_ms).max(bar.right()) + DURATION_LABEL_GAP, baseline),
        text: format_bar_duration(node.duration_ms),
        color: ThemeToken::TextSecondary,
        font_size: DURATION_FONT_SIZE,
        bold: false,
        align: TextAlign::Left,
    });

    commands.push(RenderCommand::EndGroup);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{Level, Observation, ObservationType};
    use crate::timeline::{TimelineBuilder, toggle_node_expansion};

    fn sample() -> TimelineData {
        let mut root = Observation::new("root", ObservationType::Agent);
        root.name = Some("agent".into());
        root.start_time = Some("2025-01-01T00:00:00Z".into());
        root.end_time = Some("2025-01-01T00:00:01Z".into());
        let mut g = Observation::new("g", ObservationType::Generation);
        g.name = Some("llm".into());
        g.start_time = Some("2025-01-01T00:00:00.100Z".into());
        g.end_time = Some("2025-01-01T00:00:00.600Z".into());
        g.level = Level::Error;
        g.total_tokens = Some(12_345);
        g.cost = Some("0.01234".into());
        g.model = Some("gpt-4o".into());
        let mut t = Observation::new("t", ObservationType::Tool);
        t.start_time = Some("2025-01-01T00:00:00.600Z".into());
        t.latency_ms = Some(0.5);
        root.children = vec![g, t];
        TimelineBuilder::new().build(&[root])
    }

    fn rect_for<'a>(cmds: &'a [RenderCommand], color: ThemeToken) -> Vec<&'a RenderCommand> {
        cmds.iter()
            .filter(|c| matches!(c, RenderCommand::DrawRect { color: col, .. } if *col == color))
            .collect()
    }

    fn texts(cmds: &[RenderCommand]) -> Vec<&str> {
        cmds.iter()
            .filter_map(|c| match c {
                RenderCommand::DrawText { text, .. } => Some(text.as_str()),
                _ => None,
            })
            .collect()
    }

    #[test]
    fn layout_scale_and_rows() {
        let data = sample();
        let layout = WaterfallLayout::compute(&data, 1270.0, &LayoutConfig::default());
        assert!((layout.scale.x(0.0) - 250.0).abs() < 1e-9);
        assert!((layout.scale.x(1_000.0) - 1250.0).abs() < 1e-9);
        assert_eq!(layout.row_count(), 3);
        assert!((layout.content_height() - (3.0 * 32.0 + 60.0)).abs() < 1e-9);
        assert_eq!(layout.row_at(40.0 + 33.0), Some(1));
        assert_eq!(layout.row_at(10.0), None);
        assert_eq!(layout.row_at(40.0 + 32.0 * 3.0), None);
    }

    #[test]
    fn collapsing_compacts_rows() {
        let data = toggle_node_expansion(&sample(), "root");
        let layout = WaterfallLayout::compute(&data, 1000.0, &LayoutConfig::default());
        assert_eq!(layout.row_count(), 1);
        let cmds = render_waterfall(&data, &Viewport::sized(1000.0, 600.0), &LayoutConfig::default(), &WaterfallState::default());
        assert!(texts(&cmds).contains(&"▶"));
        assert!(!texts(&cmds).contains(&"llm"));
    }

    #[test]
    fn short_bars_get_minimum_width() {
        let data = sample();
        let layout = WaterfallLayout::compute(&data, 1270.0, &LayoutConfig::default());
        let tool = &data.nodes[2];
        let rect = layout.bar_rect(tool, 2);
        assert!((rect.w - 2.0).abs() < 1e-9);
        assert!((rect.y - (40.0 + 64.0 + 4.0)).abs() < 1e-9);
    }

    #[test]
    fn row_content() {
        let data = sample();
        let cmds = render_waterfall(&data, &Viewport::sized(1270.0, 600.0), &LayoutConfig::default(), &WaterfallState::default());
        let t = texts(&cmds);
        assert!(t.contains(&"▼"));
        assert!(t.contains(&"⚠"));
        assert!(t.contains(&"agent"));
        assert!(t.contains(&"1.00s"));
        assert!(t.contains(&"0.50s"));
        assert!(t.contains(&"<0.01s"));
        assert!(t.contains(&"0.0s"));

        let bold: Vec<_> = cmds
            .iter()
            .filter_map(|c| match c {
                RenderCommand::DrawText { text, bold: true, .. } => Some(text.as_str()),
                _ => None,
            })
            .collect();
        assert_eq!(bold, ["agent"]);
        assert_eq!(rect_for(&cmds, ThemeToken::GenerationBar).len(), 1);
    }

    #[test]
    fn stroke_priority() {
        let data = sample();
        let err_node = &data.nodes[1];
        let plain = &data.nodes[2];
        assert_eq!(bar_stroke(err_node, true, true).map(|s| s.width), Some(3.0));
        assert_eq!(bar_stroke(err_node, false, true).map(|s| s.color), Some(ThemeToken::ErrorMarker));
        assert_eq!(bar_stroke(plain, false, true).map(|s| s.width), Some(1.0));
        assert_eq!(bar_stroke(plain, false, false), None);
    }

    #[test]
    fn hover_draws_band_without_touching_data() {
        let data = sample();
        let before = data.clone();
        let state = WaterfallState {
            hovered: Some("t"),
            ..WaterfallState::default()
        };
        let cmds = render_waterfall(&data, &Viewport::sized(1000.0, 600.0), &LayoutConfig::default(), &state);
        assert_eq!(rect_for(&cmds, ThemeToken::RowHover).len(), 1);
        assert_eq!(data, before);
    }

    #[test]
    fn tooltip_content() {
        let data = sample();
        assert_eq!(
            tooltip_lines(&data.nodes[1]),
            [
                "llm",
                "Type: GENERATION",
                "Duration: 0.500s",
                "Cost: CHF 0.0123",
                "Tokens: 12,345",
                "Model: gpt-4o",
            ]
        );
        assert_eq!(tooltip_lines(&data.nodes[2]).len(), 3);
    }

    #[test]
    fn faults_degrade_to_empty() {
        let data = sample();
        let state = WaterfallState {
            transform: ZoomTransform { x: f64::NAN, y: 0.0, k: 1.0 },
            ..WaterfallState::default()
        };
        assert!(render_waterfall(&data, &Viewport::sized(800.0, 600.0), &LayoutConfig::default(), &state).is_empty());
        assert!(render_waterfall(&data, &Viewport::sized(f64::INFINITY, 600.0), &LayoutConfig::default(), &WaterfallState::default()).is_empty());
        let empty = TimelineData::empty(data.trace_start);
        assert!(render_waterfall(&empty, &Viewport::sized(800.0, 600.0), &LayoutConfig::default(), &WaterfallState::default()).is_empty());
    }

    #[test]
    fn offscreen_rows_are_culled() {
        let data = sample();
        let cmds = render_waterfall(&data, &Viewport::sized(1000.0, 80.0), &LayoutConfig::default(), &WaterfallState::default());
        let groups: Vec<_> = cmds
            .iter()
            .filter_map(|c| match c {
                RenderCommand::BeginGroup { id, label: Some(_) } => Some(id.as_str()),
                _ => None,
            })
            .collect();
        assert_eq!(groups, ["root", "g"]);
    }

    #[test]
    fn thousands_grouping() {
        assert_eq!(group_thousands(0), "0");
        assert_eq!(group_thousands(999), "999");
        assert_eq!(group_thousands(1_000), "1,000");
        assert_eq!(group_thousands(-1_234_567), "-1,234,567");
    }
}
