//! Integration test: load a trace-detail export into a TraceView and drive it
//! the way a frontend does: collapse, select, zoom, render, export.

use tracelens_core::analysis::{DetailSection, ToolResultFormat};
use tracelens_core::model::{Level, ObservationType};
use tracelens_core::parsers::load_trace_document;
use tracelens_core::svg::render_svg;
use tracelens_core::{ClickOutcome, TraceView, process_traces};
use tracelens_protocol::{Point, RenderCommand, Viewport};

const FIXTURE: &[u8] = include_bytes!("fixtures/agent-trace.json");

fn open() -> TraceView {
    let mut view = TraceView::default();
    view.set_viewport(Viewport::sized(1270.0, 600.0));
    view.load_json(FIXTURE).expect("fixture loads");
    view
}

fn row_ids(commands: &[RenderCommand]) -> Vec<&str> {
    commands
        .iter()
        .filter_map(|c| match c {
            RenderCommand::BeginGroup { id, label: Some(_) } => Some(id.as_str()),
            _ => None,
        })
        .collect()
}

#[test]
fn loads_trace_detail_document() {
    let doc = load_trace_document(FIXTURE).expect("fixture parses");
    let info = doc.trace.expect("trace metadata");
    assert_eq!(info.name.as_deref(), Some("support-ticket-triage"));
    assert_eq!(info.session_id.as_deref(), Some("sess-88"));
    assert_eq!(doc.observations.len(), 1);
    assert_eq!(doc.observations[0].subtree_len(), 5);

    let view = open();
    let timeline = view.timeline();
    assert_eq!(timeline.node_count, 5);
    assert_eq!(timeline.max_depth, 2);
    // The event without an end time gets the default 100ms and ends the trace.
    assert!((timeline.total_duration_ms - 4_000.0).abs() < 1e-6);

    let ids: Vec<_> = timeline.nodes.iter().map(|n| n.id.as_str()).collect();
    assert_eq!(ids, ["obs-root", "obs-classify", "obs-lookup", "obs-db", "obs-route"]);
    let lookup = timeline.node("obs-lookup").expect("lookup node");
    assert!((lookup.start_offset_ms - 1_800.0).abs() < 1e-6);
    assert!((lookup.duration_ms - 900.0).abs() < 1e-6);
}

#[test]
fn summary_counts_levels_and_cost() {
    let summary = open().summary();
    assert_eq!(summary.node_count, 5);
    assert_eq!(summary.error_count, 1);
    assert_eq!(summary.warning_count, 1);
    assert_eq!(summary.cost_label().as_deref(), Some("CHF 0.0021"));
}

#[test]
fn collapse_and_select_through_clicks() {
    let mut view = open();
    assert_eq!(row_ids(&view.render(0.0)), ["obs-root", "obs-classify", "obs-lookup", "obs-db", "obs-route"]);

    // Row 2 is obs-lookup at depth 1; its expand icon sits at x = 25.
    let outcome = view.click(Point::new(28.0, 120.0), 0.0);
    assert_eq!(outcome, Some(ClickOutcome::Toggled("obs-lookup".into())));
    assert_eq!(row_ids(&view.render(0.0)), ["obs-root", "obs-classify", "obs-lookup", "obs-route"]);

    let Some(ClickOutcome::Selected(details)) = view.click(Point::new(600.0, 90.0), 0.0) else {
        panic!("expected obs-classify to be selected");
    };
    assert_eq!(details.id, "obs-classify");
    assert_eq!(details.observation_type, ObservationType::Generation);
    assert!(details.indicators.has_prompt && details.indicators.has_state_change);
    assert!(details.diff.added.contains_key("_llm_result"));
    assert!(details.diff.removed.contains_key("messages"));
    assert!(details.diff.changed.contains_key("status"));

    let titles: Vec<_> = details.sections.iter().map(DetailSection::title).collect();
    assert_eq!(titles, ["State Changes", "Prompt", "Response", "Reasoning", "Model Parameters"]);

    // The selected bar is outlined with the thick selection stroke.
    let commands = view.render(0.0);
    let selected_stroke = commands.iter().any(|c| {
        matches!(c, RenderCommand::DrawRect { label: Some(l), stroke: Some(s), .. }
            if l.starts_with("classify") && (s.width - 3.0).abs() < f64::EPSILON)
    });
    assert!(selected_stroke);
}

#[test]
fn tool_and_error_details() {
    let mut view = open();
    let lookup = view.select("obs-lookup").expect("lookup details");
    assert!(lookup.sections.iter().any(|s| matches!(s, DetailSection::ToolCall { .. })));
    assert!(lookup.sections.iter().any(|s| matches!(
        s,
        DetailSection::ToolResponse { format: ToolResultFormat::ToolResults, .. }
    )));

    let db = view.select("obs-db").expect("db details");
    assert_eq!(db.level, Level::Error);
    assert_eq!(db.status_message.as_deref(), Some("connection reset"));
    // No input or output on db itself.
    assert!(!db.indicators.has_state_change);
    assert_eq!(view.selected_id(), Some("obs-db"));
}

#[test]
fn zoom_transform_reaches_render() {
    let mut view = open();
    view.zoom_in(0.0);
    assert!(view.tick(100.0));
    assert!(!view.tick(400.0));
    let t = view.transform(400.0);
    assert!((t.k - 1.3).abs() < 1e-9);

    let commands = view.render(400.0);
    assert!(matches!(
        commands.get(1),
        Some(RenderCommand::PushTransform { scale, .. }) if (scale.x - 1.3).abs() < 1e-9
    ));

    view.fit(400.0);
    assert!(!view.tick(2_000.0));
    assert!((view.transform(2_000.0).k - 1.0).abs() < 1e-9);
}

#[test]
fn svg_export_of_rendered_frame() {
    let mut view = open();
    let commands = view.render(0.0);
    let height = view.content_height();
    let svg = render_svg(&commands, 1270.0, height, false);
    assert!(svg.starts_with("<svg"));
    assert!(svg.contains("triage-agent"));
    assert!(svg.contains("#9c27b0"));
    assert!(svg.contains("lookup_invoices"));
}

#[test]
fn batch_pipeline_over_fixture() {
    let roots = load_trace_document(FIXTURE).expect("fixture parses").observations;
    let reports = process_traces(&[roots.clone(), roots], 2);
    assert_eq!(reports.len(), 2);
    assert_eq!(reports[0].timeline, reports[1].timeline);
    let diffs: Vec<_> = reports[0].diffs.keys().map(String::as_str).collect();
    assert_eq!(diffs, ["obs-classify", "obs-lookup", "obs-root"]);
    assert!(reports[0].indicators["obs-root"].has_state_change);
}
