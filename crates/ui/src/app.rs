use eframe::egui;
use serde_json::Value;
use tracelens_core::analysis::{DetailSection, DiffResult, NodeDetails};
use tracelens_core::time::format_duration;
use tracelens_core::views::tooltip_lines;
use tracelens_core::{ClickOutcome, TraceView};
use tracelens_protocol::{Point, ThemeToken, Viewport};

use crate::renderer;
use crate::theme::{self, ThemeMode};

/// Wheel notches are ~50 points; one notch zooms by about 10%.
const WHEEL_ZOOM_RATE: f64 = 0.002;

/// Sample agent trace behind the Demo button and `#demo`.
const DEMO_TRACE: &[u8] = include_bytes!("../assets/demo-trace.json");

/// `#demo` in the page URL.
#[cfg(target_arch = "wasm32")]
fn demo_requested() -> bool {
    web_sys::window().and_then(|w| w.location().hash().ok()).is_some_and(|hash| hash == "#demo")
}

#[cfg(not(target_arch = "wasm32"))]
fn demo_requested() -> bool {
    false
}

/// Main application state.
pub struct TraceApp {
    view: TraceView,
    loaded: bool,
    theme_mode: ThemeMode,
    details: Option<NodeDetails>,
    /// Error message to display.
    error: Option<String>,
}

impl TraceApp {
    pub fn new(cc: &eframe::CreationContext<'_>) -> Self {
        cc.egui_ctx.set_visuals(egui::Visuals::dark());
        let mut app = Self {
            view: TraceView::default(),
            loaded: false,
            theme_mode: ThemeMode::Dark,
            details: None,
            error: None,
        };

        if demo_requested() {
            tracing::info!("loading demo trace");
            app.load_trace(DEMO_TRACE);
        }
        app
    }

    fn load_trace(&mut self, data: &[u8]) {
        match self.view.load_json(data) {
            Ok(()) => {
                self.loaded = true;
                self.details = None;
                self.error = None;
            }
            Err(e) => {
                tracing::warn!(error = %e, "failed to load trace");
                self.error = Some(format!("Failed to parse trace: {e}"));
            }
        }
    }

    fn toolbar(&mut self, ui: &mut egui::Ui, now_ms: f64) {
        ui.horizontal(|ui| {
            ui.heading("tracelens");
            ui.separator();

            if ui.button("📂 Open").clicked() {
                #[cfg(not(target_arch = "wasm32"))]
                if let Some(path) = rfd::FileDialog::new().add_filter("Trace", &["json"]).pick_file() {
                    match std::fs::read(&path) {
                        Ok(data) => self.load_trace(&data),
                        Err(e) => self.error = Some(format!("Failed to read file: {e}")),
                    }
                }
            }
            if ui.button("Demo").on_hover_text("Open the bundled sample trace").clicked() {
                self.load_trace(DEMO_TRACE);
            }

            let theme_label = match self.theme_mode {
                ThemeMode::Dark => "🌙 Dark",
                ThemeMode::Light => "☀ Light",
            };
            if ui.button(theme_label).clicked() {
                self.theme_mode = self.theme_mode.toggled();
                ui.ctx().set_visuals(self.theme_mode.visuals());
            }
            ui.separator();

            ui.add_enabled_ui(self.loaded, |ui| {
                if ui.button("➕").on_hover_text("Zoom in").clicked() {
                    self.view.zoom_in(now_ms);
                }
                if ui.button("➖").on_hover_text("Zoom out").clicked() {
                    self.view.zoom_out(now_ms);
                }
                if ui.button("⛶ Fit").on_hover_text("Fit to screen").clicked() {
                    self.view.fit(now_ms);
                }
                ui.separator();
                if ui.button("Expand all").clicked() {
                    self.view.set_all_expanded(true);
                }
                if ui.button("Collapse all").clicked() {
                    self.view.set_all_expanded(false);
                }
            });

            ui.with_layout(egui::Layout::right_to_left(egui::Align::Center), |ui| {
                ui.label(format!("{:.0}%", self.view.transform(now_ms).k * 100.0));
            });
        });
    }

    fn header(&self, ui: &mut egui::Ui) {
        let summary = self.view.summary();
        ui.horizontal(|ui| {
            if let Some(name) = self.view.trace_info().and_then(|t| t.name.as_deref()) {
                ui.strong(name);
                ui.separator();
            }
            ui.label(format!("{} observations", summary.node_count));
            ui.separator();
            ui.label(format!("Duration: {}", format_duration(summary.total_duration_ms)));
            if let Some(cost) = summary.cost_label() {
                ui.separator();
                ui.label(format!("Cost: {cost}"));
            }
            if summary.error_count > 0 {
                ui.separator();
                ui.colored_label(
                    theme::resolve(ThemeToken::ErrorMarker, self.theme_mode),
                    format!("{} errors", summary.error_count),
                );
            }
            if summary.warning_count > 0 {
                ui.colored_label(
                    theme::resolve(ThemeToken::WarningMarker, self.theme_mode),
                    format!("{} warnings", summary.warning_count),
                );
            }
        });
    }

    fn details_panel(&self, ui: &mut egui::Ui, details: &NodeDetails) {
        ui.heading(&details.name);
        egui::Grid::new("detail_header").num_columns(2).show(ui, |ui| {
            for (key, value) in details.header_fields() {
                ui.label(key);
                ui.label(value);
                ui.end_row();
            }
        });
        if let Some(message) = &details.status_message {
            ui.colored_label(theme::resolve(ThemeToken::ErrorMarker, self.theme_mode), message);
        }
        for indicator in details.indicators.active() {
            ui.small(indicator.tooltip());
        }
        ui.separator();

        egui::ScrollArea::vertical().show(ui, |ui| {
            for (i, section) in details.sections.iter().enumerate() {
                egui::CollapsingHeader::new(section.title())
                    .id_salt(("section", i))
                    .default_open(true)
                    .show(ui, |ui| match section {
                        DetailSection::StateDiff { diff } => self.diff_view(ui, diff),
                        DetailSection::Reasoning { text } => {
                            ui.label(text);
                        }
                        DetailSection::ToolResponse { format, data } => {
                            ui.small(format.label());
                            json_view(ui, data);
                        }
                        DetailSection::Prompt { prompt: value }
                        | DetailSection::Response { response: value }
                        | DetailSection::ToolCall { call: value }
                        | DetailSection::ModelParameters { parameters: value } => json_view(ui, value),
                    });
            }
        });
    }

    fn diff_view(&self, ui: &mut egui::Ui, diff: &DiffResult) {
        if !diff.has_changes() {
            ui.weak("No state changes");
            return;
        }
        let color = |token| theme::resolve(token, self.theme_mode);
        for (key, value) in &diff.added {
            ui.colored_label(color(ThemeToken::DiffAdded), format!("+ {key}: {}", compact(value)));
        }
        for (key, value) in &diff.removed {
            ui.colored_label(color(ThemeToken::DiffRemoved), format!("- {key}: {}", compact(value)));
        }
        for (key, change) in &diff.changed {
            ui.colored_label(
                color(ThemeToken::DiffChanged),
                format!("~ {key}: {} → {}", compact(&change.before), compact(&change.after)),
            );
        }
    }

    fn waterfall(&mut self, ui: &mut egui::Ui, now_ms: f64) {
        let available = ui.available_rect_before_wrap();
        let response = ui.allocate_rect(available, egui::Sense::click_and_drag());
        self.view.set_viewport(Viewport {
            x: 0.0,
            y: 0.0,
            width: f64::from(available.width()),
            height: f64::from(available.height()),
            dpr: f64::from(ui.ctx().pixels_per_point()),
        });
        let to_local = |pos: egui::Pos2| Point::new(f64::from(pos.x - available.left()), f64::from(pos.y - available.top()));

        if response.dragged() {
            let delta = response.drag_delta();
            self.view.pan(f64::from(delta.x), f64::from(delta.y), now_ms);
        }

        let (scroll, zoom_delta, modifiers) = ui.input(|i| (i.smooth_scroll_delta, i.zoom_delta(), i.modifiers));
        let pointer = response.hover_pos();
        if let Some(pos) = pointer {
            if modifiers.command && scroll.y.abs() > 0.1 {
                let factor = (f64::from(scroll.y) * WHEEL_ZOOM_RATE).exp();
                self.view.zoom_at(to_local(pos), factor, now_ms);
            } else if scroll.length() > 0.1 {
                self.view.pan(f64::from(scroll.x), f64::from(scroll.y), now_ms);
            }
            if (zoom_delta - 1.0).abs() > 0.001 {
                self.view.zoom_at(to_local(pos), f64::from(zoom_delta), now_ms);
            }
        }

        if response.clicked() {
            if let Some(pos) = response.interact_pointer_pos() {
                match self.view.click(to_local(pos), now_ms) {
                    Some(ClickOutcome::Selected(details)) => self.details = Some(*details),
                    Some(ClickOutcome::Toggled(id)) => tracing::debug!(%id, "toggled"),
                    None => {}
                }
            }
        }
        self.view.hover_at(pointer.map(to_local), now_ms);

        let mut painter = ui.painter_at(available);
        painter.rect_filled(available, egui::CornerRadius::ZERO, theme::resolve(ThemeToken::Background, self.theme_mode));
        let commands = self.view.render(now_ms);
        renderer::render_commands(&mut painter, &commands, available.left_top(), self.theme_mode);

        if let Some(node) = self.view.hovered_id().and_then(|id| self.view.timeline().node(id)) {
            let lines = tooltip_lines(node);
            response.on_hover_ui_at_pointer(|ui| {
                for line in &lines {
                    ui.label(line);
                }
            });
        }
    }
}

fn compact(value: &Value) -> String {
    serde_json::to_string(value).unwrap_or_else(|_| value.to_string())
}

fn json_view(ui: &mut egui::Ui, value: &Value) {
    let text = match value {
        Value::String(s) => s.clone(),
        other => serde_json::to_string_pretty(other).unwrap_or_else(|_| other.to_string()),
    };
    ui.add(egui::Label::new(egui::RichText::new(text).monospace()).wrap());
}

impl eframe::App for TraceApp {
    fn update(&mut self, ctx: &egui::Context, _frame: &mut eframe::Frame) {
        let dropped = ctx.input(|i| i.raw.dropped_files.first().and_then(|f| f.bytes.clone()));
        if let Some(bytes) = dropped {
            self.load_trace(&bytes);
        }

        let now_ms = ctx.input(|i| i.time) * 1_000.0;
        if self.view.tick(now_ms) {
            ctx.request_repaint();
        }

        egui::TopBottomPanel::top("toolbar").show(ctx, |ui| {
            self.toolbar(ui, now_ms);
            if self.loaded {
                ui.separator();
                self.header(ui);
            }
        });

        egui::TopBottomPanel::bottom("status").show(ctx, |ui| {
            if let Some(err) = &self.error {
                ui.colored_label(egui::Color32::RED, err);
            } else if self.loaded {
                ui.label("Click a row for details · ▶/▼ to collapse · drag or scroll to pan · Ctrl+scroll to zoom");
            } else {
                ui.label("No trace loaded: click Open or drop a JSON file");
            }
        });

        if let Some(details) = self.details.clone() {
            let mut open = true;
            egui::SidePanel::right("details").default_width(380.0).show(ctx, |ui| {
                if ui.small_button("✕").clicked() {
                    open = false;
                }
                self.details_panel(ui, &details);
            });
            if !open {
                self.details = None;
                self.view.clear_selection();
            }
        }

        egui::CentralPanel::default().show(ctx, |ui| {
            if !self.loaded {
                ui.centered_and_justified(|ui| {
                    ui.heading("Drop a trace here or click Open");
                });
                return;
            }
            self.waterfall(ui, now_ms);
        });
    }
}
