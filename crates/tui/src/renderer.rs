use std::io::stdout;
use std::time::{Duration, Instant};

use anyhow::Result;
use crossterm::{
    event::{
        self, DisableMouseCapture, EnableMouseCapture, Event, KeyCode, KeyEventKind, MouseButton,
        MouseEventKind,
    },
    execute,
    terminal::{EnterAlternateScreen, LeaveAlternateScreen, disable_raw_mode, enable_raw_mode},
};
use ratatui::{
    Terminal,
    backend::CrosstermBackend,
    buffer::Buffer,
    layout::{Constraint, Layout, Rect},
    style::{Color, Modifier, Style},
    text::{Line, Span},
    widgets::{Block, Paragraph, Wrap},
};
use serde_json::Value;
use tracelens_core::analysis::{DetailSection, NodeDetails};
use tracelens_core::config::LayoutConfig;
use tracelens_core::svg::resolve_color;
use tracelens_core::time::format_duration;
use tracelens_core::{ClickOutcome, TraceView};
use tracelens_protocol::{Affine, Point, RenderCommand, Stroke, TextAlign, ThemeToken, Viewport};

/// Logical pixels per terminal column.
pub const CELL_WIDTH: f64 = 8.0;
const SCROLL_ROWS: f64 = 3.0;
const PAN_COLUMNS: f64 = 8.0;

/// Maps between logical pixels and terminal cells: one waterfall row per
/// line, everything above the first row on line 0.
#[derive(Debug, Clone, Copy)]
pub struct CellMap {
    margin_top: f64,
    row_height: f64,
}

impl CellMap {
    pub fn new(layout: &LayoutConfig) -> Self {
        Self {
            margin_top: layout.margin.top,
            row_height: layout.row_height,
        }
    }

    pub fn cell(&self, p: Point) -> (i32, i32) {
        let col = (p.x / CELL_WIDTH).floor() as i32;
        let line = if p.y < self.margin_top {
            0
        } else {
            ((p.y - self.margin_top) / self.row_height).floor() as i32 + 1
        };
        (col, line)
    }

    /// Centre of a cell in logical pixels.
    pub fn point(&self, col: u16, line: u16) -> Point {
        let x = f64::from(col) * CELL_WIDTH + CELL_WIDTH / 2.0;
        let y = match line {
            0 => self.margin_top / 2.0,
            n => self.margin_top + f64::from(n - 1) * self.row_height + self.row_height / 2.0,
        };
        Point::new(x, y)
    }

    /// Pixel viewport covering `area`.
    pub fn viewport(&self, area: Rect) -> Viewport {
        Viewport::sized(
            f64::from(area.width) * CELL_WIDTH,
            self.margin_top + f64::from(area.height.saturating_sub(1)) * self.row_height,
        )
    }
}

pub fn theme_to_color(token: ThemeToken, dark: bool) -> Color {
    let hex = resolve_color(token, dark).trim_start_matches('#');
    let channel = |i: usize| hex.get(i..i + 2).and_then(|c| u8::from_str_radix(c, 16).ok()).unwrap_or(0);
    Color::Rgb(channel(0), channel(2), channel(4))
}

/// Rasterize render commands into `buf` within `area`.
///
/// Lines are not drawn: gridlines and tick marks have no sub-cell
/// rendition, the axis labels alone mark time.
pub fn paint_commands(buf: &mut Buffer, area: Rect, commands: &[RenderCommand], map: CellMap, dark: bool) {
    let mut stack = vec![Affine::IDENTITY];
    let background = theme_to_color(ThemeToken::Background, dark);

    let put = |buf: &mut Buffer, col: i32, line: i32, ch: char, style: Style| {
        if col < 0 || line < 0 || col >= i32::from(area.width) || line >= i32::from(area.height) {
            return;
        }
        let x = area.x + col as u16;
        let y = area.y + line as u16;
        buf[(x, y)].set_char(ch).set_style(style);
    };

    for cmd in commands {
        let current = stack.last().copied().unwrap_or(Affine::IDENTITY);
        match cmd {
            RenderCommand::PushTransform { translate, scale } => stack.push(current.then(*translate, *scale)),
            RenderCommand::PopTransform => {
                if stack.len() > 1 {
                    stack.pop();
                }
            }
            RenderCommand::DrawRect { rect, color, stroke, .. } => {
                let r = current.apply_rect(*rect);
                let (c0, line) = map.cell(Point::new(r.x, r.y + r.h / 2.0));
                let (c1, _) = map.cell(Point::new(r.right(), r.y));
                if *color == ThemeToken::RowHover || *color == ThemeToken::RowSelected {
                    for col in 0..i32::from(area.width) {
                        let x = area.x + col as u16;
                        if line >= 0 && line < i32::from(area.height) {
                            buf[(x, area.y + line as u16)].set_bg(theme_to_color(*color, dark));
                        }
                    }
                    continue;
                }
                let (ch, bg) = match stroke {
                    Some(Stroke { color: ThemeToken::SelectionStroke, .. }) => {
                        ('▓', theme_to_color(ThemeToken::SelectionStroke, dark))
                    }
                    Some(s) => ('█', theme_to_color(s.color, dark)),
                    None => ('█', background),
                };
                let style = Style::default().fg(theme_to_color(*color, dark)).bg(bg);
                for col in c0..c1.max(c0 + 1) {
                    put(buf, col, line, ch, style);
                }
            }
            RenderCommand::DrawText {
                position,
                text,
                color,
                bold,
                align,
                ..
            } => {
                let (col, line) = map.cell(current.apply(*position));
                let len = text.chars().count() as i32;
                let start = match align {
                    TextAlign::Left => col,
                    TextAlign::Center => col - len / 2,
                    TextAlign::Right => col - len,
                };
                let mut style = Style::default().fg(theme_to_color(*color, dark));
                if *bold {
                    style = style.add_modifier(Modifier::BOLD);
                }
                for (i, ch) in text.chars().enumerate() {
                    put(buf, start + i as i32, line, ch, style);
                }
            }
            _ => {}
        }
    }
}

/// Details pane content for a selected observation.
pub fn detail_lines(details: &NodeDetails) -> Vec<Line<'static>> {
    let heading = Style::default().add_modifier(Modifier::BOLD);
    let mut lines = vec![Line::styled(details.name.clone(), heading)];
    for (key, value) in details.header_fields() {
        lines.push(Line::from(vec![
            Span::styled(format!("{key}: "), Style::default().fg(Color::Gray)),
            Span::raw(value),
        ]));
    }
    if let Some(message) = &details.status_message {
        lines.push(Line::styled(format!("Error: {message}"), Style::default().fg(Color::Red)));
    }
    for indicator in details.indicators.active() {
        lines.push(Line::styled(format!("• {}", indicator.tooltip()), Style::default().fg(Color::DarkGray)));
    }

    for section in &details.sections {
        lines.push(Line::raw(""));
        lines.push(Line::styled(section.title().to_string(), heading));
        match section {
            DetailSection::StateDiff { diff } => {
                if !diff.has_changes() {
                    lines.push(Line::styled("No state changes", Style::default().fg(Color::DarkGray)));
                }
                for (key, value) in &diff.added {
                    lines.push(Line::styled(format!("+ {key}: {}", compact(value)), Style::default().fg(Color::Green)));
                }
                for (key, value) in &diff.removed {
                    lines.push(Line::styled(format!("- {key}: {}", compact(value)), Style::default().fg(Color::Red)));
                }
                for (key, change) in &diff.changed {
                    lines.push(Line::styled(
                        format!("~ {key}: {} → {}", compact(&change.before), compact(&change.after)),
                        Style::default().fg(Color::Yellow),
                    ));
                }
            }
            DetailSection::Reasoning { text } => lines.extend(text.lines().map(|l| Line::raw(l.to_string()))),
            DetailSection::ToolResponse { format, data } => {
                lines.push(Line::styled(format.label().to_string(), Style::default().fg(Color::Gray)));
                push_json(&mut lines, data);
            }
            DetailSection::Prompt { prompt: value }
            | DetailSection::Response { response: value }
            | DetailSection::ToolCall { call: value }
            | DetailSection::ModelParameters { parameters: value } => push_json(&mut lines, value),
        }
    }
    lines
}

fn compact(value: &Value) -> String {
    serde_json::to_string(value).unwrap_or_else(|_| value.to_string())
}

fn push_json(lines: &mut Vec<Line<'static>>, value: &Value) {
    let text = match value {
        Value::String(s) => s.clone(),
        other => serde_json::to_string_pretty(other).unwrap_or_else(|_| other.to_string()),
    };
    lines.extend(text.lines().map(|l| Line::raw(l.to_string())));
}

/// Interactive state around a [`TraceView`].
pub struct App {
    view: TraceView,
    map: CellMap,
    dark: bool,
    show_details: bool,
    details: Option<NodeDetails>,
    started: Instant,
}

impl App {
    pub fn new(view: TraceView, dark: bool) -> Self {
        let map = CellMap::new(&view.config().layout);
        Self {
            view,
            map,
            dark,
            show_details: true,
            details: None,
            started: Instant::now(),
        }
    }

    fn now_ms(&self) -> f64 {
        self.started.elapsed().as_secs_f64() * 1_000.0
    }

    fn visible_ids(&self) -> Vec<String> {
        self.view.timeline().visible_nodes().map(|n| n.id.clone()).collect()
    }

    fn move_selection(&mut self, delta: isize) {
        let ids = self.visible_ids();
        if ids.is_empty() {
            return;
        }
        let next = match self.view.selected_id().and_then(|id| ids.iter().position(|v| v == id)) {
            Some(i) => i.saturating_add_signed(delta).min(ids.len() - 1),
            None => 0,
        };
        self.details = self.view.select(&ids[next]);
    }

    /// Apply a key press at `now_ms`. Returns `false` to quit.
    pub fn handle_key(&mut self, code: KeyCode, now_ms: f64) -> bool {
        let row_height = self.map.row_height;
        match code {
            KeyCode::Char('q') | KeyCode::Esc => return false,
            KeyCode::Down | KeyCode::Char('j') => self.move_selection(1),
            KeyCode::Up | KeyCode::Char('k') => self.move_selection(-1),
            KeyCode::Enter | KeyCode::Char(' ') => {
                if let Some(id) = self.view.selected_id().map(String::from) {
                    self.view.toggle(&id);
                }
            }
            KeyCode::Char('e') => {
                self.view.set_all_expanded(true);
            }
            KeyCode::Char('c') => {
                self.view.set_all_expanded(false);
            }
            KeyCode::Char('+') | KeyCode::Char('=') => self.view.zoom_in(now_ms),
            KeyCode::Char('-') => self.view.zoom_out(now_ms),
            KeyCode::Char('0') | KeyCode::Char('f') => self.view.fit(now_ms),
            KeyCode::Left => self.view.pan(PAN_COLUMNS * CELL_WIDTH, 0.0, now_ms),
            KeyCode::Right => self.view.pan(-PAN_COLUMNS * CELL_WIDTH, 0.0, now_ms),
            KeyCode::PageDown => self.view.pan(0.0, -SCROLL_ROWS * row_height, now_ms),
            KeyCode::PageUp => self.view.pan(0.0, SCROLL_ROWS * row_height, now_ms),
            KeyCode::Char('d') => self.show_details = !self.show_details,
            _ => {}
        }
        true
    }

    /// Click on a cell of the waterfall area.
    pub fn handle_click(&mut self, col: u16, line: u16, now_ms: f64) {
        match self.view.click(self.map.point(col, line), now_ms) {
            Some(ClickOutcome::Selected(details)) => self.details = Some(*details),
            Some(ClickOutcome::Toggled(id)) => tracing::debug!(%id, "toggled from click"),
            None => {}
        }
    }

    fn header(&self) -> String {
        let summary = self.view.summary();
        let name = self
            .view
            .trace_info()
            .and_then(|t| t.name.clone())
            .unwrap_or_else(|| "trace".to_string());
        let mut header = format!(
            " tracelens | {name} | {} observations | {}",
            summary.node_count,
            format_duration(summary.total_duration_ms)
        );
        if let Some(cost) = summary.cost_label() {
            header.push_str(&format!(" | {cost}"));
        }
        if summary.error_count > 0 {
            header.push_str(&format!(" | {} errors", summary.error_count));
        }
        header.push(' ');
        header
    }

    fn split(&self, area: Rect) -> (Rect, Rect, Option<Rect>, Rect) {
        let [header, body, footer] =
            Layout::vertical([Constraint::Length(1), Constraint::Min(1), Constraint::Length(1)]).areas(area);
        if self.show_details && self.details.is_some() {
            let [main, side] =
                Layout::horizontal([Constraint::Percentage(62), Constraint::Percentage(38)]).areas(body);
            (header, main, Some(side), footer)
        } else {
            (header, body, None, footer)
        }
    }

    fn draw(&mut self, frame: &mut ratatui::Frame<'_>, now_ms: f64) {
        let (header_area, main, side, footer) = self.split(frame.area());
        let toolbar = Style::default()
            .fg(theme_to_color(ThemeToken::ToolbarText, self.dark))
            .bg(theme_to_color(ThemeToken::ToolbarBackground, self.dark));

        frame.render_widget(Paragraph::new(self.header()).style(toolbar), header_area);
        frame.render_widget(
            Block::default().style(Style::default().bg(theme_to_color(ThemeToken::Background, self.dark))),
            main,
        );

        self.view.set_viewport(self.map.viewport(main));
        let commands = self.view.render(now_ms);
        paint_commands(frame.buffer_mut(), main, &commands, self.map, self.dark);

        if let (Some(side), Some(details)) = (side, &self.details) {
            let pane = Paragraph::new(detail_lines(details))
                .wrap(Wrap { trim: false })
                .block(Block::bordered().title(" Details "));
            frame.render_widget(pane, side);
        }

        frame.render_widget(
            Paragraph::new(" ↑↓ select | enter toggle | e/c expand/collapse all | +/- zoom | 0 fit | ←→ pan | d details | q quit")
                .style(toolbar),
            footer,
        );
    }
}

pub fn run(view: TraceView, dark: bool) -> Result<()> {
    enable_raw_mode()?;
    let mut stdout = stdout();
    execute!(stdout, EnterAlternateScreen, EnableMouseCapture)?;
    let backend = CrosstermBackend::new(stdout);
    let mut terminal = Terminal::new(backend)?;

    let mut app = App::new(view, dark);
    let result = event_loop(&mut terminal, &mut app);

    disable_raw_mode()?;
    execute!(terminal.backend_mut(), LeaveAlternateScreen, DisableMouseCapture)?;
    terminal.show_cursor()?;
    result
}

fn event_loop(terminal: &mut Terminal<CrosstermBackend<std::io::Stdout>>, app: &mut App) -> Result<()> {
    loop {
        let now = app.now_ms();
        let animating = app.view.tick(now);
        terminal.draw(|frame| app.draw(frame, now))?;

        let wait = if animating { 16 } else { 100 };
        if !event::poll(Duration::from_millis(wait))? {
            continue;
        }
        let now = app.now_ms();
        let size = terminal.size()?;
        let (_, main, _, _) = app.split(Rect::new(0, 0, size.width, size.height));
        match event::read()? {
            Event::Key(key) if key.kind == KeyEventKind::Press => {
                if !app.handle_key(key.code, now) {
                    return Ok(());
                }
            }
            Event::Mouse(mouse) => {
                let inside = mouse.column >= main.x
                    && mouse.column < main.x + main.width
                    && mouse.row >= main.y
                    && mouse.row < main.y + main.height;
                let (col, line) = (mouse.column.saturating_sub(main.x), mouse.row.saturating_sub(main.y));
                match mouse.kind {
                    MouseEventKind::Down(MouseButton::Left) if inside => app.handle_click(col, line, now),
                    MouseEventKind::Moved => {
                        let point = inside.then(|| app.map.point(col, line));
                        app.view.hover_at(point, now);
                    }
                    MouseEventKind::ScrollDown => {
                        app.handle_key(KeyCode::PageDown, now);
                    }
                    MouseEventKind::ScrollUp => {
                        app.handle_key(KeyCode::PageUp, now);
                    }
                    _ => {}
                }
            }
            _ => {}
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tracelens_core::model::{Observation, ObservationType};
    use serde_json::json;

    fn view() -> TraceView {
        let mut tool = Observation::new("t", ObservationType::Tool);
        tool.name = Some("search".into());
        tool.start_time = Some("2025-01-01T00:00:00.500Z".into());
        tool.end_time = Some("2025-01-01T00:00:01Z".into());
        tool.input = Some(json!({"q": "rust"}));
        tool.output = Some(json!({"q": "rust", "hits": 3}));
        let mut root = Observation::new("root", ObservationType::Agent);
        root.name = Some("agent".into());
        root.start_time = Some("2025-01-01T00:00:00Z".into());
        root.end_time = Some("2025-01-01T00:00:01Z".into());
        root.children.push(tool);
        let mut view = TraceView::default();
        view.load(vec![root]);
        view
    }

    fn line_text(buf: &Buffer, line: u16) -> String {
        (0..buf.area.width).map(|x| buf[(x, line)].symbol().to_string()).collect()
    }

    #[test]
    fn cell_map_round_trips_rows() {
        let map = CellMap::new(&LayoutConfig::default());
        assert_eq!(map.cell(map.point(3, 0)), (3, 0));
        assert_eq!(map.cell(map.point(10, 2)), (10, 2));
        let vp = map.viewport(Rect::new(0, 0, 100, 11));
        assert!((vp.width - 800.0).abs() < f64::EPSILON);
        assert!((vp.height - (40.0 + 320.0)).abs() < f64::EPSILON);
    }

    #[test]
    fn paints_rows_on_their_own_lines() {
        let mut view = view();
        let area = Rect::new(0, 0, 120, 6);
        let map = CellMap::new(&view.config().layout);
        view.set_viewport(map.viewport(area));
        let commands = view.render(0.0);
        let mut buf = Buffer::empty(area);
        paint_commands(&mut buf, area, &commands, map, true);

        assert!(line_text(&buf, 0).contains("0.0s"));
        assert!(line_text(&buf, 1).contains("agent"));
        assert!(line_text(&buf, 1).contains('▼'));
        assert!(line_text(&buf, 2).contains("search"));
        assert!(line_text(&buf, 2).contains('█'));
        assert!(line_text(&buf, 3).trim().is_empty());
    }

    #[test]
    fn keys_drive_selection_and_expansion() {
        let mut app = App::new(view(), true);
        assert!(app.handle_key(KeyCode::Down, 0.0));
        assert_eq!(app.view.selected_id(), Some("root"));
        app.handle_key(KeyCode::Down, 0.0);
        assert_eq!(app.details.as_ref().map(|d| d.id.as_str()), Some("t"));
        app.handle_key(KeyCode::Up, 0.0);
        app.handle_key(KeyCode::Enter, 0.0);
        assert_eq!(app.view.timeline().visible_count(), 1);
        app.handle_key(KeyCode::Char('e'), 0.0);
        assert_eq!(app.view.timeline().visible_count(), 2);
        assert!(!app.handle_key(KeyCode::Char('q'), 0.0));
    }

    #[test]
    fn click_on_icon_cell_toggles() {
        let mut app = App::new(view(), false);
        app.view.set_viewport(app.map.viewport(Rect::new(0, 0, 120, 6)));
        app.handle_click(0, 1, 0.0);
        assert_eq!(app.view.timeline().visible_count(), 1);
        app.handle_click(40, 1, 0.0);
        assert_eq!(app.view.selected_id(), Some("root"));
    }

    #[test]
    fn details_show_diff_markers() {
        let mut view = view();
        let details = view.select("t").expect("tool details");
        let text: Vec<String> = detail_lines(&details).iter().map(ToString::to_string).collect();
        assert_eq!(text[0], "search");
        assert!(text.iter().any(|l| l == "+ hits: 3"));
        assert!(text.iter().any(|l| l == "State Changes"));
        assert!(text.iter().any(|l| l == "Tool Call"));
    }

    #[test]
    fn details_list_model_tokens_and_totals() {
        let mut generation = Observation::new("g", ObservationType::Generation);
        generation.name = Some("plan".into());
        generation.model = Some("gpt-4o".into());
        generation.total_tokens = Some(30);
        generation.prompt_tokens = Some(20);
        generation.completion_tokens = Some(10);
        generation.cost = Some("0.004".into());
        generation.latency_ms = Some(800.0);
        let mut root = Observation::new("root", ObservationType::Agent);
        root.latency_ms = Some(1_000.0);
        root.children.push(generation);
        let mut view = TraceView::default();
        view.load(vec![root]);

        let text = |id: &str, view: &mut TraceView| -> Vec<String> {
            view.select(id).map(|d| detail_lines(&d).iter().map(ToString::to_string).collect()).unwrap_or_default()
        };
        let leaf = text("g", &mut view);
        assert!(leaf.iter().any(|l| l == "Model: gpt-4o"));
        assert!(leaf.iter().any(|l| l == "Tokens: 30 (20 in / 10 out)"));
        assert!(leaf.iter().any(|l| l == "Cost: CHF 0.0040"));
        let parent = text("root", &mut view);
        assert!(parent.iter().any(|l| l == "Total latency: 1.80s"));
        assert!(parent.iter().any(|l| l == "Total cost: CHF 0.0040"));
    }

    #[test]
    fn colors_come_from_theme() {
        assert_eq!(theme_to_color(ThemeToken::GenerationBar, true), Color::Rgb(0x9c, 0x27, 0xb0));
    }
}
