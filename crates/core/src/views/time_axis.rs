use tracelens_protocol::{Point, RenderCommand, TextAlign, ThemeToken};

use super::scale::{TimeScale, format_tick};

const TICK_SIZE: f64 = 6.0;
const LABEL_GAP: f64 = 3.0;
const FONT_SIZE: f64 = 11.0;

/// How many ticks fit into `inner_width` pixels, capped at `max_ticks`.
pub fn tick_count(inner_width: f64, max_ticks: u32, min_spacing: f64) -> u32 {
    if inner_width <= 0.0 || min_spacing <= 0.0 {
        return 0;
    }
    let fit = (inner_width / min_spacing).floor();
    if fit >= f64::from(max_ticks) { max_ticks } else { fit.max(0.0) as u32 }
}

/// Top-oriented time axis at `y`: a domain line, tick marks with second
/// labels, and gridlines running `grid_height` pixels down through the rows.
pub fn render_time_axis(scale: &TimeScale, y: f64, ticks: u32, grid_height: f64) -> Vec<RenderCommand> {
    let values = scale.ticks(ticks);
    let mut commands = Vec::with_capacity(values.len() * 3 + 3);

    commands.push(RenderCommand::BeginGroup {
        id: "x-axis".to_string(),
        label: None,
    });
    commands.push(RenderCommand::DrawLine {
        from: Point::new(scale.range_start, y),
        to: Point::new(scale.range_end, y),
        color: ThemeToken::AxisLine,
        width: 1.0,
    });

    for ms in values {
        let x = scale.x(ms);
        if grid_height > 0.0 {
            commands.push(RenderCommand::DrawLine {
                from: Point::new(x, y),
                to: Point::new(x, y + grid_height),
                color: ThemeToken::Gridline,
                width: 0.5,
            });
        }
        commands.push(RenderCommand::DrawLine {
            from: Point::new(x, y - TICK_SIZE),
            to: Point::new(x, y),
            color: ThemeToken::AxisLine,
            width: 1.0,
        });
        commands.push(RenderCommand::DrawText {
            position: Point::new(x, y - TICK_SIZE - LABEL_GAP),
            text: format_tick(ms),
            color: ThemeToken::AxisText,
            font_size: FONT_SIZE,
            bold: false,
            align: TextAlign::Center,
        });
    }

    commands.push(RenderCommand::EndGroup);
    commands
}

#[cfg(test)]
mod tests {
    use super::*;

    fn labels(cmds: &[RenderCommand]) -> Vec<&str> {
        cmds.iter()
            .filter_map(|c| match c {
                RenderCommand::DrawText { text, .. } => Some(text.as_str()),
                _ => None,
            })
            .collect()
    }

    #[test]
    fn tick_count_respects_width_and_cap() {
        assert_eq!(tick_count(500.0, 10, 80.0), 6);
        assert_eq!(tick_count(5_000.0, 10, 80.0), 10);
        assert_eq!(tick_count(50.0, 10, 80.0), 0);
        assert_eq!(tick_count(-1.0, 10, 80.0), 0);
    }

    #[test]
    fn labels_in_seconds() {
        let scale = TimeScale::new(2_000.0, 250.0, 750.0);
        let cmds = render_time_axis(&scale, 40.0, 4, 100.0);
        assert_eq!(labels(&cmds), ["0.0s", "0.5s", "1.0s", "1.5s", "2.0s"]);
        let gridlines = cmds
            .iter()
            .filter(|c| matches!(c, RenderCommand::DrawLine { color: ThemeToken::Gridline, .. }))
            .count();
        assert_eq!(gridlines, 5);
    }

    #[test]
    fn empty_domain_draws_only_the_line() {
        let scale = TimeScale::new(0.0, 250.0, 750.0);
        let cmds = render_time_axis(&scale, 40.0, 10, 0.0);
        assert!(labels(&cmds).is_empty());
        assert_eq!(cmds.len(), 3);
    }
}
