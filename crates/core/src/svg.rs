//! SVG export: turns a `RenderCommand` list into a standalone SVG document.

use tracelens_protocol::{RenderCommand, TextAlign, ThemeToken};

/// Render `commands` as an SVG document of `width` × `height`.
///
/// Transforms and groups become nested `<g>` elements, group labels become
/// `<title>` tooltips, clips become `<clipPath>`s. Hit regions are not
/// painted.
pub fn render_svg(commands: &[RenderCommand], width: f64, height: f64, dark: bool) -> String {
    let mut svg = String::with_capacity(commands.len() * 160 + 512);
    svg.push_str(&format!(
        r#"<svg xmlns="http://www.w3.org/2000/svg" viewBox="0 0 {width} {height}" width="{width}" height="{height}" style="font-family:system-ui,-apple-system,sans-serif">"#
    ));
    svg.push_str(&format!(
        r#"<rect width="{width}" height="{height}" fill="{}"/>"#,
        resolve_color(ThemeToken::Background, dark)
    ));

    // Open <g> elements, so unbalanced command lists still produce valid XML.
    let mut open = 0usize;
    let mut clip_open = false;
    let mut clip_id = 0usize;

    for cmd in commands {
        match cmd {
            RenderCommand::DrawRect {
                rect,
                color,
                stroke,
                corner_radius,
                label,
            } => {
                svg.push_str(&format!(
                    r#"<rect x="{}" y="{}" width="{}" height="{}" rx="{corner_radius}" fill="{}""#,
                    rect.x,
                    rect.y,
                    rect.w.max(0.0),
                    rect.h.max(0.0),
                    resolve_color(*color, dark),
                ));
                if let Some(stroke) = stroke {
                    svg.push_str(&format!(
                        r#" stroke="{}" stroke-width="{}""#,
                        resolve_color(stroke.color, dark),
                        stroke.width
                    ));
                }
                match label {
                    Some(label) => {
                        svg.push_str(&format!("><title>{}</title></rect>", escape_xml(label)));
                    }
                    None => svg.push_str("/>"),
                }
            }
            RenderCommand::DrawLine {
                from,
                to,
                color,
                width: line_width,
            } => {
                svg.push_str(&format!(
                    r#"<line x1="{}" y1="{}" x2="{}" y2="{}" stroke="{}" stroke-width="{line_width}"/>"#,
                    from.x,
                    from.y,
                    to.x,
                    to.y,
                    resolve_color(*color, dark),
                ));
            }
            RenderCommand::DrawText {
                position,
                text,
                color,
                font_size,
                bold,
                align,
            } => {
                let anchor = match align {
                    TextAlign::Left => "start",
                    TextAlign::Center => "middle",
                    TextAlign::Right => "end",
                };
                let weight = if *bold { "bold" } else { "normal" };
                svg.push_str(&format!(
                    r#"<text x="{}" y="{}" fill="{}" font-size="{font_size}" font-weight="{weight}" text-anchor="{anchor}">{}</text>"#,
                    position.x,
                    position.y,
                    resolve_color(*color, dark),
                    escape_xml(text),
                ));
            }
            RenderCommand::PushTransform { translate, scale } => {
                svg.push_str(&format!(
                    r#"<g transform="translate({} {}) scale({} {})">"#,
                    translate.x, translate.y, scale.x, scale.y
                ));
                open += 1;
            }
            RenderCommand::BeginGroup { id, label } => {
                svg.push_str(&format!(r#"<g data-id="{}">"#, escape_xml(id)));
                if let Some(label) = label {
                    svg.push_str(&format!("<title>{}</title>", escape_xml(label)));
                }
                open += 1;
            }
            RenderCommand::PopTransform | RenderCommand::EndGroup => {
                if open > 0 {
                    svg.push_str("</g>");
                    open -= 1;
                }
            }
            RenderCommand::SetClip { rect } => {
                if clip_open {
                    svg.push_str("</g>");
                }
                clip_id += 1;
                svg.push_str(&format!(
                    r#"<clipPath id="clip{clip_id}"><rect x="{}" y="{}" width="{}" height="{}"/></clipPath><g clip-path="url(#clip{clip_id})">"#,
                    rect.x, rect.y, rect.w, rect.h,
                ));
                clip_open = true;
            }
            RenderCommand::ClearClip => {
                if clip_open {
                    svg.push_str("</g>");
                    clip_open = false;
                }
            }
            RenderCommand::HitRegion { .. } => {}
        }
    }

    if clip_open {
        svg.push_str("</g>");
    }
    for _ in 0..open {
        svg.push_str("</g>");
    }
    svg.push_str("</svg>");
    svg
}

/// Hex color for a theme token.
pub fn resolve_color(token: ThemeToken, dark: bool) -> &'static str {
    use ThemeToken::*;
    match token {
        SpanBar => "#1976d2",
        GenerationBar => "#9c27b0",
        ToolBar => "#ed6c02",
        AgentBar => "#2e7d32",
        EventBar | UnknownBar => "#757575",
        SystemBar => "#424242",
        ErrorMarker => "#d32f2f",
        WarningMarker => "#ffa000",
        DiffAdded => "#4caf50",
        DiffRemoved => "#f44336",
        DiffChanged => "#ff9800",
        _ if dark => match token {
            SelectionStroke => "#ffffff",
            HoverStroke => "#e0e0e0",
            RowHover => "#1c2230",
            RowSelected => "#26324a",
            ExpandIcon => "#a0a0a0",
            AxisLine | AxisText | TextSecondary => "#b0b0b0",
            Gridline | Border => "#2e3442",
            TextPrimary | ToolbarText => "#e0e0e0",
            TextMuted => "#8f99ad",
            Surface | ToolbarBackground => "#222834",
            _ => "#141923",
        },
        _ => match token {
            SelectionStroke => "#000000",
            HoverStroke => "#333333",
            RowHover => "#f2f4f7",
            RowSelected => "#e3ecf8",
            ExpandIcon => "#707070",
            AxisLine | AxisText | TextSecondary => "#666677",
            Gridline | Border => "#dde3ea",
            TextPrimary | ToolbarText => "#1a1a2e",
            TextMuted => "#8f99ad",
            Surface | ToolbarBackground => "#f8f9fa",
            _ => "#ffffff",
        },
    }
}

fn escape_xml(s: &str) -> String {
    s.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
        .replace('\'', "&apos;")
}
