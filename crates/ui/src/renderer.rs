use egui::{Align2, CornerRadius, FontId, Pos2, Rect, Stroke, StrokeKind};
use tracelens_protocol::{Affine, Point, RenderCommand, TextAlign};

use crate::theme::{self, ThemeMode};

/// Text positions are baselines; egui anchors on the galley box.
const DESCENT: f32 = 0.22;

fn to_pos(tf: &Affine, p: Point, offset: Pos2) -> Pos2 {
    let p = tf.apply(p);
    Pos2::new(p.x as f32 + offset.x, p.y as f32 + offset.y)
}

/// Paint a list of `RenderCommand` into an egui `Painter`.
///
/// `offset` is the top-left pixel position of the rendering area. Hit
/// regions are not painted; the caller hit-tests the same command list.
pub fn render_commands(painter: &mut egui::Painter, commands: &[RenderCommand], offset: Pos2, mode: ThemeMode) {
    let mut transform_stack = vec![Affine::IDENTITY];
    let mut clip_stack: Vec<Rect> = Vec::new();

    for cmd in commands {
        let tf = transform_stack.last().copied().unwrap_or(Affine::IDENTITY);
        match cmd {
            RenderCommand::DrawRect {
                rect,
                color,
                stroke,
                corner_radius,
                ..
            } => {
                let r = tf.apply_rect(*rect);
                if r.w < 0.5 || r.h < 0.5 {
                    continue;
                }
                let egui_rect = Rect::from_min_size(
                    Pos2::new(r.x as f32 + offset.x, r.y as f32 + offset.y),
                    egui::vec2(r.w as f32, r.h as f32),
                );
                if !painter.clip_rect().intersects(egui_rect) {
                    continue;
                }

                let radius = CornerRadius::same((corner_radius * tf.sx).round().clamp(0.0, 255.0) as u8);
                painter.rect_filled(egui_rect, radius, theme::resolve(*color, mode));
                if let Some(stroke) = stroke {
                    painter.rect_stroke(
                        egui_rect,
                        radius,
                        Stroke::new(stroke.width as f32, theme::resolve(stroke.color, mode)),
                        StrokeKind::Inside,
                    );
                }
            }

            RenderCommand::DrawText {
                position,
                text,
                color,
                font_size,
                bold,
                align,
            } => {
                let size = (*font_size * tf.sy) as f32;
                if size < 1.0 {
                    continue;
                }
                let anchor = match align {
                    TextAlign::Left => Align2::LEFT_BOTTOM,
                    TextAlign::Center => Align2::CENTER_BOTTOM,
                    TextAlign::Right => Align2::RIGHT_BOTTOM,
                };
                let mut pos = to_pos(&tf, *position, offset);
                pos.y += size * DESCENT;
                let text_color = theme::resolve(*color, mode);
                painter.text(pos, anchor, text, FontId::proportional(size), text_color);
                if *bold {
                    painter.text(pos + egui::vec2(0.5, 0.0), anchor, text, FontId::proportional(size), text_color);
                }
            }

            RenderCommand::DrawLine { from, to, color, width } => {
                let p1 = to_pos(&tf, *from, offset);
                let p2 = to_pos(&tf, *to, offset);
                painter.line_segment([p1, p2], Stroke::new(*width as f32, theme::resolve(*color, mode)));
            }

            RenderCommand::SetClip { rect } => {
                let r = tf.apply_rect(*rect);
                let clip_rect = Rect::from_min_size(
                    Pos2::new(r.x as f32 + offset.x, r.y as f32 + offset.y),
                    egui::vec2(r.w as f32, r.h as f32),
                );
                clip_stack.push(painter.clip_rect());
                let intersected = painter.clip_rect().intersect(clip_rect);
                painter.set_clip_rect(intersected);
            }

            RenderCommand::ClearClip => {
                if let Some(prev) = clip_stack.pop() {
                    painter.set_clip_rect(prev);
                }
            }

            RenderCommand::PushTransform { translate, scale } => {
                transform_stack.push(tf.then(*translate, *scale));
            }

            RenderCommand::PopTransform => {
                if transform_stack.len() > 1 {
                    transform_stack.pop();
                }
            }

            RenderCommand::HitRegion { .. } | RenderCommand::BeginGroup { .. } | RenderCommand::EndGroup => {}
        }
    }
}
