use tracelens_protocol::{Affine, HitTarget, Point, Rect, RenderCommand};

/// Resolve a screen point to the interactive target under it.
///
/// Hit regions are mapped through the active transform stack and clip.
/// A `Toggle` target wins over any `Select` target at the same point;
/// otherwise the last matching region (topmost) wins.
pub fn hit_test(commands: &[RenderCommand], point: Point) -> Option<HitTarget> {
    let mut stack = vec![Affine::IDENTITY];
    let mut clip: Option<Rect> = None;
    let mut select: Option<&HitTarget> = None;
    let mut toggle: Option<&HitTarget> = None;

    for cmd in commands {
        let current = stack.last().copied().unwrap_or(Affine::IDENTITY);
        match cmd {
            RenderCommand::PushTransform { translate, scale } => {
                stack.push(current.then(*translate, *scale));
            }
            RenderCommand::PopTransform => {
                if stack.len() > 1 {
                    stack.pop();
                }
            }
            RenderCommand::SetClip { rect } => clip = Some(current.apply_rect(*rect)),
            RenderCommand::ClearClip => clip = None,
            RenderCommand::HitRegion { rect, target } => {
                if clip.is_some_and(|c| !c.contains(point)) {
                    continue;
                }
                if current.apply_rect(*rect).contains(point) {
                    match target {
                        HitTarget::Toggle(_) => toggle = Some(target),
                        HitTarget::Select(_) => select = Some(target),
                    }
                }
            }
            _ => {}
        }
    }

    toggle.or(select).cloned()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn region(x: f64, y: f64, w: f64, h: f64, target: HitTarget) -> RenderCommand {
        RenderCommand::HitRegion {
            rect: Rect::new(x, y, w, h),
            target,
        }
    }

    #[test]
    fn toggle_beats_select() {
        let cmds = vec![
            region(0.0, 0.0, 100.0, 20.0, HitTarget::Select("a".into())),
            region(0.0, 0.0, 16.0, 20.0, HitTarget::Toggle("a".into())),
        ];
        assert_eq!(hit_test(&cmds, Point::new(5.0, 5.0)), Some(HitTarget::Toggle("a".into())));
        assert_eq!(hit_test(&cmds, Point::new(50.0, 5.0)), Some(HitTarget::Select("a".into())));
        assert_eq!(hit_test(&cmds, Point::new(50.0, 25.0)), None);
    }

    #[test]
    fn follows_transform_stack() {
        let cmds = vec![
            RenderCommand::PushTransform {
                translate: Point::new(100.0, 0.0),
                scale: Point::new(2.0, 2.0),
            },
            region(0.0, 0.0, 10.0, 10.0, HitTarget::Select("scaled".into())),
            RenderCommand::PopTransform,
            region(0.0, 0.0, 10.0, 10.0, HitTarget::Select("plain".into())),
        ];
        assert_eq!(hit_test(&cmds, Point::new(115.0, 15.0)), Some(HitTarget::Select("scaled".into())));
        assert_eq!(hit_test(&cmds, Point::new(5.0, 5.0)), Some(HitTarget::Select("plain".into())));
    }

    #[test]
    fn clip_hides_regions() {
        let cmds = vec![
            RenderCommand::SetClip {
                rect: Rect::new(0.0, 0.0, 50.0, 50.0),
            },
            region(0.0, 0.0, 100.0, 100.0, HitTarget::Select("a".into())),
            RenderCommand::ClearClip,
        ];
        assert!(hit_test(&cmds, Point::new(75.0, 10.0)).is_none());
        assert!(hit_test(&cmds, Point::new(25.0, 10.0)).is_some());
    }
}
