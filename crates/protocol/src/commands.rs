use serde::{Deserialize, Serialize};

use crate::theme::ThemeToken;
use crate::types::{Point, Rect};

/// A single, stateless render instruction.
///
/// The core emits a `Vec<RenderCommand>` for the waterfall. Renderers consume
/// this list sequentially and each command carries all the data it needs.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum RenderCommand {
    /// Draw a filled rectangle with optional rounded corners, an outline
    /// and a tooltip-style label.
    DrawRect {
        rect: Rect,
        color: ThemeToken,
        stroke: Option<Stroke>,
        corner_radius: f64,
        label: Option<String>,
    },

    /// Draw a text string anchored at a position.
    DrawText {
        position: Point,
        text: String,
        color: ThemeToken,
        font_size: f64,
        bold: bool,
        align: TextAlign,
    },

    /// Draw a line segment.
    DrawLine {
        from: Point,
        to: Point,
        color: ThemeToken,
        width: f64,
    },

    /// Invisible interactive region. Renderers do not paint it; they collect
    /// it for click/hover dispatch.
    HitRegion { rect: Rect, target: HitTarget },

    /// Restrict subsequent drawing to a rectangular region.
    SetClip { rect: Rect },

    /// Remove the active clip region.
    ClearClip,

    /// Push an affine transform (applied to all subsequent commands until
    /// the matching `PopTransform`).
    PushTransform { translate: Point, scale: Point },

    /// Pop the most recent transform.
    PopTransform,

    /// Begin a logical group (axis, rows). Renderers may use this for
    /// batching or layer separation.
    BeginGroup { id: String, label: Option<String> },

    /// End the current group.
    EndGroup,
}

/// Outline drawn around a rectangle.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Stroke {
    pub color: ThemeToken,
    pub width: f64,
}

impl Stroke {
    pub fn new(color: ThemeToken, width: f64) -> Self {
        Self { color, width }
    }
}

/// What a hit region does when the user interacts with it.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum HitTarget {
    /// Select the node (bar, label, row band).
    Select(String),
    /// Flip the node's expanded flag (expand affordance).
    Toggle(String),
}

impl HitTarget {
    /// Id of the node this target refers to.
    pub fn node_id(&self) -> &str {
        match self {
            Self::Select(id) | Self::Toggle(id) => id,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TextAlign {
    Left,
    Center,
    Right,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hit_target_node_id() {
        assert_eq!(HitTarget::Select("a".into()).node_id(), "a");
        assert_eq!(HitTarget::Toggle("b".into()).node_id(), "b");
    }

    #[test]
    fn commands_serialize_as_tagged_json() {
        let cmd = RenderCommand::HitRegion {
            rect: Rect::new(0.0, 0.0, 10.0, 10.0),
            target: HitTarget::Toggle("obs-1".into()),
        };
        let json = serde_json::to_string(&cmd).unwrap_or_default();
        assert!(json.contains("HitRegion"));
        assert!(json.contains("obs-1"));
        let back: RenderCommand =
            serde_json::from_str(&json).unwrap_or(RenderCommand::ClearClip);
        assert_eq!(back, cmd);
    }
}
