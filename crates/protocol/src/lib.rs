pub mod commands;
pub mod theme;
pub mod types;

pub use commands::{HitTarget, RenderCommand, Stroke, TextAlign};
pub use theme::ThemeToken;
pub use types::{Affine, Point, Rect, Viewport};
