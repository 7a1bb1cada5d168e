pub mod hit_test;
pub mod scale;
pub mod time_axis;
pub mod waterfall;
pub mod zoom;

pub use hit_test::hit_test;
pub use scale::TimeScale;
pub use waterfall::{
    RenderError, WaterfallLayout, WaterfallState, bar_stroke, render_waterfall, render_with_layout,
    tooltip_lines,
};
pub use zoom::{ZoomState, ZoomTransform};
