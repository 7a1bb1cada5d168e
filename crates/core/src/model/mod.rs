pub mod observation;
pub mod session;
pub mod timeline;

pub use observation::{Level, Observation, ObservationIndex, ObservationType};
pub use session::TraceView;
pub use timeline::{TimelineData, TimelineNode, color_for_type};
