//! Observation-tree analysis and waterfall rendering for agent traces.
//!
//! Traces are parsed into [`model::Observation`] trees, flattened into a
//! [`model::TimelineData`] and drawn as a list of
//! [`tracelens_protocol::RenderCommand`]s that any frontend can paint.

pub mod analysis;
pub mod config;
pub mod model;
pub mod parsers;
pub mod pipeline;
pub mod svg;
pub mod time;
pub mod timeline;
pub mod views;

pub use config::ViewerConfig;
pub use model::session::{ClickOutcome, TraceView};
pub use parsers::{TraceLoadError, load_trace};
pub use pipeline::{Pipeline, TraceReport, process_traces};
pub use timeline::{TimelineBuilder, TimelineState, transform_to_timeline};
