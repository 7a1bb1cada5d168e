//! Observation tree → flat, time-indexed timeline.
//!
//! ```text
//!   Observation tree ──▶ resolve bounds ──▶ flatten ──▶ TimelineData ──▶ TimelineState
//!                         (time origin)     (offsets,     (all nodes        (expand /
//!                                            depth)        expanded)         collapse)
//! ```

pub mod bounds;
pub mod expansion;
mod flatten;

use chrono::{DateTime, Utc};

pub use bounds::TimeBounds;
pub use expansion::{TimelineState, toggle_node_expansion};

use crate::config::{DEFAULT_DURATION_MS, MAX_DEFAULT_DURATION_MS, TimelineConfig};
use crate::model::{Observation, TimelineData, TimelineNode};
use crate::time::millis_between;

/// Builds timelines with a configurable fallback duration and clock.
///
/// The clock is only read for placeholders: the `now` of an empty trace and
/// the substitute for missing start times. Pinning it makes the output
/// fully deterministic.
#[derive(Debug, Clone)]
pub struct TimelineBuilder {
    default_duration_ms: f64,
    clock: Option<DateTime<Utc>>,
}

impl TimelineBuilder {
    pub fn new() -> Self {
        Self {
            default_duration_ms: DEFAULT_DURATION_MS,
            clock: None,
        }
    }

    pub fn from_config(config: &TimelineConfig) -> Self {
        Self::new().with_default_duration(config.default_duration_ms)
    }

    /// Non-positive values fall back to the stock duration; values above
    /// one year are clamped.
    pub fn with_default_duration(mut self, ms: f64) -> Self {
        self.default_duration_ms = if ms.is_finite() && ms > 0.0 {
            ms.min(MAX_DEFAULT_DURATION_MS)
        } else {
            tracing::warn!(ms, "invalid default duration, using {DEFAULT_DURATION_MS}");
            DEFAULT_DURATION_MS
        };
        self
    }

    /// Pin "now" to a fixed instant.
    pub fn with_clock(mut self, now: DateTime<Utc>) -> Self {
        self.clock = Some(now);
        self
    }

    fn now(&self) -> DateTime<Utc> {
        self.clock.unwrap_or_else(Utc::now)
    }

    pub fn bounds(&self, roots: &[Observation]) -> TimeBounds {
        bounds::resolve_bounds(roots, self.default_duration_ms, self.now())
    }

    pub fn flatten(&self, roots: &[Observation], bounds: &TimeBounds) -> Vec<TimelineNode> {
        flatten::FlattenPass::new(bounds, self.default_duration_ms, self.now()).run(roots)
    }

    /// Full transform: bounds, flatten, and summary fields.
    pub fn build(&self, roots: &[Observation]) -> TimelineData {
        let now = self.now();
        if roots.is_empty() {
            return TimelineData::empty(now);
        }

        let bounds = bounds::resolve_bounds(roots, self.default_duration_ms, now);
        let nodes = flatten::FlattenPass::new(&bounds, self.default_duration_ms, now).run(roots);
        let max_depth = nodes.iter().map(|n| n.depth).max().unwrap_or(0);

        tracing::debug!(
            nodes = nodes.len(),
            max_depth,
            duration_ms = bounds.duration_ms(),
            "built timeline"
        );

        TimelineData {
            node_count: nodes.len(),
            nodes,
            trace_start: bounds.start,
            trace_end: bounds.end,
            total_duration_ms: millis_between(bounds.start, bounds.end).max(0.0),
            max_depth,
        }
    }
}

impl Default for TimelineBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// Earliest start and latest end of a trace with the stock fallback duration.
pub fn resolve(roots: &[Observation]) -> TimeBounds {
    TimelineBuilder::new().bounds(roots)
}

/// Flatten a trace into pre-order timeline nodes, offsets relative to its
/// own bounds.
pub fn flatten(roots: &[Observation]) -> Vec<TimelineNode> {
    let builder = TimelineBuilder::new().with_clock(Utc::now());
    let bounds = builder.bounds(roots);
    builder.flatten(roots, &bounds)
}

/// Bounds + flatten + summary in one call.
pub fn transform_to_timeline(roots: &[Observation]) -> TimelineData {
    TimelineBuilder::new().build(roots)
}
