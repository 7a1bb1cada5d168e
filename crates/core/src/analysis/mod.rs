//! Per-node analysis: indicators, input/output diff, subtree metrics and the
//! details-panel model built from them.

pub mod details;
pub mod diff;
pub mod indicators;
pub mod metrics;

pub use details::{DetailSection, NodeDetails, ToolResultFormat, node_details};
pub use diff::{ChangedValue, DiffResult, diff};
pub use indicators::{
    Indicator, IndicatorCache, IndicatorSet, indicators, indicators_cached, indicators_for_trace,
};
pub use metrics::{TraceSummary, subtree_cost, subtree_duration};
