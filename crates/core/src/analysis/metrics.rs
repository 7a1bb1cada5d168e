use serde::{Deserialize, Serialize};

use crate::model::{Level, Observation, TimelineData};

/// Sum of `cost` over a subtree, `None` when no node carries one.
pub fn subtree_cost(node: &Observation) -> Option<f64> {
    sum_subtree(node, Observation::cost_value)
}

/// Sum of `latency_ms` over a subtree, `None` when no node carries one.
///
/// This adds up work time; overlapping children make it larger than the
/// wall-clock span.
pub fn subtree_duration(node: &Observation) -> Option<f64> {
    sum_subtree(node, |o| o.latency_ms)
}

fn sum_subtree(node: &Observation, value: impl Fn(&Observation) -> Option<f64>) -> Option<f64> {
    let mut total: Option<f64> = None;
    node.walk(&mut |o, _| {
        if let Some(v) = value(o) {
            *total.get_or_insert(0.0) += v;
        }
    });
    total
}

/// Header numbers for a loaded trace.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TraceSummary {
    pub node_count: usize,
    pub total_duration_ms: f64,
    pub total_cost: Option<f64>,
    pub error_count: usize,
    pub warning_count: usize,
    pub max_depth: u32,
}

impl TraceSummary {
    pub fn from_timeline(data: &TimelineData) -> Self {
        let mut total_cost: Option<f64> = None;
        let mut error_count = 0;
        let mut warning_count = 0;
        for node in &data.nodes {
            if let Some(cost) = node.total_cost.as_deref().and_then(|c| c.trim().parse::<f64>().ok()) {
                *total_cost.get_or_insert(0.0) += cost;
            }
            match node.level {
                Level::Error => error_count += 1,
                Level::Warning => warning_count += 1,
                _ => {}
            }
        }
        Self {
            node_count: data.node_count,
            total_duration_ms: data.total_duration_ms,
            total_cost,
            error_count,
            warning_count,
            max_depth: data.max_depth,
        }
    }

    /// `"CHF 0.0123"`, or `None` without any cost data.
    pub fn cost_label(&self) -> Option<String> {
        self.total_cost.map(format_cost)
    }
}

pub fn format_cost(cost: f64) -> String {
    format!("CHF {cost:.4}")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::ObservationType;
    use crate::timeline::TimelineBuilder;

    fn tree() -> Observation {
        let mut gen_a = Observation::new("a", ObservationType::Generation);
        gen_a.cost = Some("0.25".into());
        gen_a.latency_ms = Some(120.0);
        gen_a.level = Level::Error;
        let mut gen_b = Observation::new("b", ObservationType::Generation);
        gen_b.cost = Some("0.5".into());
        gen_b.level = Level::Warning;
        let mut tool = Observation::new("t", ObservationType::Tool);
        tool.latency_ms = Some(30.0);
        tool.cost = Some("n/a".into());
        let mut root = Observation::new("root", ObservationType::Agent);
        root.children = vec![gen_a, gen_b, tool];
        root.start_time = Some("2025-01-01T00:00:00Z".into());
        root
    }

    #[test]
    fn sums_cost_and_latency() {
        let root = tree();
        assert!((subtree_cost(&root).unwrap_or_default() - 0.75).abs() < 1e-12);
        assert!((subtree_duration(&root).unwrap_or_default() - 150.0).abs() < 1e-12);
        assert_eq!(subtree_cost(&root.children[2]), None);
    }

    #[test]
    fn absent_everywhere_is_none() {
        let root = Observation::new("r", ObservationType::Span);
        assert_eq!(subtree_cost(&root), None);
        assert_eq!(subtree_duration(&root), None);
    }

    #[test]
    fn summary_counts() {
        let root = tree();
        let data = TimelineBuilder::new().build(&[root]);
        let summary = TraceSummary::from_timeline(&data);
        assert_eq!(summary.node_count, 4);
        assert_eq!(summary.error_count, 1);
        assert_eq!(summary.warning_count, 1);
        assert_eq!(summary.max_depth, 1);
        assert_eq!(summary.cost_label().as_deref(), Some("CHF 0.7500"));
    }
}
