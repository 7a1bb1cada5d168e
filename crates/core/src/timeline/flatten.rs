use chrono::{DateTime, Utc};

use super::bounds::TimeBounds;
use crate::model::{Observation, TimelineNode, color_for_type};
use crate::time::{millis_between, parse_timestamp};

/// Per-pass inputs shared by every node.
pub(crate) struct FlattenPass {
    pub trace_start: DateTime<Utc>,
    pub default_duration_ms: f64,
    /// Substituted for a missing or unparseable start time. Captured once
    /// per pass so every affected node gets the same value.
    pub now: DateTime<Utc>,
}

impl FlattenPass {
    pub fn new(bounds: &TimeBounds, default_duration_ms: f64, now: DateTime<Utc>) -> Self {
        Self {
            trace_start: bounds.start,
            default_duration_ms,
            now,
        }
    }

    /// Depth-first pre-order flatten of all roots. Children keep their
    /// source order.
    pub fn run(&self, roots: &[Observation]) -> Vec<TimelineNode> {
        let capacity = roots.iter().map(Observation::subtree_len).sum();
        let mut nodes = Vec::with_capacity(capacity);
        for root in roots {
            self.visit(root, 0, None, &mut nodes);
        }
        nodes
    }

    fn visit(
        &self,
        obs: &Observation,
        depth: u32,
        parent_id: Option<&str>,
        out: &mut Vec<TimelineNode>,
    ) {
        out.push(self.position(obs, depth, parent_id));
        for child in &obs.children {
            self.visit(child, depth + 1, Some(&obs.id), out);
        }
    }

    fn start_of(&self, obs: &Observation) -> DateTime<Utc> {
        match obs.start_time.as_deref() {
            Some(raw) => parse_timestamp(raw).unwrap_or_else(|| {
                tracing::warn!(id = %obs.id, name = %obs.display_name(), start_time = %raw, "unparseable start time, using current time");
                self.now
            }),
            None => {
                tracing::warn!(id = %obs.id, name = %obs.display_name(), "observation missing start time, using current time");
                self.now
            }
        }
    }

    /// End offset priority: explicit end time, then positive latency, then
    /// the default duration.
    fn end_offset(&self, obs: &Observation, start_offset: f64) -> f64 {
        if let Some(end) = obs.end_time.as_deref().and_then(parse_timestamp) {
            return millis_between(self.trace_start, end);
        }
        match obs.latency_ms {
            Some(latency) if latency > 0.0 => start_offset + latency,
            _ => start_offset + self.default_duration_ms,
        }
    }

    fn position(&self, obs: &Observation, depth: u32, parent_id: Option<&str>) -> TimelineNode {
        let start_offset_ms = millis_between(self.trace_start, self.start_of(obs));
        let raw_end = self.end_offset(obs, start_offset_ms);
        let duration_ms = (raw_end - start_offset_ms).max(1.0);

        TimelineNode {
            id: obs.id.clone(),
            name: obs.display_name().to_string(),
            observation_type: obs.observation_type,
            level: obs.level,
            start_offset_ms,
            end_offset_ms: start_offset_ms + duration_ms,
            duration_ms,
            depth,
            parent_id: parent_id.map(String::from),
            child_ids: obs.children.iter().map(|c| c.id.clone()).collect(),
            color: color_for_type(obs.observation_type),
            is_expanded: true,
            is_visible: true,
            prompt_tokens: obs.prompt_tokens,
            completion_tokens: obs.completion_tokens,
            total_tokens: obs.total_tokens,
            total_cost: obs.cost.clone(),
            model: obs.model.clone(),
            has_error: obs.level == crate::model::Level::Error,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::DEFAULT_DURATION_MS;
    use crate::model::{Level, ObservationType};

    const T0: &str = "2025-01-01T00:00:00Z";

    fn ts(s: &str) -> DateTime<Utc> {
        parse_timestamp(s).unwrap_or_default()
    }

    fn pass() -> FlattenPass {
        FlattenPass {
            trace_start: ts(T0),
            default_duration_ms: DEFAULT_DURATION_MS,
            now: ts("2025-01-01T00:00:10Z"),
        }
    }

    fn obs(id: &str, start: Option<&str>) -> Observation {
        let mut o = Observation::new(id, ObservationType::Span);
        o.start_time = start.map(String::from);
        o
    }

    #[test]
    fn preorder_with_depth_parent_and_child_ids() {
        let mut root = obs("root", Some(T0));
        let mut a = obs("a", Some(T0));
        a.children.push(obs("a1", Some(T0)));
        a.children.push(obs("a2", Some(T0)));
        root.children.push(a);
        root.children.push(obs("b", Some(T0)));

        let nodes = pass().run(&[root]);
        let ids: Vec<_> = nodes.iter().map(|n| n.id.as_str()).collect();
        assert_eq!(ids, ["root", "a", "a1", "a2", "b"]);
        let depths: Vec<_> = nodes.iter().map(|n| n.depth).collect();
        assert_eq!(depths, [0, 1, 2, 2, 1]);
        assert_eq!(nodes[0].child_ids, ["a", "b"]);
        assert_eq!(nodes[2].parent_id.as_deref(), Some("a"));
        assert!(nodes[0].parent_id.is_none());
        assert!(nodes.iter().all(|n| n.is_expanded && n.is_visible));
    }

    #[test]
    fn end_offset_prefers_end_time_then_latency_then_default() {
        let mut with_end = obs("end", Some("2025-01-01T00:00:00.100Z"));
        with_end.end_time = Some("2025-01-01T00:00:00.350Z".into());
        with_end.latency_ms = Some(9_999.0);

        let mut with_latency = obs("lat", Some("2025-01-01T00:00:00.100Z"));
        with_latency.latency_ms = Some(42.0);

        let mut zero_latency = obs("zero", Some("2025-01-01T00:00:00.100Z"));
        zero_latency.latency_ms = Some(0.0);

        let nodes = pass().run(&[with_end, with_latency, zero_latency]);
        assert!((nodes[0].start_offset_ms - 100.0).abs() < 1e-9);
        assert!((nodes[0].end_offset_ms - 350.0).abs() < 1e-9);
        assert!((nodes[1].end_offset_ms - 142.0).abs() < 1e-9);
        assert!((nodes[2].duration_ms - DEFAULT_DURATION_MS).abs() < 1e-9);
    }

    #[test]
    fn duration_is_at_least_one_ms() {
        let mut instant = obs("instant", Some(T0));
        instant.end_time = Some(T0.into());
        let mut backwards = obs("backwards", Some("2025-01-01T00:00:01Z"));
        backwards.end_time = Some(T0.into());

        let nodes = pass().run(&[instant, backwards]);
        for n in &nodes {
            assert!(n.duration_ms >= 1.0);
            assert!(n.end_offset_ms - n.start_offset_ms >= 1.0);
        }
    }

    #[test]
    fn missing_start_uses_pass_clock() {
        let nodes = pass().run(&[obs("no-start", None), obs("bad-start", Some("garbage"))]);
        assert!((nodes[0].start_offset_ms - 10_000.0).abs() < 1e-9);
        assert!((nodes[1].start_offset_ms - 10_000.0).abs() < 1e-9);
    }

    #[test]
    fn copies_metrics_and_error_flag() {
        let mut gen_obs = Observation::new("g", ObservationType::Generation);
        gen_obs.start_time = Some(T0.into());
        gen_obs.level = Level::Error;
        gen_obs.model = Some("gpt-4o".into());
        gen_obs.total_tokens = Some(150);
        gen_obs.cost = Some("0.01".into());

        let nodes = pass().run(&[gen_obs]);
        let n = &nodes[0];
        assert!(n.has_error);
        assert_eq!(n.color, tracelens_protocol::ThemeToken::GenerationBar);
        assert_eq!(n.model.as_deref(), Some("gpt-4o"));
        assert_eq!(n.total_tokens, Some(150));
        assert_eq!(n.total_cost.as_deref(), Some("0.01"));
        assert_eq!(n.name, "Unknown");
    }

    #[test]
    fn same_input_same_output() {
        let mut root = obs("root", Some(T0));
        root.children.push(obs("c", None));
        let roots = vec![root];
        let a = serde_json::to_string(&pass().run(&roots)).unwrap_or_default();
        let b = serde_json::to_string(&pass().run(&roots)).unwrap_or_default();
        assert!(!a.is_empty());
        assert_eq!(a, b);
    }
}
