//! Batch processing of many traces off the UI thread.
//!
//! Each trace goes through flatten, indicator aggregation and per-node
//! diffing independently, so traces are split across scoped worker threads
//! with no shared state.

use std::collections::{BTreeMap, HashMap};
use std::thread;

use serde::{Deserialize, Serialize};

use crate::analysis::{DiffResult, IndicatorSet, TraceSummary, diff, indicators_for_trace};
use crate::analysis::indicators::local_state_changed;
use crate::model::{Observation, TimelineData};
use crate::timeline::TimelineBuilder;

/// Everything computed for one trace.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TraceReport {
    /// Position of the trace in the input.
    pub index: usize,
    pub timeline: TimelineData,
    pub summary: TraceSummary,
    pub indicators: HashMap<String, IndicatorSet>,
    /// Input → output diff of every node whose state changed locally.
    pub diffs: BTreeMap<String, DiffResult>,
}

/// Configured batch runner.
#[derive(Debug, Clone)]
pub struct Pipeline {
    builder: TimelineBuilder,
    workers: usize,
}

impl Pipeline {
    pub fn new(builder: TimelineBuilder, workers: usize) -> Self {
        Self {
            builder,
            workers: workers.max(1),
        }
    }

    /// Analyse a single trace on the calling thread. Ids are expected to be
    /// unique, as [`load_trace`](crate::parsers::load_trace) leaves them.
    pub fn process_one(&self, index: usize, roots: &[Observation]) -> TraceReport {
        let timeline = self.builder.build(roots);
        let summary = TraceSummary::from_timeline(&timeline);
        let indicators = indicators_for_trace(roots);

        let mut diffs = BTreeMap::new();
        for root in roots {
            root.walk(&mut |node, _| {
                if local_state_changed(node) {
                    diffs.insert(node.id.clone(), diff(node.input.as_ref(), node.output.as_ref()));
                }
            });
        }

        TraceReport {
            index,
            timeline,
            summary,
            indicators,
            diffs,
        }
    }

    /// Analyse every trace. Output order matches input order.
    pub fn run(&self, traces: &[Vec<Observation>]) -> Vec<TraceReport> {
        if traces.is_empty() {
            return Vec::new();
        }
        let workers = self.workers.min(traces.len());
        if workers == 1 {
            return traces
                .iter()
                .enumerate()
                .map(|(i, roots)| self.process_one(i, roots))
                .collect();
        }

        let chunk_size = traces.len().div_ceil(workers);
        tracing::debug!(traces = traces.len(), workers, chunk_size, "processing traces");

        thread::scope(|scope| {
            let handles: Vec<_> = traces
                .chunks(chunk_size)
                .enumerate()
                .map(|(chunk, batch)| {
                    scope.spawn(move || {
                        batch
                            .iter()
                            .enumerate()
                            .map(|(i, roots)| self.process_one(chunk * chunk_size + i, roots))
                            .collect::<Vec<_>>()
                    })
                })
                .collect();

            let mut reports = Vec::with_capacity(traces.len());
            for handle in handles {
                match handle.join() {
                    Ok(batch) => reports.extend(batch),
                    Err(panic) => std::panic::resume_unwind(panic),
                }
            }
            reports
        })
    }
}

/// Analyse `traces` with the default timeline settings on up to `workers`
/// threads.
pub fn process_traces(traces: &[Vec<Observation>], workers: usize) -> Vec<TraceReport> {
    Pipeline::new(TimelineBuilder::new(), workers).run(traces)
}
