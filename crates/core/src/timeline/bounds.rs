use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::model::Observation;
use crate::time::{add_millis, parse_timestamp};

/// Time frame of a trace.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TimeBounds {
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
    /// `false` when the input had no observations at all; `start == end ==
    /// now` is then a placeholder, not a real zero-length trace.
    pub has_data: bool,
}

impl TimeBounds {
    pub fn duration_ms(&self) -> f64 {
        crate::time::millis_between(self.start, self.end).max(0.0)
    }
}

/// Find the earliest start and latest end across all observations in one
/// traversal.
///
/// A node whose start time is missing or unparseable contributes nothing
/// (its children are still visited). An unparseable end time is ignored on
/// its own. When no node has an end time, the end falls back to
/// `start + default_duration_ms`. The end is never earlier than the start.
pub(crate) fn resolve_bounds(
    roots: &[Observation],
    default_duration_ms: f64,
    now: DateTime<Utc>,
) -> TimeBounds {
    if roots.is_empty() {
        return TimeBounds {
            start: now,
            end: now,
            has_data: false,
        };
    }

    let mut earliest: Option<DateTime<Utc>> = None;
    let mut latest: Option<DateTime<Utc>> = None;

    for root in roots {
        root.walk(&mut |node, _depth| {
            let Some(raw_start) = node.start_time.as_deref() else {
                tracing::warn!(id = %node.id, "observation missing start time, excluded from bounds");
                return;
            };
            let Some(start) = parse_timestamp(raw_start) else {
                tracing::warn!(id = %node.id, start_time = %raw_start, "unparseable start time, excluded from bounds");
                return;
            };
            earliest = Some(earliest.map_or(start, |e| e.min(start)));

            if let Some(raw_end) = node.end_time.as_deref() {
                match parse_timestamp(raw_end) {
                    Some(end) => latest = Some(latest.map_or(end, |l| l.max(end))),
                    None => {
                        tracing::warn!(id = %node.id, end_time = %raw_end, "unparseable end time ignored");
                    }
                }
            }
        });
    }

    let start = earliest.unwrap_or(now);
    let end = match latest {
        Some(end) => end.max(start),
        None => add_millis(start, default_duration_ms),
    };

    TimeBounds {
        start,
        end,
        has_data: true,
    }
}
