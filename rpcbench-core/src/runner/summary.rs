use std::collections::BTreeMap;
use std::time::Duration;

use super::record::{ErrorKind, ResultRecord};

/// Percentiles reported in the latency distribution.
pub const DISTRIBUTION_PERCENTILES: [u8; 7] = [10, 25, 50, 75, 90, 95, 99];

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LatencySummary {
    pub count: u64,
    pub min: Duration,
    pub max: Duration,
    pub mean: Duration,
    pub stdev: Duration,
    pub p50: Duration,
    pub p75: Duration,
    pub p90: Duration,
    pub p95: Duration,
    pub p99: Duration,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct PhaseSummary {
    pub connect: Option<LatencySummary>,
    pub write: Option<LatencySummary>,
    pub delay: Option<LatencySummary>,
    pub read: Option<LatencySummary>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HistogramBucket {
    /// Upper bound of the bucket.
    pub mark: Duration,
    pub count: u64,
}

/// Final report of a run.
#[derive(Debug, Clone)]
pub struct RunSummary {
    pub total: u64,
    pub successes: u64,
    pub errors: u64,
    /// `errors / total`, 0 for an empty run.
    pub error_rate: f64,

    /// Wall clock time from the start of the measured run until the stream was closed.
    pub elapsed: Duration,
    pub rps: f64,

    /// Attempts the configuration asked for (`None` for unbounded runs).
    pub planned: Option<u64>,
    /// The stop signal was raised before the workers returned.
    pub stopped: bool,

    /// Total attempt duration.
    pub latency: Option<LatencySummary>,
    pub phases: PhaseSummary,
    pub distribution: Vec<(u8, Duration)>,
    pub histogram: Vec<HistogramBucket>,

    pub status_codes: BTreeMap<u16, u64>,
    pub errors_by_kind: BTreeMap<ErrorKind, u64>,
    pub error_messages: BTreeMap<String, u64>,

    /// Every record in arrival order, when the run kept them.
    pub records: Vec<ResultRecord>,
}

impl RunSummary {
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.total == 0
    }
}
