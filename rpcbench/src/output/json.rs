use serde::Serialize;
use std::collections::BTreeMap;
use std::io::Write as _;
use std::sync::Arc;
use std::time::Duration;

use rpcbench_core::runner::LatencySummary;
use rpcbench_core::{ProgressFn, ProgressUpdate, RunSummary};

use super::{OutputFormatter, RunPlan};

pub(crate) struct JsonOutput;

impl OutputFormatter for JsonOutput {
    fn print_header(&self, _plan: &RunPlan) {}

    fn progress(&self) -> Option<ProgressFn> {
        Some(Arc::new(move |u| {
            let line = build_progress_line(&u);
            emit_json_line(&line);
        }))
    }

    fn print_summary(&self, summary: &RunSummary) -> anyhow::Result<()> {
        let line = build_summary_line(summary);
        emit_json_line(&line);
        Ok(())
    }
}

#[derive(Debug, Serialize)]
pub(crate) struct JsonProgressLine {
    pub kind: &'static str,
    pub tick: u64,
    pub elapsed_secs: f64,
    pub interval_secs: f64,
    pub completed: u64,
    pub errors: u64,
    pub requests_per_sec: f64,
    pub error_rate: f64,
    pub planned: Option<u64>,
}

fn build_progress_line(u: &ProgressUpdate) -> JsonProgressLine {
    JsonProgressLine {
        kind: "progress",
        tick: u.tick,
        elapsed_secs: u.elapsed.as_secs_f64(),
        interval_secs: u.interval.as_secs_f64(),
        completed: u.completed,
        errors: u.errors,
        requests_per_sec: u.rps_now,
        error_rate: u.error_rate_now,
        planned: u.planned,
    }
}

/// Latencies in seconds.
#[derive(Debug, Serialize)]
pub(crate) struct JsonLatency {
    pub count: u64,
    pub min: f64,
    pub max: f64,
    pub mean: f64,
    pub stdev: f64,
    pub p50: f64,
    pub p75: f64,
    pub p90: f64,
    pub p95: f64,
    pub p99: f64,
}

impl From<&LatencySummary> for JsonLatency {
    fn from(l: &LatencySummary) -> Self {
        Self {
            count: l.count,
            min: l.min.as_secs_f64(),
            max: l.max.as_secs_f64(),
            mean: l.mean.as_secs_f64(),
            stdev: l.stdev.as_secs_f64(),
            p50: l.p50.as_secs_f64(),
            p75: l.p75.as_secs_f64(),
            p90: l.p90.as_secs_f64(),
            p95: l.p95.as_secs_f64(),
            p99: l.p99.as_secs_f64(),
        }
    }
}

#[derive(Debug, Serialize)]
pub(crate) struct JsonPhases {
    pub connect: Option<JsonLatency>,
    pub write: Option<JsonLatency>,
    pub delay: Option<JsonLatency>,
    pub read: Option<JsonLatency>,
}

#[derive(Debug, Serialize)]
pub(crate) struct JsonSummaryLine {
    pub kind: &'static str,
    pub total: u64,
    pub successes: u64,
    pub errors: u64,
    pub error_rate: f64,
    pub elapsed_secs: f64,
    pub requests_per_sec: f64,
    pub planned: Option<u64>,
    pub stopped: bool,
    pub latency: Option<JsonLatency>,
    pub phases: JsonPhases,
    /// Percentile -> seconds.
    pub distribution: BTreeMap<String, f64>,
    pub status_codes: BTreeMap<String, u64>,
    pub errors_by_kind: BTreeMap<String, u64>,
    pub error_messages: BTreeMap<String, u64>,
}

fn secs(d: Duration) -> f64 {
    d.as_secs_f64()
}

fn build_summary_line(summary: &RunSummary) -> JsonSummaryLine {
    JsonSummaryLine {
        kind: "summary",
        total: summary.total,
        successes: summary.successes,
        errors: summary.errors,
        error_rate: summary.error_rate,
        elapsed_secs: secs(summary.elapsed),
        requests_per_sec: summary.rps,
        planned: summary.planned,
        stopped: summary.stopped,
        latency: summary.latency.as_ref().map(JsonLatency::from),
        phases: JsonPhases {
            connect: summary.phases.connect.as_ref().map(JsonLatency::from),
            write: summary.phases.write.as_ref().map(JsonLatency::from),
            delay: summary.phases.delay.as_ref().map(JsonLatency::from),
            read: summary.phases.read.as_ref().map(JsonLatency::from),
        },
        distribution: summary
            .distribution
            .iter()
            .map(|(pct, d)| (format!("p{pct}"), secs(*d)))
            .collect(),
        status_codes: summary
            .status_codes
            .iter()
            .map(|(code, n)| (code.to_string(), *n))
            .collect(),
        errors_by_kind: summary
            .errors_by_kind
            .iter()
            .map(|(kind, n)| (kind.to_string(), *n))
            .collect(),
        error_messages: summary.error_messages.clone(),
    }
}

fn emit_json_line<T: Serialize>(line: &T) {
    let mut out = std::io::stdout().lock();
    if serde_json::to_writer(&mut out, line).is_ok() {
        let _ = writeln!(out);
    }
}
