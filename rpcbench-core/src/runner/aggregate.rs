use std::collections::BTreeMap;
use std::time::Duration;

use hdrhistogram::Histogram;
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};

use super::error::{Error, Result};
use super::progress::{ProgressFn, ProgressUpdate};
use super::record::{ErrorKind, ResultRecord};
use super::stream::ResultReceiver;
use super::summary::{
    DISTRIBUTION_PERCENTILES, HistogramBucket, LatencySummary, PhaseSummary, RunSummary,
};

const PROGRESS_INTERVAL: Duration = Duration::from_secs(1);
const HISTOGRAM_BUCKETS: u32 = 10;

/// Latency series in microseconds.
#[derive(Debug)]
struct Series {
    hist: Histogram<u64>,
    count: u64,
    min: Duration,
    max: Duration,
    sum: Duration,
}

impl Series {
    fn new() -> Self {
        // Up to one hour in microseconds (with 3 sigfigs).
        let hist = Histogram::<u64>::new_with_bounds(1, 3_600_000_000, 3)
            .unwrap_or_else(|err| panic!("failed to init histogram: {err}"));
        Self {
            hist,
            count: 0,
            min: Duration::MAX,
            max: Duration::ZERO,
            sum: Duration::ZERO,
        }
    }

    fn record(&mut self, value: Duration) {
        let us = u64::try_from(value.as_micros()).unwrap_or(u64::MAX);
        self.hist.saturating_record(us);
        self.count = self.count.saturating_add(1);
        self.min = self.min.min(value);
        self.max = self.max.max(value);
        self.sum = self.sum.saturating_add(value);
    }

    fn summary(&self) -> Option<LatencySummary> {
        if self.count == 0 {
            return None;
        }

        let mean_nanos = self.sum.as_nanos() / u128::from(self.count);
        let mean = Duration::from_nanos(u64::try_from(mean_nanos).unwrap_or(u64::MAX));

        Some(LatencySummary {
            count: self.count,
            min: self.min,
            max: self.max,
            mean,
            stdev: Duration::from_secs_f64(self.hist.stdev() / 1_000_000.0),
            p50: self.quantile(0.50),
            p75: self.quantile(0.75),
            p90: self.quantile(0.90),
            p95: self.quantile(0.95),
            p99: self.quantile(0.99),
        })
    }

    fn quantile(&self, q: f64) -> Duration {
        // The histogram rounds within its precision; keep the result inside the exact range.
        Duration::from_micros(self.hist.value_at_quantile(q)).clamp(self.min, self.max)
    }

    fn distribution(&self) -> Vec<(u8, Duration)> {
        if self.count == 0 {
            return Vec::new();
        }
        DISTRIBUTION_PERCENTILES
            .iter()
            .map(|&p| (p, self.quantile(f64::from(p) / 100.0)))
            .collect()
    }

    /// Buckets of equal width between the fastest and slowest value.
    fn buckets(&self) -> Vec<HistogramBucket> {
        if self.count == 0 {
            return Vec::new();
        }

        let width = (self.max - self.min) / HISTOGRAM_BUCKETS;
        let mut buckets: Vec<HistogramBucket> = (1..=HISTOGRAM_BUCKETS)
            .map(|i| HistogramBucket {
                mark: self.min + width * i,
                count: 0,
            })
            .collect();
        if let Some(last) = buckets.last_mut() {
            last.mark = self.max;
        }

        for v in self.hist.iter_recorded() {
            let value = Duration::from_micros(v.value_iterated_to());
            let idx = buckets
                .iter()
                .position(|b| value <= b.mark)
                .unwrap_or(buckets.len() - 1);
            buckets[idx].count += v.count_at_value();
        }
        buckets
    }
}

/// Running statistics over every record taken from the result stream.
#[derive(Debug)]
pub struct Aggregate {
    total: u64,
    successes: u64,
    errors: u64,
    status_codes: BTreeMap<u16, u64>,
    errors_by_kind: BTreeMap<ErrorKind, u64>,
    error_messages: BTreeMap<String, u64>,
    latency: Series,
    connect: Series,
    write: Series,
    delay: Series,
    read: Series,
    records: Option<Vec<ResultRecord>>,
}

impl Aggregate {
    #[must_use]
    pub fn new(keep_records: bool) -> Self {
        Self {
            total: 0,
            successes: 0,
            errors: 0,
            status_codes: BTreeMap::new(),
            errors_by_kind: BTreeMap::new(),
            error_messages: BTreeMap::new(),
            latency: Series::new(),
            connect: Series::new(),
            write: Series::new(),
            delay: Series::new(),
            read: Series::new(),
            records: keep_records.then(Vec::new),
        }
    }

    pub fn record(&mut self, record: ResultRecord) {
        self.total += 1;

        if let Some(status) = record.status() {
            *self.status_codes.entry(status).or_default() += 1;
        }

        match &record.outcome {
            Ok(_) => {
                self.successes += 1;
                // Latency statistics cover successful attempts only.
                self.latency.record(record.duration);
                self.connect.record(record.phases.connect);
                self.write.record(record.phases.write);
                self.delay.record(record.phases.delay);
                self.read.record(record.phases.read);
            }
            Err(err) => {
                self.errors += 1;
                *self.errors_by_kind.entry(err.kind).or_default() += 1;
                *self.error_messages.entry(err.to_string()).or_default() += 1;
            }
        }

        if let Some(records) = &mut self.records {
            records.push(record);
        }
    }

    #[must_use]
    pub fn total(&self) -> u64 {
        self.total
    }

    #[must_use]
    pub fn errors(&self) -> u64 {
        self.errors
    }

    /// Finalizes the report. `elapsed` is the wall clock time of the whole run.
    #[must_use]
    pub fn summarize(self, elapsed: Duration, planned: Option<u64>, stopped: bool) -> RunSummary {
        let secs = elapsed.as_secs_f64();
        let rps = if secs > 0.0 {
            self.total as f64 / secs
        } else {
            0.0
        };
        let error_rate = if self.total > 0 {
            self.errors as f64 / self.total as f64
        } else {
            0.0
        };

        RunSummary {
            total: self.total,
            successes: self.successes,
            errors: self.errors,
            error_rate,
            elapsed,
            rps,
            planned,
            stopped,
            latency: self.latency.summary(),
            phases: PhaseSummary {
                connect: self.connect.summary(),
                write: self.write.summary(),
                delay: self.delay.summary(),
                read: self.read.summary(),
            },
            distribution: self.latency.distribution(),
            histogram: self.latency.buckets(),
            status_codes: self.status_codes,
            errors_by_kind: self.errors_by_kind,
            error_messages: self.error_messages,
            records: self.records.unwrap_or_default(),
        }
    }
}

/// Drains the result stream on its own task.
pub struct Aggregator {
    rx: ResultReceiver,
    aggregate: Aggregate,
    progress: Option<ProgressFn>,
    planned: Option<u64>,
    duration: Option<Duration>,
}

impl Aggregator {
    #[must_use]
    pub fn new(rx: ResultReceiver, keep_records: bool) -> Self {
        Self {
            rx,
            aggregate: Aggregate::new(keep_records),
            progress: None,
            planned: None,
            duration: None,
        }
    }

    #[must_use]
    pub fn with_progress(
        mut self,
        progress: Option<ProgressFn>,
        planned: Option<u64>,
        duration: Option<Duration>,
    ) -> Self {
        self.progress = progress;
        self.planned = planned;
        self.duration = duration;
        self
    }

    pub fn spawn(self) -> AggregatorHandle {
        AggregatorHandle {
            join: tokio::spawn(self.run()),
        }
    }

    async fn run(mut self) -> Aggregate {
        let Some(progress) = self.progress.take() else {
            while let Some(record) = self.rx.next().await {
                self.aggregate.record(record);
            }
            return self.aggregate;
        };

        let started = Instant::now();
        let mut ticker = tokio::time::interval_at(started + PROGRESS_INTERVAL, PROGRESS_INTERVAL);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

        let mut tick = 0u64;
        let mut last_at = started;
        let mut last_total = 0u64;
        let mut last_errors = 0u64;

        loop {
            tokio::select! {
                biased;
                _ = ticker.tick() => {
                    let now = Instant::now();
                    let interval = now.saturating_duration_since(last_at);
                    let total = self.aggregate.total();
                    let errors = self.aggregate.errors();
                    let done = total - last_total;
                    let failed = errors - last_errors;

                    tick += 1;
                    let secs = interval.as_secs_f64();
                    progress(ProgressUpdate {
                        tick,
                        elapsed: now.saturating_duration_since(started),
                        interval,
                        completed: total,
                        errors,
                        rps_now: if secs > 0.0 { done as f64 / secs } else { 0.0 },
                        error_rate_now: if done > 0 { failed as f64 / done as f64 } else { 0.0 },
                        planned: self.planned,
                        duration: self.duration,
                    });

                    last_at = now;
                    last_total = total;
                    last_errors = errors;
                }
                record = self.rx.next() => match record {
                    Some(record) => self.aggregate.record(record),
                    None => break,
                },
            }
        }

        self.aggregate
    }
}

/// Completion signal of the aggregator. Consumed when awaited, so it is awaited at most once.
pub struct AggregatorHandle {
    join: JoinHandle<Aggregate>,
}

impl AggregatorHandle {
    /// Waits until the stream is closed and every record has been aggregated.
    pub async fn wait(self) -> Result<Aggregate> {
        self.join.await.map_err(|err| {
            tracing::error!(error = %err, "result aggregator failed");
            Error::AggregatorLost
        })
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]

    use super::*;
    use crate::runner::record::{CallError, CallOk};
    use crate::runner::stream::result_stream;
    use crate::runner::tracer::PhaseTimings;

    fn ok(ms: u64) -> ResultRecord {
        ResultRecord {
            worker: 1,
            sequence: None,
            outcome: Ok(CallOk::default()),
            duration: Duration::from_millis(ms),
            phases: PhaseTimings {
                delay: Duration::from_millis(ms),
                ..PhaseTimings::default()
            },
            offset: Duration::ZERO,
        }
    }

    fn failed(kind: ErrorKind, status: Option<u16>) -> ResultRecord {
        let mut err = CallError::new(kind, "boom");
        err.status = status;
        ResultRecord {
            outcome: Err(err),
            ..ok(1)
        }
    }

    #[test]
    fn empty_aggregate_yields_empty_summary() {
        let summary = Aggregate::new(false).summarize(Duration::from_secs(1), Some(0), false);
        assert!(summary.is_empty());
        assert_eq!(summary.error_rate, 0.0);
        assert!(summary.latency.is_none());
        assert!(summary.distribution.is_empty());
        assert!(summary.histogram.is_empty());
    }

    #[test]
    fn counts_outcomes_statuses_and_errors() {
        let mut agg = Aggregate::new(false);
        agg.record(ok(10));
        agg.record(ok(20));
        agg.record(failed(ErrorKind::Status, Some(503)));
        agg.record(failed(ErrorKind::Timeout, None));

        let summary = agg.summarize(Duration::from_secs(2), Some(4), false);
        assert_eq!(summary.total, 4);
        assert_eq!(summary.successes, 2);
        assert_eq!(summary.errors, 2);
        assert_eq!(summary.error_rate, 0.5);
        assert_eq!(summary.rps, 2.0);
        assert_eq!(summary.status_codes.get(&200), Some(&2));
        assert_eq!(summary.status_codes.get(&503), Some(&1));
        assert_eq!(summary.errors_by_kind.get(&ErrorKind::Timeout), Some(&1));
        assert_eq!(summary.error_messages.get("status: boom"), Some(&1));
        assert!(summary.records.is_empty());
    }

    #[test]
    fn latency_statistics_cover_successes() {
        let mut agg = Aggregate::new(true);
        for ms in 1..=100 {
            agg.record(ok(ms));
        }
        agg.record(failed(ErrorKind::Transport, None));

        let summary = agg.summarize(Duration::from_secs(1), None, true);
        let latency = summary.latency.unwrap();
        assert_eq!(latency.count, 100);
        assert_eq!(latency.min, Duration::from_millis(1));
        assert_eq!(latency.max, Duration::from_millis(100));
        assert_eq!(latency.mean, Duration::from_micros(50_500));
        assert!(
            latency.p50 >= Duration::from_millis(49) && latency.p50 <= Duration::from_millis(51)
        );
        assert!(latency.p99 >= Duration::from_millis(98));
        assert_eq!(summary.phases.delay.unwrap().count, 100);
        assert_eq!(summary.distribution.len(), DISTRIBUTION_PERCENTILES.len());
        assert_eq!(summary.records.len(), 101);

        let bucketed: u64 = summary.histogram.iter().map(|b| b.count).sum();
        assert_eq!(bucketed, 100);
        assert_eq!(summary.histogram.last().unwrap().mark, Duration::from_millis(100));
    }

    #[tokio::test]
    async fn aggregator_drains_until_stream_closes() {
        let (tx, rx) = result_stream(2);
        let handle = Aggregator::new(rx, false).spawn();

        for ms in 0..50 {
            tx.push(ok(ms)).await.unwrap();
        }
        drop(tx);

        let agg = handle.wait().await.unwrap();
        assert_eq!(agg.total(), 50);
    }

    #[tokio::test(start_paused = true)]
    async fn full_stream_blocks_pushes_until_drained() {
        let (tx, rx) = result_stream(1);
        for ms in 0..1000 {
            tx.push(ok(ms)).await.unwrap();
        }

        let blocked = tokio::time::timeout(Duration::from_millis(100), tx.push(ok(1000))).await;
        assert!(blocked.is_err(), "push into a full stream completed");

        let handle = Aggregator::new(rx, false).spawn();
        tx.push(ok(1000)).await.unwrap();
        drop(tx);

        let agg = handle.wait().await.unwrap();
        assert_eq!(agg.total(), 1001);
    }

    #[tokio::test(start_paused = true)]
    async fn aggregator_reports_progress() {
        use std::sync::{Arc, Mutex};

        let seen: Arc<Mutex<Vec<ProgressUpdate>>> = Arc::new(Mutex::new(Vec::new()));
        let sink = seen.clone();
        let progress: ProgressFn = Arc::new(move |update| sink.lock().unwrap().push(update));

        let (tx, rx) = result_stream(1);
        let handle = Aggregator::new(rx, false)
            .with_progress(Some(progress), Some(3), None)
            .spawn();

        tx.push(ok(1)).await.unwrap();
        tx.push(failed(ErrorKind::Rpc, None)).await.unwrap();
        tokio::time::sleep(Duration::from_millis(1500)).await;
        tx.push(ok(1)).await.unwrap();
        drop(tx);
        handle.wait().await.unwrap();

        let seen = seen.lock().unwrap();
        let first = seen.first().unwrap();
        assert_eq!(first.tick, 1);
        assert_eq!(first.completed, 2);
        assert_eq!(first.errors, 1);
        assert_eq!(first.planned, Some(3));
        assert_eq!(first.error_rate_now, 0.5);
    }
}
