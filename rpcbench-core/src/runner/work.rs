use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::{Arc, Mutex, OnceLock};

use tokio::sync::oneshot;
use tokio::time::Instant;

use super::aggregate::{Aggregator, AggregatorHandle};
use super::client::ClientFactory;
use super::config::WorkConfig;
use super::error::{Error, Result};
use super::progress::ProgressFn;
use super::signal::{StartSignal, StopSignal};
use super::stream::{ResultReceiver, ResultSender, result_stream};
use super::summary::RunSummary;
use super::worker::{WorkerContext, run_worker};

/// Lifecycle of a [`Work`]. Stopping is observed through [`StopSignal::is_stopped`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, strum::Display)]
#[strum(serialize_all = "snake_case")]
#[repr(u8)]
pub enum LifecycleState {
    Uninitialized = 0,
    Initialized = 1,
    Running = 2,
    Finished = 3,
}

impl LifecycleState {
    fn from_u8(v: u8) -> Self {
        match v {
            0 => Self::Uninitialized,
            1 => Self::Initialized,
            2 => Self::Running,
            _ => Self::Finished,
        }
    }
}

struct Channels {
    results_tx: Mutex<Option<ResultSender>>,
    results_rx: Mutex<Option<ResultReceiver>>,
    stop: Arc<StopSignal>,
}

/// One load-generation run: a pool of workers, the result stream, and its aggregator.
///
/// `stop` may be called from any task (a signal handler, a timer) while `run` is in
/// progress; the run then drains and reports what was issued so far.
pub struct Work<F: ClientFactory> {
    config: Arc<WorkConfig>,
    factory: Arc<F>,
    progress: Option<ProgressFn>,

    channels: OnceLock<Channels>,
    state: AtomicU8,
    started: OnceLock<Instant>,
    aggregator: Mutex<Option<AggregatorHandle>>,
}

impl<F: ClientFactory> Work<F> {
    pub fn new(config: WorkConfig, factory: F) -> Self {
        Self {
            config: Arc::new(config),
            factory: Arc::new(factory),
            progress: None,
            channels: OnceLock::new(),
            state: AtomicU8::new(LifecycleState::Uninitialized as u8),
            started: OnceLock::new(),
            aggregator: Mutex::new(None),
        }
    }

    #[must_use]
    pub fn with_progress(mut self, progress: ProgressFn) -> Self {
        self.progress = Some(progress);
        self
    }

    pub fn config(&self) -> &WorkConfig {
        &self.config
    }

    pub fn state(&self) -> LifecycleState {
        LifecycleState::from_u8(self.state.load(Ordering::Acquire))
    }

    /// Creates the result stream and the stop signal. Runs at most once, whichever caller
    /// gets there first; later calls are no-ops.
    pub fn init(&self) {
        self.channels();
    }

    fn channels(&self) -> &Channels {
        self.channels.get_or_init(|| {
            let (tx, rx) = result_stream(self.config.concurrency);
            let _ = self.state.compare_exchange(
                LifecycleState::Uninitialized as u8,
                LifecycleState::Initialized as u8,
                Ordering::AcqRel,
                Ordering::Acquire,
            );
            tracing::debug!(capacity = tx.capacity(), "initialized result stream");
            Channels {
                results_tx: Mutex::new(Some(tx)),
                results_rx: Mutex::new(Some(rx)),
                stop: Arc::new(StopSignal::new()),
            }
        })
    }

    pub fn stop_signal(&self) -> Arc<StopSignal> {
        self.channels().stop.clone()
    }

    /// Asks every worker to stop before its next attempt. Never blocks; repeated calls
    /// have no further effect.
    pub fn stop(&self) {
        let stop = &self.channels().stop;
        if !stop.is_stopped() {
            tracing::info!("stopping run");
        }
        stop.stop();
    }

    /// Issues the configured attempts and returns the final report.
    pub async fn run(&self) -> Result<RunSummary> {
        self.config.validate()?;
        self.init();

        let channels = self.channels();
        let rx = channels
            .results_rx
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .take()
            .ok_or(Error::AlreadyRan)?;
        let tx = channels
            .results_tx
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone()
            .ok_or(Error::AlreadyRan)?;
        self.state
            .store(LifecycleState::Running as u8, Ordering::Release);

        let concurrency = self.config.concurrency;
        let attempts = self.config.per_worker_attempts();
        let planned = attempts.map(|a| a.saturating_mul(concurrency));

        let handle = Aggregator::new(rx, self.config.keep_records)
            .with_progress(self.progress.clone(), planned, self.config.duration)
            .spawn();
        *self
            .aggregator
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner()) = Some(handle);

        tracing::info!(
            concurrency,
            planned = ?planned,
            qps = self.config.qps,
            mode = %self.config.mode,
            "starting run"
        );

        let setup_error: Arc<Mutex<Option<Error>>> = Arc::new(Mutex::new(None));
        let start_signal = Arc::new(StartSignal::new());
        let run_started: Arc<OnceLock<Instant>> = Arc::new(OnceLock::new());

        let mut handles = Vec::with_capacity(usize::try_from(concurrency).unwrap_or(0));
        let mut ready = Vec::with_capacity(handles.capacity());
        for id in 1..=concurrency {
            let ctx = WorkerContext {
                id,
                attempts,
                config: self.config.clone(),
                factory: self.factory.clone(),
                results: tx.clone(),
                stop: channels.stop.clone(),
                setup_error: setup_error.clone(),
                start_signal: start_signal.clone(),
                run_started: run_started.clone(),
            };
            let (ready_tx, ready_rx) = oneshot::channel();
            ready.push(ready_rx);
            handles.push(tokio::spawn(run_worker(ctx, ready_tx)));
        }
        drop(tx);

        // Setup (connecting, fetching sequence numbers) stays out of the measured time.
        let mut all_ready = true;
        for rx in ready {
            all_ready &= rx.await.is_ok();
        }

        let setup_err = setup_error
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .take();
        if !all_ready {
            channels.stop.stop();
        }

        let started = Instant::now();
        let _ = run_started.set(started);
        let _ = self.started.set(started);
        start_signal.start();

        let timer = self.config.duration.filter(|_| all_ready).map(|duration| {
            let stop = channels.stop.clone();
            tokio::spawn(async move {
                tokio::time::sleep(duration).await;
                tracing::debug!(?duration, "run duration elapsed");
                stop.stop();
            })
        });

        let mut join_err = None;
        for h in handles {
            if let Err(err) = h.await {
                tracing::error!(error = %err, "worker task failed");
                join_err.get_or_insert(Error::Join(err));
            }
        }
        if let Some(timer) = timer {
            timer.abort();
        }

        let summary = self.finish().await;

        if let Some(err) = setup_err {
            return Err(err);
        }
        if let Some(err) = join_err {
            return Err(err);
        }
        summary
    }

    /// Closes the result stream, waits for the aggregator to drain it, and builds the report.
    pub async fn finish(&self) -> Result<RunSummary> {
        let channels = self.channels();
        drop(
            channels
                .results_tx
                .lock()
                .unwrap_or_else(|poisoned| poisoned.into_inner())
                .take(),
        );

        let elapsed = self
            .started
            .get()
            .map(|started| started.elapsed())
            .unwrap_or_default();

        let handle = self
            .aggregator
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .take()
            .ok_or(Error::NotRunning)?;
        let aggregate = handle.wait().await?;

        self.state
            .store(LifecycleState::Finished as u8, Ordering::Release);

        let planned = self
            .config
            .per_worker_attempts()
            .map(|a| a.saturating_mul(self.config.concurrency));
        let stopped = channels.stop.is_stopped();
        let summary = aggregate.summarize(elapsed, planned, stopped);

        tracing::info!(
            total = summary.total,
            errors = summary.errors,
            elapsed = ?summary.elapsed,
            rps = summary.rps,
            "run finished"
        );
        Ok(summary)
    }
}
