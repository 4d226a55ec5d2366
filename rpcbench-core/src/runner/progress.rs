use std::time::Duration;

#[derive(Debug, Clone)]
pub struct ProgressUpdate {
    /// Monotonic tick counter (1-based) for progress emissions.
    pub tick: u64,
    pub elapsed: Duration,
    /// Time covered by this update.
    pub interval: Duration,

    /// Results observed so far.
    pub completed: u64,
    /// Failed attempts observed so far.
    pub errors: u64,

    /// Results/sec observed during the last interval.
    pub rps_now: f64,
    /// Failed attempts / results during the last interval (0..=1).
    pub error_rate_now: f64,

    /// Attempts the run will issue in total, when bounded.
    pub planned: Option<u64>,
    /// Configured run duration, when the run is time-bounded.
    pub duration: Option<Duration>,
}

pub type ProgressFn = std::sync::Arc<dyn Fn(ProgressUpdate) + Send + Sync + 'static>;
