pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("task join error: {0}")]
    Join(#[from] tokio::task::JoinError),

    #[error("`concurrency` must be a positive integer")]
    InvalidConcurrency,

    #[error("`requests` must be a positive integer")]
    InvalidRequests,

    #[error("`requests` ({requests}) cannot be less than `concurrency` ({concurrency})")]
    RequestsBelowConcurrency { requests: u64, concurrency: u64 },

    #[error("`qps` must be a finite number")]
    InvalidQps,

    #[error("`duration` must be a positive duration")]
    InvalidDuration,

    #[error("request payload is empty")]
    MissingPayload,

    #[error(
        "a signing key file cannot be shared by {concurrency} workers in raw-request mode (each worker needs its own sequence numbers)"
    )]
    SharedSigningIdentity { concurrency: u64 },

    #[error("worker {worker} setup failed: {message}")]
    Setup { worker: u64, message: String },

    #[error("work has already been run")]
    AlreadyRan,

    #[error("work was never started")]
    NotRunning,

    #[error("result aggregator exited before the result stream was drained")]
    AggregatorLost,
}

impl Error {
    /// Whether the error was raised while validating configuration (no worker was started).
    #[must_use]
    pub fn is_config(&self) -> bool {
        matches!(
            self,
            Self::InvalidConcurrency
                | Self::InvalidRequests
                | Self::RequestsBelowConcurrency { .. }
                | Self::InvalidQps
                | Self::InvalidDuration
                | Self::MissingPayload
                | Self::SharedSigningIdentity { .. }
        )
    }
}
