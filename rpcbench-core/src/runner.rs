mod aggregate;
mod client;
mod config;
mod error;
mod nonce;
mod progress;
mod record;
mod signal;
mod stream;
mod summary;
mod throttle;
mod tracer;
mod work;
mod worker;

pub use aggregate::{Aggregate, Aggregator, AggregatorHandle};
pub use client::{BoxError, ClientFactory, RemoteClient, WorkerSetup};
pub use config::{ExecutionMode, KeySource, Requests, TransportOptions, WorkConfig};
pub use error::{Error, Result};
pub use nonce::NonceSequencer;
pub use progress::{ProgressFn, ProgressUpdate};
pub use record::{CallError, CallOk, CallResult, ErrorKind, ResultRecord};
pub use signal::{StartSignal, StopSignal};
pub use stream::{
    MAX_RESULT_CAPACITY, ResultReceiver, ResultSender, StreamClosed, result_capacity,
    result_stream,
};
pub use summary::{
    DISTRIBUTION_PERCENTILES, HistogramBucket, LatencySummary, PhaseSummary, RunSummary,
};
pub use throttle::{Throttle, tick_period};
pub use tracer::{PhaseTimings, PhaseTracer};
pub use work::{LifecycleState, Work};
