pub mod runner;

pub use runner::{
    BoxError, CallError, CallOk, CallResult, ClientFactory, Error, ErrorKind, ExecutionMode,
    KeySource, PhaseTimings, PhaseTracer, ProgressFn, ProgressUpdate, RemoteClient, Requests,
    Result, RunSummary, TransportOptions, Work, WorkConfig, WorkerSetup,
};
