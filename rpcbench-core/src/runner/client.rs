use std::future::Future;
use std::time::Duration;

use bytes::Bytes;

use super::config::{ExecutionMode, KeySource, TransportOptions};
use super::record::{CallError, CallResult};
use super::tracer::PhaseTracer;

pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Everything a factory needs to build one worker's client.
#[derive(Debug, Clone)]
pub struct WorkerSetup {
    /// 1-based worker id.
    pub worker: u64,
    pub mode: ExecutionMode,
    pub key_source: KeySource,
    pub transport: TransportOptions,
    pub timeout: Option<Duration>,
}

/// Builds one client per worker.
///
/// Each client owns its signing identity and its connection. A failure here aborts the run.
pub trait ClientFactory: Send + Sync + 'static {
    type Client: RemoteClient;

    fn connect(
        &self,
        setup: WorkerSetup,
    ) -> impl Future<Output = Result<Self::Client, BoxError>> + Send;
}

/// Remote endpoint as seen by one worker.
pub trait RemoteClient: Send + 'static {
    /// Unsigned transaction built once per worker in raw mode.
    type Prepared: Send + Sync + 'static;

    /// Signs `payload` and sends it; the client picks the sequence number itself.
    fn call(
        &mut self,
        payload: &Bytes,
        trace: &PhaseTracer,
    ) -> impl Future<Output = CallResult> + Send;

    /// Last sequence number the endpoint committed for this client's identity.
    fn current_sequence(&mut self) -> impl Future<Output = Result<u64, BoxError>> + Send;

    fn prepare_raw(&mut self, payload: &Bytes) -> Result<Self::Prepared, BoxError>;

    /// Signs the prepared transaction with `sequence` and encodes the wire request.
    fn sign_raw(&self, prepared: &Self::Prepared, sequence: u64) -> Result<Bytes, CallError>;

    fn send_raw(
        &mut self,
        request: Bytes,
        trace: &PhaseTracer,
    ) -> impl Future<Output = CallResult> + Send;
}
