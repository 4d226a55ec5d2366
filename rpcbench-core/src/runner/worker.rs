use std::sync::{Arc, Mutex, OnceLock};

use bytes::Bytes;
use tokio::sync::oneshot;
use tokio::time::Instant;

use super::client::{BoxError, ClientFactory, RemoteClient, WorkerSetup};
use super::config::{ExecutionMode, WorkConfig};
use super::error::Error;
use super::nonce::NonceSequencer;
use super::record::{CallError, CallResult, ResultRecord};
use super::signal::{StartSignal, StopSignal};
use super::stream::ResultSender;
use super::throttle::Throttle;
use super::tracer::PhaseTracer;

pub(crate) struct WorkerContext<F: ClientFactory> {
    /// 1-based worker id.
    pub id: u64,
    /// `None` keeps the worker going until the run is stopped.
    pub attempts: Option<u64>,
    pub config: Arc<WorkConfig>,
    pub factory: Arc<F>,
    pub results: ResultSender,
    pub stop: Arc<StopSignal>,

    pub setup_error: Arc<Mutex<Option<Error>>>,
    pub start_signal: Arc<StartSignal>,
    pub run_started: Arc<OnceLock<Instant>>,
}

enum Mode<P> {
    PerRequest,
    RawPreSigned {
        prepared: P,
        sequencer: NonceSequencer,
    },
}

type Prepared<F> = <<F as ClientFactory>::Client as RemoteClient>::Prepared;

async fn setup<F: ClientFactory>(
    ctx: &WorkerContext<F>,
) -> Result<(F::Client, Mode<Prepared<F>>), BoxError> {
    let setup = WorkerSetup {
        worker: ctx.id,
        mode: ctx.config.mode,
        key_source: ctx.config.key_source.clone(),
        transport: ctx.config.transport.clone(),
        timeout: ctx.config.timeout,
    };
    let mut client = ctx.factory.connect(setup).await?;

    let mode = match ctx.config.mode {
        ExecutionMode::PerRequest => Mode::PerRequest,
        ExecutionMode::RawPreSigned => {
            let prepared = client.prepare_raw(&ctx.config.payload)?;
            let sequencer = NonceSequencer::fetch(&mut client).await?;
            tracing::debug!(
                worker = ctx.id,
                next_sequence = sequencer.current(),
                "fetched starting sequence"
            );
            Mode::RawPreSigned {
                prepared,
                sequencer,
            }
        }
    };

    Ok((client, mode))
}

/// Runs one worker: setup, wait for the common start, then issue attempts until the
/// assigned count is reached or the run is stopped.
///
/// `ready` is completed once setup succeeded. It is dropped unsent when setup fails or the
/// task panics, so the orchestrator never waits on a worker that is gone.
pub(crate) async fn run_worker<F: ClientFactory>(
    ctx: WorkerContext<F>,
    ready: oneshot::Sender<()>,
) {
    let (mut client, mut mode) = match setup(&ctx).await {
        Ok(ready_client) => {
            let _ = ready.send(());
            ready_client
        }
        Err(err) => {
            tracing::warn!(worker = ctx.id, error = %err, "worker setup failed");
            {
                let mut slot = ctx
                    .setup_error
                    .lock()
                    .unwrap_or_else(|poisoned| poisoned.into_inner());
                if slot.is_none() {
                    *slot = Some(Error::Setup {
                        worker: ctx.id,
                        message: err.to_string(),
                    });
                }
            }
            return;
        }
    };

    ctx.start_signal.wait().await;
    let run_started = ctx.run_started.get().copied().unwrap_or_else(Instant::now);

    // Created after the start so the first tick lands one period into the run.
    let mut throttle = Throttle::new(ctx.config.qps);
    let payload = ctx.config.payload.clone();
    let mut issued = 0u64;

    loop {
        if ctx.attempts.is_some_and(|limit| issued >= limit) {
            break;
        }
        if ctx.stop.is_stopped() {
            break;
        }

        if throttle.is_enabled() {
            tokio::select! {
                biased;
                _ = ctx.stop.stopped() => break,
                _ = throttle.tick() => {}
            }
        }

        let record = attempt(&ctx, &mut client, &mut mode, &payload, run_started).await;
        issued += 1;

        if ctx.results.push(record).await.is_err() {
            tracing::debug!(worker = ctx.id, "result stream closed; worker exiting");
            break;
        }
    }

    tracing::debug!(worker = ctx.id, issued, "worker finished");
}

async fn attempt<F: ClientFactory>(
    ctx: &WorkerContext<F>,
    client: &mut F::Client,
    mode: &mut Mode<Prepared<F>>,
    payload: &Bytes,
    run_started: Instant,
) -> ResultRecord {
    let trace = PhaseTracer::new();
    let start = Instant::now();

    let (sequence, outcome) = match mode {
        Mode::PerRequest => (None, timed(ctx, client.call(payload, &trace)).await),
        Mode::RawPreSigned {
            prepared,
            sequencer,
        } => {
            let sequence = sequencer.current();
            // The number is consumed whatever the outcome; it is never handed out twice.
            sequencer.advance();
            let outcome = match client.sign_raw(prepared, sequence) {
                Ok(request) => timed(ctx, client.send_raw(request, &trace)).await,
                Err(err) => Err(err),
            };
            (Some(sequence), outcome)
        }
    };

    let finished = Instant::now();
    ResultRecord {
        worker: ctx.id,
        sequence,
        outcome,
        duration: finished.saturating_duration_since(start),
        phases: trace.timings(finished),
        offset: start.saturating_duration_since(run_started),
    }
}

async fn timed<F: ClientFactory>(
    ctx: &WorkerContext<F>,
    call: impl Future<Output = CallResult>,
) -> CallResult {
    match ctx.config.timeout {
        Some(after) => tokio::time::timeout(after, call)
            .await
            .unwrap_or_else(|_| Err(CallError::timeout(after))),
        None => call.await,
    }
}
