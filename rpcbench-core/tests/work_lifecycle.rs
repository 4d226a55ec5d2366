#![allow(clippy::unwrap_used)]

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use bytes::Bytes;
use rpcbench_core::runner::{
    BoxError, CallError, CallOk, CallResult, ClientFactory, Error, ErrorKind, ExecutionMode,
    LifecycleState, PhaseTracer, RemoteClient, Requests, Work, WorkConfig, WorkerSetup,
};

#[derive(Debug, Default)]
struct Shared {
    calls: AtomicU64,
    sent: Mutex<Vec<(u64, u64)>>,
    latency: Duration,
    fail_calls: bool,
    fail_setup_for: Option<u64>,
    panic_setup_for: Option<u64>,
    committed: u64,
}

#[derive(Debug, Clone, Default)]
struct MockFactory {
    shared: Arc<Shared>,
}

impl MockFactory {
    fn new(shared: Shared) -> Self {
        Self {
            shared: Arc::new(shared),
        }
    }

    fn calls(&self) -> u64 {
        self.shared.calls.load(Ordering::SeqCst)
    }
}

struct MockClient {
    worker: u64,
    shared: Arc<Shared>,
}

impl MockClient {
    async fn exchange(&mut self, trace: &PhaseTracer) -> CallResult {
        trace.connect_started();
        trace.connection_obtained(false);
        trace.request_written();
        if !self.shared.latency.is_zero() {
            tokio::time::sleep(self.shared.latency).await;
        }
        trace.first_byte();
        self.shared.calls.fetch_add(1, Ordering::SeqCst);

        if self.shared.fail_calls {
            Err(CallError::new(ErrorKind::Transport, "connection refused"))
        } else {
            Ok(CallOk::default())
        }
    }
}

impl ClientFactory for MockFactory {
    type Client = MockClient;

    async fn connect(&self, setup: WorkerSetup) -> Result<MockClient, BoxError> {
        if self.shared.fail_setup_for == Some(setup.worker) {
            return Err("endpoint unreachable".into());
        }
        if self.shared.panic_setup_for == Some(setup.worker) {
            panic!("client construction failed");
        }
        Ok(MockClient {
            worker: setup.worker,
            shared: self.shared.clone(),
        })
    }
}

impl RemoteClient for MockClient {
    type Prepared = Bytes;

    async fn call(&mut self, _payload: &Bytes, trace: &PhaseTracer) -> CallResult {
        self.exchange(trace).await
    }

    async fn current_sequence(&mut self) -> Result<u64, BoxError> {
        Ok(self.shared.committed)
    }

    fn prepare_raw(&mut self, payload: &Bytes) -> Result<Bytes, BoxError> {
        Ok(payload.clone())
    }

    fn sign_raw(&self, _prepared: &Bytes, sequence: u64) -> Result<Bytes, CallError> {
        Ok(Bytes::copy_from_slice(&sequence.to_be_bytes()))
    }

    async fn send_raw(&mut self, request: Bytes, trace: &PhaseTracer) -> CallResult {
        let sequence = u64::from_be_bytes(request.as_ref().try_into().unwrap());
        self.shared
            .sent
            .lock()
            .unwrap()
            .push((self.worker, sequence));
        self.exchange(trace).await
    }
}

fn config(requests: Requests, concurrency: u64) -> WorkConfig {
    WorkConfig {
        requests,
        concurrency,
        payload: Bytes::from_static(br#"{"key":"hello","value":"world"}"#),
        ..WorkConfig::default()
    }
}

#[tokio::test]
async fn bounded_run_issues_every_attempt() -> anyhow::Result<()> {
    let factory = MockFactory::default();
    let work = Work::new(config(Requests::Total(100), 10), factory.clone());

    let summary = work.run().await?;

    assert_eq!(summary.total, 100);
    assert_eq!(summary.successes, 100);
    assert_eq!(summary.planned, Some(100));
    assert!(!summary.stopped);
    assert_eq!(factory.calls(), 100);
    assert_eq!(work.state(), LifecycleState::Finished);
    Ok(())
}

#[tokio::test]
async fn remainder_of_uneven_split_is_not_issued() -> anyhow::Result<()> {
    let factory = MockFactory::default();
    let work = Work::new(config(Requests::Total(103), 10), factory.clone());

    let summary = work.run().await?;

    assert_eq!(summary.total, 100);
    assert_eq!(summary.planned, Some(100));
    assert_eq!(factory.calls(), 100);
    Ok(())
}

#[tokio::test(start_paused = true)]
async fn stop_ends_unbounded_run_without_losing_records() -> anyhow::Result<()> {
    let factory = MockFactory::new(Shared {
        latency: Duration::from_millis(1),
        ..Shared::default()
    });
    let work = Arc::new(Work::new(config(Requests::UntilStopped, 5), factory.clone()));

    let runner = {
        let work = work.clone();
        tokio::spawn(async move { work.run().await })
    };

    while factory.calls() < 20 {
        tokio::time::sleep(Duration::from_millis(1)).await;
    }
    work.stop();

    let summary = tokio::time::timeout(Duration::from_secs(5), runner).await???;

    assert!(summary.stopped);
    assert!(summary.total >= 20);
    // In-flight attempts finish; nothing beyond one per worker is started after the stop.
    assert!(summary.total <= 20 + 2 * 5);
    assert_eq!(summary.total, factory.calls());
    assert_eq!(summary.planned, None);
    Ok(())
}

#[tokio::test(start_paused = true)]
async fn throttled_attempts_are_spaced_by_period() -> anyhow::Result<()> {
    let mut cfg = config(Requests::Total(5), 1);
    cfg.qps = 10.0;
    cfg.keep_records = true;
    let work = Work::new(cfg, MockFactory::default());

    let summary = work.run().await?;

    assert_eq!(summary.total, 5);
    let offsets: Vec<Duration> = summary.records.iter().map(|r| r.offset).collect();
    assert!(offsets[0] >= Duration::from_millis(100));
    for pair in offsets.windows(2) {
        assert!(
            pair[1] - pair[0] >= Duration::from_millis(100),
            "attempts too close: {offsets:?}"
        );
    }
    Ok(())
}

#[tokio::test]
async fn failed_attempts_are_reported_not_raised() -> anyhow::Result<()> {
    let factory = MockFactory::new(Shared {
        fail_calls: true,
        ..Shared::default()
    });
    let work = Work::new(config(Requests::Total(10), 2), factory);

    let summary = work.run().await?;

    assert_eq!(summary.total, 10);
    assert_eq!(summary.successes, 0);
    assert_eq!(summary.errors, 10);
    assert_eq!(summary.error_rate, 1.0);
    assert_eq!(summary.errors_by_kind.get(&ErrorKind::Transport), Some(&10));
    assert!(summary.latency.is_none());
    Ok(())
}

#[tokio::test(start_paused = true)]
async fn slow_attempts_time_out() -> anyhow::Result<()> {
    let factory = MockFactory::new(Shared {
        latency: Duration::from_millis(50),
        ..Shared::default()
    });
    let mut cfg = config(Requests::Total(4), 2);
    cfg.timeout = Some(Duration::from_millis(10));
    let work = Work::new(cfg, factory);

    let summary = work.run().await?;

    assert_eq!(summary.total, 4);
    assert_eq!(summary.errors_by_kind.get(&ErrorKind::Timeout), Some(&4));
    Ok(())
}

#[tokio::test]
async fn raw_mode_sequences_increase_per_worker() -> anyhow::Result<()> {
    let factory = MockFactory::new(Shared {
        committed: 7,
        ..Shared::default()
    });
    let mut cfg = config(Requests::Total(40), 4);
    cfg.mode = ExecutionMode::RawPreSigned;
    cfg.keep_records = true;
    let work = Work::new(cfg, factory.clone());

    let summary = work.run().await?;
    assert_eq!(summary.total, 40);

    let mut by_worker: BTreeMap<u64, Vec<u64>> = BTreeMap::new();
    for record in &summary.records {
        by_worker
            .entry(record.worker)
            .or_default()
            .push(record.sequence.unwrap());
    }
    assert_eq!(by_worker.len(), 4);
    for sequences in by_worker.values() {
        assert_eq!(sequences, &(8..=17).collect::<Vec<u64>>());
    }

    let sent = factory.shared.sent.lock().unwrap();
    assert_eq!(sent.len(), 40);
    Ok(())
}

#[tokio::test]
async fn setup_failure_aborts_run_before_any_attempt() {
    let factory = MockFactory::new(Shared {
        fail_setup_for: Some(3),
        ..Shared::default()
    });
    let work = Work::new(config(Requests::Total(50), 5), factory.clone());

    let err = work.run().await.err().unwrap();

    assert!(matches!(err, Error::Setup { worker: 3, .. }), "{err}");
    assert_eq!(factory.calls(), 0);
}

#[tokio::test]
async fn setup_panic_is_reported_instead_of_hanging() -> anyhow::Result<()> {
    let factory = MockFactory::new(Shared {
        panic_setup_for: Some(2),
        ..Shared::default()
    });
    let work = Work::new(config(Requests::Total(10), 2), factory.clone());

    let outcome = tokio::time::timeout(Duration::from_secs(3), work.run()).await?;

    let err = outcome.err().unwrap();
    assert!(matches!(err, Error::Join(_)), "{err}");
    assert_eq!(factory.calls(), 0);
    Ok(())
}

#[tokio::test]
async fn invalid_config_is_rejected_before_init() {
    let work = Work::new(config(Requests::Total(10), 0), MockFactory::default());

    let err = work.run().await.err().unwrap();

    assert!(matches!(err, Error::InvalidConcurrency));
    assert!(err.is_config());
    assert_eq!(work.state(), LifecycleState::Uninitialized);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_init_creates_one_set_of_channels() -> anyhow::Result<()> {
    let work = Arc::new(Work::new(
        config(Requests::Total(10), 2),
        MockFactory::default(),
    ));

    let mut handles = Vec::new();
    for _ in 0..8 {
        let work = work.clone();
        handles.push(tokio::spawn(async move {
            work.init();
            work.stop_signal()
        }));
    }

    let first = work.stop_signal();
    for h in handles {
        assert!(Arc::ptr_eq(&first, &h.await?));
    }
    assert_eq!(work.state(), LifecycleState::Initialized);
    Ok(())
}

#[tokio::test]
async fn stop_before_run_yields_empty_report() -> anyhow::Result<()> {
    let factory = MockFactory::default();
    let work = Work::new(config(Requests::Total(10), 2), factory.clone());

    work.stop();
    work.stop();
    let summary = work.run().await?;

    assert!(summary.is_empty());
    assert!(summary.stopped);
    assert_eq!(factory.calls(), 0);
    Ok(())
}

#[tokio::test]
async fn second_run_is_rejected() -> anyhow::Result<()> {
    let work = Work::new(config(Requests::Total(4), 2), MockFactory::default());

    work.run().await?;
    let err = work.run().await.err().unwrap();

    assert!(matches!(err, Error::AlreadyRan));
    Ok(())
}

#[tokio::test(start_paused = true)]
async fn duration_bounds_the_run() -> anyhow::Result<()> {
    let factory = MockFactory::new(Shared {
        latency: Duration::from_millis(10),
        ..Shared::default()
    });
    let mut cfg = config(Requests::Total(1), 2);
    cfg.duration = Some(Duration::from_millis(300));
    let work = Work::new(cfg, factory.clone());

    let summary = tokio::time::timeout(Duration::from_secs(5), work.run()).await??;

    assert!(summary.stopped);
    assert!(summary.total >= 2 * 25, "total = {}", summary.total);
    assert_eq!(summary.total, factory.calls());
    Ok(())
}
