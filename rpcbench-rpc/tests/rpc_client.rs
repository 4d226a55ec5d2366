#![allow(clippy::unwrap_used)]

use std::time::Duration;

use bytes::Bytes;
use rpcbench_core::{
    ClientFactory, ErrorKind, ExecutionMode, KeySource, PhaseTracer, RemoteClient, Requests,
    TransportOptions, Work, WorkConfig, WorkerSetup,
};
use rpcbench_rpc::{RpcClientFactory, RpcEndpoints, generate_key_file};
use rpcbench_testserver::{ChainOptions, TestServer};

const PAYLOAD: &[u8] = br#"{"key":"hello","value":"world"}"#;

fn endpoints(server: &TestServer) -> RpcEndpoints {
    RpcEndpoints {
        write_url: server.urls().rpc.clone(),
        read_url: server.urls().query.clone(),
        ..RpcEndpoints::default()
    }
}

fn setup(worker: u64, mode: ExecutionMode, key_source: KeySource) -> WorkerSetup {
    WorkerSetup {
        worker,
        mode,
        key_source,
        transport: TransportOptions::default(),
        timeout: Some(Duration::from_secs(5)),
    }
}

#[tokio::test]
async fn per_request_calls_pick_the_next_nonce() -> anyhow::Result<()> {
    let server = TestServer::start().await?;
    let factory = RpcClientFactory::new(endpoints(&server));
    let mut client = factory
        .connect(setup(1, ExecutionMode::PerRequest, KeySource::Generate))
        .await
        .unwrap();
    let payload = Bytes::from_static(PAYLOAD);

    for _ in 0..3 {
        let ok = client
            .call(&payload, &PhaseTracer::new())
            .await
            .unwrap_or_else(|e| panic!("call failed: {e}"));
        assert_eq!(ok.status, 200);
    }

    let pk = client.signer().public_key_hex();
    assert_eq!(server.chain().accepted_nonces(&pk), vec![1, 2, 3]);
    assert_eq!(server.stats().nonce_queries(), 3);

    drop(client);
    server.shutdown().await;
    Ok(())
}

#[tokio::test]
async fn raw_requests_are_signed_with_local_nonces() -> anyhow::Result<()> {
    let server = TestServer::start().await?;
    let factory = RpcClientFactory::new(endpoints(&server));
    let mut client = factory
        .connect(setup(1, ExecutionMode::RawPreSigned, KeySource::Generate))
        .await
        .unwrap();

    let committed = client.current_sequence().await.unwrap();
    assert_eq!(committed, 0);

    let prepared = client.prepare_raw(&Bytes::from_static(PAYLOAD)).unwrap();
    for nonce in 1..=3 {
        let request = client.sign_raw(&prepared, nonce)?;
        let outcome = client.send_raw(request, &PhaseTracer::new()).await;
        assert!(outcome.is_ok(), "{outcome:?}");
    }

    // A replayed nonce is refused by the chain.
    let stale = client.sign_raw(&prepared, 2)?;
    let err = client
        .send_raw(stale, &PhaseTracer::new())
        .await
        .unwrap_err();
    assert_eq!(err.kind, ErrorKind::Rpc);
    assert_eq!(err.status, Some(200));
    assert!(err.message.contains("invalid nonce"), "{err}");

    assert_eq!(client.current_sequence().await.unwrap(), 3);
    assert_eq!(server.stats().rejected_total(), 1);

    drop(client);
    server.shutdown().await;
    Ok(())
}

#[tokio::test]
async fn server_errors_map_to_status_failures() -> anyhow::Result<()> {
    let server = TestServer::start_with(ChainOptions {
        fail_every: Some(1),
        ..ChainOptions::default()
    })
    .await?;
    let factory = RpcClientFactory::new(endpoints(&server));
    let mut client = factory
        .connect(setup(1, ExecutionMode::PerRequest, KeySource::Generate))
        .await
        .unwrap();

    let err = client
        .call(&Bytes::from_static(PAYLOAD), &PhaseTracer::new())
        .await
        .unwrap_err();
    assert_eq!(err.kind, ErrorKind::Status);
    assert_eq!(err.status, Some(500));
    assert_eq!(server.stats().injected_failures(), 1);

    drop(client);
    server.shutdown().await;
    Ok(())
}

#[tokio::test]
async fn wrong_endpoint_reports_rpc_error() -> anyhow::Result<()> {
    let server = TestServer::start().await?;
    let factory = RpcClientFactory::new(RpcEndpoints {
        read_url: server.urls().rpc.clone(),
        ..endpoints(&server)
    });
    let mut client = factory
        .connect(setup(1, ExecutionMode::PerRequest, KeySource::Generate))
        .await
        .unwrap();

    let err = client
        .call(&Bytes::from_static(PAYLOAD), &PhaseTracer::new())
        .await
        .unwrap_err();
    assert_eq!(err.kind, ErrorKind::Rpc);
    assert!(err.message.contains("Method not found"), "{err}");

    drop(client);
    server.shutdown().await;
    Ok(())
}

#[tokio::test]
async fn unreachable_endpoint_is_a_transport_error() -> anyhow::Result<()> {
    let factory = RpcClientFactory::new(RpcEndpoints {
        write_url: "http://127.0.0.1:9/rpc".to_string(),
        read_url: "http://127.0.0.1:9/query".to_string(),
        ..RpcEndpoints::default()
    });
    let mut client = factory
        .connect(setup(1, ExecutionMode::PerRequest, KeySource::Generate))
        .await
        .unwrap();

    let err = client
        .call(&Bytes::from_static(PAYLOAD), &PhaseTracer::new())
        .await
        .unwrap_err();
    assert_eq!(err.kind, ErrorKind::Transport);
    Ok(())
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn raw_mode_run_commits_every_transaction() -> anyhow::Result<()> {
    let server = TestServer::start().await?;
    let config = WorkConfig {
        requests: Requests::Total(40),
        concurrency: 4,
        mode: ExecutionMode::RawPreSigned,
        payload: Bytes::from_static(PAYLOAD),
        ..WorkConfig::default()
    };
    let work = Work::new(config, RpcClientFactory::new(endpoints(&server)));

    let summary = work.run().await?;

    assert_eq!(summary.total, 40);
    assert_eq!(summary.errors, 0, "{:?}", summary.error_messages);
    assert_eq!(server.stats().accepted_total(), 40);

    let signers = server.chain().signers();
    assert_eq!(signers.len(), 4);
    for signer in signers {
        assert_eq!(
            server.chain().accepted_nonces(&signer),
            (1..=10).collect::<Vec<u64>>()
        );
    }

    drop(work);
    server.shutdown().await;
    Ok(())
}

#[tokio::test]
async fn key_file_identity_is_used() -> anyhow::Result<()> {
    let dir = tempfile::tempdir()?;
    let path = dir.path().join("priv.key");
    let signer = generate_key_file(&path)?;

    let server = TestServer::start().await?;
    let config = WorkConfig {
        requests: Requests::Total(5),
        concurrency: 1,
        key_source: KeySource::File(path),
        payload: Bytes::from_static(PAYLOAD),
        ..WorkConfig::default()
    };
    let work = Work::new(config, RpcClientFactory::new(endpoints(&server)));

    let summary = work.run().await?;

    assert_eq!(summary.successes, 5);
    assert_eq!(
        server.chain().accepted_nonces(&signer.public_key_hex()),
        vec![1, 2, 3, 4, 5]
    );

    drop(work);
    server.shutdown().await;
    Ok(())
}
