use bytes::Bytes;
use rpcbench_core::PhaseTracer;
use rpcbench_http::{ClientOptions, HttpClient, HttpRequest};
use rpcbench_testserver::TestServer;

fn nonce_query() -> Bytes {
    Bytes::from_static(
        br#"{"jsonrpc":"2.0","method":"nonce","params":{"key":"00"},"id":"1"}"#,
    )
}

#[tokio::test]
async fn keep_alive_reuses_the_connection() -> anyhow::Result<()> {
    let server = TestServer::start().await?;
    let mut client = HttpClient::new(ClientOptions::default())?;

    let first = PhaseTracer::new();
    let res = client
        .request(
            HttpRequest::post_json(&server.urls().query, nonce_query()),
            Some(&first),
        )
        .await?;
    anyhow::ensure!(res.status == 200, "status = {}", res.status);
    anyhow::ensure!(res.body_utf8().is_some_and(|b| b.contains("\"result\":0")));
    anyhow::ensure!(!res.reused);

    let second = PhaseTracer::new();
    let res = client
        .request(
            HttpRequest::post_json(&server.urls().query, nonce_query()),
            Some(&second),
        )
        .await?;
    anyhow::ensure!(res.reused);
    anyhow::ensure!(second.timings(tokio::time::Instant::now()).connect.is_zero());

    drop(client);
    server.shutdown().await;
    Ok(())
}

#[tokio::test]
async fn disabled_keep_alive_dials_every_request() -> anyhow::Result<()> {
    let server = TestServer::start().await?;
    let mut client = HttpClient::new(ClientOptions {
        keep_alive: false,
        disable_compression: true,
        ..ClientOptions::default()
    })?;

    for _ in 0..3 {
        let trace = PhaseTracer::new();
        let res = client
            .request(HttpRequest::get(&server.urls().health), Some(&trace))
            .await?;
        anyhow::ensure!(res.status == 200);
        anyhow::ensure!(!res.reused);
        anyhow::ensure!(!trace.timings(tokio::time::Instant::now()).connect.is_zero());
    }
    anyhow::ensure!(server.stats().saw_identity_encoding() == 3);

    drop(client);
    server.shutdown().await;
    Ok(())
}

#[tokio::test]
async fn http2_prior_knowledge() -> anyhow::Result<()> {
    let server = TestServer::start().await?;
    let mut client = HttpClient::new(ClientOptions {
        http2: true,
        ..ClientOptions::default()
    })?;

    for _ in 0..2 {
        let res = client
            .request(
                HttpRequest::post_json(&server.urls().query, nonce_query()),
                None,
            )
            .await?;
        anyhow::ensure!(res.status == 200, "status = {}", res.status);
    }
    anyhow::ensure!(server.stats().nonce_queries() == 2);

    drop(client);
    server.shutdown().await;
    Ok(())
}

#[tokio::test]
async fn proxy_receives_absolute_form_requests() -> anyhow::Result<()> {
    let server = TestServer::start().await?;
    let mut client = HttpClient::new(ClientOptions {
        proxy: Some(server.addr().to_string()),
        ..ClientOptions::default()
    })?;

    // The target host does not resolve; only the proxy is dialed.
    let res = client
        .request(HttpRequest::get("http://chain.invalid:46658/health"), None)
        .await?;
    anyhow::ensure!(res.status == 200, "status = {}", res.status);
    anyhow::ensure!(server.stats().requests_total() == 1);

    drop(client);
    server.shutdown().await;
    Ok(())
}

#[tokio::test]
async fn phases_are_marked_in_order() -> anyhow::Result<()> {
    let server = TestServer::start().await?;
    let mut client = HttpClient::new(ClientOptions::default())?;

    let trace = PhaseTracer::new();
    let started = tokio::time::Instant::now();
    client
        .request(
            HttpRequest::post_json(&server.urls().query, nonce_query()),
            Some(&trace),
        )
        .await?;
    let finished = tokio::time::Instant::now();

    let phases = trace.timings(finished);
    let sum = phases.connect + phases.write + phases.delay + phases.read;
    anyhow::ensure!(sum <= finished - started, "{phases:?}");
    anyhow::ensure!(!phases.delay.is_zero(), "{phases:?}");

    drop(client);
    server.shutdown().await;
    Ok(())
}
