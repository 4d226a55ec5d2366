use std::net::SocketAddr;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use axum::Router;
use axum::body::Bytes;
use axum::extract::State;
use axum::http::{HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use tokio::net::TcpListener;
use tokio::sync::oneshot;
use tokio::time::{Duration, sleep};

pub mod chain;

pub use chain::{Chain, Rejection, signing_bytes};

pub const PATH_RPC: &str = "/rpc";
pub const PATH_QUERY: &str = "/query";
pub const PATH_HEALTH: &str = "/health";

pub const DEFAULT_CHAIN_ID: &str = "default";

/// JSON-RPC error code for an unknown method.
pub const METHOD_NOT_FOUND: i64 = -32601;
/// JSON-RPC error code for an unparsable request.
pub const PARSE_ERROR: i64 = -32700;
/// JSON-RPC error code for bad params.
pub const INVALID_PARAMS: i64 = -32602;

#[derive(Debug, Clone)]
pub struct ChainOptions {
    pub chain_id: String,
    /// Answer every n-th broadcast with `500 Internal Server Error` instead of committing it.
    pub fail_every: Option<u64>,
    /// Sleep this long before answering a broadcast.
    pub delay: Option<Duration>,
}

impl Default for ChainOptions {
    fn default() -> Self {
        Self {
            chain_id: DEFAULT_CHAIN_ID.to_string(),
            fail_every: None,
            delay: None,
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct TestServerStats {
    requests_total: Arc<AtomicU64>,
    broadcasts_total: Arc<AtomicU64>,
    accepted_total: Arc<AtomicU64>,
    rejected_total: Arc<AtomicU64>,
    injected_failures: Arc<AtomicU64>,
    nonce_queries: Arc<AtomicU64>,
    saw_identity_encoding: Arc<AtomicU64>,
}

impl TestServerStats {
    fn inc(counter: &AtomicU64) {
        counter.fetch_add(1, Ordering::Relaxed);
    }

    pub fn requests_total(&self) -> u64 {
        self.requests_total.load(Ordering::Relaxed)
    }

    pub fn broadcasts_total(&self) -> u64 {
        self.broadcasts_total.load(Ordering::Relaxed)
    }

    pub fn accepted_total(&self) -> u64 {
        self.accepted_total.load(Ordering::Relaxed)
    }

    pub fn rejected_total(&self) -> u64 {
        self.rejected_total.load(Ordering::Relaxed)
    }

    pub fn injected_failures(&self) -> u64 {
        self.injected_failures.load(Ordering::Relaxed)
    }

    pub fn nonce_queries(&self) -> u64 {
        self.nonce_queries.load(Ordering::Relaxed)
    }

    pub fn saw_identity_encoding(&self) -> u64 {
        self.saw_identity_encoding.load(Ordering::Relaxed)
    }
}

#[derive(Debug, Clone)]
pub struct TestServerUrls {
    pub base_url: String,
    /// Write endpoint (`broadcast_tx_commit`).
    pub rpc: String,
    /// Read endpoint (`nonce`).
    pub query: String,
    pub health: String,
}

impl TestServerUrls {
    pub fn new(base_url: String) -> Self {
        Self {
            rpc: format!("{base_url}{PATH_RPC}"),
            query: format!("{base_url}{PATH_QUERY}"),
            health: format!("{base_url}{PATH_HEALTH}"),
            base_url,
        }
    }
}

#[derive(Debug, Clone)]
struct AppState {
    stats: TestServerStats,
    chain: Arc<Chain>,
    options: Arc<ChainOptions>,
}

#[derive(Debug, Deserialize)]
struct RpcRequest {
    #[serde(default)]
    method: String,
    #[serde(default)]
    params: Value,
    #[serde(default)]
    id: Value,
}

#[derive(Debug, Serialize)]
struct RpcResponse {
    jsonrpc: &'static str,
    id: Value,
    #[serde(skip_serializing_if = "Option::is_none")]
    result: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<RpcErrorBody>,
}

#[derive(Debug, Serialize)]
struct RpcErrorBody {
    code: i64,
    message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    data: Option<String>,
}

fn rpc_result(id: Value, result: Value) -> Response {
    json_response(RpcResponse {
        jsonrpc: "2.0",
        id,
        result: Some(result),
        error: None,
    })
}

fn rpc_error(id: Value, code: i64, message: &str, data: Option<String>) -> Response {
    json_response(RpcResponse {
        jsonrpc: "2.0",
        id,
        result: None,
        error: Some(RpcErrorBody {
            code,
            message: message.to_string(),
            data,
        }),
    })
}

fn json_response(body: RpcResponse) -> Response {
    match serde_json::to_vec(&body) {
        Ok(bytes) => (
            StatusCode::OK,
            [("content-type", "application/json")],
            Bytes::from(bytes),
        )
            .into_response(),
        Err(_) => (StatusCode::INTERNAL_SERVER_ERROR, "encode error").into_response(),
    }
}

fn track_request(state: &AppState, headers: &HeaderMap) {
    TestServerStats::inc(&state.stats.requests_total);
    if headers
        .get("accept-encoding")
        .and_then(|v| v.to_str().ok())
        .is_some_and(|v| v.eq_ignore_ascii_case("identity"))
    {
        TestServerStats::inc(&state.stats.saw_identity_encoding);
    }
}

async fn handle_rpc(State(state): State<AppState>, headers: HeaderMap, body: Bytes) -> Response {
    track_request(&state, &headers);

    let req: RpcRequest = match serde_json::from_slice(&body) {
        Ok(req) => req,
        Err(e) => return rpc_error(Value::Null, PARSE_ERROR, "Parse error", Some(e.to_string())),
    };
    if req.method != "broadcast_tx_commit" {
        return rpc_error(req.id, METHOD_NOT_FOUND, "Method not found", Some(req.method));
    }

    let n = state.stats.broadcasts_total.fetch_add(1, Ordering::Relaxed) + 1;
    if let Some(delay) = state.options.delay {
        sleep(delay).await;
    }
    if state.options.fail_every.is_some_and(|every| every > 0 && n % every == 0) {
        TestServerStats::inc(&state.stats.injected_failures);
        return (StatusCode::INTERNAL_SERVER_ERROR, "injected failure").into_response();
    }

    let Some(tx) = req.params.get("tx").and_then(Value::as_str) else {
        return rpc_error(req.id, INVALID_PARAMS, "Invalid params", Some("missing tx".to_string()));
    };

    match state.chain.commit(&state.options.chain_id, tx) {
        Ok(height) => {
            TestServerStats::inc(&state.stats.accepted_total);
            rpc_result(
                req.id,
                json!({
                    "check_tx": { "code": 0, "log": "" },
                    "deliver_tx": { "code": 0, "log": "" },
                    "height": height,
                }),
            )
        }
        Err(rejection) => {
            TestServerStats::inc(&state.stats.rejected_total);
            rpc_result(
                req.id,
                json!({
                    "check_tx": { "code": rejection.code(), "log": rejection.log() },
                    "deliver_tx": { "code": 0, "log": "" },
                    "height": 0,
                }),
            )
        }
    }
}

async fn handle_query(State(state): State<AppState>, headers: HeaderMap, body: Bytes) -> Response {
    track_request(&state, &headers);

    let req: RpcRequest = match serde_json::from_slice(&body) {
        Ok(req) => req,
        Err(e) => return rpc_error(Value::Null, PARSE_ERROR, "Parse error", Some(e.to_string())),
    };
    if req.method != "nonce" {
        return rpc_error(req.id, METHOD_NOT_FOUND, "Method not found", Some(req.method));
    }
    let Some(key) = req.params.get("key").and_then(Value::as_str) else {
        return rpc_error(req.id, INVALID_PARAMS, "Invalid params", Some("missing key".to_string()));
    };

    TestServerStats::inc(&state.stats.nonce_queries);
    rpc_result(req.id, json!(state.chain.committed_nonce(key)))
}

async fn handle_health(State(state): State<AppState>, headers: HeaderMap) -> &'static str {
    track_request(&state, &headers);
    "ok"
}

pub fn router(stats: TestServerStats, chain: Arc<Chain>, options: ChainOptions) -> Router {
    let state = AppState {
        stats,
        chain,
        options: Arc::new(options),
    };
    Router::new()
        .route(PATH_RPC, post(handle_rpc))
        .route(PATH_QUERY, post(handle_query))
        .route(PATH_HEALTH, get(handle_health))
        .with_state(state)
}

/// In-process mock chain endpoint.
pub struct TestServer {
    addr: SocketAddr,
    base_url: String,
    urls: TestServerUrls,
    stats: TestServerStats,
    chain: Arc<Chain>,
    shutdown_tx: Option<oneshot::Sender<()>>,
    task: Option<tokio::task::JoinHandle<()>>,
}

impl TestServer {
    pub async fn start() -> std::io::Result<Self> {
        Self::start_with(ChainOptions::default()).await
    }

    pub async fn start_with(options: ChainOptions) -> std::io::Result<Self> {
        let listener = TcpListener::bind("127.0.0.1:0").await?;
        let addr = listener.local_addr()?;

        let stats = TestServerStats::default();
        let chain = Arc::new(Chain::default());

        let app = router(stats.clone(), chain.clone(), options);

        let (shutdown_tx, shutdown_rx) = oneshot::channel::<()>();
        let task = tokio::spawn(async move {
            let serve = axum::serve(listener, app).with_graceful_shutdown(async move {
                let _ = shutdown_rx.await;
            });
            let _ = serve.await;
        });

        let base_url = format!("http://{addr}");
        let urls = TestServerUrls::new(base_url.clone());

        Ok(Self {
            addr,
            base_url,
            urls,
            stats,
            chain,
            shutdown_tx: Some(shutdown_tx),
            task: Some(task),
        })
    }

    pub fn addr(&self) -> SocketAddr {
        self.addr
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub fn urls(&self) -> &TestServerUrls {
        &self.urls
    }

    pub fn stats(&self) -> &TestServerStats {
        &self.stats
    }

    pub fn chain(&self) -> &Chain {
        &self.chain
    }

    pub async fn shutdown(mut self) {
        if let Some(tx) = self.shutdown_tx.take() {
            let _ = tx.send(());
        }

        if let Some(task) = self.task.take() {
            let _ = task.await;
        }
    }
}

impl Drop for TestServer {
    fn drop(&mut self) {
        if self.shutdown_tx.is_some()
            && let Some(task) = self.task.take()
        {
            task.abort();
        }
    }
}
