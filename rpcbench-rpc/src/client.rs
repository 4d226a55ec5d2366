use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use bytes::Bytes;
use rpcbench_core::{
    BoxError, CallError, CallOk, CallResult, ClientFactory, ErrorKind, ExecutionMode, KeySource,
    PhaseTracer, RemoteClient, WorkerSetup,
};
use rpcbench_http::{ClientOptions, HttpClient, HttpRequest, HttpResponse};

use super::jsonrpc::{BroadcastResult, NonceParams, RpcRequest, RpcResponse};
use super::signer::Signer;
use super::tx::{CallTemplate, DEFAULT_CHAIN_ID, DEFAULT_CONTRACT, DEFAULT_METHOD};
use super::{Error, Result};

/// Where and what to call.
#[derive(Debug, Clone)]
pub struct RpcEndpoints {
    /// Receives `broadcast_tx_commit`.
    pub write_url: String,
    /// Answers `nonce` queries.
    pub read_url: String,
    pub chain_id: String,
    pub contract: String,
    pub method: String,
}

impl Default for RpcEndpoints {
    fn default() -> Self {
        Self {
            write_url: "http://localhost:46658/rpc".to_string(),
            read_url: "http://localhost:46658/query".to_string(),
            chain_id: DEFAULT_CHAIN_ID.to_string(),
            contract: DEFAULT_CONTRACT.to_string(),
            method: DEFAULT_METHOD.to_string(),
        }
    }
}

/// Builds one [`RpcClient`] per worker, each with its own signer and connection.
#[derive(Debug)]
pub struct RpcClientFactory {
    endpoints: Arc<RpcEndpoints>,
    warned_shared_key: AtomicBool,
}

impl RpcClientFactory {
    pub fn new(endpoints: RpcEndpoints) -> Self {
        Self {
            endpoints: Arc::new(endpoints),
            warned_shared_key: AtomicBool::new(false),
        }
    }

    pub fn endpoints(&self) -> &RpcEndpoints {
        &self.endpoints
    }
}

impl ClientFactory for RpcClientFactory {
    type Client = RpcClient;

    async fn connect(&self, setup: WorkerSetup) -> std::result::Result<RpcClient, BoxError> {
        if setup.mode == ExecutionMode::PerRequest
            && matches!(setup.key_source, KeySource::File(_))
            && setup.worker > 1
            && !self.warned_shared_key.swap(true, Ordering::Relaxed)
        {
            tracing::warn!(
                "all workers sign with the same key file; concurrent transactions may race for nonces"
            );
        }

        let signer = Signer::load(&setup.key_source)?;
        let http = HttpClient::new(ClientOptions::from(&setup.transport))?;
        tracing::debug!(
            worker = setup.worker,
            public_key = %signer.public_key_hex(),
            "worker client ready"
        );

        Ok(RpcClient {
            http,
            signer,
            endpoints: self.endpoints.clone(),
            timeout: setup.timeout,
            request_id: setup.worker.to_string(),
        })
    }
}

/// JSON-RPC client of one worker.
#[derive(Debug)]
pub struct RpcClient {
    http: HttpClient,
    signer: Signer,
    endpoints: Arc<RpcEndpoints>,
    timeout: Option<Duration>,
    request_id: String,
}

impl RpcClient {
    pub fn signer(&self) -> &Signer {
        &self.signer
    }

    fn template(&self, payload: Bytes) -> CallTemplate {
        CallTemplate::new(
            self.endpoints.chain_id.as_str(),
            self.endpoints.contract.as_str(),
            self.endpoints.method.as_str(),
            payload,
        )
    }

    /// Last nonce the chain committed for this client's key.
    pub async fn query_nonce(&mut self) -> Result<u64> {
        let key = self.signer.public_key_hex();
        let body = serde_json::to_vec(&RpcRequest::new(
            "nonce",
            NonceParams { key: &key },
            &self.request_id,
        ))
        .map_err(Error::Encode)?;
        let req = HttpRequest::post_json(&self.endpoints.read_url, Bytes::from(body));
        let res = self.http.request(req, None).await?;

        let (status, result) = decode(&res)?;
        serde_json::from_value::<u64>(result).map_err(|source| Error::Decode { status, source })
    }

    /// Posts a `broadcast_tx_commit` body and checks that the transaction was committed.
    pub async fn broadcast(&mut self, body: Bytes, trace: Option<&PhaseTracer>) -> Result<u16> {
        let req = HttpRequest::post_json(&self.endpoints.write_url, body);
        let res = self.http.request(req, trace).await?;

        let (status, result) = decode(&res)?;
        let committed: BroadcastResult =
            serde_json::from_value(result).map_err(|source| Error::Decode { status, source })?;
        for (phase, outcome) in [
            ("check_tx", &committed.check_tx),
            ("deliver_tx", &committed.deliver_tx),
        ] {
            if outcome.code != 0 {
                return Err(Error::Rejected {
                    status,
                    phase,
                    code: outcome.code,
                    log: outcome.log.clone(),
                });
            }
        }
        Ok(status)
    }

    /// Per-request flow: look up the nonce, sign with the next one, broadcast.
    async fn commit(&mut self, payload: &Bytes, trace: &PhaseTracer) -> Result<u16> {
        let nonce = self.query_nonce().await?.saturating_add(1);
        let body = self
            .template(payload.clone())
            .broadcast_request(&self.signer, nonce, &self.request_id)?;
        self.broadcast(body, Some(trace)).await
    }
}

fn decode(res: &HttpResponse) -> Result<(u16, serde_json::Value)> {
    let status = res.status;
    if !res.is_success() {
        return Err(Error::Status { status });
    }
    let parsed: RpcResponse =
        serde_json::from_slice(&res.body).map_err(|source| Error::Decode { status, source })?;
    if let Some(error) = parsed.error {
        return Err(Error::Remote { status, error });
    }
    let result = parsed.result.ok_or(Error::EmptyResponse { status })?;
    Ok((status, result))
}

fn into_call_result(outcome: Result<u16>) -> CallResult {
    outcome
        .map(|status| CallOk { status })
        .map_err(CallError::from)
}

impl RemoteClient for RpcClient {
    type Prepared = CallTemplate;

    async fn call(&mut self, payload: &Bytes, trace: &PhaseTracer) -> CallResult {
        into_call_result(self.commit(payload, trace).await)
    }

    async fn current_sequence(&mut self) -> std::result::Result<u64, BoxError> {
        let nonce = match self.timeout {
            Some(after) => tokio::time::timeout(after, self.query_nonce())
                .await
                .map_err(|_| Error::Timeout(after))??,
            None => self.query_nonce().await?,
        };
        Ok(nonce)
    }

    fn prepare_raw(&mut self, payload: &Bytes) -> std::result::Result<CallTemplate, BoxError> {
        Ok(self.template(payload.clone()))
    }

    fn sign_raw(
        &self,
        prepared: &CallTemplate,
        sequence: u64,
    ) -> std::result::Result<Bytes, CallError> {
        prepared
            .broadcast_request(&self.signer, sequence, &self.request_id)
            .map_err(|err| CallError::new(ErrorKind::Signing, err.to_string()))
    }

    async fn send_raw(&mut self, request: Bytes, trace: &PhaseTracer) -> CallResult {
        into_call_result(self.broadcast(request, Some(trace)).await)
    }
}
