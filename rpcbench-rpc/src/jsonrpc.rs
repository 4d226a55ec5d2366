use serde::{Deserialize, Serialize};
use serde_json::Value;

pub const JSONRPC_VERSION: &str = "2.0";

#[derive(Debug, Serialize)]
pub struct RpcRequest<'a, P> {
    pub jsonrpc: &'static str,
    pub method: &'a str,
    pub params: P,
    pub id: &'a str,
}

impl<'a, P: Serialize> RpcRequest<'a, P> {
    pub fn new(method: &'a str, params: P, id: &'a str) -> Self {
        Self {
            jsonrpc: JSONRPC_VERSION,
            method,
            params,
            id,
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct RpcResponse {
    #[serde(default)]
    pub result: Option<Value>,
    #[serde(default)]
    pub error: Option<RpcErrorObject>,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct RpcErrorObject {
    pub code: i64,
    pub message: String,
    #[serde(default)]
    pub data: Option<Value>,
}

impl std::fmt::Display for RpcErrorObject {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} ({})", self.message, self.code)?;
        if let Some(data) = &self.data {
            match data {
                Value::String(s) => write!(f, ": {s}")?,
                other => write!(f, ": {other}")?,
            }
        }
        Ok(())
    }
}

/// Outcome of one ABCI phase.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct TxResult {
    #[serde(default)]
    pub code: u32,
    #[serde(default)]
    pub log: String,
}

/// `result` of `broadcast_tx_commit`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct BroadcastResult {
    #[serde(default)]
    pub check_tx: TxResult,
    #[serde(default)]
    pub deliver_tx: TxResult,
    #[serde(default)]
    pub height: u64,
}

#[derive(Debug, Serialize)]
pub(crate) struct BroadcastParams<'a> {
    pub tx: &'a str,
}

#[derive(Debug, Serialize)]
pub(crate) struct NonceParams<'a> {
    pub key: &'a str,
}
