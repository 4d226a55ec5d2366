use base64::Engine as _;
use base64::engine::general_purpose::STANDARD;
use bytes::Bytes;
use serde::Serialize;

use super::jsonrpc::{BroadcastParams, RpcRequest};
use super::signer::Signer;
use super::{Error, Result};

pub const DEFAULT_CHAIN_ID: &str = "default";
pub const DEFAULT_CONTRACT: &str = "SimpleStore";
pub const DEFAULT_METHOD: &str = "Set";

/// Bytes covered by the signature: chain id, contract and method (each NUL terminated),
/// the big-endian nonce, then the payload.
pub fn signing_bytes(
    chain_id: &str,
    contract: &str,
    method: &str,
    nonce: u64,
    payload: &[u8],
) -> Vec<u8> {
    let mut out =
        Vec::with_capacity(chain_id.len() + contract.len() + method.len() + 11 + payload.len());
    out.extend_from_slice(chain_id.as_bytes());
    out.push(0);
    out.extend_from_slice(contract.as_bytes());
    out.push(0);
    out.extend_from_slice(method.as_bytes());
    out.push(0);
    out.extend_from_slice(&nonce.to_be_bytes());
    out.extend_from_slice(payload);
    out
}

#[derive(Debug, Serialize)]
struct SignedTx<'a> {
    chain_id: &'a str,
    contract: &'a str,
    method: &'a str,
    nonce: u64,
    payload: &'a str,
    public_key: &'a str,
    signature: String,
}

/// Unsigned contract call. Built once and signed again for every nonce.
#[derive(Debug, Clone)]
pub struct CallTemplate {
    chain_id: String,
    contract: String,
    method: String,
    payload: Bytes,
    payload_b64: String,
}

impl CallTemplate {
    pub fn new(
        chain_id: impl Into<String>,
        contract: impl Into<String>,
        method: impl Into<String>,
        payload: Bytes,
    ) -> Self {
        let payload_b64 = STANDARD.encode(&payload);
        Self {
            chain_id: chain_id.into(),
            contract: contract.into(),
            method: method.into(),
            payload,
            payload_b64,
        }
    }

    /// Base64 of the signed envelope, the `tx` parameter of `broadcast_tx_commit`.
    pub fn sign(&self, signer: &Signer, nonce: u64) -> Result<String> {
        let msg = signing_bytes(
            &self.chain_id,
            &self.contract,
            &self.method,
            nonce,
            &self.payload,
        );
        let public_key = signer.public_key_hex();
        let tx = SignedTx {
            chain_id: &self.chain_id,
            contract: &self.contract,
            method: &self.method,
            nonce,
            payload: &self.payload_b64,
            public_key: &public_key,
            signature: hex::encode(signer.sign(&msg)),
        };
        let envelope = serde_json::to_vec(&tx).map_err(Error::Encode)?;
        Ok(STANDARD.encode(envelope))
    }

    /// Complete `broadcast_tx_commit` request body for `nonce`.
    pub fn broadcast_request(&self, signer: &Signer, nonce: u64, id: &str) -> Result<Bytes> {
        let tx = self.sign(signer, nonce)?;
        let req = RpcRequest::new("broadcast_tx_commit", BroadcastParams { tx: &tx }, id);
        serde_json::to_vec(&req).map(Bytes::from).map_err(Error::Encode)
    }
}
