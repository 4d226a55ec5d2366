use std::collections::HashMap;
use std::sync::Mutex;

use base64::Engine as _;
use base64::engine::general_purpose::STANDARD;
use ed25519_dalek::{Signature, Verifier as _, VerifyingKey};
use serde::Deserialize;

/// Transaction envelope as broadcast by the load generator.
#[derive(Debug, Deserialize)]
pub struct SignedTx {
    pub chain_id: String,
    pub contract: String,
    pub method: String,
    pub nonce: u64,
    /// Base64 of the contract call payload.
    pub payload: String,
    /// Hex ed25519 public key.
    pub public_key: String,
    /// Hex ed25519 signature over [`signing_bytes`].
    pub signature: String,
}

/// Bytes covered by the signature of a transaction.
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

/// Why a transaction was not committed. The code is reported in `check_tx.code`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Rejection {
    Malformed(String),
    BadSignature,
    WrongChain { expected: String, got: String },
    BadNonce { expected: u64, got: u64 },
}

impl Rejection {
    pub fn code(&self) -> u32 {
        match self {
            Self::BadNonce { .. } => 1,
            Self::BadSignature => 2,
            Self::WrongChain { .. } => 3,
            Self::Malformed(_) => 4,
        }
    }

    pub fn log(&self) -> String {
        match self {
            Self::Malformed(msg) => format!("malformed transaction: {msg}"),
            Self::BadSignature => "signature verification failed".to_string(),
            Self::WrongChain { expected, got } => {
                format!("wrong chain id: expected {expected}, got {got}")
            }
            Self::BadNonce { expected, got } => {
                format!("invalid nonce: expected {expected}, got {got}")
            }
        }
    }
}

#[derive(Debug, Default)]
struct Account {
    committed: u64,
    accepted: Vec<u64>,
}

/// Per-signer nonce ledger.
#[derive(Debug, Default)]
pub struct Chain {
    accounts: Mutex<HashMap<String, Account>>,
    height: Mutex<u64>,
}

impl Chain {
    /// Last committed nonce for `public_key` (0 if it never transacted).
    pub fn committed_nonce(&self, public_key: &str) -> u64 {
        self.accounts
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .get(&public_key.to_ascii_lowercase())
            .map_or(0, |a| a.committed)
    }

    /// Nonces accepted for `public_key`, in commit order.
    pub fn accepted_nonces(&self, public_key: &str) -> Vec<u64> {
        self.accounts
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .get(&public_key.to_ascii_lowercase())
            .map(|a| a.accepted.clone())
            .unwrap_or_default()
    }

    pub fn signers(&self) -> Vec<String> {
        let mut keys: Vec<String> = self
            .accounts
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .keys()
            .cloned()
            .collect();
        keys.sort();
        keys
    }

    /// Verifies and commits a base64 encoded envelope. Returns the new block height.
    pub fn commit(&self, chain_id: &str, encoded: &str) -> Result<u64, Rejection> {
        let raw = STANDARD
            .decode(encoded)
            .map_err(|e| Rejection::Malformed(e.to_string()))?;
        let tx: SignedTx =
            serde_json::from_slice(&raw).map_err(|e| Rejection::Malformed(e.to_string()))?;

        if tx.chain_id != chain_id {
            return Err(Rejection::WrongChain {
                expected: chain_id.to_string(),
                got: tx.chain_id,
            });
        }

        let payload = STANDARD
            .decode(&tx.payload)
            .map_err(|e| Rejection::Malformed(e.to_string()))?;
        let key_bytes: [u8; 32] = hex::decode(&tx.public_key)
            .ok()
            .and_then(|b| b.try_into().ok())
            .ok_or_else(|| Rejection::Malformed("public key".to_string()))?;
        let sig_bytes: [u8; 64] = hex::decode(&tx.signature)
            .ok()
            .and_then(|b| b.try_into().ok())
            .ok_or_else(|| Rejection::Malformed("signature".to_string()))?;

        let key = VerifyingKey::from_bytes(&key_bytes).map_err(|_| Rejection::BadSignature)?;
        let msg = signing_bytes(&tx.chain_id, &tx.contract, &tx.method, tx.nonce, &payload);
        key.verify(&msg, &Signature::from_bytes(&sig_bytes))
            .map_err(|_| Rejection::BadSignature)?;

        let mut accounts = self
            .accounts
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        let account = accounts.entry(tx.public_key.to_ascii_lowercase()).or_default();
        let expected = account.committed + 1;
        if tx.nonce != expected {
            return Err(Rejection::BadNonce {
                expected,
                got: tx.nonce,
            });
        }
        account.committed = tx.nonce;
        account.accepted.push(tx.nonce);
        drop(accounts);

        let mut height = self
            .height
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        *height += 1;
        Ok(*height)
    }
}
