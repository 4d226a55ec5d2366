#![forbid(unsafe_code)]

mod client;
mod error;
mod jsonrpc;
mod signer;
mod tx;

pub use client::{RpcClient, RpcClientFactory, RpcEndpoints};
pub use error::{Error, Result};
pub use jsonrpc::{BroadcastResult, RpcErrorObject, RpcRequest, RpcResponse, TxResult};
pub use signer::{KeyError, Signer, generate_key_file};
pub use tx::{CallTemplate, DEFAULT_CHAIN_ID, DEFAULT_CONTRACT, DEFAULT_METHOD, signing_bytes};
