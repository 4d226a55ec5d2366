use rpcbench_core::{CallError, ErrorKind};

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error(transparent)]
    Http(#[from] rpcbench_http::Error),

    #[error("endpoint answered with status {status}")]
    Status { status: u16 },

    #[error("failed to decode response: {source}")]
    Decode {
        status: u16,
        #[source]
        source: serde_json::Error,
    },

    #[error("response has neither result nor error")]
    EmptyResponse { status: u16 },

    #[error("rpc error: {error}")]
    Remote {
        status: u16,
        error: crate::RpcErrorObject,
    },

    #[error("transaction rejected in {phase} with code {code}: {log}")]
    Rejected {
        status: u16,
        phase: &'static str,
        code: u32,
        log: String,
    },

    #[error("failed to encode request: {0}")]
    Encode(#[source] serde_json::Error),

    #[error("request timed out after {0:?}")]
    Timeout(std::time::Duration),
}

impl Error {
    #[must_use]
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Http(_) => ErrorKind::Transport,
            Self::Status { .. } => ErrorKind::Status,
            Self::Decode { .. } | Self::EmptyResponse { .. } => ErrorKind::Decode,
            Self::Remote { .. } | Self::Rejected { .. } => ErrorKind::Rpc,
            Self::Encode(_) => ErrorKind::Signing,
            Self::Timeout(_) => ErrorKind::Timeout,
        }
    }

    #[must_use]
    pub fn status(&self) -> Option<u16> {
        match self {
            Self::Status { status }
            | Self::Decode { status, .. }
            | Self::EmptyResponse { status }
            | Self::Remote { status, .. }
            | Self::Rejected { status, .. } => Some(*status),
            Self::Http(_) | Self::Encode(_) | Self::Timeout(_) => None,
        }
    }
}

impl From<Error> for CallError {
    fn from(err: Error) -> Self {
        let status = err.status();
        let mut call = CallError::new(err.kind(), err.to_string());
        call.status = status;
        call
    }
}
