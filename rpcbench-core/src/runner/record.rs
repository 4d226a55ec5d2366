use std::time::Duration;

use super::tracer::PhaseTimings;

/// Coarse classification of a failed attempt.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, strum::Display, strum::EnumString,
)]
#[strum(serialize_all = "snake_case")]
pub enum ErrorKind {
    /// Connection, write, or read failure.
    Transport,
    /// The per-request timeout elapsed.
    Timeout,
    /// The endpoint answered with a non-success status.
    Status,
    /// The endpoint answered with an application-level error.
    Rpc,
    /// The response could not be decoded.
    Decode,
    /// The request could not be signed.
    Signing,
}

/// Successful attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CallOk {
    pub status: u16,
}

impl Default for CallOk {
    fn default() -> Self {
        Self { status: 200 }
    }
}

/// Failed attempt. Carried inside the result record; never stops the worker.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{kind}: {message}")]
pub struct CallError {
    pub kind: ErrorKind,
    pub message: String,
    /// Status reported by the endpoint, when one was received.
    pub status: Option<u16>,
}

impl CallError {
    pub fn new(kind: ErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
            status: None,
        }
    }

    #[must_use]
    pub fn with_status(mut self, status: u16) -> Self {
        self.status = Some(status);
        self
    }

    pub fn timeout(after: Duration) -> Self {
        Self::new(ErrorKind::Timeout, format!("request timed out after {after:?}"))
    }
}

pub type CallResult = std::result::Result<CallOk, CallError>;

/// Outcome and timings of one attempt.
#[derive(Debug, Clone)]
pub struct ResultRecord {
    pub worker: u64,
    /// Sequence number the attempt was signed with, when the worker tracks it.
    pub sequence: Option<u64>,
    pub outcome: CallResult,
    pub duration: Duration,
    pub phases: PhaseTimings,
    /// Attempt start relative to the start of the run.
    pub offset: Duration,
}

impl ResultRecord {
    #[must_use]
    pub fn is_success(&self) -> bool {
        self.outcome.is_ok()
    }

    #[must_use]
    pub fn status(&self) -> Option<u16> {
        match &self.outcome {
            Ok(ok) => Some(ok.status),
            Err(err) => err.status,
        }
    }

    #[must_use]
    pub fn error(&self) -> Option<&CallError> {
        self.outcome.as_ref().err()
    }
}
