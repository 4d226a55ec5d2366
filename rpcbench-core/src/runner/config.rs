use std::path::PathBuf;
use std::time::Duration;

use bytes::Bytes;

use super::error::{Error, Result};

/// Total volume of a run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Requests {
    /// Issue this many attempts in total (split evenly across workers).
    Total(u64),
    /// Keep issuing attempts until the run is stopped.
    UntilStopped,
}

/// How a worker builds the signed payload for each attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, strum::Display, strum::EnumString)]
#[strum(serialize_all = "kebab-case")]
pub enum ExecutionMode {
    /// The remote client signs every request and picks the sequence number itself.
    #[default]
    PerRequest,
    /// The transaction is prepared once per worker; each attempt only signs it with the next
    /// locally tracked sequence number.
    RawPreSigned,
}

/// Where each worker gets its signing key from.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum KeySource {
    /// Generate an ephemeral key per worker.
    #[default]
    Generate,
    /// Load the key from a file. Every worker ends up with the same identity.
    File(PathBuf),
}

impl KeySource {
    /// `genkey` selects an ephemeral key, anything else is a path.
    #[must_use]
    pub fn parse(raw: &str) -> Self {
        if raw == "genkey" {
            Self::Generate
        } else {
            Self::File(PathBuf::from(raw))
        }
    }
}

/// Transport tuning. The core never interprets these; they are handed to the client factory.
#[derive(Debug, Clone, Default)]
pub struct TransportOptions {
    pub disable_keep_alives: bool,
    pub disable_compression: bool,
    pub http2: bool,
    /// Plain HTTP proxy in `host:port` or `http://host:port` form.
    pub proxy: Option<String>,
}

#[derive(Debug, Clone)]
pub struct WorkConfig {
    pub requests: Requests,
    pub concurrency: u64,
    /// Per-worker rate in requests/sec. `<= 0` disables throttling.
    pub qps: f64,
    /// Per-request timeout. `None` waits indefinitely.
    pub timeout: Option<Duration>,
    /// Stop the run after this long. Implies [`Requests::UntilStopped`].
    pub duration: Option<Duration>,
    pub mode: ExecutionMode,
    pub key_source: KeySource,
    pub transport: TransportOptions,
    /// Opaque request payload template.
    pub payload: Bytes,
    /// Keep every result record in the summary (for per-request output such as CSV).
    pub keep_records: bool,
}

impl Default for WorkConfig {
    fn default() -> Self {
        Self {
            requests: Requests::Total(200),
            concurrency: 50,
            qps: 0.0,
            timeout: Some(Duration::from_secs(20)),
            duration: None,
            mode: ExecutionMode::default(),
            key_source: KeySource::default(),
            transport: TransportOptions::default(),
            payload: Bytes::new(),
            keep_records: false,
        }
    }
}

impl WorkConfig {
    pub fn validate(&self) -> Result<()> {
        if self.concurrency == 0 {
            return Err(Error::InvalidConcurrency);
        }

        if let Some(duration) = self.duration {
            if duration.is_zero() {
                return Err(Error::InvalidDuration);
            }
        } else if let Requests::Total(requests) = self.requests {
            if requests == 0 {
                return Err(Error::InvalidRequests);
            }
            if requests < self.concurrency {
                return Err(Error::RequestsBelowConcurrency {
                    requests,
                    concurrency: self.concurrency,
                });
            }
        }

        if !self.qps.is_finite() {
            return Err(Error::InvalidQps);
        }

        if self.payload.is_empty() {
            return Err(Error::MissingPayload);
        }

        if self.concurrency > 1
            && self.mode == ExecutionMode::RawPreSigned
            && matches!(self.key_source, KeySource::File(_))
        {
            return Err(Error::SharedSigningIdentity {
                concurrency: self.concurrency,
            });
        }

        Ok(())
    }

    /// Requests actually executed by the run, after the duration override.
    #[must_use]
    pub fn effective_requests(&self) -> Requests {
        if self.duration.is_some() {
            Requests::UntilStopped
        } else {
            self.requests
        }
    }

    /// Attempts assigned to each worker. `None` means unbounded.
    ///
    /// The remainder of `requests % concurrency` is not issued.
    #[must_use]
    pub fn per_worker_attempts(&self) -> Option<u64> {
        match self.effective_requests() {
            Requests::Total(n) => Some(n / self.concurrency.max(1)),
            Requests::UntilStopped => None,
        }
    }

    #[must_use]
    pub fn throttled(&self) -> bool {
        self.qps > 0.0
    }
}
