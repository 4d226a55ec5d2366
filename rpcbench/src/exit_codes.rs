#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(i32)]
pub enum ExitCode {
    Success = 0,

    /// At least one request failed and `--fail-on-error` was given.
    AttemptsFailed = 20,

    /// Invalid CLI/config/options (bad flags, invalid durations, unreadable payload or key, etc.).
    InvalidInput = 30,

    /// Runtime error (worker setup failed, IO errors, unexpected invariants).
    RuntimeError = 40,
}

impl ExitCode {
    #[must_use]
    pub fn as_i32(self) -> i32 {
        self as i32
    }

    #[must_use]
    pub fn from_errors(errors: u64, fail_on_error: bool) -> Self {
        if fail_on_error && errors > 0 {
            Self::AttemptsFailed
        } else {
            Self::Success
        }
    }
}
