use super::client::{BoxError, RemoteClient};

/// Worker-local sequence numbers for raw (pre-signed) requests.
///
/// The counter is fetched from the endpoint once and then only advanced locally, so one
/// identity used by one worker never sees duplicate or out-of-order numbers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NonceSequencer {
    next: u64,
}

impl NonceSequencer {
    /// Starts right after `committed`, the last sequence number the endpoint knows about.
    #[must_use]
    pub fn starting_after(committed: u64) -> Self {
        Self {
            next: committed.saturating_add(1),
        }
    }

    pub async fn fetch<C: RemoteClient>(client: &mut C) -> Result<Self, BoxError> {
        let committed = client.current_sequence().await?;
        Ok(Self::starting_after(committed))
    }

    #[must_use]
    pub fn current(&self) -> u64 {
        self.next
    }

    pub fn advance(&mut self) {
        self.next = self.next.saturating_add(1);
    }
}
