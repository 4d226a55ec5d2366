use tokio::sync::mpsc;

use super::record::ResultRecord;

/// Upper bound on buffered result records.
pub const MAX_RESULT_CAPACITY: usize = 1_000_000;

/// Buffered records per worker before pushes start to block.
const RESULTS_PER_WORKER: usize = 1000;

#[must_use]
pub fn result_capacity(concurrency: u64) -> usize {
    let concurrency = usize::try_from(concurrency).unwrap_or(usize::MAX);
    concurrency
        .saturating_mul(RESULTS_PER_WORKER)
        .clamp(1, MAX_RESULT_CAPACITY)
}

/// Bounded stream of result records, closed once every sender is dropped.
pub fn result_stream(concurrency: u64) -> (ResultSender, ResultReceiver) {
    let (tx, rx) = mpsc::channel(result_capacity(concurrency));
    (ResultSender { tx }, ResultReceiver { rx })
}

#[derive(Debug, Clone)]
pub struct ResultSender {
    tx: mpsc::Sender<ResultRecord>,
}

/// The aggregator is gone; the record could not be delivered.
#[derive(Debug)]
pub struct StreamClosed(pub ResultRecord);

impl ResultSender {
    /// Waits for capacity while the stream is full (backpressure); never drops the record.
    pub async fn push(&self, record: ResultRecord) -> Result<(), StreamClosed> {
        self.tx
            .send(record)
            .await
            .map_err(|mpsc::error::SendError(record)| StreamClosed(record))
    }

    #[must_use]
    pub fn capacity(&self) -> usize {
        self.tx.max_capacity()
    }
}

#[derive(Debug)]
pub struct ResultReceiver {
    rx: mpsc::Receiver<ResultRecord>,
}

impl ResultReceiver {
    /// Next record, or `None` once the stream is closed and drained.
    pub async fn next(&mut self) -> Option<ResultRecord> {
        self.rx.recv().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn capacity_scales_with_workers_up_to_cap() {
        assert_eq!(result_capacity(1), 1000);
        assert_eq!(result_capacity(10), 10_000);
        assert_eq!(result_capacity(1000), MAX_RESULT_CAPACITY);
        assert_eq!(result_capacity(50_000), MAX_RESULT_CAPACITY);
        assert_eq!(result_capacity(0), 1);
    }

    #[test]
    fn stream_uses_computed_capacity() {
        let (tx, _rx) = result_stream(3);
        assert_eq!(tx.capacity(), 3000);
    }
}
