use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::time::Duration;

use tokio::time::Instant;

/// Phase durations of a single attempt.
///
/// The phases do not necessarily add up to the attempt's total duration.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PhaseTimings {
    /// Connection requested -> connection obtained. Zero when a connection was reused.
    pub connect: Duration,
    /// Connection obtained -> request fully written.
    pub write: Duration,
    /// Request written -> first response byte.
    pub delay: Duration,
    /// First response byte -> attempt finished.
    pub read: Duration,
}

#[derive(Debug)]
struct Marks {
    origin: Instant,
    // Offsets from `origin` in nanoseconds, plus one. Zero means "not observed".
    conn_start: AtomicU64,
    conn_obtained: AtomicU64,
    wrote_request: AtomicU64,
    first_byte: AtomicU64,
    reused: AtomicBool,
}

/// Records phase boundaries of one attempt.
///
/// Cloning is cheap; the transport may mark boundaries from whichever task drives the
/// connection. Each boundary keeps its latest mark.
#[derive(Debug, Clone)]
pub struct PhaseTracer {
    marks: Arc<Marks>,
}

impl Default for PhaseTracer {
    fn default() -> Self {
        Self::new()
    }
}

impl PhaseTracer {
    #[must_use]
    pub fn new() -> Self {
        Self {
            marks: Arc::new(Marks {
                origin: Instant::now(),
                conn_start: AtomicU64::new(0),
                conn_obtained: AtomicU64::new(0),
                wrote_request: AtomicU64::new(0),
                first_byte: AtomicU64::new(0),
                reused: AtomicBool::new(false),
            }),
        }
    }

    fn stamp(&self, slot: &AtomicU64) {
        let offset = self.marks.origin.elapsed().as_nanos();
        let offset = u64::try_from(offset).unwrap_or(u64::MAX - 1);
        slot.store(offset.saturating_add(1), Ordering::Release);
    }

    pub fn connect_started(&self) {
        self.stamp(&self.marks.conn_start);
    }

    pub fn connection_obtained(&self, reused: bool) {
        self.marks.reused.store(reused, Ordering::Release);
        self.stamp(&self.marks.conn_obtained);
    }

    pub fn request_written(&self) {
        self.stamp(&self.marks.wrote_request);
    }

    pub fn first_byte(&self) {
        self.stamp(&self.marks.first_byte);
    }

    fn mark(slot: &AtomicU64) -> Option<u64> {
        match slot.load(Ordering::Acquire) {
            0 => None,
            v => Some(v - 1),
        }
    }

    /// Resolves the phases against `finished`, the instant the attempt completed.
    #[must_use]
    pub fn timings(&self, finished: Instant) -> PhaseTimings {
        let m = &self.marks;
        let conn_start = Self::mark(&m.conn_start);
        let conn_obtained = Self::mark(&m.conn_obtained);
        let wrote_request = Self::mark(&m.wrote_request);
        let first_byte = Self::mark(&m.first_byte);
        let end = finished.saturating_duration_since(m.origin).as_nanos();
        let end = u64::try_from(end).unwrap_or(u64::MAX);

        let span = |from: Option<u64>, to: Option<u64>| match (from, to) {
            (Some(a), Some(b)) => Duration::from_nanos(b.saturating_sub(a)),
            _ => Duration::ZERO,
        };

        let connect = if m.reused.load(Ordering::Acquire) {
            Duration::ZERO
        } else {
            span(conn_start, conn_obtained)
        };

        PhaseTimings {
            connect,
            write: span(conn_obtained, wrote_request),
            delay: span(wrote_request, first_byte),
            read: span(first_byte, Some(end)),
        }
    }
}
