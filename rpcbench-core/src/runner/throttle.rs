use std::time::Duration;

use tokio::time::{Instant, Interval, MissedTickBehavior};

/// Per-worker request pacing.
///
/// Every worker owns its own ticker, so the aggregate rate of a run is roughly
/// `qps * concurrency`.
#[derive(Debug)]
pub struct Throttle {
    interval: Option<Interval>,
}

impl Throttle {
    /// `qps <= 0` (or NaN) disables pacing.
    #[must_use]
    pub fn new(qps: f64) -> Self {
        let Some(period) = tick_period(qps) else {
            return Self { interval: None };
        };

        // First tick after one full period, like a plain ticker.
        let mut interval = tokio::time::interval_at(Instant::now() + period, period);
        // A slow worker gets at most one pending tick; it never bursts to catch up.
        interval.set_missed_tick_behavior(MissedTickBehavior::Skip);
        Self {
            interval: Some(interval),
        }
    }

    #[must_use]
    pub fn is_enabled(&self) -> bool {
        self.interval.is_some()
    }

    pub async fn tick(&mut self) {
        if let Some(interval) = self.interval.as_mut() {
            interval.tick().await;
        }
    }
}

/// `1/qps` seconds, truncated to whole microseconds.
#[must_use]
pub fn tick_period(qps: f64) -> Option<Duration> {
    if !qps.is_finite() || qps <= 0.0 {
        return None;
    }
    let micros = (1e6 / qps) as u64;
    Some(Duration::from_micros(micros.max(1)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn period_from_rate() {
        assert_eq!(tick_period(10.0), Some(Duration::from_millis(100)));
        assert_eq!(tick_period(3.0), Some(Duration::from_micros(333_333)));
        assert_eq!(tick_period(0.0), None);
        assert_eq!(tick_period(-1.0), None);
        assert_eq!(tick_period(f64::NAN), None);
        // Absurd rates still produce a usable period.
        assert_eq!(tick_period(1e12), Some(Duration::from_micros(1)));
    }

    #[tokio::test(start_paused = true)]
    async fn ticks_are_spaced_by_period() {
        let mut throttle = Throttle::new(10.0);
        assert!(throttle.is_enabled());

        let start = Instant::now();
        throttle.tick().await;
        assert_eq!(start.elapsed(), Duration::from_millis(100));
        throttle.tick().await;
        assert_eq!(start.elapsed(), Duration::from_millis(200));
    }

    #[tokio::test(start_paused = true)]
    async fn disabled_throttle_never_waits() {
        let mut throttle = Throttle::new(0.0);
        assert!(!throttle.is_enabled());

        let start = Instant::now();
        for _ in 0..100 {
            throttle.tick().await;
        }
        assert_eq!(start.elapsed(), Duration::ZERO);
    }

    #[tokio::test(start_paused = true)]
    async fn slow_consumer_does_not_burst() {
        let mut throttle = Throttle::new(10.0);
        tokio::time::sleep(Duration::from_millis(450)).await;

        // One overdue tick is delivered right away, the next waits for the schedule.
        let start = Instant::now();
        throttle.tick().await;
        assert_eq!(start.elapsed(), Duration::ZERO);
        throttle.tick().await;
        assert!(start.elapsed() >= Duration::from_millis(50));
    }
}
