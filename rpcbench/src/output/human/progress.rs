use std::sync::Mutex;
use std::time::Duration;

use indicatif::{ProgressBar, ProgressDrawTarget, ProgressStyle};

/// One progress line on stderr: a bar for bounded runs, a spinner otherwise.
pub(crate) struct HumanProgress {
    inner: Mutex<Option<Bar>>,
}

struct Bar {
    kind: ProgressBarKind,
    pb: ProgressBar,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ProgressBarKind {
    /// Length is the planned request count.
    Requests,
    /// Length is the run duration in milliseconds.
    Duration,
    Spinner,
}

impl HumanProgress {
    pub(crate) fn new() -> Self {
        Self {
            inner: Mutex::new(None),
        }
    }

    pub(crate) fn update(
        &self,
        planned: Option<u64>,
        duration: Option<Duration>,
        completed: u64,
        elapsed: Duration,
        message: String,
    ) {
        let mut inner = self
            .inner
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());

        let bar = inner.get_or_insert_with(|| Bar::new(planned, duration));
        bar.pb.set_message(message);

        match bar.kind {
            ProgressBarKind::Requests => {
                let total = planned.unwrap_or_default();
                bar.pb.set_length(total);
                bar.pb.set_position(completed.min(total));
            }
            ProgressBarKind::Duration => {
                let total_ms = duration.map_or(0, |d| d.as_millis() as u64);
                let elapsed_ms = elapsed.as_millis() as u64;
                bar.pb.set_length(total_ms);
                bar.pb.set_position(elapsed_ms.min(total_ms));
            }
            ProgressBarKind::Spinner => bar.pb.tick(),
        }
    }

    pub(crate) fn finish(&self) {
        let mut inner = self
            .inner
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());

        if let Some(bar) = inner.take() {
            bar.pb.finish_and_clear();
        }
    }
}

impl Bar {
    fn new(planned: Option<u64>, duration: Option<Duration>) -> Self {
        let kind = match (duration, planned) {
            (Some(_), _) => ProgressBarKind::Duration,
            (None, Some(_)) => ProgressBarKind::Requests,
            (None, None) => ProgressBarKind::Spinner,
        };

        let pb = match kind {
            ProgressBarKind::Requests | ProgressBarKind::Duration => {
                let pb = ProgressBar::with_draw_target(
                    Some(0),
                    ProgressDrawTarget::stderr_with_hz(5),
                );
                pb.set_style(bar_style());
                pb
            }
            ProgressBarKind::Spinner => {
                let pb = ProgressBar::with_draw_target(None, ProgressDrawTarget::stderr_with_hz(5));
                pb.set_style(spinner_style());
                pb.enable_steady_tick(Duration::from_millis(120));
                pb
            }
        };

        Self { kind, pb }
    }
}

fn bar_style() -> ProgressStyle {
    ProgressStyle::with_template("[ {bar:30.cyan/blue} ] {percent:>3}% {msg}")
        .unwrap_or_else(|_| ProgressStyle::default_bar())
        .progress_chars("█░")
}

fn spinner_style() -> ProgressStyle {
    ProgressStyle::with_template("{spinner} {msg}")
        .unwrap_or_else(|_| ProgressStyle::default_spinner())
}
