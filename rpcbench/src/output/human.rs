use std::sync::Arc;

use rpcbench_core::{ProgressFn, Requests, RunSummary};

mod format;
mod progress;
mod summary;

use format::{format_duration_single, format_rate};
use progress::HumanProgress;
use summary::render;

use super::{OutputFormatter, RunPlan};

pub(crate) struct HumanReadableOutput {
    progress: Arc<HumanProgress>,
}

impl HumanReadableOutput {
    pub(crate) fn new() -> Self {
        Self {
            progress: Arc::new(HumanProgress::new()),
        }
    }
}

impl OutputFormatter for HumanReadableOutput {
    fn print_header(&self, plan: &RunPlan) {
        let volume = match (plan.requests, plan.duration) {
            (_, Some(d)) => format!("for {}", humantime::format_duration(d)),
            (Requests::Total(n), None) => format!("{n} requests"),
            (Requests::UntilStopped, None) => "until interrupted".to_string(),
        };
        let rate = if plan.qps > 0.0 {
            format!(" at {} req/s per worker", format_rate(plan.qps))
        } else {
            String::new()
        };
        println!(
            "target: {} mode={} workers={} {volume}{rate}",
            plan.write_url, plan.mode, plan.concurrency
        );
        println!();
    }

    fn progress(&self) -> Option<ProgressFn> {
        let progress = self.progress.clone();

        Some(Arc::new(move |u| {
            let message = format!(
                "done={} errors={} rps={} elapsed={}",
                u.completed,
                u.errors,
                format_rate(u.rps_now),
                format_duration_single(u.elapsed)
            );
            progress.update(u.planned, u.duration, u.completed, u.elapsed, message);
        }))
    }

    fn print_summary(&self, summary: &RunSummary) -> anyhow::Result<()> {
        self.progress.finish();
        print!("{}", render(summary));
        Ok(())
    }
}
