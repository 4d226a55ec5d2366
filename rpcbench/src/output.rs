use std::time::Duration;

use rpcbench_core::{ExecutionMode, ProgressFn, Requests, RunSummary};

use crate::cli::OutputFormat;

mod csv;
mod human;
mod json;

/// What is about to run, for the header line.
#[derive(Debug, Clone)]
pub(crate) struct RunPlan {
    pub write_url: String,
    pub requests: Requests,
    pub concurrency: u64,
    pub qps: f64,
    pub duration: Option<Duration>,
    pub mode: ExecutionMode,
}

pub(crate) trait OutputFormatter: Send + Sync {
    fn print_header(&self, plan: &RunPlan);
    fn progress(&self) -> Option<ProgressFn>;
    fn print_summary(&self, summary: &RunSummary) -> anyhow::Result<()>;
}

pub(crate) fn formatter(format: OutputFormat) -> Box<dyn OutputFormatter> {
    match format {
        OutputFormat::HumanReadable => Box::new(human::HumanReadableOutput::new()),
        OutputFormat::Json => Box::new(json::JsonOutput),
        OutputFormat::Csv => Box::new(csv::CsvOutput),
    }
}
