use std::fmt::Write as _;
use std::io::Write as _;

use anyhow::Context as _;
use rpcbench_core::ProgressFn;
use rpcbench_core::RunSummary;
use rpcbench_core::runner::ResultRecord;

use super::{OutputFormatter, RunPlan};

const HEADER: &str = "response-time,connect,write,delay,read,status-code,offset";

/// One row per request, seconds with four decimals.
pub(crate) struct CsvOutput;

impl OutputFormatter for CsvOutput {
    fn print_header(&self, _plan: &RunPlan) {}

    fn progress(&self) -> Option<ProgressFn> {
        None
    }

    fn print_summary(&self, summary: &RunSummary) -> anyhow::Result<()> {
        let mut out = std::io::stdout().lock();
        out.write_all(render(&summary.records).as_bytes())
            .context("failed to write csv")?;
        out.flush().context("failed to write csv")
    }
}

fn render(records: &[ResultRecord]) -> String {
    let mut out = String::with_capacity(64 * (records.len() + 1));
    out.push_str(HEADER);
    out.push('\n');

    for r in records {
        writeln!(
            out,
            "{:.4},{:.4},{:.4},{:.4},{:.4},{},{:.4}",
            r.duration.as_secs_f64(),
            r.phases.connect.as_secs_f64(),
            r.phases.write.as_secs_f64(),
            r.phases.delay.as_secs_f64(),
            r.phases.read.as_secs_f64(),
            r.status().map(|s| s.to_string()).unwrap_or_default(),
            r.offset.as_secs_f64(),
        )
        .ok();
    }

    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use rpcbench_core::{CallError, CallOk, ErrorKind, PhaseTimings};
    use std::time::Duration;

    fn record(outcome: rpcbench_core::CallResult, offset_ms: u64) -> ResultRecord {
        ResultRecord {
            worker: 1,
            sequence: None,
            outcome,
            duration: Duration::from_millis(12),
            phases: PhaseTimings {
                connect: Duration::from_millis(1),
                write: Duration::ZERO,
                delay: Duration::from_millis(10),
                read: Duration::from_millis(1),
            },
            offset: Duration::from_millis(offset_ms),
        }
    }

    #[test]
    fn one_row_per_record() {
        let records = vec![
            record(Ok(CallOk { status: 200 }), 0),
            record(
                Err(CallError::new(ErrorKind::Transport, "connection refused")),
                5,
            ),
        ];

        let text = render(&records);
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines.len(), 3);
        assert_eq!(lines[0], HEADER);
        assert_eq!(lines[1], "0.0120,0.0010,0.0000,0.0100,0.0010,200,0.0000");
        assert_eq!(lines[2], "0.0120,0.0010,0.0000,0.0100,0.0010,,0.0050");
    }

    #[test]
    fn failed_status_is_kept_in_row() {
        let mut err = CallError::new(ErrorKind::Status, "service unavailable");
        err.status = Some(503);

        let text = render(&[record(Err(err), 0)]);
        assert_eq!(
            text.lines().nth(1),
            Some("0.0120,0.0010,0.0000,0.0100,0.0010,503,0.0000")
        );
    }
}
