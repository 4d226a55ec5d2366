use std::fmt::Write as _;

use rpcbench_core::RunSummary;
use rpcbench_core::runner::LatencySummary;

use super::format::{format_rate, format_secs, histogram_bar};

const BAR_WIDTH: usize = 40;

pub(crate) fn render(summary: &RunSummary) -> String {
    let mut out = String::new();

    if summary.is_empty() {
        out.push_str("summary: no requests were issued\n");
        return out;
    }

    out.push_str("Summary:\n");
    writeln!(out, "  Total:\t{} secs", format_secs(summary.elapsed)).ok();
    if let Some(l) = &summary.latency {
        writeln!(out, "  Slowest:\t{} secs", format_secs(l.max)).ok();
        writeln!(out, "  Fastest:\t{} secs", format_secs(l.min)).ok();
        writeln!(out, "  Average:\t{} secs", format_secs(l.mean)).ok();
    }
    writeln!(out, "  Requests/sec:\t{:.4}", summary.rps).ok();
    writeln!(
        out,
        "  Errors:\t{} ({:.2}%)",
        summary.errors,
        summary.error_rate * 100.0
    )
    .ok();
    if summary.stopped {
        out.push_str("  (interrupted)\n");
    }

    if !summary.histogram.is_empty() {
        out.push_str("\nResponse time histogram:\n");
        let max = summary
            .histogram
            .iter()
            .map(|b| b.count)
            .max()
            .unwrap_or_default();
        for bucket in &summary.histogram {
            writeln!(
                out,
                "  {} [{}]\t|{}",
                format_secs(bucket.mark),
                bucket.count,
                histogram_bar(bucket.count, max, BAR_WIDTH)
            )
            .ok();
        }
    }

    if !summary.distribution.is_empty() {
        out.push_str("\nLatency distribution:\n");
        for (pct, value) in &summary.distribution {
            writeln!(out, "  {pct}% in {} secs", format_secs(*value)).ok();
        }
    }

    let phases = [
        ("DNS+dialup", summary.phases.connect.as_ref()),
        ("req write", summary.phases.write.as_ref()),
        ("resp wait", summary.phases.delay.as_ref()),
        ("resp read", summary.phases.read.as_ref()),
    ];
    if phases.iter().any(|(_, p)| p.is_some()) {
        out.push_str("\nDetails (average, fastest, slowest):\n");
        for (name, phase) in phases {
            if let Some(p) = phase {
                render_phase(&mut out, name, p);
            }
        }
    }

    if !summary.status_codes.is_empty() {
        out.push_str("\nStatus code distribution:\n");
        for (code, count) in &summary.status_codes {
            writeln!(out, "  [{code}]\t{count} responses").ok();
        }
    }

    if !summary.error_messages.is_empty() {
        out.push_str("\nError distribution:\n");
        let mut errors: Vec<_> = summary.error_messages.iter().collect();
        errors.sort_by(|(a_msg, a_count), (b_msg, b_count)| {
            b_count.cmp(a_count).then_with(|| a_msg.cmp(b_msg))
        });
        for (message, count) in errors {
            writeln!(out, "  [{count}]\t{message}").ok();
        }
    }

    if summary.errors > 0 {
        let kinds = summary
            .errors_by_kind
            .iter()
            .map(|(kind, count)| format!("{kind}={count}"))
            .collect::<Vec<_>>()
            .join(" ");
        writeln!(out, "  by kind: {kinds}").ok();
    }

    writeln!(
        out,
        "\n{} requests, {} ok, {} failed, {} req/s",
        summary.total,
        summary.successes,
        summary.errors,
        format_rate(summary.rps)
    )
    .ok();

    out
}

fn render_phase(out: &mut String, name: &str, p: &LatencySummary) {
    writeln!(
        out,
        "  {name}:\t{} secs, {} secs, {} secs",
        format_secs(p.mean),
        format_secs(p.min),
        format_secs(p.max)
    )
    .ok();
}
