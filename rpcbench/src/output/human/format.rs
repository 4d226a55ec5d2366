use std::time::Duration;

pub(crate) fn format_rate(v: f64) -> String {
    if v.is_finite() {
        format!("{v:.0}")
    } else {
        "0".to_string()
    }
}

/// Seconds with four decimals, the unit of every latency in the summary.
pub(crate) fn format_secs(d: Duration) -> String {
    format!("{:.4}", d.as_secs_f64())
}

pub(crate) fn format_duration_single(d: Duration) -> String {
    // One rounded component in us, ms or s.
    let total_ns = d.as_nanos();

    const NS_PER_US: u128 = 1_000;
    const NS_PER_MS: u128 = 1_000_000;
    const NS_PER_S: u128 = 1_000_000_000;

    fn round_div(value: u128, unit: u128) -> u128 {
        (value + (unit / 2)) / unit
    }

    if total_ns >= NS_PER_S {
        return format!("{}s", round_div(total_ns, NS_PER_S));
    }
    if total_ns >= NS_PER_MS {
        return format!("{}ms", round_div(total_ns, NS_PER_MS));
    }
    format!("{}us", round_div(total_ns, NS_PER_US))
}

/// Bar of `width * count / max` block characters.
pub(crate) fn histogram_bar(count: u64, max: u64, width: usize) -> String {
    if max == 0 {
        return String::new();
    }
    let len = (count as u128 * width as u128 / max as u128) as usize;
    "■".repeat(len)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn single_component_durations() {
        assert_eq!(format_duration_single(Duration::from_micros(250)), "250us");
        assert_eq!(format_duration_single(Duration::from_micros(1_500)), "2ms");
        assert_eq!(format_duration_single(Duration::from_millis(2_400)), "2s");
    }

    #[test]
    fn seconds_have_four_decimals() {
        assert_eq!(format_secs(Duration::from_micros(12_345)), "0.0123");
        assert_eq!(format_secs(Duration::from_secs(2)), "2.0000");
    }

    #[test]
    fn bars_scale_to_the_largest_bucket() {
        assert_eq!(histogram_bar(10, 10, 4).chars().count(), 4);
        assert_eq!(histogram_bar(5, 10, 4).chars().count(), 2);
        assert_eq!(histogram_bar(0, 10, 4), "");
        assert_eq!(histogram_bar(3, 0, 4), "");
    }

    #[test]
    fn non_finite_rate_renders_zero() {
        assert_eq!(format_rate(f64::NAN), "0");
        assert_eq!(format_rate(12.6), "13");
    }
}
