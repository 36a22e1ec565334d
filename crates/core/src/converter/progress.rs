//! Transcoder progress parsing.

use once_cell::sync::Lazy;
use regex_lite::Regex;

// Matches both the stats line ("time=00:01:02.50") and -progress output
// ("out_time=00:01:02.500000").
static TIME_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"time=(\d{2,}):(\d{2}):(\d{2})").expect("valid time regex"));

/// Extracts the `HH:MM:SS` timestamp of a transcoder output line, in seconds.
pub fn parse_timestamp(line: &str) -> Option<u64> {
    let caps = TIME_RE.captures(line)?;
    let hours: u64 = caps.get(1)?.as_str().parse().ok()?;
    let minutes: u64 = caps.get(2)?.as_str().parse().ok()?;
    let seconds: u64 = caps.get(3)?.as_str().parse().ok()?;
    Some(hours * 3600 + minutes * 60 + seconds)
}

/// `current / total * 100`, clamped to 100. `None` without a usable total.
pub fn percent_of(current_secs: u64, total_secs: f64) -> Option<u8> {
    if total_secs.is_nan() || total_secs <= 0.0 {
        return None;
    }
    let pct = (current_secs as f64 / total_secs * 100.0).min(100.0);
    Some(pct.max(0.0) as u8)
}

/// Parses the plain-text duration printed by the probe call.
pub fn parse_duration(output: &str) -> Option<f64> {
    output
        .lines()
        .map(str::trim)
        .find(|l| !l.is_empty())
        .and_then(|l| l.parse::<f64>().ok())
        .filter(|d| d.is_finite() && *d > 0.0)
}
