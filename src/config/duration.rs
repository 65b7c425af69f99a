//! Duration parsing for command-line timeouts.

use anyhow::Context;
use std::time::Duration;

/// Parse a duration string like "1h", "30m", "300s" or "300".
///
/// A plain number is a count of seconds.
pub fn parse_duration(s: &str) -> anyhow::Result<Duration> {
    let s = s.trim();
    if s.is_empty() {
        anyhow::bail!("Empty duration string");
    }

    let secs = if let Some(num_str) = s.strip_suffix('h') {
        let hours: u64 = num_str
            .parse()
            .with_context(|| format!("Invalid hours value: {num_str}"))?;
        hours.saturating_mul(3600)
    } else if let Some(num_str) = s.strip_suffix('m') {
        let minutes: u64 = num_str
            .parse()
            .with_context(|| format!("Invalid minutes value: {num_str}"))?;
        minutes.saturating_mul(60)
    } else if let Some(num_str) = s.strip_suffix('s') {
        num_str
            .parse()
            .with_context(|| format!("Invalid seconds value: {num_str}"))?
    } else {
        s.parse::<u64>()
            .with_context(|| format!("Invalid duration value: {s}"))?
    };

    Ok(Duration::from_secs(secs))
}
