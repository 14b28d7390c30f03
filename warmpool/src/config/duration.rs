//! Human-readable duration parsing (e.g., "30s", "5m", "1h").

use std::time::Duration;

use thiserror::Error;

/// Error parsing a duration string.
#[derive(Debug, Error, PartialEq, Eq)]
#[error("Invalid duration '{input}' - expected format like '30', '30s', '500ms', '5m' or '1h'")]
pub struct DurationParseError {
    input: String,
}

impl DurationParseError {
    fn new(input: impl Into<String>) -> Self {
        Self {
            input: input.into(),
        }
    }
}

/// Parse a human-readable duration.
///
/// Supports:
/// - Bare numbers (seconds)
/// - `ms`, `s`, `m`, `h` suffixes
/// - Case-insensitive, whitespace tolerant
///
/// # Examples
///
/// ```
/// use std::time::Duration;
/// use warmpool::config::parse_duration;
///
/// assert_eq!(parse_duration("30").unwrap(), Duration::from_secs(30));
/// assert_eq!(parse_duration("250ms").unwrap(), Duration::from_millis(250));
/// assert_eq!(parse_duration("5 m").unwrap(), Duration::from_secs(300));
/// assert_eq!(parse_duration("1H").unwrap(), Duration::from_secs(3600));
/// ```
pub fn parse_duration(s: &str) -> Result<Duration, DurationParseError> {
    let trimmed = s.trim();
    let lower = trimmed.to_lowercase();

    let (number, millis_per_unit) = if let Some(n) = lower.strip_suffix("ms") {
        (n, 1_u64)
    } else if let Some(n) = lower.strip_suffix('s') {
        (n, 1_000)
    } else if let Some(n) = lower.strip_suffix('m') {
        (n, 60_000)
    } else if let Some(n) = lower.strip_suffix('h') {
        (n, 3_600_000)
    } else {
        (lower.as_str(), 1_000)
    };

    let number = number.trim();
    if number.is_empty() {
        return Err(DurationParseError::new(trimmed));
    }

    let value: u64 = number
        .parse()
        .map_err(|_| DurationParseError::new(trimmed))?;

    value
        .checked_mul(millis_per_unit)
        .map(Duration::from_millis)
        .ok_or_else(|| DurationParseError::new(trimmed))
}

/// Format a duration using the largest unit that divides it evenly.
///
/// ```
/// use std::time::Duration;
/// use warmpool::config::format_duration;
///
/// assert_eq!(format_duration(Duration::from_secs(3600)), "1h");
/// assert_eq!(format_duration(Duration::from_secs(90)), "90s");
/// assert_eq!(format_duration(Duration::from_millis(1500)), "1500ms");
/// ```
pub fn format_duration(duration: Duration) -> String {
    let millis = duration.as_millis();
    if millis == 0 {
        "0s".to_string()
    } else if millis % 3_600_000 == 0 {
        format!("{}h", millis / 3_600_000)
    } else if millis % 60_000 == 0 {
        format!("{}m", millis / 60_000)
    } else if millis % 1_000 == 0 {
        format!("{}s", millis / 1_000)
    } else {
        format!("{}ms", millis)
    }
}
