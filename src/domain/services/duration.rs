use crate::domain::errors::{SlaError, SlaResult};
use chrono::Duration;
use regex::Regex;
use std::sync::OnceLock;

/// Parse duration string like "30m", "2h", "1h30m", "2d" into a `Duration`.
pub fn parse_duration(duration_str: &str) -> SlaResult<Duration> {
    static FORMAT_REGEX: OnceLock<Regex> = OnceLock::new();
    static PART_REGEX: OnceLock<Regex> = OnceLock::new();
    let format = FORMAT_REGEX
        .get_or_init(|| Regex::new(r"^(\d+[dhms])+$").expect("Invalid duration regex"));
    let part =
        PART_REGEX.get_or_init(|| Regex::new(r"(\d+)([dhms])").expect("Invalid duration regex"));

    let trimmed = duration_str.trim();
    if !format.is_match(trimmed) {
        return Err(SlaError::InvalidDuration(format!(
            "{}. Expected format: <number><d|h|m|s>, e.g. 30m, 4h, 1h30m",
            duration_str
        )));
    }

    let mut seconds: i64 = 0;
    for caps in part.captures_iter(trimmed) {
        let number: i64 = caps[1]
            .parse()
            .map_err(|_| SlaError::InvalidDuration(format!("number too large: {}", &caps[1])))?;
        let unit_seconds = match &caps[2] {
            "s" => 1,
            "m" => 60,
            "h" => 60 * 60,
            "d" => 60 * 60 * 24,
            unit => return Err(SlaError::InvalidDuration(format!("unknown unit: {}", unit))),
        };
        seconds = number
            .checked_mul(unit_seconds)
            .and_then(|s| seconds.checked_add(s))
            .ok_or_else(|| SlaError::InvalidDuration(format!("out of range: {}", duration_str)))?;
    }

    if seconds <= 0 {
        return Err(SlaError::InvalidDuration(format!(
            "{}: duration must be greater than 0",
            duration_str
        )));
    }

    Duration::try_seconds(seconds)
        .ok_or_else(|| SlaError::InvalidDuration(format!("out of range: {}", duration_str)))
}

/// Human readable form such as "2 hours 5 minutes", ignoring the sign.
pub fn format_duration(duration: Duration) -> String {
    let total_minutes = duration.num_minutes().abs();
    let days = total_minutes / (60 * 24);
    let hours = (total_minutes % (60 * 24)) / 60;
    let minutes = total_minutes % 60;

    let mut parts = Vec::new();
    for (value, unit) in [(days, "day"), (hours, "hour"), (minutes, "minute")] {
        match value {
            0 => {}
            1 => parts.push(format!("1 {}", unit)),
            n => parts.push(format!("{} {}s", n, unit)),
        }
    }

    if parts.is_empty() {
        "less than a minute".to_string()
    } else {
        parts.join(" ")
    }
}
