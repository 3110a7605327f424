use anyhow::{Context, Result, bail};
use regex::Regex;
use serde::Serialize;
use std::sync::OnceLock;

/// Duration as carried in every payload: canonical seconds plus a display label.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct TimeAmount {
    pub seconds: u64,
    pub display: DisplayLabel,
}

impl TimeAmount {
    pub fn from_seconds(seconds: u64) -> Self {
        Self {
            seconds,
            display: DisplayLabel(seconds),
        }
    }

    pub fn from_signed(seconds: i64) -> Self {
        Self::from_seconds(seconds.max(0) as u64)
    }

    pub fn display_text(&self) -> String {
        format_duration_seconds(self.seconds)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DisplayLabel(u64);

impl Serialize for DisplayLabel {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&format_duration_seconds(self.0))
    }
}

pub fn format_duration_seconds(seconds: u64) -> String {
    let hours = seconds / 3600;
    let minutes = (seconds % 3600) / 60;
    let remain_seconds = seconds % 60;

    if hours > 0 {
        if remain_seconds == 0 {
            format!("{hours}h {minutes}m")
        } else {
            format!("{hours}h {minutes}m {remain_seconds}s")
        }
    } else if minutes > 0 {
        if remain_seconds == 0 {
            format!("{minutes}m")
        } else {
            format!("{minutes}m {remain_seconds}s")
        }
    } else {
        format!("{remain_seconds}s")
    }
}

pub fn sec_to_min(seconds: i64) -> u64 {
    seconds.max(0) as u64 / 60
}

fn unit_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(r"(?i)(\d+(?:\.\d+)?)\s*(hours|hour|hrs|hr|h|minutes|minute|mins|min|m|seconds|second|secs|sec|s)")
            .unwrap_or_else(|error| panic!("invalid duration pattern: {error}"))
    })
}

fn clock_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(r"^(\d{1,2}):(\d{2})$")
            .unwrap_or_else(|error| panic!("invalid clock pattern: {error}"))
    })
}

/// Parses human duration labels such as `4hrs`, `8.5hrs`, `1h 30m`, `45mins` or `08:30`.
pub fn parse_duration_label(raw: &str) -> Result<u64> {
    let value = raw.trim();
    if value.is_empty() {
        bail!("Duration label is empty");
    }

    if let Some(captures) = clock_pattern().captures(value) {
        let hours = captures[1].parse::<u64>().context("Invalid hour value")?;
        let minutes = captures[2].parse::<u64>().context("Invalid minute value")?;
        if minutes >= 60 {
            bail!("Invalid duration label: {value}. Minutes must be below 60");
        }
        return Ok(hours * 3600 + minutes * 60);
    }

    let mut total = 0.0_f64;
    let mut matched = 0_usize;

    for captures in unit_pattern().captures_iter(value) {
        let amount = captures[1]
            .parse::<f64>()
            .with_context(|| format!("Invalid duration amount in: {value}"))?;
        let multiplier = match captures[2].to_lowercase().chars().next() {
            Some('h') => 3600.0,
            Some('m') => 60.0,
            _ => 1.0,
        };
        total += amount * multiplier;
        matched += captures[0].chars().filter(|ch| !ch.is_whitespace()).count();
    }

    let significant = value.chars().filter(|ch| !ch.is_whitespace()).count();
    if matched == 0 || matched != significant {
        bail!("Invalid duration label: {value}. Examples: 8hrs, 8.5hrs, 1h 30m, 08:30");
    }

    Ok(total.round() as u64)
}
