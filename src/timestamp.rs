//! Built-in time strategies for lines that start with a timestamp

use anyhow::anyhow;
use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use std::sync::Mutex;

use crate::strategy::{Action, TimeStrategy};

/// Layout of nginx error logs (`2020/01/18 12:20:30 [error] ...`)
pub const DEFAULT_TIME_FORMAT: &str = "%Y/%m/%d %H:%M:%S";

/// Unit of the sort keys produced by the built-in strategies
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TimeResolution {
    #[default]
    Seconds,
    Millis,
}

impl TimeResolution {
    fn key(self, dt: DateTime<Utc>) -> i64 {
        match self {
            TimeResolution::Seconds => dt.timestamp(),
            TimeResolution::Millis => dt.timestamp_millis(),
        }
    }
}

/// What to do with a line whose timestamp cannot be parsed
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum BadTimePolicy {
    #[default]
    Skip,
    Stop,
}

/// Parses a timestamp in a fixed chrono layout at the start of each line
///
/// Layouts without an offset are read as UTC. Date-only layouts give
/// midnight.
#[derive(Debug, Clone)]
pub struct TimePrefix {
    format: String,
    resolution: TimeResolution,
    on_bad: BadTimePolicy,
}

impl TimePrefix {
    pub fn new(format: impl Into<String>) -> Self {
        Self {
            format: format.into(),
            resolution: TimeResolution::default(),
            on_bad: BadTimePolicy::default(),
        }
    }

    pub fn with_resolution(mut self, resolution: TimeResolution) -> Self {
        self.resolution = resolution;
        self
    }

    pub fn with_bad_time_policy(mut self, on_bad: BadTimePolicy) -> Self {
        self.on_bad = on_bad;
        self
    }

    pub fn format(&self) -> &str {
        &self.format
    }
}

impl Default for TimePrefix {
    fn default() -> Self {
        Self::new(DEFAULT_TIME_FORMAT)
    }
}

impl TimeStrategy for TimePrefix {
    fn extract(&self, record: &[u8]) -> Action<i64> {
        let text = utf8_prefix(record);
        match parse_leading(text, &self.format) {
            Some(dt) => Action::Accept(self.resolution.key(dt)),
            None => bad_time(self.on_bad, text, &self.format),
        }
    }
}

/// Tries a list of common layouts, moving the last successful one to the front
///
/// Files usually stick to one layout, so after the first hit almost every
/// line parses on the first attempt. Also understands a leading Unix
/// timestamp (10 or 13 digits) and RFC 3339.
pub struct AdaptiveTimestamp {
    formats: Mutex<Vec<String>>,
    resolution: TimeResolution,
    on_bad: BadTimePolicy,
}

impl AdaptiveTimestamp {
    pub fn new() -> Self {
        Self {
            formats: Mutex::new(initial_formats()),
            resolution: TimeResolution::default(),
            on_bad: BadTimePolicy::default(),
        }
    }

    pub fn with_resolution(mut self, resolution: TimeResolution) -> Self {
        self.resolution = resolution;
        self
    }

    pub fn with_bad_time_policy(mut self, on_bad: BadTimePolicy) -> Self {
        self.on_bad = on_bad;
        self
    }

    /// Current format ordering (most recently successful first)
    pub fn format_ordering(&self) -> Vec<String> {
        match self.formats.lock() {
            Ok(formats) => formats.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }

    fn parse(&self, text: &str) -> Option<DateTime<Utc>> {
        let first_token = text
            .trim_start_matches('[')
            .split(|c: char| c.is_whitespace() || c == ']')
            .next()
            .unwrap_or("");

        if !first_token.is_empty() && first_token.bytes().all(|b| b.is_ascii_digit()) {
            if let Some(dt) = parse_unix_timestamp(first_token) {
                return Some(dt);
            }
        }
        if let Ok(dt) = DateTime::parse_from_rfc3339(first_token) {
            return Some(dt.with_timezone(&Utc));
        }

        let mut formats = match self.formats.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        let hit = formats
            .iter()
            .enumerate()
            .find_map(|(index, format)| parse_leading(text, format).map(|dt| (index, dt)));

        let (index, dt) = hit?;
        if index > 0 {
            let format = formats.remove(index);
            formats.insert(0, format);
        }
        Some(dt)
    }
}

impl Default for AdaptiveTimestamp {
    fn default() -> Self {
        Self::new()
    }
}

impl TimeStrategy for AdaptiveTimestamp {
    fn extract(&self, record: &[u8]) -> Action<i64> {
        let text = utf8_prefix(record);
        match self.parse(text) {
            Some(dt) => Action::Accept(self.resolution.key(dt)),
            None => bad_time(self.on_bad, text, "any known layout"),
        }
    }
}

fn bad_time(on_bad: BadTimePolicy, text: &str, format: &str) -> Action<i64> {
    match on_bad {
        BadTimePolicy::Skip => {
            tracing::trace!(line = text, format, "no leading timestamp, skipping line");
            Action::Skip
        }
        BadTimePolicy::Stop => Action::Stop(anyhow!(
            "line has no leading timestamp matching {}: {:?}",
            format,
            truncate_for_message(text)
        )),
    }
}

/// Longest valid UTF-8 prefix of a record
fn utf8_prefix(record: &[u8]) -> &str {
    match std::str::from_utf8(record) {
        Ok(text) => text,
        Err(e) => std::str::from_utf8(&record[..e.valid_up_to()]).unwrap_or_default(),
    }
}

fn truncate_for_message(text: &str) -> &str {
    match text.char_indices().nth(80) {
        Some((idx, _)) => &text[..idx],
        None => text,
    }
}

/// Parse a timestamp at the start of `text`, ignoring whatever follows it
pub fn parse_leading(text: &str, format: &str) -> Option<DateTime<Utc>> {
    let text = text.strip_prefix('[').unwrap_or(text);

    if let Ok((dt, _)) = DateTime::parse_and_remainder(text, format) {
        return Some(dt.with_timezone(&Utc));
    }
    if let Ok((naive, _)) = NaiveDateTime::parse_and_remainder(text, format) {
        return Some(naive.and_utc());
    }
    if let Ok((date, _)) = NaiveDate::parse_and_remainder(text, format) {
        return date.and_hms_opt(0, 0, 0).map(|naive| naive.and_utc());
    }
    None
}

/// Detect Unix timestamp precision by string length
fn parse_unix_timestamp(ts_str: &str) -> Option<DateTime<Utc>> {
    let value = ts_str.parse::<i64>().ok()?;
    match ts_str.len() {
        10 => DateTime::from_timestamp(value, 0),
        13 => DateTime::from_timestamp_millis(value),
        _ => None,
    }
}

/// Ordered by likelihood, with most common formats first
fn initial_formats() -> Vec<String> {
    [
        "%Y-%m-%dT%H:%M:%S%.f%:z",
        "%Y-%m-%dT%H:%M:%S%.fZ",
        "%Y-%m-%dT%H:%M:%S%.f",
        "%Y-%m-%d %H:%M:%S,%3f",
        "%Y-%m-%d %H:%M:%S%.f%z",
        "%Y-%m-%d %H:%M:%S%.f",
        "%Y/%m/%d %H:%M:%S",
        "%d/%b/%Y:%H:%M:%S %z",
        "%b %d %Y %H:%M:%S",
        "%m/%d/%Y %H:%M:%S",
        "%d.%m.%Y %H:%M:%S",
        "%y%m%d %H:%M:%S",
        "%a %b %d %H:%M:%S %Y",
    ]
    .iter()
    .map(|format| format.to_string())
    .collect()
}
