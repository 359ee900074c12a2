//! Per-record strategies
//!
//! A [`TimeStrategy`] turns a raw record into a sort key, or rejects it. A
//! [`FilterStrategy`] runs after the time strategy accepted a record and may
//! rewrite or reject it. Plain closures implement both traits; stateful
//! adapters (regex filters, the adaptive timestamp parser) implement them
//! directly.

use regex::bytes::Regex;

/// Outcome of one strategy invocation
#[derive(Debug)]
pub enum Action<T> {
    /// Use the record, with the produced value (sort key or output bytes)
    Accept(T),
    /// Drop the record and move on to the next one from the same source
    Skip,
    /// Abort the source (and in ordered mode the whole merge) with this cause
    Stop(anyhow::Error),
}

impl<T> Action<T> {
    pub fn is_accept(&self) -> bool {
        matches!(self, Action::Accept(_))
    }
}

/// Extracts the sort key of a record
pub trait TimeStrategy: Send + Sync {
    fn extract(&self, record: &[u8]) -> Action<i64>;
}

/// Rewrites or rejects an accepted record
///
/// The record is handed over by value; returning it unchanged in
/// `Action::Accept` costs nothing.
pub trait FilterStrategy: Send + Sync {
    fn filter(&self, source: &str, record: Vec<u8>) -> Action<Vec<u8>>;
}

impl<F> TimeStrategy for F
where
    F: Fn(&[u8]) -> Action<i64> + Send + Sync,
{
    fn extract(&self, record: &[u8]) -> Action<i64> {
        self(record)
    }
}

impl<F> FilterStrategy for F
where
    F: Fn(&str, Vec<u8>) -> Action<Vec<u8>> + Send + Sync,
{
    fn filter(&self, source: &str, record: Vec<u8>) -> Action<Vec<u8>> {
        self(source, record)
    }
}

/// Keeps or drops records by regular expression
///
/// A record passes when it matches `keep` (if set) and does not match
/// `ignore` (if set).
#[derive(Debug, Clone, Default)]
pub struct LinePatternFilter {
    keep: Option<Regex>,
    ignore: Option<Regex>,
}

impl LinePatternFilter {
    pub fn new(keep: Option<&str>, ignore: Option<&str>) -> Result<Self, regex::Error> {
        Ok(Self {
            keep: keep.map(Regex::new).transpose()?,
            ignore: ignore.map(Regex::new).transpose()?,
        })
    }

    fn passes(&self, record: &[u8]) -> bool {
        if let Some(keep) = &self.keep {
            if !keep.is_match(record) {
                return false;
            }
        }
        match &self.ignore {
            Some(ignore) => !ignore.is_match(record),
            None => true,
        }
    }
}

impl FilterStrategy for LinePatternFilter {
    fn filter(&self, _source: &str, record: Vec<u8>) -> Action<Vec<u8>> {
        if self.passes(&record) {
            Action::Accept(record)
        } else {
            Action::Skip
        }
    }
}

/// Prefixes every record with `[label] `
#[derive(Debug, Clone, Copy, Default)]
pub struct SourceTagFilter;

impl FilterStrategy for SourceTagFilter {
    fn filter(&self, source: &str, record: Vec<u8>) -> Action<Vec<u8>> {
        let mut tagged = Vec::with_capacity(source.len() + 3 + record.len());
        tagged.push(b'[');
        tagged.extend_from_slice(source.as_bytes());
        tagged.extend_from_slice(b"] ");
        tagged.extend_from_slice(&record);
        Action::Accept(tagged)
    }
}

/// Runs filters in order; the first `Skip` or `Stop` wins
pub struct FilterChain {
    filters: Vec<Box<dyn FilterStrategy>>,
}

impl FilterChain {
    pub fn new() -> Self {
        Self {
            filters: Vec::new(),
        }
    }

    pub fn with(mut self, filter: impl FilterStrategy + 'static) -> Self {
        self.filters.push(Box::new(filter));
        self
    }

    pub fn is_empty(&self) -> bool {
        self.filters.is_empty()
    }
}

impl Default for FilterChain {
    fn default() -> Self {
        Self::new()
    }
}

impl FilterStrategy for FilterChain {
    fn filter(&self, source: &str, record: Vec<u8>) -> Action<Vec<u8>> {
        let mut current = record;
        for filter in &self.filters {
            match filter.filter(source, current) {
                Action::Accept(next) => current = next,
                other => return other,
            }
        }
        Action::Accept(current)
    }
}
