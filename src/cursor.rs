use std::io::BufRead;
use std::sync::Arc;

use crate::error::{MergeError, Result};
use crate::strategy::{Action, FilterStrategy, TimeStrategy};

/// Per-source read position: holds the next accepted record not yet emitted
///
/// While the cursor is not exhausted, `record()` and `key()` describe a record
/// that passed both the time strategy and the filter. `advance()` replaces
/// them with the next accepted record or marks the cursor exhausted.
pub struct RecordCursor {
    label: String,
    ordinal: usize,
    reader: Box<dyn BufRead + Send>,
    time: Option<Arc<dyn TimeStrategy>>,
    filter: Option<Arc<dyn FilterStrategy>>,
    raw: Vec<u8>,
    record: Vec<u8>,
    key: i64,
    exhausted: bool,
    records_read: u64,
    records_skipped: u64,
}

impl RecordCursor {
    /// Cursor whose records are keyed by `time` (ordered merges)
    pub fn new(
        label: impl Into<String>,
        ordinal: usize,
        reader: Box<dyn BufRead + Send>,
        time: Arc<dyn TimeStrategy>,
        filter: Option<Arc<dyn FilterStrategy>>,
    ) -> Self {
        Self::build(label.into(), ordinal, reader, Some(time), filter)
    }

    /// Cursor that accepts records without extracting a key (unordered merges)
    pub fn unkeyed(
        label: impl Into<String>,
        ordinal: usize,
        reader: Box<dyn BufRead + Send>,
        filter: Option<Arc<dyn FilterStrategy>>,
    ) -> Self {
        Self::build(label.into(), ordinal, reader, None, filter)
    }

    fn build(
        label: String,
        ordinal: usize,
        reader: Box<dyn BufRead + Send>,
        time: Option<Arc<dyn TimeStrategy>>,
        filter: Option<Arc<dyn FilterStrategy>>,
    ) -> Self {
        Self {
            label,
            ordinal,
            reader,
            time,
            filter,
            raw: Vec::new(),
            record: Vec::new(),
            key: 0,
            exhausted: false,
            records_read: 0,
            records_skipped: 0,
        }
    }

    pub fn label(&self) -> &str {
        &self.label
    }

    /// Position of the source in the input list
    pub fn ordinal(&self) -> usize {
        self.ordinal
    }

    pub fn key(&self) -> i64 {
        self.key
    }

    /// Current record without its terminator (empty once exhausted)
    pub fn record(&self) -> &[u8] {
        &self.record
    }

    /// Move the current record out, leaving an empty buffer behind
    pub fn take_record(&mut self) -> Vec<u8> {
        std::mem::take(&mut self.record)
    }

    pub fn is_exhausted(&self) -> bool {
        self.exhausted
    }

    pub fn records_read(&self) -> u64 {
        self.records_read
    }

    pub fn records_skipped(&self) -> u64 {
        self.records_skipped
    }

    /// Pull raw records until one is accepted or the stream ends
    ///
    /// A `Stop` from either strategy is returned as `HandlerAbort` and leaves
    /// the cursor un-exhausted; the caller decides how far the abort reaches.
    pub fn advance(&mut self) -> Result<()> {
        loop {
            if !self.read_raw()? {
                self.exhausted = true;
                self.record.clear();
                return Ok(());
            }
            self.records_read += 1;

            let key = match &self.time {
                Some(time) => match time.extract(&self.raw) {
                    Action::Accept(key) => key,
                    Action::Skip => {
                        self.records_skipped += 1;
                        continue;
                    }
                    Action::Stop(cause) => return Err(MergeError::abort(&self.label, cause)),
                },
                None => 0,
            };

            let raw = std::mem::take(&mut self.raw);
            let accepted = match &self.filter {
                Some(filter) => match filter.filter(&self.label, raw) {
                    Action::Accept(bytes) => bytes,
                    Action::Skip => {
                        self.records_skipped += 1;
                        continue;
                    }
                    Action::Stop(cause) => return Err(MergeError::abort(&self.label, cause)),
                },
                None => raw,
            };

            // The old record buffer becomes the next scratch buffer.
            self.raw = std::mem::replace(&mut self.record, accepted);
            self.key = key;
            return Ok(());
        }
    }

    /// Read one line into `raw` without its `\n` / `\r\n` terminator
    fn read_raw(&mut self) -> Result<bool> {
        self.raw.clear();
        let read = self
            .reader
            .read_until(b'\n', &mut self.raw)
            .map_err(|e| MergeError::source_access(&self.label, e))?;
        if read == 0 {
            return Ok(false);
        }
        if self.raw.last() == Some(&b'\n') {
            self.raw.pop();
            if self.raw.last() == Some(&b'\r') {
                self.raw.pop();
            }
        }
        Ok(true)
    }
}
