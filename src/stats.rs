use std::time::Duration;

use crate::cursor::RecordCursor;

/// Counters collected during one merge run
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MergeStats {
    pub sources: usize,
    pub sources_failed: usize,
    pub records_read: u64,
    pub records_skipped: u64,
    pub records_written: u64,
    pub cancelled: bool,
    pub elapsed: Duration,
}

impl MergeStats {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fold the read/skip counters of a drained cursor into the totals
    pub fn add_cursor(&mut self, cursor: &RecordCursor) {
        self.records_read += cursor.records_read();
        self.records_skipped += cursor.records_skipped();
    }

    /// Add another partial result (one worker's share) to this one
    pub fn merge(&mut self, other: &MergeStats) {
        self.sources += other.sources;
        self.sources_failed += other.sources_failed;
        self.records_read += other.records_read;
        self.records_skipped += other.records_skipped;
        self.records_written += other.records_written;
        self.cancelled |= other.cancelled;
    }

    /// True when every source was drained and nothing was cancelled
    pub fn is_complete(&self) -> bool {
        self.sources_failed == 0 && !self.cancelled
    }

    pub fn format_stats(&self) -> String {
        let mut output = format!(
            "Records merged: {} read, {} written, {} skipped",
            self.records_read, self.records_written, self.records_skipped
        );

        output.push_str(&format!(", {} sources", self.sources));
        if self.sources_failed > 0 {
            output.push_str(&format!(" ({} failed)", self.sources_failed));
        }

        let elapsed_ms = self.elapsed.as_millis();
        output.push_str(&format!(" in {}ms", elapsed_ms));

        if elapsed_ms > 0 && self.records_written > 0 {
            let per_sec = (self.records_written as f64 * 1000.0) / elapsed_ms as f64;
            output.push_str(&format!(" ({:.0} records/s)", per_sec));
        }

        if self.cancelled {
            output.push_str(", cancelled");
        }

        output
    }
}
