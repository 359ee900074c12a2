//! Globally time-ordered merge
//!
//! Every source gets a [`RecordCursor`] that is primed once and then kept in
//! the [`Frontier`]. Each step emits the smallest pending record and advances
//! only the cursor it came from, so no source is ever buffered beyond its
//! current record.

use std::io::Write;
use std::sync::Arc;
use std::time::Instant;

use crate::cursor::RecordCursor;
use crate::destination::{describe_target, write_record};
use crate::error::{MergeError, Result};
use crate::frontier::Frontier;
use crate::platform::CancelSignal;
use crate::source::Source;
use crate::stats::MergeStats;
use crate::strategy::{FilterStrategy, TimeStrategy};

pub struct OrderedMerger {
    time: Arc<dyn TimeStrategy>,
    filter: Option<Arc<dyn FilterStrategy>>,
    cancel: Option<CancelSignal>,
    target: String,
}

impl OrderedMerger {
    pub fn new(time: Arc<dyn TimeStrategy>) -> Self {
        Self {
            time,
            filter: None,
            cancel: None,
            target: describe_target(None),
        }
    }

    pub fn with_filter(mut self, filter: Option<Arc<dyn FilterStrategy>>) -> Self {
        self.filter = filter;
        self
    }

    /// Stop between records once `cancel` fires
    pub fn with_cancel(mut self, cancel: CancelSignal) -> Self {
        self.cancel = Some(cancel);
        self
    }

    /// Name of the output used in `Destination` errors
    pub fn with_target(mut self, target: impl Into<String>) -> Self {
        self.target = target.into();
        self
    }

    /// Merge `sources` into `output`
    ///
    /// On error, `output` holds exactly the records flushed before the failing
    /// step. Records that sibling cursors had already read ahead are dropped.
    pub fn run<W: Write + ?Sized>(
        &self,
        sources: Vec<Source>,
        output: &mut W,
    ) -> Result<MergeStats> {
        self.prime(sources)?.drain(output)
    }

    /// Open and prime every source without touching any output
    ///
    /// Any open or priming failure is returned here, so a caller can defer
    /// creating the destination until every source is known to be readable.
    pub fn prime(&self, sources: Vec<Source>) -> Result<PrimedMerge<'_>> {
        let started = Instant::now();
        let mut stats = MergeStats {
            sources: sources.len(),
            ..Default::default()
        };
        let mut frontier = Frontier::with_capacity(sources.len());

        for (ordinal, source) in sources.into_iter().enumerate() {
            if self.is_cancelled() {
                return Err(MergeError::Cancelled);
            }

            let (label, stream) = source.open();
            let reader = stream.map_err(|e| MergeError::source_access(&label, e))?;
            let mut cursor = RecordCursor::new(
                label,
                ordinal,
                reader,
                Arc::clone(&self.time),
                self.filter.clone(),
            );

            cursor.advance()?;
            if cursor.is_exhausted() {
                tracing::debug!(source = cursor.label(), "source has no accepted records");
                stats.add_cursor(&cursor);
            } else {
                frontier.insert(cursor);
            }
        }

        tracing::debug!(active = frontier.len(), "frontier primed");
        Ok(PrimedMerge {
            merger: self,
            frontier,
            stats,
            started,
        })
    }

    fn is_cancelled(&self) -> bool {
        self.cancel.as_ref().is_some_and(|c| c.is_cancelled())
    }
}

/// Primed sources waiting to be drained into an output
pub struct PrimedMerge<'a> {
    merger: &'a OrderedMerger,
    frontier: Frontier,
    stats: MergeStats,
    started: Instant,
}

impl PrimedMerge<'_> {
    /// Emit every pending record in key order
    pub fn drain<W: Write + ?Sized>(mut self, output: &mut W) -> Result<MergeStats> {
        let stats = &mut self.stats;

        while let Some(mut cursor) = self.frontier.extract_min() {
            if self.merger.is_cancelled() {
                tracing::info!(written = stats.records_written, "ordered merge cancelled");
                return Err(MergeError::Cancelled);
            }

            write_record(output, cursor.record())
                .map_err(|e| MergeError::destination(&self.merger.target, e))?;
            stats.records_written += 1;

            cursor.advance()?;
            if cursor.is_exhausted() {
                tracing::debug!(source = cursor.label(), "source drained");
                stats.add_cursor(&cursor);
            } else {
                self.frontier.insert(cursor);
            }
        }

        stats.elapsed = self.started.elapsed();
        tracing::info!(
            sources = stats.sources,
            written = stats.records_written,
            skipped = stats.records_skipped,
            "ordered merge finished"
        );
        Ok(self.stats)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::strategy::Action;
    use anyhow::anyhow;
    use std::io::{self, Cursor};

    /// Key is the number between `[T` and `]`
    fn bracket_time() -> Arc<dyn TimeStrategy> {
        Arc::new(|line: &[u8]| -> Action<i64> {
            let text = std::str::from_utf8(line).unwrap_or("");
            match text
                .strip_prefix("[T")
                .and_then(|rest| rest.split(']').next())
                .and_then(|n| n.parse::<i64>().ok())
            {
                Some(key) => Action::Accept(key),
                None => Action::Skip,
            }
        })
    }

    fn mem(label: &str, text: &str) -> Source {
        Source::from_reader(label, Cursor::new(text.as_bytes().to_vec()))
    }

    fn merged(sources: Vec<Source>) -> String {
        let mut out = Vec::new();
        OrderedMerger::new(bracket_time()).run(sources, &mut out).unwrap();
        String::from_utf8(out).unwrap()
    }

    #[test]
    fn test_interleaves_two_sources() {
        let out = merged(vec![
            mem("s1", "[T0] A\n[T2] B\n"),
            mem("s2", "[T1] C\n[T3] D\n"),
        ]);
        assert_eq!(out, "[T0] A\n[T1] C\n[T2] B\n[T3] D\n");
    }

    #[test]
    fn test_no_sources_and_empty_sources() {
        assert_eq!(merged(Vec::new()), "");
        assert_eq!(merged(vec![mem("a", ""), mem("b", "")]), "");
    }

    #[test]
    fn test_equal_keys_follow_source_order() {
        let out = merged(vec![
            mem("s1", "[T5] first\n"),
            mem("s2", "[T5] second\n"),
            mem("s3", "[T4] zeroth\n[T5] third\n"),
        ]);
        assert_eq!(out, "[T4] zeroth\n[T5] first\n[T5] second\n[T5] third\n");
    }

    #[test]
    fn test_stats_count_every_source() {
        let mut out = Vec::new();
        let stats = OrderedMerger::new(bracket_time())
            .run(vec![mem("a", "[T1] x\nnoise\n"), mem("b", "")], &mut out)
            .unwrap();
        assert_eq!(stats.sources, 2);
        assert_eq!(stats.records_read, 2);
        assert_eq!(stats.records_skipped, 1);
        assert_eq!(stats.records_written, 1);
    }

    #[test]
    fn test_stop_keeps_flushed_prefix() {
        let time: Arc<dyn TimeStrategy> = Arc::new(|line: &[u8]| -> Action<i64> {
            if line.ends_with(b"halt") {
                return Action::Stop(anyhow!("test for stop"));
            }
            Action::Accept(line[0] as i64)
        });
        let mut out = Vec::new();
        let err = OrderedMerger::new(time)
            .run(vec![mem("a", "1\n3 halt\n"), mem("b", "2\n4\n")], &mut out)
            .unwrap_err();

        assert_eq!(err.abort_cause().unwrap().to_string(), "test for stop");
        assert_eq!(String::from_utf8(out).unwrap(), "1\n");
    }

    #[test]
    fn test_priming_failure_writes_nothing() {
        let broken =
            Source::from_fn("broken", || Err(io::Error::new(io::ErrorKind::NotFound, "gone")));
        let mut out = Vec::new();
        let err = OrderedMerger::new(bracket_time())
            .run(vec![mem("ok", "[T1] a\n"), broken], &mut out)
            .unwrap_err();

        assert!(matches!(err, MergeError::SourceAccess { ref label, .. } if label == "broken"));
        assert!(out.is_empty());
    }

    #[test]
    fn test_prime_reports_unreadable_source_before_output_exists() {
        let merger = OrderedMerger::new(bracket_time());
        let broken = Source::from_fn("typo.log", || {
            Err(io::Error::new(io::ErrorKind::NotFound, "No such file"))
        });
        let err = merger.prime(vec![mem("a", "[T1] a\n"), broken]).err().unwrap();
        assert!(matches!(err, MergeError::SourceAccess { ref label, .. } if label == "typo.log"));

        let primed = merger.prime(vec![mem("a", "[T2] b\n"), mem("b", "[T1] a\n")]).unwrap();
        let mut out = Vec::new();
        let stats = primed.drain(&mut out).unwrap();
        assert_eq!(String::from_utf8(out).unwrap(), "[T1] a\n[T2] b\n");
        assert_eq!(stats.records_written, 2);
    }

    #[test]
    fn test_cancelled_before_start() {
        let cancel = CancelSignal::new();
        cancel.cancel();
        let mut out = Vec::new();
        let err = OrderedMerger::new(bracket_time())
            .with_cancel(cancel)
            .run(vec![mem("a", "[T1] a\n")], &mut out)
            .unwrap_err();
        assert!(matches!(err, MergeError::Cancelled));
        assert!(out.is_empty());
    }

    struct FailingWriter;

    impl Write for FailingWriter {
        fn write(&mut self, _buf: &[u8]) -> io::Result<usize> {
            Err(io::Error::other("disk full"))
        }
        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    #[test]
    fn test_write_failure_is_destination_error() {
        let err = OrderedMerger::new(bracket_time())
            .with_target("merged.log")
            .run(vec![mem("a", "[T1] a\n")], &mut FailingWriter)
            .unwrap_err();
        assert!(matches!(
            err,
            MergeError::Destination { ref target, .. } if target == "merged.log"
        ));
    }
}
