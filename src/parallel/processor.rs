//! Main worker pool
//!
//! Contains the UnorderedWorkerPool struct that orchestrates the concurrent
//! merge.

use crossbeam_channel::{bounded, Sender};
use std::io::Write;
use std::sync::Arc;
use std::thread;

use crate::destination::describe_target;
use crate::error::{MergeError, Result};
use crate::platform::CancelSignal;
use crate::source::Source;
use crate::stats::MergeStats;
use crate::strategy::FilterStrategy;

use super::sink::writer_loop;
use super::tracker::GlobalTracker;
use super::types::{ParallelConfig, SourceJob, WorkerContext};
use super::worker::worker_thread;

/// Drains sources concurrently into one output, without cross-source order
///
/// Per-source failures (open errors, read errors, filter `Stop`) are sent to
/// the error sink and only end that source. Setting an error sink is
/// mandatory. Use an unbounded channel or drain it while the pool runs,
/// since workers block on a full sink.
pub struct UnorderedWorkerPool {
    config: ParallelConfig,
    filter: Option<Arc<dyn FilterStrategy>>,
    cancel: CancelSignal,
    errors: Option<Sender<MergeError>>,
    target: String,
}

impl UnorderedWorkerPool {
    pub fn new(config: ParallelConfig) -> Self {
        Self {
            config,
            filter: None,
            cancel: CancelSignal::new(),
            errors: None,
            target: describe_target(None),
        }
    }

    pub fn with_filter(mut self, filter: Option<Arc<dyn FilterStrategy>>) -> Self {
        self.filter = filter;
        self
    }

    pub fn with_cancel(mut self, cancel: CancelSignal) -> Self {
        self.cancel = cancel;
        self
    }

    pub fn with_error_sink(mut self, errors: Sender<MergeError>) -> Self {
        self.errors = Some(errors);
        self
    }

    /// Name of the output used in `Destination` errors
    pub fn with_target(mut self, target: impl Into<String>) -> Self {
        self.target = target.into();
        self
    }

    /// Reject configurations that cannot run, before any thread is started
    pub fn validate(&self) -> Result<()> {
        if self.errors.is_none() {
            return Err(missing_error_sink());
        }
        if self.config.num_workers == 0 {
            return Err(MergeError::Configuration(
                "worker count must be at least 1".to_string(),
            ));
        }
        if self.config.queue_size == 0 {
            return Err(MergeError::Configuration(
                "hand-off queue size must be at least 1".to_string(),
            ));
        }
        Ok(())
    }

    /// Merge `sources` into `output` using the worker pool
    ///
    /// Returns once every worker has been joined. A failing write to `output`
    /// stops the workers and is returned as `MergeError::Destination`.
    pub fn run<W: Write + ?Sized>(
        &self,
        sources: Vec<Source>,
        output: &mut W,
    ) -> Result<MergeStats> {
        self.validate()?;
        let errors = self.errors.clone().ok_or_else(missing_error_sink)?;

        let total = sources.len();
        if total == 0 {
            return Ok(MergeStats::new());
        }
        let workers = self.config.num_workers.min(total);

        let (job_sender, job_receiver) = bounded(total);
        for (ordinal, source) in sources.into_iter().enumerate() {
            job_sender
                .send(SourceJob { ordinal, source })
                .map_err(|_| MergeError::Configuration("job queue closed".to_string()))?;
        }
        drop(job_sender);

        let (record_sender, record_receiver) = bounded(self.config.queue_size);
        let tracker = GlobalTracker::new(workers);
        let ctx = WorkerContext {
            filter: self.filter.clone(),
            cancel: self.cancel.clone(),
            errors,
        };

        tracing::info!(
            workers,
            sources = total,
            queue = self.config.queue_size,
            "unordered merge started"
        );

        let handles: Vec<_> = (0..workers)
            .map(|worker_id| {
                let guard = tracker.worker_guard(worker_id, record_sender.clone());
                let jobs = job_receiver.clone();
                let ctx = ctx.clone();
                thread::spawn(move || worker_thread(worker_id, jobs, guard, ctx))
            })
            .collect();

        // Only the workers' guards hold senders from here on.
        drop(record_sender);
        drop(job_receiver);
        drop(ctx);

        let written = writer_loop(record_receiver, output, &self.target, &self.cancel);

        for handle in handles {
            match handle.join() {
                Ok(worker_stats) => tracker.merge_worker_stats(&worker_stats),
                Err(_) => tracing::warn!("worker thread panicked"),
            }
        }
        debug_assert!(tracker.all_finished());

        let written = written?;
        let mut stats = tracker.get_final_stats();
        stats.sources = total;
        stats.records_written = written;
        stats.cancelled |= self.cancel.is_cancelled();

        tracing::info!(
            sources = stats.sources,
            failed = stats.sources_failed,
            written = stats.records_written,
            cancelled = stats.cancelled,
            "unordered merge finished"
        );
        Ok(stats)
    }
}

fn missing_error_sink() -> MergeError {
    MergeError::Configuration("unordered merge requires an error sink".to_string())
}
