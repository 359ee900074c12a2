//! Worker thread for the unordered merge

use crossbeam_channel::{select, Receiver, Sender};

use crate::cursor::RecordCursor;
use crate::error::MergeError;
use crate::stats::MergeStats;

use super::tracker::WorkerGuard;
use super::types::{SourceJob, WorkerContext};

/// How a worker stopped draining one source
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum SourceOutcome {
    Drained,
    Failed,
    Cancelled,
    WriterGone,
}

/// Worker thread: takes jobs until none are left or the run is cancelled
///
/// Returns the worker's local counters; the pool merges them at join time.
pub(crate) fn worker_thread(
    worker_id: usize,
    jobs: Receiver<SourceJob>,
    guard: WorkerGuard,
    ctx: WorkerContext,
) -> MergeStats {
    let mut stats = MergeStats::new();
    let Some(records) = guard.records() else {
        return stats;
    };

    while !ctx.cancel.is_cancelled() {
        let job = match jobs.recv() {
            Ok(job) => job,
            Err(_) => break,
        };

        match drain_source(worker_id, job, records, &ctx, &mut stats) {
            SourceOutcome::Drained | SourceOutcome::Failed => {}
            SourceOutcome::Cancelled => {
                stats.cancelled = true;
                break;
            }
            SourceOutcome::WriterGone => {
                tracing::debug!(worker = worker_id, "writer stopped, worker exiting");
                break;
            }
        }
    }

    stats
}

fn drain_source(
    worker_id: usize,
    job: SourceJob,
    records: &Sender<Vec<u8>>,
    ctx: &WorkerContext,
    stats: &mut MergeStats,
) -> SourceOutcome {
    let (label, stream) = job.source.open();
    let reader = match stream {
        Ok(reader) => reader,
        Err(e) => {
            stats.sources_failed += 1;
            report(ctx, MergeError::source_access(&label, e));
            return SourceOutcome::Failed;
        }
    };
    tracing::debug!(worker = worker_id, source = %label, "draining source");

    let mut cursor = RecordCursor::unkeyed(label, job.ordinal, reader, ctx.filter.clone());
    let outcome = loop {
        if ctx.cancel.is_cancelled() {
            break SourceOutcome::Cancelled;
        }
        if let Err(e) = cursor.advance() {
            stats.sources_failed += 1;
            report(ctx, e);
            break SourceOutcome::Failed;
        }
        if cursor.is_exhausted() {
            break SourceOutcome::Drained;
        }

        let record = cursor.take_record();
        select! {
            send(records, record) -> res => {
                if res.is_err() {
                    break SourceOutcome::WriterGone;
                }
            }
            recv(ctx.cancel.watch()) -> _ => break SourceOutcome::Cancelled,
        }
    };

    stats.add_cursor(&cursor);
    tracing::debug!(
        worker = worker_id,
        source = cursor.label(),
        ?outcome,
        read = cursor.records_read(),
        "source done"
    );
    outcome
}

/// Hand a per-source failure to the caller's error sink
fn report(ctx: &WorkerContext, err: MergeError) {
    tracing::debug!(source = err.source_label().unwrap_or("?"), error = %err, "source failed");
    if ctx.errors.send(err).is_err() {
        tracing::warn!("error sink closed, dropping source error");
    }
}
