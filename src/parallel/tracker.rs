//! Thread-safe state tracking for the worker pool
//!
//! Contains GlobalTracker, which merges per-worker statistics and counts
//! finished workers, and WorkerGuard, which owns a worker's end of the
//! hand-off queue.

use crossbeam_channel::Sender;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Instant;

use crate::stats::MergeStats;

#[derive(Clone)]
pub(crate) struct GlobalTracker {
    stats: Arc<Mutex<MergeStats>>,
    finished: Arc<AtomicUsize>,
    workers: usize,
    start_time: Instant,
}

impl GlobalTracker {
    pub fn new(workers: usize) -> Self {
        Self {
            stats: Arc::new(Mutex::new(MergeStats::new())),
            finished: Arc::new(AtomicUsize::new(0)),
            workers,
            start_time: Instant::now(),
        }
    }

    /// Lock merged stats with poison recovery
    fn lock_stats(&self) -> MutexGuard<'_, MergeStats> {
        match self.stats.lock() {
            Ok(guard) => guard,
            Err(poisoned) => {
                tracing::warn!("worker thread panicked, recovering merge stats");
                poisoned.into_inner()
            }
        }
    }

    /// Fold one worker's local counters into the totals
    pub fn merge_worker_stats(&self, worker_stats: &MergeStats) {
        self.lock_stats().merge(worker_stats);
    }

    /// Hand a worker its sender; dropping the guard marks the worker finished
    pub fn worker_guard(&self, worker_id: usize, records: Sender<Vec<u8>>) -> WorkerGuard {
        WorkerGuard {
            worker_id,
            records: Some(records),
            tracker: self.clone(),
        }
    }

    pub fn finished_workers(&self) -> usize {
        self.finished.load(Ordering::SeqCst)
    }

    pub fn all_finished(&self) -> bool {
        self.finished_workers() == self.workers
    }

    /// Final totals with the elapsed time filled in
    pub fn get_final_stats(&self) -> MergeStats {
        let mut stats = self.lock_stats().clone();
        stats.elapsed = self.start_time.elapsed();
        stats
    }

    fn finish_worker(&self, worker_id: usize) {
        let finished = self.finished.fetch_add(1, Ordering::SeqCst) + 1;
        tracing::debug!(worker = worker_id, finished, total = self.workers, "worker finished");
        if finished == self.workers {
            tracing::debug!("all workers finished, hand-off queue closed");
        }
    }
}

/// A worker's handle on the hand-off queue
///
/// Dropping it (normal return, early exit or panic) releases the sender
/// before the finished count is bumped, so the queue is closed once the last
/// worker has been counted.
pub(crate) struct WorkerGuard {
    worker_id: usize,
    records: Option<Sender<Vec<u8>>>,
    tracker: GlobalTracker,
}

impl WorkerGuard {
    pub fn records(&self) -> Option<&Sender<Vec<u8>>> {
        self.records.as_ref()
    }
}

impl Drop for WorkerGuard {
    fn drop(&mut self) {
        self.records.take();
        self.tracker.finish_worker(self.worker_id);
    }
}
