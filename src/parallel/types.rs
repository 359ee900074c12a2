//! Type definitions for the worker pool

use crossbeam_channel::Sender;
use std::sync::Arc;

use crate::error::MergeError;
use crate::platform::CancelSignal;
use crate::source::Source;
use crate::strategy::FilterStrategy;

/// Default capacity of the hand-off queue, in records
pub const DEFAULT_QUEUE_SIZE: usize = 1024;

/// Configuration for the worker pool
#[derive(Debug, Clone)]
pub struct ParallelConfig {
    pub num_workers: usize,
    /// Capacity of the bounded hand-off queue; producers block when it is full
    pub queue_size: usize,
}

impl Default for ParallelConfig {
    fn default() -> Self {
        Self {
            num_workers: num_cpus::get(),
            queue_size: DEFAULT_QUEUE_SIZE,
        }
    }
}

/// One source waiting for a worker
#[derive(Debug)]
pub(crate) struct SourceJob {
    pub ordinal: usize,
    pub source: Source,
}

/// Shared, read-only state every worker gets a clone of
#[derive(Clone)]
pub(crate) struct WorkerContext {
    pub filter: Option<Arc<dyn FilterStrategy>>,
    pub cancel: CancelSignal,
    pub errors: Sender<MergeError>,
}
