//! Unordered, concurrent merge
//!
//! Sources are drained by a fixed pool of worker threads; accepted records
//! meet in one bounded hand-off queue that the calling thread writes out.
//! Output contains every accepted record but no ordering across sources.
//!
//! # Module Structure
//!
//! - `types`: Pool configuration, jobs and per-worker context
//! - `tracker`: Finished-worker counter and stats merge
//! - `worker`: Worker thread draining one source at a time
//! - `sink`: Writer loop consuming the hand-off queue
//! - `processor`: Main UnorderedWorkerPool orchestration

mod processor;
mod sink;
mod tracker;
mod types;
mod worker;

// Re-export public types
pub use processor::UnorderedWorkerPool;
pub use types::{ParallelConfig, DEFAULT_QUEUE_SIZE};
