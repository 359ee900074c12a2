// Core library for the logmerge tool
//
// Merges line-oriented, individually time-sorted sources into one stream:
// either globally time-ordered (`OrderedMerger`) or drained concurrently
// without cross-source order (`UnorderedWorkerPool`).

pub mod cli;
pub mod config;
pub mod cursor;
pub mod decompression;
pub mod destination;
pub mod error;
pub mod frontier;
pub mod ordered;
pub mod parallel;
pub mod platform;
pub mod runner;
pub mod source;
pub mod stats;
pub mod strategy;
pub mod timestamp;

pub use cli::Cli;
pub use config::{MergeConfig, MergeMode};
pub use cursor::RecordCursor;
pub use destination::{Destination, OutputCompression};
pub use error::{MergeError, Result};
pub use frontier::Frontier;
pub use ordered::{OrderedMerger, PrimedMerge};
pub use parallel::{ParallelConfig, UnorderedWorkerPool};
pub use platform::CancelSignal;
pub use runner::{merge_files, run_merge};
pub use source::Source;
pub use stats::MergeStats;
pub use strategy::{
    Action, FilterChain, FilterStrategy, LinePatternFilter, SourceTagFilter, TimeStrategy,
};
pub use timestamp::{AdaptiveTimestamp, BadTimePolicy, TimePrefix, TimeResolution};
