//! Path-based merge execution
//!
//! Opens the sources and the destination, runs the selected mode and cleans
//! up afterwards.

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::config::{MergeConfig, MergeMode};
use crate::destination::{describe_target, Destination};
use crate::error::{MergeError, Result};
use crate::ordered::OrderedMerger;
use crate::parallel::UnorderedWorkerPool;
use crate::source::Source;
use crate::stats::MergeStats;
use crate::strategy::TimeStrategy;

/// Run a merge job described by `config`
///
/// An ordered merge opens and primes every source before the destination is
/// created, so an unreadable source leaves an existing output file untouched.
/// An unordered merge creates the destination first; its sources are opened
/// by the workers and fail one at a time. With `delete_sources`, sources are
/// removed only after a complete merge: no source failed, nothing was
/// cancelled and the output was closed cleanly.
pub fn run_merge(config: MergeConfig) -> Result<MergeStats> {
    config.validate()?;
    let time = config
        .time_strategy
        .clone()
        .ok_or_else(|| MergeError::Configuration("a time strategy is required".to_string()))?;

    let target = describe_target(config.destination.as_deref());
    tracing::debug!(destination = %target, sources = config.sources.len(), "merge started");

    let sources: Vec<Source> = config
        .sources
        .iter()
        .map(|path| Source::from_path(path, config.source_compressed))
        .collect();

    let (stats, output) = match &config.mode {
        MergeMode::Ordered => {
            let merger = OrderedMerger::new(time)
                .with_filter(config.filter_strategy.clone())
                .with_cancel(config.cancel.clone())
                .with_target(target.as_str());
            let primed = merger.prime(sources)?;
            let mut output = open_destination(&config)?;
            let stats = primed.drain(&mut output)?;
            (stats, output)
        }
        MergeMode::Unordered(parallel) => {
            let mut pool = UnorderedWorkerPool::new(parallel.clone())
                .with_filter(config.filter_strategy.clone())
                .with_cancel(config.cancel.clone())
                .with_target(target.as_str());
            if let Some(errors) = &config.error_sink {
                pool = pool.with_error_sink(errors.clone());
            }
            pool.validate()?;
            let mut output = open_destination(&config)?;
            let stats = pool.run(sources, &mut output)?;
            (stats, output)
        }
    };

    output
        .finish()
        .map_err(|e| MergeError::destination(&target, e))?;

    if config.delete_sources {
        if stats.is_complete() {
            delete_sources(&config.sources)?;
        } else {
            tracing::warn!("merge incomplete, keeping source files");
        }
    }

    Ok(stats)
}

fn open_destination(config: &MergeConfig) -> Result<Destination> {
    match &config.destination {
        Some(path) => Destination::create(path, config.destination_compression),
        None => Destination::stdout(config.destination_compression),
    }
}

/// Ordered merge of `sources` into `destination` (stdout when `None`)
pub fn merge_files<P: AsRef<Path>>(
    sources: &[P],
    destination: Option<&Path>,
    time: Arc<dyn TimeStrategy>,
) -> Result<MergeStats> {
    let mut config = MergeConfig::new(
        sources.iter().map(|p| p.as_ref().to_path_buf()).collect(),
        time,
    );
    config.destination = destination.map(Path::to_path_buf);
    run_merge(config)
}

/// Remove every source; the first failure is returned after trying them all
fn delete_sources(paths: &[PathBuf]) -> Result<()> {
    let mut first_error = None;
    for path in paths {
        match fs::remove_file(path) {
            Ok(()) => tracing::debug!(path = %path.display(), "deleted source"),
            Err(cause) => {
                tracing::warn!(path = %path.display(), error = %cause, "cannot delete source");
                if first_error.is_none() {
                    first_error = Some(MergeError::SourceRemoval {
                        path: path.clone(),
                        cause,
                    });
                }
            }
        }
    }
    match first_error {
        Some(err) => Err(err),
        None => Ok(()),
    }
}
