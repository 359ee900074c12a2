//! Merge job configuration
//!
//! [`MergeConfig`] is everything a path-based merge needs. The CLI builds
//! one with [`MergeConfig::from_cli`]; library callers fill it in directly.

use anyhow::{anyhow, Context};
use chrono::format::{Item, StrftimeItems};
use crossbeam_channel::Sender;
use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;

use crate::cli::Cli;
use crate::destination::OutputCompression;
use crate::error::{MergeError, Result};
use crate::parallel::ParallelConfig;
use crate::platform::CancelSignal;
use crate::strategy::{
    FilterChain, FilterStrategy, LinePatternFilter, SourceTagFilter, TimeStrategy,
};
use crate::timestamp::{AdaptiveTimestamp, BadTimePolicy, TimePrefix};

/// Ordered (single thread, global time order) or unordered (worker pool)
#[derive(Debug, Clone, Default)]
pub enum MergeMode {
    #[default]
    Ordered,
    Unordered(ParallelConfig),
}

/// Main configuration struct for a merge run
#[derive(Clone, Default)]
pub struct MergeConfig {
    pub sources: Vec<PathBuf>,
    /// Output file; stdout when `None`
    pub destination: Option<PathBuf>,
    pub source_compressed: bool,
    pub destination_compression: OutputCompression,
    /// Remove the sources once every one of them was merged completely
    pub delete_sources: bool,
    /// Required in both modes
    pub time_strategy: Option<Arc<dyn TimeStrategy>>,
    pub filter_strategy: Option<Arc<dyn FilterStrategy>>,
    pub mode: MergeMode,
    pub cancel: CancelSignal,
    /// Receives per-source failures; required in unordered mode
    pub error_sink: Option<Sender<MergeError>>,
}

impl MergeConfig {
    pub fn new(sources: Vec<PathBuf>, time_strategy: Arc<dyn TimeStrategy>) -> Self {
        Self {
            sources,
            time_strategy: Some(time_strategy),
            ..Default::default()
        }
    }

    /// Reject the job before any file is touched
    pub fn validate(&self) -> Result<()> {
        if self.time_strategy.is_none() {
            return Err(MergeError::Configuration(
                "a time strategy is required".to_string(),
            ));
        }

        if let MergeMode::Unordered(parallel) = &self.mode {
            if self.error_sink.is_none() {
                return Err(MergeError::Configuration(
                    "unordered merge requires an error sink".to_string(),
                ));
            }
            if parallel.num_workers == 0 || parallel.queue_size == 0 {
                return Err(MergeError::Configuration(
                    "worker count and queue size must be at least 1".to_string(),
                ));
            }
        }

        if let Some(destination) = &self.destination {
            if self.sources.iter().any(|source| source == destination) {
                return Err(MergeError::Configuration(format!(
                    "output '{}' is also an input",
                    destination.display()
                )));
            }
        }

        Ok(())
    }

    /// Build a configuration from parsed command-line arguments
    ///
    /// The cancel signal and error sink are left at their defaults for the
    /// caller to wire up.
    pub fn from_cli(cli: &Cli) -> anyhow::Result<Self> {
        let destination = cli.output_path().map(PathBuf::from);
        let destination_compression = match (cli.compress, &destination) {
            (Some(arg), _) => arg.into(),
            (None, Some(path)) => OutputCompression::from_extension(path),
            (None, None) => OutputCompression::None,
        };

        let on_bad = if cli.stop_on_bad_time {
            BadTimePolicy::Stop
        } else {
            BadTimePolicy::Skip
        };
        let time_strategy: Arc<dyn TimeStrategy> = if cli.auto_time {
            Arc::new(AdaptiveTimestamp::new().with_bad_time_policy(on_bad))
        } else {
            validate_time_format(&cli.time_format)?;
            Arc::new(TimePrefix::new(cli.time_format.clone()).with_bad_time_policy(on_bad))
        };

        let mut chain = FilterChain::new();
        if cli.keep.is_some() || cli.ignore.is_some() {
            let patterns = LinePatternFilter::new(cli.keep.as_deref(), cli.ignore.as_deref())
                .context("Invalid --keep/--ignore pattern")?;
            chain = chain.with(patterns);
        }
        if cli.tag_source {
            chain = chain.with(SourceTagFilter);
        }
        let filter_strategy: Option<Arc<dyn FilterStrategy>> = if chain.is_empty() {
            None
        } else {
            Some(Arc::new(chain))
        };

        let mode = if cli.unordered {
            MergeMode::Unordered(cli.parallel_config())
        } else {
            MergeMode::Ordered
        };

        Ok(Self {
            sources: cli.files.iter().map(PathBuf::from).collect(),
            destination,
            source_compressed: cli.decompress,
            destination_compression,
            delete_sources: cli.delete_sources,
            time_strategy: Some(time_strategy),
            filter_strategy,
            mode,
            cancel: CancelSignal::new(),
            error_sink: None,
        })
    }
}

impl fmt::Debug for MergeConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MergeConfig")
            .field("sources", &self.sources)
            .field("destination", &self.destination)
            .field("source_compressed", &self.source_compressed)
            .field("destination_compression", &self.destination_compression)
            .field("delete_sources", &self.delete_sources)
            .field("time_strategy", &self.time_strategy.is_some())
            .field("filter_strategy", &self.filter_strategy.is_some())
            .field("mode", &self.mode)
            .field("error_sink", &self.error_sink.is_some())
            .finish()
    }
}

/// Reject layouts chrono cannot parse, so the mistake shows up before merging
fn validate_time_format(format: &str) -> anyhow::Result<()> {
    if format.trim().is_empty() {
        return Err(anyhow!("Time format must not be empty"));
    }
    if StrftimeItems::new(format).any(|item| matches!(item, Item::Error)) {
        return Err(anyhow!("Invalid time format '{}'", format));
    }
    Ok(())
}
