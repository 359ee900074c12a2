// CLI-specific types and structures
// This module contains the command-line interface definitions

use clap::Parser;

use crate::destination::OutputCompression;
use crate::parallel::ParallelConfig;
use crate::timestamp::DEFAULT_TIME_FORMAT;

#[derive(clap::ValueEnum, Clone, Copy, Debug, PartialEq, Eq)]
pub enum CompressArg {
    None,
    Gzip,
    Zstd,
}

impl From<CompressArg> for OutputCompression {
    fn from(arg: CompressArg) -> Self {
        match arg {
            CompressArg::None => OutputCompression::None,
            CompressArg::Gzip => OutputCompression::Gzip,
            CompressArg::Zstd => OutputCompression::Zstd,
        }
    }
}

// CLI structure - contains all command-line arguments and options
#[derive(Parser, Debug)]
#[command(name = "logmerge")]
#[command(about = "Merge time-ordered log files into one time-ordered stream")]
#[command(
    long_about = "Merge time-ordered log files into one time-ordered stream\n\nEvery input file must already be sorted by time. Lines are emitted in global\ntimestamp order; lines without a parsable leading timestamp are skipped.\n\nMODES:\n  (default)    Ordered merge - one thread, globally time-ordered output\n  --unordered  Concurrent drain - all lines, no ordering between files\n\nCOMMON EXAMPLES:\n  logmerge web1/error.log web2/error.log -o merged.log\n  logmerge -z access.log.*.gz -t '%d/%b/%Y:%H:%M:%S %z' -o access.log.gz\n  logmerge --auto-time --tag-source app-*.log"
)]
#[command(version)]
#[command(args_override_self = true)]
pub struct Cli {
    /// Input files, each sorted by time
    pub files: Vec<String>,

    /// Sources are gzip or zstd compressed (detected from magic bytes)
    #[arg(short = 'z', long = "decompress", help_heading = "Input Options")]
    pub decompress: bool,

    /// chrono layout of the timestamp at the start of each line
    #[arg(
        short = 't',
        long = "time-format",
        default_value = DEFAULT_TIME_FORMAT,
        help_heading = "Time Options"
    )]
    pub time_format: String,

    /// Detect the timestamp layout automatically (ISO 8601, syslog, Apache, Unix epoch, ...)
    #[arg(long = "auto-time", help_heading = "Time Options", conflicts_with = "time_format")]
    pub auto_time: bool,

    /// Abort the merge on a line without a parsable timestamp instead of skipping it
    #[arg(long = "stop-on-bad-time", help_heading = "Time Options")]
    pub stop_on_bad_time: bool,

    /// Keep only lines matching this regex
    #[arg(long = "keep", help_heading = "Filtering Options")]
    pub keep: Option<String>,

    /// Drop lines matching this regex
    #[arg(long = "ignore", help_heading = "Filtering Options")]
    pub ignore: Option<String>,

    /// Prefix every line with the name of the file it came from
    #[arg(long = "tag-source", help_heading = "Filtering Options")]
    pub tag_source: bool,

    /// Output file (stdout if not specified or "-")
    #[arg(short = 'o', long = "output", help_heading = "Output Options")]
    pub output: Option<String>,

    /// Compress the output (default: inferred from a .gz/.zst output extension)
    #[arg(long = "compress", value_enum, help_heading = "Output Options")]
    pub compress: Option<CompressArg>,

    /// Delete the input files after a successful merge
    #[arg(long = "delete-sources", help_heading = "Output Options")]
    pub delete_sources: bool,

    /// Drain inputs concurrently, without ordering between files
    #[arg(long = "unordered", help_heading = "Performance Options")]
    pub unordered: bool,

    /// Number of worker threads for --unordered (0 = number of CPUs)
    #[arg(long = "threads", default_value_t = 0, help_heading = "Performance Options")]
    pub threads: usize,

    /// Capacity of the line queue between workers and the writer
    #[arg(
        long = "queue-size",
        default_value_t = crate::parallel::DEFAULT_QUEUE_SIZE,
        help_heading = "Performance Options"
    )]
    pub queue_size: usize,

    /// Print merge statistics to stderr when done
    #[arg(long = "stats", help_heading = "Display Options")]
    pub stats: bool,

    /// Increase log verbosity on stderr (-v debug, -vv trace)
    #[arg(
        short = 'v',
        long = "verbose",
        action = clap::ArgAction::Count,
        help_heading = "Display Options"
    )]
    pub verbose: u8,

    /// Read defaults from this config file instead of the usual locations
    #[arg(long = "config-file", help_heading = "Configuration Options")]
    pub config_file: Option<String>,

    /// Ignore config files
    #[arg(long = "no-config", help_heading = "Configuration Options")]
    pub no_config: bool,
}

impl Cli {
    /// Worker pool settings for --unordered
    pub fn parallel_config(&self) -> ParallelConfig {
        let defaults = ParallelConfig::default();
        ParallelConfig {
            num_workers: if self.threads == 0 {
                defaults.num_workers
            } else {
                self.threads
            },
            queue_size: self.queue_size,
        }
    }

    /// Output path, or None for stdout
    pub fn output_path(&self) -> Option<&str> {
        self.output.as_deref().filter(|path| *path != "-")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let cli = Cli::try_parse_from(["logmerge", "a.log", "b.log"]).unwrap();
        assert_eq!(cli.files, vec!["a.log", "b.log"]);
        assert_eq!(cli.time_format, DEFAULT_TIME_FORMAT);
        assert!(!cli.unordered);
        assert_eq!(cli.output_path(), None);
        assert!(cli.parallel_config().num_workers >= 1);
    }

    #[test]
    fn test_unordered_options() {
        let cli = Cli::try_parse_from([
            "logmerge",
            "--unordered",
            "--threads",
            "3",
            "--queue-size",
            "8",
            "-o",
            "-",
            "a.log",
        ])
        .unwrap();
        let parallel = cli.parallel_config();
        assert_eq!(parallel.num_workers, 3);
        assert_eq!(parallel.queue_size, 8);
        assert_eq!(cli.output_path(), None);
    }

    #[test]
    fn test_auto_time_conflicts_with_layout() {
        assert!(Cli::try_parse_from(["logmerge", "--auto-time", "-t", "%s", "a.log"]).is_err());
    }

    #[test]
    fn test_later_flags_override_earlier() {
        let cli = Cli::try_parse_from(["logmerge", "-t", "%Y", "-t", "%H", "a.log"]).unwrap();
        assert_eq!(cli.time_format, "%H");
    }
}
