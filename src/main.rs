use clap::{CommandFactory, Parser};
use crossbeam_channel::unbounded;
use std::thread;
use tracing_subscriber::fmt::time::ChronoLocal;
use tracing_subscriber::EnvFilter;

use logmerge::platform::{CancelSignal, ExitCode, SignalHandler};
use logmerge::{run_merge, Cli, MergeConfig, MergeError, MergeMode, MergeStats};

mod config_file;

use config_file::ConfigFile;

/// Environment variable holding the tracing filter (e.g. `logmerge=debug`)
const LOG_ENV_VAR: &str = "LOGMERGE_LOG";

fn main() {
    let cancel = CancelSignal::new();

    // Initialize signal handling early
    let _signal_handler = match SignalHandler::new(cancel.clone()) {
        Ok(handler) => handler,
        Err(e) => {
            eprintln!("logmerge: Failed to initialize signal handling: {}", e);
            ExitCode::GeneralError.exit();
        }
    };

    let cli = process_args_with_config();
    init_logging(cli.verbose);

    if cli.files.is_empty() {
        eprintln!("{}", Cli::command().render_usage());
        eprintln!("logmerge: Error: no input files");
        eprintln!("Try 'logmerge --help' for more information.");
        ExitCode::InvalidUsage.exit();
    }

    let mut config = match MergeConfig::from_cli(&cli) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("logmerge: Error: {:#}", e);
            ExitCode::InvalidUsage.exit();
        }
    };
    config.cancel = cancel;

    // Per-source failures in unordered mode are reported as they happen
    let reporter = if matches!(config.mode, MergeMode::Unordered(_)) {
        let (error_tx, error_rx) = unbounded::<MergeError>();
        config.error_sink = Some(error_tx);
        Some(thread::spawn(move || {
            for err in error_rx {
                eprintln!("logmerge: Warning: {}", err);
            }
        }))
    } else {
        None
    };

    let result = run_merge(config);
    if let Some(reporter) = reporter {
        let _ = reporter.join();
    }

    match result {
        Ok(stats) => finish(&cli, &stats),
        Err(MergeError::Cancelled) => {
            if cli.stats {
                eprintln!("logmerge: Merge interrupted");
            }
            SignalHandler::exit_code()
                .unwrap_or(ExitCode::SignalInt)
                .exit();
        }
        Err(e) => {
            eprintln!("logmerge: Error: {}", e);
            match e {
                MergeError::Configuration(_) => ExitCode::InvalidUsage.exit(),
                _ => ExitCode::GeneralError.exit(),
            }
        }
    }
}

fn finish(cli: &Cli, stats: &MergeStats) -> ! {
    if cli.stats {
        eprintln!("logmerge: {}", stats.format_stats());
    }

    if let Some(code) = SignalHandler::exit_code() {
        code.exit();
    }
    if stats.sources_failed > 0 {
        ExitCode::GeneralError.exit();
    }
    ExitCode::Success.exit();
}

/// Install the stderr tracing subscriber
///
/// `-v` / `-vv` override the filter from the environment.
fn init_logging(verbose: u8) {
    let filter = match verbose {
        0 => EnvFilter::try_from_env(LOG_ENV_VAR).unwrap_or_else(|_| EnvFilter::new("warn")),
        1 => EnvFilter::new("debug"),
        _ => EnvFilter::new("trace"),
    };

    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_timer(ChronoLocal::rfc_3339())
        .with_writer(std::io::stderr)
        .try_init();
}

/// Extract --config-file argument from raw args
fn extract_config_file_arg(args: &[String]) -> Option<String> {
    args.windows(2)
        .find(|pair| pair[0] == "--config-file")
        .map(|pair| pair[1].clone())
}

/// Process command line arguments with config file support
fn process_args_with_config() -> Cli {
    let raw_args: Vec<String> = std::env::args().collect();

    let processed_args = if raw_args.iter().any(|arg| arg == "--no-config") {
        raw_args
    } else {
        let config_file_path = extract_config_file_arg(&raw_args);
        match ConfigFile::load_with_custom_path(config_file_path.as_deref())
            .and_then(|config_file| config_file.process_args(raw_args))
        {
            Ok(processed) => processed,
            Err(e) => {
                eprintln!("logmerge: Config file error: {:#}", e);
                ExitCode::GeneralError.exit();
            }
        }
    };

    Cli::parse_from(processed_args)
}
