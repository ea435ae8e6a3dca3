use clap::{ArgAction, Parser, ValueEnum};
use serde_json::Value;
use std::path::PathBuf;
use std::process::{Command, ExitCode};

use jobguard::config::HandlerConfig;
use jobguard::error::{ExceptionKind, HandlerError, JobError};
use jobguard::handler::{ExceptionContext, Outcome};
use jobguard::identity;
use jobguard::logging::{init_logging, LoggingConfig};
use jobguard::processor::{default_processors, format_metrics, ExceptionMetrics, FaultLedger};

/// Output format for the metrics report
#[derive(Debug, Clone, Copy, Default, ValueEnum)]
pub enum MetricsFormat {
    /// JSON snapshot of every counter
    #[default]
    Json,
    /// Human-readable markdown summary
    Markdown,
}

#[derive(Parser, Debug)]
#[command(name = "jobguard")]
#[command(version)]
#[command(about = "Run a command as a job and classify its failure")]
struct Cli {
    /// Path to a TOML configuration file
    #[arg(long, short)]
    config: Option<PathBuf>,

    /// Job source recorded with every failure
    #[arg(long, default_value = "jobguard")]
    source: String,

    /// Queue name recorded with every failure
    #[arg(long, short, default_value = "default")]
    queue: String,

    /// Treat KIND as ignorable (repeatable)
    #[arg(long = "ignore", value_name = "KIND")]
    ignorables: Vec<String>,

    /// Treat KIND as retryable (repeatable)
    #[arg(long = "retry", value_name = "KIND")]
    retryables: Vec<String>,

    /// Treat KIND as unretryable (repeatable)
    #[arg(long = "unretry", value_name = "KIND")]
    unretryables: Vec<String>,

    /// Absorb retryable failures instead of exiting with the retry code
    #[arg(long)]
    rescue_retryable: bool,

    /// Dump handled failures to stdout
    #[arg(long)]
    dump_exceptions: bool,

    /// Print the metrics report on stderr when done
    #[arg(long)]
    metrics: bool,

    /// Metrics report format: json (default) or markdown
    #[arg(long, default_value = "json", value_enum)]
    metrics_format: MetricsFormat,

    /// Increase verbosity (-v, -vv, -vvv)
    #[arg(long, short, action = ArgAction::Count)]
    verbose: u8,

    /// The command to run, with its arguments
    #[arg(required = true, trailing_var_arg = true, allow_hyphen_values = true)]
    command: Vec<String>,
}

/// Exit codes reported by the runner
mod exit_codes {
    use std::process::ExitCode;

    /// The command succeeded, or its failure was absorbed
    pub fn ok() -> ExitCode {
        ExitCode::from(0)
    }

    /// The command failed with an unclassified error
    pub fn failed() -> ExitCode {
        ExitCode::from(1)
    }

    /// A pipeline step (processor or logger) failed
    pub fn software() -> ExitCode {
        ExitCode::from(70)
    }

    /// The failure is retryable; run the job again later
    pub fn retry() -> ExitCode {
        ExitCode::from(75)
    }

    /// The configuration is invalid
    pub fn config() -> ExitCode {
        ExitCode::from(78)
    }
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    init_logging(LoggingConfig::from_verbosity(cli.verbose));
    tracing::debug!("{}", identity::version_label());

    let config = match load_config(&cli) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("jobguard: {}", e);
            return exit_codes::config();
        }
    };

    let args: Vec<Value> = cli.command.iter().cloned().map(Value::String).collect();
    let context = match ExceptionContext::new(&cli.source, &cli.queue, args) {
        Ok(context) => context,
        Err(e) => {
            eprintln!("jobguard: invalid job context: {}", e);
            return exit_codes::config();
        }
    };

    let metrics = ExceptionMetrics::new();
    let faults = FaultLedger::new();
    let mut handler = match config.handler_builder(context) {
        Ok(builder) => builder
            .processors(default_processors(&metrics, &faults))
            .build(),
        Err(e) => {
            eprintln!("jobguard: {}", e);
            return exit_codes::config();
        }
    };

    let result = handler.process(|| run_command(&cli.command));

    if cli.metrics {
        let snapshot = metrics.snapshot();
        match cli.metrics_format {
            MetricsFormat::Json => match serde_json::to_string_pretty(&snapshot) {
                Ok(json) => eprintln!("{}", json),
                Err(e) => tracing::warn!("failed to serialize metrics: {}", e),
            },
            MetricsFormat::Markdown => eprint!("{}", format_metrics(&snapshot)),
        }
    }
    for fault in faults.faults() {
        tracing::info!(
            error_name = %fault.key.error_name,
            count = fault.count,
            "actionable fault: {}",
            fault.last_message
        );
    }

    match result {
        Ok(Outcome::Completed(())) => exit_codes::ok(),
        Ok(Outcome::Absorbed(classification)) => {
            tracing::info!(%classification, "failure absorbed");
            exit_codes::ok()
        }
        Err(HandlerError::RetryRequested) => {
            eprintln!("jobguard: retryable failure; retry requested");
            exit_codes::retry()
        }
        Err(HandlerError::Unknown(error)) => {
            eprintln!("jobguard: {} ({})", error, error.kind());
            error
                .kind()
                .exit_status()
                .and_then(|code| u8::try_from(code).ok())
                .filter(|code| *code != 0)
                .map(ExitCode::from)
                .unwrap_or_else(exit_codes::failed)
        }
        Err(e @ HandlerError::InvalidBucket(_)) => {
            eprintln!("jobguard: {}", e);
            exit_codes::config()
        }
        Err(e) => {
            eprintln!("jobguard: {}", e);
            exit_codes::software()
        }
    }
}

/// Merge the configuration file, environment and command-line flags.
fn load_config(cli: &Cli) -> Result<HandlerConfig, jobguard::config::ConfigLoadError> {
    let mut config = match &cli.config {
        Some(path) => HandlerConfig::load(path)?,
        None => HandlerConfig::from_env()?,
    };

    config.rescue_retryable_errors |= cli.rescue_retryable;
    config.dump_exceptions |= cli.dump_exceptions;

    for (bucket, kinds) in [
        ("ignorables", &cli.ignorables),
        ("retryables", &cli.retryables),
        ("unretryables", &cli.unretryables),
    ] {
        for kind in kinds {
            config = config.with_kind(bucket, kind.clone());
        }
    }
    Ok(config)
}

/// Run the guarded command, mapping its failure onto a [`JobError`].
fn run_command(command: &[String]) -> Result<(), JobError> {
    let (program, args) = command
        .split_first()
        .ok_or_else(|| JobError::new(ExceptionKind::IO, "no command given"))?;

    let status = Command::new(program)
        .args(args)
        .status()
        .map_err(|e| JobError::from(e).capture_backtrace())?;
    if status.success() {
        return Ok(());
    }

    match status.code() {
        Some(code) => Err(JobError::new(
            ExceptionKind::exit_code(code),
            format!("{} exited with status {}", program, code),
        )
        .capture_backtrace()),
        None => Err(JobError::new(
            ExceptionKind::SIGNAL,
            format!("{} was terminated by a signal", program),
        )
        .capture_backtrace()),
    }
}
