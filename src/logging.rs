//! Logging for the handler and the command-line runner.
//!
//! Two concerns live here:
//! - process-wide diagnostics through `tracing`, installed by [`init_logging`]
//!   and written to stderr;
//! - the [`TaggedLogger`] sink the handler writes exception dumps to when
//!   exception dumping is enabled. Dumps are not diagnostics and bypass the
//!   `tracing` filter; the default sink is [`WriterLogger::stdout`].

use std::io::{self, Write};
use std::sync::{Arc, Mutex};

use tracing_subscriber::{fmt, EnvFilter};

/// Component label attached to every exception dump line.
pub const COMPONENT_TAG: &str = "ExceptionHandler";

/// Log level configuration for diagnostics.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum LogLevel {
    /// Trace level - most verbose
    Trace,
    /// Debug level
    Debug,
    /// Info level
    Info,
    /// Warning level (default)
    #[default]
    Warn,
    /// Error level - least verbose
    Error,
    /// Disable logging entirely
    Off,
}

impl LogLevel {
    fn as_directive(&self) -> &'static str {
        match self {
            LogLevel::Trace => "trace",
            LogLevel::Debug => "debug",
            LogLevel::Info => "info",
            LogLevel::Warn => "warn",
            LogLevel::Error => "error",
            LogLevel::Off => "off",
        }
    }
}

impl From<u8> for LogLevel {
    /// Convert verbosity count to log level.
    /// 0 = Warn, 1 = Info, 2 = Debug, 3+ = Trace
    fn from(verbosity: u8) -> Self {
        match verbosity {
            0 => LogLevel::Warn,
            1 => LogLevel::Info,
            2 => LogLevel::Debug,
            _ => LogLevel::Trace,
        }
    }
}

/// Configuration for the diagnostics subscriber.
#[derive(Debug, Clone)]
pub struct LoggingConfig {
    /// The log level to use
    pub level: LogLevel,
    /// Whether to include timestamps
    pub with_timestamps: bool,
    /// Whether to include the target (module path)
    pub with_target: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: LogLevel::default(),
            with_timestamps: true,
            with_target: true,
        }
    }
}

impl LoggingConfig {
    /// Create a new logging configuration with default settings.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the log level.
    pub fn with_level(mut self, level: LogLevel) -> Self {
        self.level = level;
        self
    }

    /// Set whether to include timestamps.
    pub fn with_timestamps(mut self, enabled: bool) -> Self {
        self.with_timestamps = enabled;
        self
    }

    /// Set whether to include the target (module path).
    pub fn with_target(mut self, enabled: bool) -> Self {
        self.with_target = enabled;
        self
    }

    /// Create a configuration from a `-v` count.
    pub fn from_verbosity(verbosity: u8) -> Self {
        Self::default().with_level(LogLevel::from(verbosity))
    }
}

/// Install the global `tracing` subscriber.
///
/// `RUST_LOG` takes precedence over the configured level. Call once at
/// startup; later calls are ignored.
///
/// # Examples
///
/// ```no_run
/// use jobguard::logging::{init_logging, LoggingConfig, LogLevel};
///
/// init_logging(LoggingConfig::new().with_level(LogLevel::Debug));
/// ```
pub fn init_logging(config: LoggingConfig) {
    let env_filter = if std::env::var("RUST_LOG").is_ok() {
        EnvFilter::from_default_env()
    } else {
        EnvFilter::new(config.level.as_directive())
    };

    let subscriber = fmt::Subscriber::builder()
        .with_env_filter(env_filter)
        .with_writer(io::stderr)
        .with_target(config.with_target);

    let result = if config.with_timestamps {
        subscriber.try_init()
    } else {
        subscriber.without_time().try_init()
    };
    if result.is_err() {
        tracing::debug!("tracing subscriber already installed");
    }
}

/// Sink for tagged exception dump lines.
///
/// Failures are reported to the caller; the handler does not swallow them.
pub trait TaggedLogger: Send {
    /// Writes one line under `tag`.
    fn log(&mut self, tag: &str, line: &str) -> io::Result<()>;
}

/// Logger that writes `[tag] line` records to any writer.
#[derive(Debug)]
pub struct WriterLogger<W> {
    writer: W,
}

impl<W: Write + Send> WriterLogger<W> {
    /// Wraps a writer.
    pub fn new(writer: W) -> Self {
        Self { writer }
    }

    /// Returns the wrapped writer.
    pub fn into_inner(self) -> W {
        self.writer
    }
}

impl WriterLogger<io::Stdout> {
    /// Logger writing to standard output. This is the handler's default.
    pub fn stdout() -> Self {
        Self::new(io::stdout())
    }
}

impl<W: Write + Send> TaggedLogger for WriterLogger<W> {
    fn log(&mut self, tag: &str, line: &str) -> io::Result<()> {
        writeln!(self.writer, "[{}] {}", tag, line)?;
        self.writer.flush()
    }
}

/// Logger that keeps records in memory. Clones share the same buffer.
#[derive(Debug, Clone, Default)]
pub struct MemoryLogger {
    lines: Arc<Mutex<Vec<String>>>,
}

impl MemoryLogger {
    /// Creates an empty in-memory logger.
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns every record written so far, formatted as `[tag] line`.
    pub fn lines(&self) -> Vec<String> {
        match self.lines.lock() {
            Ok(lines) => lines.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }

    /// Returns true if nothing has been written.
    pub fn is_empty(&self) -> bool {
        self.lines().is_empty()
    }
}

impl TaggedLogger for MemoryLogger {
    fn log(&mut self, tag: &str, line: &str) -> io::Result<()> {
        let record = format!("[{}] {}", tag, line);
        match self.lines.lock() {
            Ok(mut lines) => lines.push(record),
            Err(poisoned) => poisoned.into_inner().push(record),
        }
        Ok(())
    }
}

/// Interprets an environment flag such as `DUMP_EXCEPTIONS`.
///
/// Unset, empty, `0`, `false`, `no` and `off` (any case) are false; every
/// other value is true.
pub fn flag_enabled(value: Option<&str>) -> bool {
    match value.map(str::trim) {
        None | Some("") => false,
        Some(v) => !matches!(
            v.to_ascii_lowercase().as_str(),
            "0" | "false" | "no" | "off"
        ),
    }
}
