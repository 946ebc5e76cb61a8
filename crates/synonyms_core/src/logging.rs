//! Process-wide diagnostics for the synonym store.
//!
//! # Responsibility
//! - Start one rolling file logger per process, optionally mirroring
//!   warnings to stderr for interactive use.
//! - Capture panics as a single sanitized log line.
//!
//! # Invariants
//! - A second `init_logging` with the same level and directory is a no-op;
//!   any other second call fails with `LoggingError::AlreadyInitialized`.
//! - Nothing in this module panics.
//! - Log lines from core carry counts, ids and durations. Submitted term
//!   text is never logged.

use flexi_logger::{
    Cleanup, Criterion, Duplicate, FileSpec, FlexiLoggerError, Logger, LoggerHandle, Naming,
    WriteMode,
};
use log::{error, info};
use once_cell::sync::OnceCell;
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::path::{Path, PathBuf};
use std::str::FromStr;

const LOG_FILE_BASENAME: &str = "synonyms";
const ROTATE_AT_BYTES: u64 = 10 * 1024 * 1024;
const KEEP_LOG_FILES: usize = 5;
const PANIC_PAYLOAD_LIMIT: usize = 160;

static ACTIVE: OnceCell<ActiveLogger> = OnceCell::new();
static PANIC_HOOK: OnceCell<()> = OnceCell::new();

struct ActiveLogger {
    level: LogLevel,
    log_dir: PathBuf,
    _handle: LoggerHandle,
}

/// Minimum severity written to the log files.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogLevel {
    Trace,
    Debug,
    Info,
    Warn,
    Error,
}

impl LogLevel {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Trace => "trace",
            Self::Debug => "debug",
            Self::Info => "info",
            Self::Warn => "warn",
            Self::Error => "error",
        }
    }
}

impl Display for LogLevel {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for LogLevel {
    type Err = LoggingError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "trace" => Ok(Self::Trace),
            "debug" => Ok(Self::Debug),
            "info" => Ok(Self::Info),
            "warn" | "warning" => Ok(Self::Warn),
            "error" => Ok(Self::Error),
            _ => Err(LoggingError::UnsupportedLevel(value.trim().to_string())),
        }
    }
}

/// `debug` in debug builds, `info` otherwise.
pub fn default_log_level() -> LogLevel {
    if cfg!(debug_assertions) {
        LogLevel::Debug
    } else {
        LogLevel::Info
    }
}

/// Logger settings chosen by the embedding process.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogConfig {
    pub level: LogLevel,
    /// Absolute directory holding `synonyms*.log` files.
    pub log_dir: PathBuf,
    /// Also write `warn` and `error` records to stderr.
    pub echo_stderr: bool,
}

impl LogConfig {
    pub fn new(log_dir: impl Into<PathBuf>) -> Self {
        Self {
            level: default_log_level(),
            log_dir: log_dir.into(),
            echo_stderr: false,
        }
    }
}

/// Logging bootstrap failure.
#[derive(Debug)]
pub enum LoggingError {
    UnsupportedLevel(String),
    InvalidLogDir { path: PathBuf, reason: &'static str },
    CreateLogDir { path: PathBuf, source: std::io::Error },
    /// Logging already runs with a different level or directory.
    AlreadyInitialized { active: String, requested: String },
    Backend(FlexiLoggerError),
}

impl Display for LoggingError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::UnsupportedLevel(level) => write!(
                f,
                "unsupported log level `{level}`; expected trace|debug|info|warn|error"
            ),
            Self::InvalidLogDir { path, reason } => {
                write!(f, "invalid log directory `{}`: {reason}", path.display())
            }
            Self::CreateLogDir { path, source } => write!(
                f,
                "failed to create log directory `{}`: {source}",
                path.display()
            ),
            Self::AlreadyInitialized { active, requested } => write!(
                f,
                "logging already initialized with {active}; refusing to switch to {requested}"
            ),
            Self::Backend(err) => write!(f, "failed to start logger: {err}"),
        }
    }
}

impl Error for LoggingError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::CreateLogDir { source, .. } => Some(source),
            Self::Backend(err) => Some(err),
            _ => None,
        }
    }
}

impl From<FlexiLoggerError> for LoggingError {
    fn from(value: FlexiLoggerError) -> Self {
        Self::Backend(value)
    }
}

/// Starts file logging for the process.
///
/// # Errors
/// - `InvalidLogDir` for an empty or relative directory.
/// - `CreateLogDir` when the directory cannot be created.
/// - `AlreadyInitialized` when logging runs with another level or directory.
/// - `Backend` when `flexi_logger` refuses the configuration.
pub fn init_logging(config: &LogConfig) -> Result<(), LoggingError> {
    validate_log_dir(&config.log_dir)?;

    let active = ACTIVE.get_or_try_init(|| start_logger(config))?;
    if active.level != config.level || active.log_dir != config.log_dir {
        return Err(LoggingError::AlreadyInitialized {
            active: describe(active.level, &active.log_dir),
            requested: describe(config.level, &config.log_dir),
        });
    }
    Ok(())
}

/// Level and directory of the running logger, if any.
pub fn logging_status() -> Option<(LogLevel, PathBuf)> {
    ACTIVE
        .get()
        .map(|active| (active.level, active.log_dir.clone()))
}

fn start_logger(config: &LogConfig) -> Result<ActiveLogger, LoggingError> {
    std::fs::create_dir_all(&config.log_dir).map_err(|source| LoggingError::CreateLogDir {
        path: config.log_dir.clone(),
        source,
    })?;

    let mirror = if config.echo_stderr {
        Duplicate::Warn
    } else {
        Duplicate::None
    };
    let handle = Logger::try_with_str(config.level.as_str())?
        .log_to_file(
            FileSpec::default()
                .directory(config.log_dir.as_path())
                .basename(LOG_FILE_BASENAME),
        )
        .rotate(
            Criterion::Size(ROTATE_AT_BYTES),
            Naming::Numbers,
            Cleanup::KeepLogFiles(KEEP_LOG_FILES),
        )
        .duplicate_to_stderr(mirror)
        .write_mode(WriteMode::BufferAndFlush)
        .append()
        .format_for_files(flexi_logger::detailed_format)
        .start()?;

    install_panic_hook();
    info!(
        "event=logging_init module=logging status=ok level={} log_dir={} echo_stderr={} version={}",
        config.level,
        config.log_dir.display(),
        config.echo_stderr,
        env!("CARGO_PKG_VERSION")
    );

    Ok(ActiveLogger {
        level: config.level,
        log_dir: config.log_dir.clone(),
        _handle: handle,
    })
}

fn validate_log_dir(path: &Path) -> Result<(), LoggingError> {
    let reason = if path.as_os_str().is_empty() {
        "path is empty"
    } else if !path.is_absolute() {
        "path must be absolute"
    } else {
        return Ok(());
    };
    Err(LoggingError::InvalidLogDir {
        path: path.to_path_buf(),
        reason,
    })
}

fn describe(level: LogLevel, log_dir: &Path) -> String {
    format!("level `{level}` at `{}`", log_dir.display())
}

fn install_panic_hook() {
    if PANIC_HOOK.set(()).is_err() {
        return;
    }

    let previous = std::panic::take_hook();
    std::panic::set_hook(Box::new(move |panic_info| {
        let location = panic_info
            .location()
            .map(|loc| format!("{}:{}", loc.file(), loc.line()))
            .unwrap_or_else(|| "unknown".to_string());
        let payload = panic_info
            .payload()
            .downcast_ref::<&str>()
            .map(|message| (*message).to_string())
            .or_else(|| panic_info.payload().downcast_ref::<String>().cloned())
            .unwrap_or_else(|| "non-string panic payload".to_string());
        error!(
            "event=panic module=logging status=error location={} payload={}",
            location,
            single_line(&payload, PANIC_PAYLOAD_LIMIT)
        );
        previous(panic_info);
    }));
}

/// Flattens line breaks and caps the length at `limit` characters.
fn single_line(value: &str, limit: usize) -> String {
    let mut flat: String = value
        .chars()
        .map(|ch| if ch == '\n' || ch == '\r' { ' ' } else { ch })
        .take(limit)
        .collect();
    if value.chars().count() > limit {
        flat.push_str("...");
    }
    flat
}
