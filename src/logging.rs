/// Structured logging for the air-quality alert service
///
/// Provides context-rich logging with data source and region identifiers
/// on top of `tracing`. The subscriber is installed once per run by
/// `init_logger`; `RUST_LOG` overrides the configured level.

use std::fmt;

use tracing_subscriber::EnvFilter;

use crate::error::FetchError;

// ---------------------------------------------------------------------------
// Log Levels
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum LogLevel {
    Debug,
    Info,
    Warning,
    Error,
}

impl LogLevel {
    fn directive(self) -> &'static str {
        match self {
            LogLevel::Debug => "debug",
            LogLevel::Info => "info",
            LogLevel::Warning => "warn",
            LogLevel::Error => "error",
        }
    }
}

// ---------------------------------------------------------------------------
// Data Source Types
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DataSource {
    AirKorea,
    Kma,
    Telegram,
    System,
}

impl fmt::Display for DataSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DataSource::AirKorea => write!(f, "AIRKOREA"),
            DataSource::Kma => write!(f, "KMA"),
            DataSource::Telegram => write!(f, "TELEGRAM"),
            DataSource::System => write!(f, "SYS"),
        }
    }
}

// ---------------------------------------------------------------------------
// Failure Classification
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FailureType {
    /// Expected failure - e.g. an hour with no published data yet
    Expected,
    /// Unexpected failure - indicates service degradation or configuration issue
    Unexpected,
    /// Unknown - cannot determine if this is expected or not
    Unknown,
}

impl fmt::Display for FailureType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FailureType::Expected => write!(f, "EXPECTED"),
            FailureType::Unexpected => write!(f, "UNEXPECTED"),
            FailureType::Unknown => write!(f, "UNKNOWN"),
        }
    }
}

// ---------------------------------------------------------------------------
// Subscriber setup
// ---------------------------------------------------------------------------

/// Install the global subscriber.
///
/// `console_timestamps` keeps timestamps on every line, which is what cron
/// mail and journald want; interactive runs usually turn it off. Calling
/// this twice is harmless: the second install is ignored.
pub fn init_logger(min_level: LogLevel, console_timestamps: bool) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(min_level.directive()));

    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr);

    let result = if console_timestamps {
        builder.try_init()
    } else {
        builder.without_time().try_init()
    };

    if result.is_err() {
        debug(DataSource::System, None, "logger already initialized");
    }
}

// ---------------------------------------------------------------------------
// Public Logging Functions
// ---------------------------------------------------------------------------

/// Log a general informational message
pub fn info(source: DataSource, region: Option<&str>, message: &str) {
    tracing::info!(source = %source, region = region.unwrap_or("-"), "{}", message);
}

/// Log a warning message
pub fn warn(source: DataSource, region: Option<&str>, message: &str) {
    tracing::warn!(source = %source, region = region.unwrap_or("-"), "{}", message);
}

/// Log an error message
pub fn error(source: DataSource, region: Option<&str>, message: &str) {
    tracing::error!(source = %source, region = region.unwrap_or("-"), "{}", message);
}

/// Log a debug message
pub fn debug(source: DataSource, region: Option<&str>, message: &str) {
    tracing::debug!(source = %source, region = region.unwrap_or("-"), "{}", message);
}

// ---------------------------------------------------------------------------
// Failure Classification Helpers
// ---------------------------------------------------------------------------

/// Classify a fetch failure by what went wrong.
pub fn classify_fetch_failure(err: &FetchError) -> FailureType {
    match err {
        // An empty page usually means the hour has not been published yet.
        FetchError::NoData(_) => FailureType::Expected,
        // Bad status, bad key, or a changed envelope all need a human.
        FetchError::HttpStatus(_) | FetchError::Api { .. } | FetchError::Parse(_) => {
            FailureType::Unexpected
        }
        FetchError::WorkerPanicked(_) => FailureType::Unexpected,
        FetchError::Transport(e) if e.is_timeout() => FailureType::Unknown,
        FetchError::Transport(_) => FailureType::Unexpected,
    }
}

/// Log a fetch failure with automatic classification
pub fn log_fetch_failure(source: DataSource, query: &str, err: &FetchError) {
    let failure_type = classify_fetch_failure(err);
    let message = format!("{} failed [{}]: {}", query, failure_type, err);

    match failure_type {
        FailureType::Expected => debug(source, None, &message),
        FailureType::Unexpected => error(source, None, &message),
        FailureType::Unknown => warn(source, None, &message),
    }
}

// ---------------------------------------------------------------------------
// Run Summary Logging
// ---------------------------------------------------------------------------

/// Log a summary of one pipeline run
pub fn log_run_summary(job: &str, fetched: usize, readings: usize, reported: usize) {
    let message = format!(
        "{} complete: {} records fetched, {} valid readings, {} reported",
        job, fetched, readings, reported
    );

    if fetched == 0 {
        warn(DataSource::System, None, &message);
    } else {
        info(DataSource::System, None, &message);
    }
}
