//! Logging infrastructure for the signal controller.
//!
//! Provides structured logging with file output and optional console output:
//! - Writes to the configured log file (cleared on session start)
//! - Optionally prints to stdout for terminal tailing
//! - Multi-line pretty format for readability
//! - Configurable via RUST_LOG environment variable, `debug` forces DEBUG

use std::fs;
use std::io;
use std::path::Path;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::fmt::format::FmtSpan;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::EnvFilter;

/// Guard that must be kept alive for the duration of logging.
///
/// Dropping this guard will flush and close the log file writer.
pub struct LoggingGuard {
    _file_guard: WorkerGuard,
}

/// Logging options.
#[derive(Debug, Clone, Copy, Default)]
pub struct LoggingOptions {
    /// Mirror log output to stdout.
    pub stdout: bool,
    /// Force DEBUG level regardless of RUST_LOG.
    pub debug: bool,
}

/// Initialize logging system.
///
/// Creates the log file's directory if needed, clears the previous log
/// and sets up the file layer plus an optional stdout layer.
///
/// # Errors
///
/// Returns error if the log directory cannot be created or the file cannot
/// be cleared.
pub fn init_logging(log_path: &Path, options: LoggingOptions) -> Result<LoggingGuard, io::Error> {
    let (log_dir, log_file) = split_log_path(log_path)?;
    prepare_log_file(log_dir, log_file)?;

    let file_appender = tracing_appender::rolling::never(log_dir, log_file);
    let (non_blocking_file, file_guard) = tracing_appender::non_blocking(file_appender);

    let file_layer = tracing_subscriber::fmt::layer()
        .with_writer(non_blocking_file)
        .with_ansi(false)
        .with_span_events(FmtSpan::CLOSE)
        .pretty();

    let stdout_layer = options.stdout.then(|| {
        tracing_subscriber::fmt::layer()
            .with_writer(io::stdout)
            .with_ansi(true)
            .with_span_events(FmtSpan::CLOSE)
            .pretty()
    });

    tracing_subscriber::registry()
        .with(env_filter(options.debug))
        .with(file_layer)
        .with(stdout_layer)
        .init();

    Ok(LoggingGuard {
        _file_guard: file_guard,
    })
}

/// RUST_LOG if set, otherwise INFO; `debug` overrides both.
fn env_filter(debug: bool) -> EnvFilter {
    if debug {
        return EnvFilter::new("debug");
    }
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"))
}

fn split_log_path(log_path: &Path) -> Result<(&Path, &Path), io::Error> {
    let file = log_path.file_name().ok_or_else(|| {
        io::Error::new(
            io::ErrorKind::InvalidInput,
            format!("log path {} has no file name", log_path.display()),
        )
    })?;
    let dir = match log_path.parent() {
        Some(dir) if !dir.as_os_str().is_empty() => dir,
        _ => Path::new("."),
    };
    Ok((dir, Path::new(file)))
}

/// Create `dir` and truncate `dir/file`.
fn prepare_log_file(dir: &Path, file: &Path) -> Result<(), io::Error> {
    fs::create_dir_all(dir)?;
    fs::write(dir.join(file), "")
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_split_log_path() {
        let (dir, file) = split_log_path(Path::new("/var/log/signal.log")).unwrap();
        assert_eq!(dir, Path::new("/var/log"));
        assert_eq!(file, Path::new("signal.log"));

        let (dir, file) = split_log_path(Path::new("signal.log")).unwrap();
        assert_eq!(dir, Path::new("."));
        assert_eq!(file, Path::new("signal.log"));

        assert!(split_log_path(Path::new("/")).is_err());
    }

    #[test]
    fn test_creates_nested_directory_and_file() {
        let temp = TempDir::new().unwrap();
        let dir = temp.path().join("deep/nested");

        prepare_log_file(&dir, Path::new("controller.log")).unwrap();

        let log = dir.join("controller.log");
        assert!(log.exists(), "Log file should be created");
        assert_eq!(fs::read_to_string(&log).unwrap(), "");
    }

    #[test]
    fn test_clears_existing_file() {
        let temp = TempDir::new().unwrap();
        let log = temp.path().join("controller.log");
        fs::write(&log, "old log data").unwrap();

        prepare_log_file(temp.path(), Path::new("controller.log")).unwrap();

        assert_eq!(fs::read_to_string(&log).unwrap(), "", "File should be cleared");
    }

    #[test]
    fn test_guard_structure() {
        use tracing_appender::non_blocking::NonBlocking;

        let (non_blocking, guard) = NonBlocking::new(std::io::sink());
        drop(non_blocking);

        let _logging_guard = LoggingGuard { _file_guard: guard };
    }

    // The global subscriber can only be installed once per process, so
    // init_logging itself is exercised by the CLI rather than here.
}
