//! Tracing setup for the binary.

use std::path::{Path, PathBuf};

use color_eyre::eyre::{Result, WrapErr, eyre};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_appender::rolling::{RollingFileAppender, Rotation};
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

/// Where log lines go.
#[derive(Debug, Clone)]
pub enum LogTarget {
    /// Append to a file. Used while the TUI owns the terminal.
    File(PathBuf),
    /// Write to stderr.
    Stderr,
}

/// Default log file of interactive sessions.
pub fn default_log_file() -> PathBuf {
    std::env::temp_dir().join("beagle.log")
}

/// Keeps the background log writer alive. Dropping it flushes pending lines.
#[must_use = "logs are lost once the guard is dropped"]
pub struct LogGuard {
    _worker: Option<WorkerGuard>,
}

/// Install the global subscriber. `RUST_LOG` takes precedence over `level`.
pub fn init(level: &str, target: LogTarget) -> Result<LogGuard> {
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(level))
        .wrap_err_with(|| format!("invalid log level `{level}`"))?;

    match target {
        LogTarget::File(path) => {
            let appender = file_appender(&path)?;
            let (writer, guard) = tracing_appender::non_blocking(appender);
            tracing_subscriber::registry()
                .with(
                    fmt::layer()
                        .with_writer(writer)
                        .with_ansi(false)
                        .with_thread_names(true)
                        .with_filter(filter),
                )
                .try_init()
                .wrap_err("failed to install log subscriber")?;
            Ok(LogGuard {
                _worker: Some(guard),
            })
        }
        LogTarget::Stderr => {
            tracing_subscriber::registry()
                .with(
                    fmt::layer()
                        .with_writer(std::io::stderr)
                        .with_target(false)
                        .with_filter(filter),
                )
                .try_init()
                .wrap_err("failed to install log subscriber")?;
            Ok(LogGuard { _worker: None })
        }
    }
}

fn file_appender(path: &Path) -> Result<RollingFileAppender> {
    let file_name = path
        .file_name()
        .ok_or_else(|| eyre!("log file path `{}` has no file name", path.display()))?;
    let directory = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };

    RollingFileAppender::builder()
        .rotation(Rotation::NEVER)
        .filename_prefix(file_name.to_string_lossy())
        .build(directory)
        .wrap_err_with(|| format!("cannot open log file `{}`", path.display()))
}
