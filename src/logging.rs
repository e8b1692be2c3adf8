//! Tracing setup: human-readable stderr output plus one log file per run
//! under `<log_dir>/<YYYY-MM-DD>/<YYYY-MM-DD_HH-MM-SS>.log`.

use std::fs;
use std::path::{Path, PathBuf};

use chrono::Local;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, fmt};

use crate::error::ConfigError;

/// Path of this run's log file, creating the day directory.
pub fn log_file_path(log_dir: &Path) -> Result<PathBuf, ConfigError> {
    let now = Local::now();
    let day_dir = log_dir.join(now.format("%Y-%m-%d").to_string());
    fs::create_dir_all(&day_dir)?;
    Ok(day_dir.join(format!("{}.log", now.format("%Y-%m-%d_%H-%M-%S"))))
}

/// Install the global subscriber. Keep the guard alive until exit so the
/// file writer flushes.
pub fn init(log_dir: &Path) -> Result<WorkerGuard, ConfigError> {
    let path = log_file_path(log_dir)?;
    let (dir, file) = match (path.parent(), path.file_name()) {
        (Some(dir), Some(file)) => (dir.to_path_buf(), file.to_os_string()),
        _ => return Err(ConfigError::Logging(format!("bad log path {}", path.display()))),
    };
    let (writer, guard) = tracing_appender::non_blocking(tracing_appender::rolling::never(dir, file));

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_target(false).with_writer(std::io::stderr))
        .with(fmt::layer().with_ansi(false).with_writer(writer))
        .try_init()
        .map_err(|e| ConfigError::Logging(e.to_string()))?;

    Ok(guard)
}
