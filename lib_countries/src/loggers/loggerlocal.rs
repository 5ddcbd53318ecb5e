use glob::glob;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::info;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_appender::rolling::{RollingFileAppender, Rotation};
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{fmt, layer::SubscriberExt, EnvFilter, Layer, Registry};

/// Errors raised while installing the global subscriber.
#[derive(Debug, Error)]
pub enum LoggerError {
    #[error("Invalid log filter '{0}': {1}")]
    Filter(String, String),
    #[error("Failed to prepare log directory {0}: {1}")]
    Directory(PathBuf, std::io::Error),
    #[error("Failed to create log file appender: {0}")]
    Appender(String),
    #[error("Invalid log rotation pattern: {0}")]
    Pattern(#[from] glob::PatternError),
    #[error("A global subscriber is already installed: {0}")]
    AlreadyInstalled(String),
}

#[derive(Debug, Clone)]
/// # Log Settings
///
/// Where and how the process logs.
pub struct LogSettings {
    /// Prefix of the log file names (`<app_name>.<date>.log`).
    pub app_name: String,
    /// Default filter directive when `RUST_LOG` is unset (e.g. "info").
    pub level: String,
    /// Directory for daily log files. `None` logs to stdout only.
    pub log_dir: Option<PathBuf>,
    /// Emit JSON lines instead of human readable text.
    pub json: bool,
    /// How many log files to keep, newest first, at startup.
    pub keep_files: usize,
}

impl Default for LogSettings {
    fn default() -> Self {
        Self {
            app_name: "app".to_string(),
            level: "info".to_string(),
            log_dir: None,
            json: false,
            keep_files: 7,
        }
    }
}

type BoxedLayer = Box<dyn Layer<Registry> + Send + Sync>;

/// Installs the global `tracing` subscriber.
///
/// The filter comes from `RUST_LOG` when set, otherwise from `settings.level`.
/// Console output always goes to stdout; file output is added when a log
/// directory is configured, after deleting all but the newest log files.
///
/// # Returns
/// The file writer's guard. Keep it alive for the lifetime of the process or
/// buffered lines are lost.
///
/// # Errors
/// See [`LoggerError`].
pub fn setup_logging(settings: &LogSettings) -> Result<Option<WorkerGuard>, LoggerError> {
    // 1. Build the filter
    let env_filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(&settings.level))
        .map_err(|e| LoggerError::Filter(settings.level.clone(), e.to_string()))?;

    // 2. Console layer
    let mut layers: Vec<BoxedLayer> = Vec::new();
    let console = fmt::layer().with_target(true).with_ansi(!settings.json);
    layers.push(if settings.json { console.json().boxed() } else { console.boxed() });

    // 3. Optional daily file layer
    let mut guard = None;
    if let Some(dir) = &settings.log_dir {
        std::fs::create_dir_all(dir).map_err(|e| LoggerError::Directory(dir.clone(), e))?;
        let removed = rotate_logs(&settings.app_name, dir, settings.keep_files.saturating_sub(1))?;

        let appender = RollingFileAppender::builder()
            .rotation(Rotation::DAILY)
            .filename_prefix(&settings.app_name)
            .filename_suffix("log")
            .build(dir)
            .map_err(|e| LoggerError::Appender(e.to_string()))?;
        let (writer, worker_guard) = tracing_appender::non_blocking(appender);
        guard = Some(worker_guard);

        let file = fmt::layer().with_ansi(false).with_writer(writer);
        layers.push(if settings.json { file.json().boxed() } else { file.boxed() });

        if removed > 0 {
            eprintln!("Removed {} old log file(s) from {}", removed, dir.display());
        }
    }

    // 4. Install
    tracing_subscriber::registry()
        .with(layers)
        .with(env_filter)
        .try_init()
        .map_err(|e| LoggerError::AlreadyInstalled(e.to_string()))?;

    info!(level = %settings.level, json = settings.json, "Logging initialized");
    Ok(guard)
}

/// Deletes old log files of `app_name` in `log_dir`, keeping the `keep` newest.
///
/// Files are matched by `<app_name>.*.log` and ordered by name, which sorts by
/// date for the daily appender's naming scheme.
///
/// # Returns
/// The number of files removed.
pub fn rotate_logs(app_name: &str, log_dir: &Path, keep: usize) -> Result<usize, LoggerError> {
    let pattern = format!("{}/{}.*.log", log_dir.display(), app_name);
    let mut log_files: Vec<PathBuf> = glob(&pattern)?.filter_map(Result::ok).collect();

    // Newest first.
    log_files.sort_by(|a, b| b.file_name().cmp(&a.file_name()));

    let mut removed = 0;
    for old_file in log_files.iter().skip(keep) {
        match std::fs::remove_file(old_file) {
            Ok(()) => removed += 1,
            Err(e) => eprintln!("Error deleting old log file {}: {}", old_file.display(), e),
        }
    }
    Ok(removed)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    fn touch(dir: &Path, name: &str) {
        fs::write(dir.join(name), b"line\n").unwrap();
    }

    #[test]
    fn rotate_keeps_newest_files_of_the_app_only() {
        let dir = tempfile::tempdir().unwrap();
        for day in ["2024-01-01", "2024-01-02", "2024-01-03"] {
            touch(dir.path(), &format!("server_countries.{day}.log"));
        }
        touch(dir.path(), "other_app.2024-01-01.log");

        let removed = rotate_logs("server_countries", dir.path(), 2).unwrap();

        assert_eq!(removed, 1);
        assert!(!dir.path().join("server_countries.2024-01-01.log").exists());
        assert!(dir.path().join("server_countries.2024-01-03.log").exists());
        assert!(dir.path().join("other_app.2024-01-01.log").exists());
    }

    #[test]
    fn rotate_on_empty_dir_is_noop() {
        let dir = tempfile::tempdir().unwrap();
        assert_eq!(rotate_logs("server_countries", dir.path(), 0).unwrap(), 0);
    }

    #[test]
    fn setup_creates_log_dir_and_returns_guard() {
        let dir = tempfile::tempdir().unwrap();
        let log_dir = dir.path().join("logs");
        let settings = LogSettings {
            app_name: "lib_countries_test".to_string(),
            level: "debug".to_string(),
            log_dir: Some(log_dir.clone()),
            ..Default::default()
        };

        let guard = setup_logging(&settings).unwrap();

        assert!(guard.is_some());
        assert!(log_dir.is_dir());
        assert!(matches!(setup_logging(&LogSettings::default()), Err(LoggerError::AlreadyInstalled(_))));
    }
}
