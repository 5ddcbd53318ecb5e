/// Installs the `tracing` subscriber: stdout, daily files, old file cleanup.
pub mod loggerlocal;

pub use loggerlocal::{rotate_logs, setup_logging, LogSettings, LoggerError};
