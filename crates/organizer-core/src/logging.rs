//! Logging configuration using tracing

use std::path::PathBuf;
use tracing_appender::rolling::{RollingFileAppender, Rotation};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use crate::error::Result;

/// Environment variable that overrides the log filter
pub const LOG_ENV_VAR: &str = "ORGANIZER_LOG";

const LOG_FILE_NAME: &str = "organizer.log";

const DEFAULT_FILTER: &str = "file_organizer=info,organizer_app=info,organizer_worker=info,warn";

/// Initialize the logging subsystem
///
/// Logs are written to `~/.local/share/file-organizer/logs/` (platform data dir).
/// stdout is left alone; the bridge owns it.
///
/// # Examples
/// ```bash
/// ORGANIZER_LOG=debug organizer
/// ORGANIZER_LOG=organizer_worker=trace organizer
/// ```
pub fn init() -> Result<()> {
    let log_dir = get_log_directory();
    std::fs::create_dir_all(&log_dir)?;

    let file_appender = RollingFileAppender::new(Rotation::DAILY, &log_dir, LOG_FILE_NAME);

    let env_filter =
        EnvFilter::try_from_env(LOG_ENV_VAR).unwrap_or_else(|_| EnvFilter::new(DEFAULT_FILTER));

    tracing_subscriber::registry()
        .with(env_filter)
        .with(
            fmt::layer()
                .with_writer(file_appender)
                .with_ansi(false)
                .with_target(true)
                .with_thread_ids(false)
                .with_file(true)
                .with_line_number(true)
                .with_timer(fmt::time::ChronoLocal::new(
                    "%Y-%m-%d %H:%M:%S%.3f".to_string(),
                )),
        )
        .init();

    tracing::info!("═══════════════════════════════════════════════════════");
    tracing::info!("File organizer host starting");
    tracing::info!("Log directory: {}", log_dir.display());
    tracing::info!("═══════════════════════════════════════════════════════");

    Ok(())
}

/// Get the log directory path
fn get_log_directory() -> PathBuf {
    let base = dirs::data_local_dir().unwrap_or_else(|| PathBuf::from("."));
    base.join("file-organizer").join("logs")
}

/// Get the log file path for the current day
///
/// The daily appender suffixes the base name with the local date.
pub fn get_current_log_file() -> PathBuf {
    let date = chrono::Local::now().format("%Y-%m-%d");
    get_log_directory().join(format!("{}.{}", LOG_FILE_NAME, date))
}
