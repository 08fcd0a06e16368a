//! File Organizer Host Library
//!
//! Wires the worker supervisor, the file scanner and the NDJSON bridge
//! together for the `organizer` binary.

pub mod runner;

use std::path::PathBuf;

use organizer_app::config::{load_settings, Settings};
use organizer_core::prelude::*;

pub use runner::run_bridge;

/// Command-line overrides applied on top of the config file
#[derive(Debug, Clone, Default)]
pub struct HostOptions {
    pub config_path: Option<PathBuf>,
    pub worker_dir: Option<PathBuf>,
    pub watch_dir: Option<PathBuf>,
}

impl HostOptions {
    /// Apply the overrides to loaded settings
    pub fn apply(&self, settings: &mut Settings) {
        if let Some(dir) = &self.worker_dir {
            settings.worker.working_dir = dir.to_string_lossy().into_owned();
        }
        if let Some(dir) = &self.watch_dir {
            settings.scanner.watch_dir = Some(dir.to_string_lossy().into_owned());
        }
    }
}

/// Main application entry point
///
/// Installs error reporting and file logging, loads settings, then serves
/// the bridge until stdin closes or a termination signal arrives.
pub async fn run(options: HostOptions) -> Result<()> {
    // Initialize error handling
    color_eyre::install().map_err(|e| Error::terminal(e.to_string()))?;

    // Log to file; stdout carries the bridge protocol
    organizer_core::logging::init()?;
    debug!(
        "Log file: {}",
        organizer_core::logging::get_current_log_file().display()
    );

    let result = match load_settings(options.config_path.as_deref()) {
        Ok(mut settings) => {
            options.apply(&mut settings);
            run_bridge(&settings).await
        }
        Err(e) => Err(e),
    };

    if let Err(ref e) = result {
        if e.is_fatal() {
            error!("Fatal error, host cannot start: {}", e);
        } else {
            error!("Application error: {:?}", e);
        }
    }

    info!("File organizer host exiting");
    result
}
