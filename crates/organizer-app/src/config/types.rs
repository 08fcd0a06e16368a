//! Configuration types for the file organizer host
//!
//! Defines:
//! - `Settings` - Top-level `config.toml` document
//! - `WorkerSettings` - How to launch the worker process
//! - `ScannerSettings` - Which directory the file list shows

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::PathBuf;
use std::time::Duration;

use organizer_worker::WorkerConfig;

/// Application settings (`config.toml`)
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct Settings {
    #[serde(default)]
    pub worker: WorkerSettings,

    #[serde(default)]
    pub scanner: ScannerSettings,
}

/// Worker launch settings
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct WorkerSettings {
    /// Executable name or path
    #[serde(default = "default_program")]
    pub program: String,

    #[serde(default = "default_args")]
    pub args: Vec<String>,

    /// Working directory for the worker. An empty string inherits the host's.
    #[serde(default = "default_working_dir")]
    pub working_dir: String,

    /// Time between the termination signal and the forced kill
    #[serde(default = "default_grace_period_ms")]
    pub grace_period_ms: u64,

    /// Extra environment variables
    #[serde(default)]
    pub env: BTreeMap<String, String>,
}

impl Default for WorkerSettings {
    fn default() -> Self {
        Self {
            program: default_program(),
            args: default_args(),
            working_dir: default_working_dir(),
            grace_period_ms: default_grace_period_ms(),
            env: BTreeMap::new(),
        }
    }
}

impl WorkerSettings {
    /// Build the launch config the supervisor consumes
    pub fn to_worker_config(&self) -> WorkerConfig {
        let working_dir = match self.working_dir.trim() {
            "" => None,
            dir => Some(super::expand_tilde(dir)),
        };

        WorkerConfig {
            program: self.program.clone(),
            args: self.args.clone(),
            working_dir,
            env: self.env.clone(),
            grace_period: Duration::from_millis(self.grace_period_ms),
        }
    }
}

/// File list settings
#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
pub struct ScannerSettings {
    /// Directory listed by `get-file-list`. Defaults to the user's download folder.
    #[serde(default)]
    pub watch_dir: Option<String>,
}

impl ScannerSettings {
    /// The directory to scan, with `~` expanded
    pub fn resolved_watch_dir(&self) -> PathBuf {
        match self.watch_dir.as_deref().map(str::trim) {
            Some(dir) if !dir.is_empty() => super::expand_tilde(dir),
            _ => dirs::download_dir().unwrap_or_else(|| PathBuf::from(".")),
        }
    }
}

fn default_program() -> String {
    "python".to_string()
}

fn default_args() -> Vec<String> {
    vec!["main.py".to_string()]
}

fn default_working_dir() -> String {
    "backend".to_string()
}

fn default_grace_period_ms() -> u64 {
    5000
}
