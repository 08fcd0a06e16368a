//! # organizer-app - Host Orchestration
//!
//! Everything between the worker supervisor and the UI process:
//!
//! - [`config`] - `config.toml` loading into [`Settings`]
//! - [`scanner`] - watched-directory listing, sorting and size formatting
//! - [`bridge`] - NDJSON request dispatch and event encoding
//! - [`signals`] - SIGINT/SIGTERM handling for graceful shutdown

pub mod bridge;
pub mod config;
pub mod scanner;
pub mod signals;

pub use bridge::{Bridge, BridgeEvent, BridgeRequest, BridgeResponse, INVALID_REQUEST_CHANNEL};
pub use config::{load_settings, ScannerSettings, Settings, WorkerSettings};
pub use scanner::{format_size, scan_directory, sort_entries};
pub use signals::{spawn_signal_handler, ShutdownReason};
