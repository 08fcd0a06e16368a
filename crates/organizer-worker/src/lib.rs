//! # organizer-worker - Worker Process Supervision
//!
//! Spawns and supervises the background worker, decodes its line-oriented
//! stdout protocol, and carries JSON commands to its stdin.
//!
//! Depends on [`organizer_core`] for domain types and error handling.
//!
//! ## Public API
//!
//! ### Supervision
//! - [`Supervisor`] - Owns at most one worker; start/stop/status/send-command
//! - [`WorkerProcess`] - One spawned child with its reader/writer/wait tasks
//! - [`WorkerConfig`] - Executable, arguments, working directory, grace period
//!
//! ### Protocol
//! - [`parse_worker_line()`] - Classify one stdout line
//! - [`LineBuffer`] - Reassemble lines from chunked reads
//!
//! ### Commands
//! - [`Command`] - Opaque JSON object sent to the worker
//! - [`WorkerCommand`] - Commands the bundled worker understands
//! - [`CommandSender`] - Queue for a worker's stdin

pub mod commands;
pub mod process;
pub mod protocol;
pub mod supervisor;

pub use commands::{encode_command, Command, CommandSender, WorkerCommand};
pub use process::{ExitHook, ExitWaiter, WorkerConfig, WorkerProcess, DEFAULT_GRACE_PERIOD};
pub use protocol::{
    extract_detected_path, parse_worker_line, LineBuffer, DETECTION_MARKER, STATUS_PREFIX,
};
pub use supervisor::Supervisor;
