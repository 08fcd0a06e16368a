//! Command encoding and the stdin command channel
//!
//! Commands are opaque JSON objects written one per line to the worker's
//! stdin. The supervisor does not enforce a schema; [`WorkerCommand`] only
//! builds the handful of commands the bundled worker understands.

use serde_json::{json, Map, Value};
use tokio::sync::mpsc;

use organizer_core::prelude::*;

/// A caller-supplied command: a JSON object with arbitrary fields
pub type Command = Map<String, Value>;

/// Serialize a command to a single JSON line (without the trailing newline).
///
/// `serde_json` escapes embedded newlines, so the result is always one line.
pub fn encode_command(command: &Command) -> Result<String> {
    Ok(serde_json::to_string(command)?)
}

/// Commands understood by the bundled worker
#[derive(Debug, Clone, PartialEq)]
pub enum WorkerCommand {
    /// Run an organize pass now
    StartCleanup,
    /// Ask the worker to report its counters
    GetStats,
    /// Replace the worker's runtime configuration
    UpdateConfig { config: Value },
}

impl WorkerCommand {
    /// Build the JSON object sent to the worker
    pub fn build(&self) -> Command {
        let value = match self {
            WorkerCommand::StartCleanup => json!({ "type": "start_cleanup" }),
            WorkerCommand::GetStats => json!({ "type": "get_stats" }),
            WorkerCommand::UpdateConfig { config } => {
                json!({ "type": "update_config", "config": config })
            }
        };

        match value {
            Value::Object(map) => map,
            _ => Command::new(),
        }
    }

    /// Get a human-readable description
    pub fn description(&self) -> &'static str {
        match self {
            WorkerCommand::StartCleanup => "start cleanup",
            WorkerCommand::GetStats => "get stats",
            WorkerCommand::UpdateConfig { .. } => "update config",
        }
    }
}

impl From<WorkerCommand> for Command {
    fn from(command: WorkerCommand) -> Self {
        command.build()
    }
}

/// Queues command lines for a worker's stdin writer task
///
/// Sending never waits: lines go into an unbounded queue drained by the
/// writer. Once the writer stops (pipe closed or write error), every send
/// fails with [`Error::CommandWrite`].
#[derive(Clone)]
pub struct CommandSender {
    stdin_tx: mpsc::UnboundedSender<String>,
}

impl std::fmt::Debug for CommandSender {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CommandSender")
            .field("stdin_tx", &"<channel>")
            .field("closed", &self.stdin_tx.is_closed())
            .finish()
    }
}

impl CommandSender {
    pub fn new(stdin_tx: mpsc::UnboundedSender<String>) -> Self {
        Self { stdin_tx }
    }

    fn send_line(&self, line: String) -> Result<()> {
        self.stdin_tx
            .send(line)
            .map_err(|_| Error::command_write("worker input stream is closed"))
    }

    /// Encode and queue a command
    pub fn send(&self, command: &Command) -> Result<()> {
        let line = encode_command(command)?;
        debug!("Queueing worker command: {}", line);
        self.send_line(line)
    }
}
