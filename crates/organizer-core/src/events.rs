//! Domain event definitions

// ─────────────────────────────────────────────────────────
// WorkerLine (one classified line of worker stdout)
// ─────────────────────────────────────────────────────────

/// A single line of worker output after classification.
///
/// The worker's stdout protocol has two recognized tags and a default case:
/// - `STATUS:<json>` status lines
/// - lines containing the new-file marker phrase
/// - everything else is an opaque log line
#[derive(Debug, Clone, PartialEq)]
pub enum WorkerLine {
    /// `STATUS:` line whose payload parsed as JSON
    Status(serde_json::Value),

    /// `STATUS:` line whose payload is not valid JSON
    InvalidStatus { payload: String, error: String },

    /// New-file detection line with the extracted path
    FileDetected { path: String },

    /// Opaque log text
    Log(String),
}

impl WorkerLine {
    /// Convert into the event subscribers see, if any.
    ///
    /// Log lines and malformed status lines stay local.
    pub fn into_event(self) -> Option<WorkerEvent> {
        match self {
            WorkerLine::Status(value) => Some(WorkerEvent::Status(value)),
            WorkerLine::FileDetected { path } => Some(WorkerEvent::FileDetected { path }),
            WorkerLine::InvalidStatus { .. } | WorkerLine::Log(_) => None,
        }
    }
}

// ─────────────────────────────────────────────────────────
// WorkerEvent
// ─────────────────────────────────────────────────────────

/// Events published by the worker supervisor to its subscribers
#[derive(Debug, Clone, PartialEq)]
pub enum WorkerEvent {
    /// Status document reported by the worker, forwarded verbatim
    Status(serde_json::Value),

    /// The worker announced a newly observed file
    FileDetected { path: String },

    /// The worker process terminated
    ///
    /// `requested` is true when a stop was requested for this process
    /// before it exited; false means it exited on its own.
    Stopped { code: Option<i32>, requested: bool },

    /// Waiting on the worker process failed at the OS level
    Failed { reason: String },
}

impl WorkerEvent {
    /// True for the events that end a process's lifetime
    pub fn is_terminal(&self) -> bool {
        matches!(self, WorkerEvent::Stopped { .. } | WorkerEvent::Failed { .. })
    }

    /// Get a human-readable summary
    pub fn summary(&self) -> String {
        match self {
            WorkerEvent::Status(value) => format!("Worker status: {}", value),
            WorkerEvent::FileDetected { path } => format!("New file detected: {}", path),
            WorkerEvent::Stopped { code, requested } => match (code, requested) {
                (Some(code), true) => format!("Worker stopped (code {})", code),
                (None, true) => "Worker stopped".to_string(),
                (Some(code), false) => format!("Worker exited unexpectedly (code {})", code),
                (None, false) => "Worker exited unexpectedly".to_string(),
            },
            WorkerEvent::Failed { reason } => format!("Worker failed: {}", reason),
        }
    }
}
