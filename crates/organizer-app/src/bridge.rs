//! UI bridge - NDJSON request/response and event encoding
//!
//! Requests arrive one JSON object per line, tagged by `"channel"`:
//!
//! ```json
//! {"channel":"start-python-worker","id":1}
//! {"channel":"send-worker-command","command":{"type":"get_stats"}}
//! {"channel":"get-file-list","sort":"size","direction":"desc"}
//! ```
//!
//! Each request gets exactly one response on the same channel:
//!
//! ```json
//! {"channel":"start-python-worker","id":1,"success":true,"pid":4242}
//! {"channel":"send-worker-command","success":false,"error":"Worker process is not running"}
//! ```
//!
//! Supervisor events are written unprompted:
//!
//! ```json
//! {"channel":"worker-status-update","data":{"phase":"scanning"},"timestamp":1704700001000}
//! {"channel":"worker-stopped","code":0,"requested":false,"timestamp":1704700002000}
//! ```

use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use chrono::Utc;
use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};

use organizer_core::prelude::*;
use organizer_core::{FileStats, SortDirection, SortKey, WorkerEvent};
use organizer_worker::{Command, Supervisor};

use crate::scanner::{format_size, scan_directory, sort_entries};

/// Channel used to answer lines that are not a valid request
pub const INVALID_REQUEST_CHANNEL: &str = "invalid-request";

// ─────────────────────────────────────────────────────────
// Requests
// ─────────────────────────────────────────────────────────

/// A request from the UI
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(tag = "channel", rename_all = "kebab-case")]
pub enum BridgeRequest {
    StartPythonWorker,
    StopPythonWorker,
    GetWorkerStatus,
    SendWorkerCommand {
        command: Command,
    },
    GetFileList {
        #[serde(default)]
        sort: SortKey,
        #[serde(default)]
        direction: SortDirection,
    },
}

impl BridgeRequest {
    /// Channel name the response is sent on
    pub fn channel(&self) -> &'static str {
        match self {
            BridgeRequest::StartPythonWorker => "start-python-worker",
            BridgeRequest::StopPythonWorker => "stop-python-worker",
            BridgeRequest::GetWorkerStatus => "get-worker-status",
            BridgeRequest::SendWorkerCommand { .. } => "send-worker-command",
            BridgeRequest::GetFileList { .. } => "get-file-list",
        }
    }
}

// ─────────────────────────────────────────────────────────
// Responses
// ─────────────────────────────────────────────────────────

/// Reply to one request
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BridgeResponse {
    pub channel: String,

    /// Echo of the request's `id`, when it had one
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<Value>,

    pub success: bool,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,

    /// Channel-specific fields, written at the top level
    #[serde(flatten)]
    pub payload: Map<String, Value>,
}

impl BridgeResponse {
    pub fn ok(channel: &str, id: Option<Value>, payload: Map<String, Value>) -> Self {
        Self {
            channel: channel.to_string(),
            id,
            success: true,
            error: None,
            payload,
        }
    }

    pub fn failed(channel: &str, id: Option<Value>, error: impl Into<String>) -> Self {
        Self {
            channel: channel.to_string(),
            id,
            success: false,
            error: Some(error.into()),
            payload: Map::new(),
        }
    }

    pub fn invalid(id: Option<Value>, error: impl Into<String>) -> Self {
        Self::failed(INVALID_REQUEST_CHANNEL, id, error)
    }

    /// Write this response to stdout as one NDJSON line
    pub fn emit(&self) {
        emit_json(self);
    }
}

// ─────────────────────────────────────────────────────────
// Events
// ─────────────────────────────────────────────────────────

/// Supervisor events as the UI sees them
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "channel", rename_all = "kebab-case")]
pub enum BridgeEvent {
    WorkerStatusUpdate {
        data: Value,
        timestamp: i64,
    },
    FileDetected {
        path: String,
        timestamp: i64,
    },
    WorkerStopped {
        code: Option<i32>,
        requested: bool,
        timestamp: i64,
    },
    WorkerFailed {
        reason: String,
        timestamp: i64,
    },
}

impl From<WorkerEvent> for BridgeEvent {
    fn from(event: WorkerEvent) -> Self {
        let timestamp = Self::now();
        match event {
            WorkerEvent::Status(data) => BridgeEvent::WorkerStatusUpdate { data, timestamp },
            WorkerEvent::FileDetected { path } => BridgeEvent::FileDetected { path, timestamp },
            WorkerEvent::Stopped { code, requested } => BridgeEvent::WorkerStopped {
                code,
                requested,
                timestamp,
            },
            WorkerEvent::Failed { reason } => BridgeEvent::WorkerFailed { reason, timestamp },
        }
    }
}

impl BridgeEvent {
    /// Write this event to stdout as one NDJSON line
    pub fn emit(&self) {
        emit_json(self);
    }

    /// Get current timestamp in milliseconds
    fn now() -> i64 {
        Utc::now().timestamp_millis()
    }
}

/// Serialize `value` and write it as a single flushed stdout line.
///
/// The stdout lock is held for the whole line so concurrent writers never
/// interleave within a line.
fn emit_json<T: Serialize>(value: &T) {
    let json = match serde_json::to_string(value) {
        Ok(json) => json,
        Err(e) => {
            error!("Failed to serialize bridge message: {}", e);
            return;
        }
    };

    let mut stdout = io::stdout().lock();
    if let Err(e) = writeln!(stdout, "{}", json) {
        error!("Failed to write bridge message to stdout: {}", e);
        return;
    }

    if let Err(e) = stdout.flush() {
        error!("Failed to flush bridge stdout: {}", e);
    }
}

// ─────────────────────────────────────────────────────────
// Dispatch
// ─────────────────────────────────────────────────────────

/// Routes UI requests to the supervisor and the scanner
#[derive(Debug, Clone)]
pub struct Bridge {
    supervisor: Arc<Supervisor>,
    watch_dir: PathBuf,
}

impl Bridge {
    pub fn new(supervisor: Arc<Supervisor>, watch_dir: PathBuf) -> Self {
        Self {
            supervisor,
            watch_dir,
        }
    }

    /// Parse and answer one request line. Never fails; problems become
    /// `success: false` responses.
    pub async fn handle_line(&self, line: &str) -> BridgeResponse {
        let value: Value = match serde_json::from_str(line) {
            Ok(value) => value,
            Err(e) => {
                warn!("Malformed bridge request: {}", e);
                return BridgeResponse::invalid(None, format!("Malformed JSON: {}", e));
            }
        };

        let id = value.get("id").cloned();
        let request: BridgeRequest = match serde_json::from_value(value) {
            Ok(request) => request,
            Err(e) => {
                warn!("Unrecognized bridge request: {}", e);
                return BridgeResponse::invalid(id, e.to_string());
            }
        };

        let channel = request.channel();
        match self.handle(request).await {
            Ok(payload) => BridgeResponse::ok(channel, id, payload),
            Err(e) => {
                if e.is_recoverable() {
                    warn!("{} failed: {}", channel, e);
                } else {
                    error!("{} failed: {:?}", channel, e);
                }
                BridgeResponse::failed(channel, id, e.to_string())
            }
        }
    }

    /// Execute a request and return its response payload
    ///
    /// Supervisor requests complete without waiting; the directory listing
    /// runs on the blocking pool.
    pub async fn handle(&self, request: BridgeRequest) -> Result<Map<String, Value>> {
        debug!("Bridge request: {}", request.channel());

        match request {
            BridgeRequest::StartPythonWorker => {
                let pid = self.supervisor.start()?;
                Ok(payload(json!({ "pid": pid })))
            }
            BridgeRequest::StopPythonWorker => {
                self.supervisor.stop()?;
                Ok(Map::new())
            }
            BridgeRequest::GetWorkerStatus => {
                let status = self.supervisor.status();
                Ok(payload(json!({
                    "status": status.label(),
                    "pid": status.pid(),
                })))
            }
            BridgeRequest::SendWorkerCommand { command } => {
                self.supervisor.send_command(&command)?;
                Ok(Map::new())
            }
            BridgeRequest::GetFileList { sort, direction } => {
                let dir = self.watch_dir.clone();
                tokio::task::spawn_blocking(move || file_list(&dir, sort, direction))
                    .await
                    .map_err(|e| Error::scan(&self.watch_dir, e.to_string()))?
            }
        }
    }
}

/// Scan, sort and summarize `dir`. Blocks on filesystem I/O.
fn file_list(dir: &Path, sort: SortKey, direction: SortDirection) -> Result<Map<String, Value>> {
    let mut entries = scan_directory(dir)?;
    sort_entries(&mut entries, sort, direction);

    let stats = FileStats::from_entries(&entries);
    let total_bytes: u64 = entries.iter().map(|e| e.size).sum();
    info!(
        "Listed {} files ({}) in {}",
        stats.total,
        format_size(total_bytes),
        dir.display()
    );

    Ok(payload(json!({
        "files": serde_json::to_value(&entries)?,
        "stats": serde_json::to_value(stats)?,
    })))
}

fn payload(value: Value) -> Map<String, Value> {
    match value {
        Value::Object(map) => map,
        _ => Map::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use organizer_worker::WorkerConfig;
    use tempfile::tempdir;

    fn bridge_for(dir: &Path) -> Bridge {
        let supervisor = Arc::new(Supervisor::new(WorkerConfig::new(
            "definitely-not-a-real-worker-binary",
            vec![],
        )));
        Bridge::new(supervisor, dir.to_path_buf())
    }

    fn to_json(response: &BridgeResponse) -> Value {
        serde_json::to_value(response).unwrap()
    }

    #[test]
    fn test_parse_requests() {
        let request: BridgeRequest =
            serde_json::from_str(r#"{"channel":"start-python-worker","id":7}"#).unwrap();
        assert_eq!(request, BridgeRequest::StartPythonWorker);

        let request: BridgeRequest = serde_json::from_str(
            r#"{"channel":"send-worker-command","command":{"type":"get_stats"}}"#,
        )
        .unwrap();
        match request {
            BridgeRequest::SendWorkerCommand { command } => {
                assert_eq!(command.get("type"), Some(&json!("get_stats")));
            }
            other => panic!("unexpected request {:?}", other),
        }

        let request: BridgeRequest =
            serde_json::from_str(r#"{"channel":"get-file-list"}"#).unwrap();
        assert_eq!(
            request,
            BridgeRequest::GetFileList {
                sort: SortKey::Name,
                direction: SortDirection::Asc,
            }
        );

        let request: BridgeRequest =
            serde_json::from_str(r#"{"channel":"get-file-list","sort":"date","direction":"desc"}"#)
                .unwrap();
        assert_eq!(
            request,
            BridgeRequest::GetFileList {
                sort: SortKey::Date,
                direction: SortDirection::Desc,
            }
        );
    }

    #[tokio::test]
    async fn test_status_when_stopped() {
        let temp = tempdir().unwrap();
        let bridge = bridge_for(temp.path());

        let response = bridge
            .handle_line(r#"{"channel":"get-worker-status","id":"abc"}"#)
            .await;
        assert_eq!(
            to_json(&response),
            json!({
                "channel": "get-worker-status",
                "id": "abc",
                "success": true,
                "status": "stopped",
                "pid": null,
            })
        );
    }

    #[tokio::test]
    async fn test_send_command_when_stopped_fails() {
        let temp = tempdir().unwrap();
        let bridge = bridge_for(temp.path());

        let response = bridge
            .handle_line(r#"{"channel":"send-worker-command","command":{"type":"start_cleanup"}}"#)
            .await;
        assert_eq!(
            to_json(&response),
            json!({
                "channel": "send-worker-command",
                "success": false,
                "error": "Worker process is not running",
            })
        );
    }

    #[tokio::test]
    async fn test_stop_when_stopped_succeeds() {
        let temp = tempdir().unwrap();
        let bridge = bridge_for(temp.path());

        let response = bridge.handle_line(r#"{"channel":"stop-python-worker"}"#).await;
        assert!(response.success);
        assert!(response.payload.is_empty());
    }

    #[tokio::test]
    async fn test_start_failure_reports_error() {
        let temp = tempdir().unwrap();
        let bridge = bridge_for(temp.path());

        let response = bridge
            .handle_line(r#"{"channel":"start-python-worker","id":1}"#)
            .await;
        assert_eq!(response.channel, "start-python-worker");
        assert_eq!(response.id, Some(json!(1)));
        assert!(!response.success);
        assert!(response
            .error
            .as_deref()
            .unwrap()
            .contains("definitely-not-a-real-worker-binary"));
    }

    #[tokio::test]
    async fn test_malformed_json_is_invalid_request() {
        let temp = tempdir().unwrap();
        let bridge = bridge_for(temp.path());

        let response = bridge.handle_line("{not json").await;
        assert_eq!(response.channel, INVALID_REQUEST_CHANNEL);
        assert!(!response.success);
        assert!(response.error.unwrap().starts_with("Malformed JSON"));
    }

    #[tokio::test]
    async fn test_unknown_channel_echoes_id() {
        let temp = tempdir().unwrap();
        let bridge = bridge_for(temp.path());

        let response = bridge.handle_line(r#"{"channel":"undo-job","id":3}"#).await;
        assert_eq!(response.channel, INVALID_REQUEST_CHANNEL);
        assert_eq!(response.id, Some(json!(3)));
        assert!(!response.success);
    }

    #[tokio::test]
    async fn test_command_must_be_object() {
        let temp = tempdir().unwrap();
        let bridge = bridge_for(temp.path());

        let response = bridge
            .handle_line(r#"{"channel":"send-worker-command","command":"go"}"#)
            .await;
        assert_eq!(response.channel, INVALID_REQUEST_CHANNEL);
    }

    #[tokio::test]
    async fn test_file_list_sorted_with_stats() {
        let temp = tempdir().unwrap();
        std::fs::write(temp.path().join("small.png"), b"1").unwrap();
        std::fs::write(temp.path().join("large.pdf"), b"12345").unwrap();
        std::fs::write(temp.path().join("medium.mkv"), b"123").unwrap();
        let bridge = bridge_for(temp.path());

        let response = bridge
            .handle_line(r#"{"channel":"get-file-list","sort":"size","direction":"desc"}"#)
            .await;
        assert!(response.success);

        let names: Vec<&str> = response.payload["files"]
            .as_array()
            .unwrap()
            .iter()
            .map(|f| f["name"].as_str().unwrap())
            .collect();
        assert_eq!(names, vec!["large.pdf", "medium.mkv", "small.png"]);
        assert_eq!(response.payload["files"][0]["type"], "document");
        assert_eq!(
            response.payload["stats"],
            json!({"total": 3, "images": 1, "documents": 1, "videos": 1, "others": 0})
        );
    }

    #[tokio::test]
    async fn test_file_list_missing_dir_fails() {
        let temp = tempdir().unwrap();
        let bridge = bridge_for(&temp.path().join("missing"));

        let response = bridge.handle_line(r#"{"channel":"get-file-list"}"#).await;
        assert_eq!(response.channel, "get-file-list");
        assert!(!response.success);
    }

    #[test]
    fn test_event_encoding() {
        let strip_timestamp = |event: BridgeEvent| {
            let mut value = serde_json::to_value(event).unwrap();
            let timestamp = value.as_object_mut().unwrap().remove("timestamp");
            assert!(timestamp.unwrap().as_i64().unwrap() > 0);
            value
        };

        assert_eq!(
            strip_timestamp(WorkerEvent::Status(json!({"phase": "idle"})).into()),
            json!({"channel": "worker-status-update", "data": {"phase": "idle"}})
        );
        assert_eq!(
            strip_timestamp(
                WorkerEvent::FileDetected {
                    path: "/tmp/a.txt".to_string()
                }
                .into()
            ),
            json!({"channel": "file-detected", "path": "/tmp/a.txt"})
        );
        assert_eq!(
            strip_timestamp(
                WorkerEvent::Stopped {
                    code: None,
                    requested: true
                }
                .into()
            ),
            json!({"channel": "worker-stopped", "code": null, "requested": true})
        );
        assert_eq!(
            strip_timestamp(
                WorkerEvent::Failed {
                    reason: "wait failed".to_string()
                }
                .into()
            ),
            json!({"channel": "worker-failed", "reason": "wait failed"})
        );
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_start_status_stop_roundtrip() {
        let temp = tempdir().unwrap();
        let supervisor = Arc::new(Supervisor::new(WorkerConfig::new(
            "sh",
            vec!["-c".to_string(), "exec sleep 30".to_string()],
        )));
        let bridge = Bridge::new(Arc::clone(&supervisor), temp.path().to_path_buf());
        let mut events = supervisor.subscribe();

        let started = bridge.handle_line(r#"{"channel":"start-python-worker"}"#).await;
        assert!(started.success);
        let pid = started.payload["pid"].as_u64().unwrap();

        let status = bridge.handle_line(r#"{"channel":"get-worker-status"}"#).await;
        assert_eq!(status.payload["status"], "running");
        assert_eq!(status.payload["pid"].as_u64(), Some(pid));

        let again = bridge.handle_line(r#"{"channel":"start-python-worker"}"#).await;
        assert_eq!(again.payload["pid"].as_u64(), Some(pid));

        let stopped = bridge
            .handle_line(r#"{"channel":"stop-python-worker"}"#)
            .await;
        assert!(stopped.success);
        let event = tokio::time::timeout(std::time::Duration::from_secs(10), events.recv())
            .await
            .unwrap()
            .unwrap();
        assert!(event.is_terminal());

        let status = bridge.handle_line(r#"{"channel":"get-worker-status"}"#).await;
        assert_eq!(status.payload["status"], "stopped");
    }
}
