//! Worker process management

use std::collections::BTreeMap;
use std::path::PathBuf;
use std::process::Stdio;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tokio::io::{AsyncRead, AsyncReadExt, AsyncWriteExt};
use tokio::process::{Child, Command};
use tokio::sync::{broadcast, mpsc, oneshot, Notify};
use tokio::task::JoinHandle;
use tokio::time::Instant;

use super::commands::{self, CommandSender};
use super::protocol::{parse_worker_line, LineBuffer};
use organizer_core::prelude::*;
use organizer_core::{WorkerEvent, WorkerLine};

/// Grace period between the polite termination signal and the forced kill
pub const DEFAULT_GRACE_PERIOD: Duration = Duration::from_secs(5);

/// How long the exit path waits for stdout to drain before emitting the
/// exit event. A grandchild holding the pipe open must not stall exit.
const STREAM_DRAIN_TIMEOUT: Duration = Duration::from_secs(1);

/// Environment that keeps a Python worker's text I/O UTF-8 and line-flushed
const TEXT_ENCODING_ENV: &[(&str, &str)] = &[("PYTHONIOENCODING", "utf-8"), ("PYTHONUNBUFFERED", "1")];

const READ_CHUNK_SIZE: usize = 4096;

/// How to launch the worker
#[derive(Debug, Clone, PartialEq)]
pub struct WorkerConfig {
    /// Executable name or path
    pub program: String,
    pub args: Vec<String>,
    /// Working directory; `None` inherits the host's
    pub working_dir: Option<PathBuf>,
    /// Extra environment, applied after the text-encoding defaults
    pub env: BTreeMap<String, String>,
    pub grace_period: Duration,
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self {
            program: "python".to_string(),
            args: vec!["main.py".to_string()],
            working_dir: Some(PathBuf::from("backend")),
            env: BTreeMap::new(),
            grace_period: DEFAULT_GRACE_PERIOD,
        }
    }
}

impl WorkerConfig {
    /// Config for an arbitrary program with no working directory override
    pub fn new(program: impl Into<String>, args: Vec<String>) -> Self {
        Self {
            program: program.into(),
            args,
            working_dir: None,
            ..Self::default()
        }
    }

    pub fn with_grace_period(mut self, grace_period: Duration) -> Self {
        self.grace_period = grace_period;
        self
    }

    /// Command line for log messages
    pub fn display_command(&self) -> String {
        if self.args.is_empty() {
            self.program.clone()
        } else {
            format!("{} {}", self.program, self.args.join(" "))
        }
    }
}

/// Callback the wait task runs after the child exits, before waking
/// waiters and publishing the exit event.
pub type ExitHook = Box<dyn FnOnce() + Send + 'static>;

/// Manages one worker child process.
///
/// The `Child` handle is moved into a dedicated wait task that owns the
/// process for its whole lifetime. `WorkerProcess` keeps a one-shot stop
/// channel to that task, an atomic exit flag for synchronous checks, and a
/// [`Notify`] so callers can await termination without holding a lock.
///
/// The forced kill after a stop request is a deadline inside the wait task,
/// so it disappears with the process and never signals a reaped child.
pub struct WorkerProcess {
    commands: CommandSender,
    pid: u32,
    /// Carries the grace period to the wait task. Consumed on first stop.
    stop_tx: Option<oneshot::Sender<Duration>>,
    exited: Arc<AtomicBool>,
    stop_requested: Arc<AtomicBool>,
    exit_notify: Arc<Notify>,
}

impl std::fmt::Debug for WorkerProcess {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WorkerProcess")
            .field("pid", &self.pid)
            .field("exited", &self.has_exited())
            .field("stop_requested", &self.stop_requested())
            .finish()
    }
}

impl WorkerProcess {
    /// Spawn the worker and wire its three streams.
    ///
    /// Must be called from within a tokio runtime. Status and detection lines
    /// are published on `events`; `on_exit` runs once the child is gone.
    pub fn spawn(
        config: &WorkerConfig,
        events: broadcast::Sender<WorkerEvent>,
        on_exit: ExitHook,
    ) -> Result<Self> {
        info!("Spawning worker: {}", config.display_command());

        let mut command = Command::new(&config.program);
        command
            .args(&config.args)
            .envs(TEXT_ENCODING_ENV.iter().copied())
            .envs(&config.env)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);
        if let Some(dir) = &config.working_dir {
            command.current_dir(dir);
        }

        let mut child = command.spawn().map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                Error::worker_not_found(&config.program)
            } else {
                Error::process_spawn(e.to_string())
            }
        })?;

        let pid = child
            .id()
            .ok_or_else(|| Error::process_spawn("worker exited before its pid was known"))?;
        info!("Worker process started with PID: {}", pid);

        let (Some(stdin), Some(stdout), Some(stderr)) =
            (child.stdin.take(), child.stdout.take(), child.stderr.take())
        else {
            return Err(Error::process_spawn("worker stdio was not piped"));
        };

        let (stdin_tx, stdin_rx) = mpsc::unbounded_channel::<String>();
        tokio::spawn(Self::stdin_writer(stdin, stdin_rx));

        let stdout_task = tokio::spawn(Self::stdout_reader(stdout, events.clone()));
        tokio::spawn(Self::stderr_reader(stderr));

        let exited = Arc::new(AtomicBool::new(false));
        let stop_requested = Arc::new(AtomicBool::new(false));
        let exit_notify = Arc::new(Notify::new());
        let (stop_tx, stop_rx) = oneshot::channel::<Duration>();

        tokio::spawn(Self::wait_for_exit(
            child,
            stop_rx,
            stdout_task,
            events,
            ExitSignals {
                exited: Arc::clone(&exited),
                stop_requested: Arc::clone(&stop_requested),
                exit_notify: Arc::clone(&exit_notify),
                on_exit,
            },
        ));

        Ok(Self {
            commands: CommandSender::new(stdin_tx),
            pid,
            stop_tx: Some(stop_tx),
            exited,
            stop_requested,
            exit_notify,
        })
    }

    /// Background task: owns `child`, waits for it to exit, publishes the outcome.
    ///
    /// While waiting it also serves the stop request: the first request sends
    /// the polite signal and arms a deadline; the deadline force-kills once.
    /// A dropped stop channel means the handle is gone, so the child is killed.
    async fn wait_for_exit(
        mut child: Child,
        mut stop_rx: oneshot::Receiver<Duration>,
        stdout_task: JoinHandle<()>,
        events: broadcast::Sender<WorkerEvent>,
        signals: ExitSignals,
    ) {
        let mut stop_pending = true;
        let mut deadline: Option<Instant> = None;
        let mut forced = false;

        let result = loop {
            let grace = async move {
                match deadline {
                    Some(at) => tokio::time::sleep_until(at).await,
                    None => std::future::pending::<()>().await,
                }
            };

            tokio::select! {
                result = child.wait() => break result,

                request = &mut stop_rx, if stop_pending => {
                    stop_pending = false;
                    match request {
                        Ok(grace_period) => {
                            info!("Stop requested, terminating worker (grace {:?})", grace_period);
                            terminate(&mut child);
                            deadline = Some(Instant::now() + grace_period);
                        }
                        Err(_) => {
                            warn!("Worker handle dropped while process running, force killing");
                            force_kill(&mut child);
                            forced = true;
                        }
                    }
                }

                _ = grace, if deadline.is_some() && !forced => {
                    warn!("Worker did not exit within grace period, force killing");
                    force_kill(&mut child);
                    forced = true;
                }
            }
        };

        // Taken at reap time; a stop() during the drain below does not count.
        let requested = signals.stop_requested.load(Ordering::Acquire);
        let event = match result {
            Ok(status) => {
                info!("Worker process exited with status: {:?}", status);
                WorkerEvent::Stopped {
                    code: status.code(),
                    requested,
                }
            }
            Err(e) => {
                error!("Error waiting for worker process: {}", e);
                WorkerEvent::Failed {
                    reason: e.to_string(),
                }
            }
        };

        // The child is reaped, so the handle is dead from here on even while
        // a grandchild keeps stdout open.
        signals.exited.store(true, Ordering::Release);
        (signals.on_exit)();
        signals.exit_notify.notify_waiters();

        // Let the stdout reader publish everything the worker wrote before it died.
        if tokio::time::timeout(STREAM_DRAIN_TIMEOUT, stdout_task)
            .await
            .is_err()
        {
            debug!("stdout still open after worker exit, not waiting further");
        }

        debug!("Publishing {:?}", event);
        let _ = events.send(event);
    }

    /// Read stdout, reassemble lines, and publish status/detection events.
    async fn stdout_reader(
        stdout: tokio::process::ChildStdout,
        events: broadcast::Sender<WorkerEvent>,
    ) {
        read_lines(stdout, |line| dispatch_line(&line, &events)).await;
        debug!("stdout reader finished");
    }

    /// Log every stderr line; never parsed
    async fn stderr_reader(stderr: tokio::process::ChildStderr) {
        read_lines(stderr, |line| warn!("Worker stderr: {}", line)).await;
        debug!("stderr reader finished");
    }

    /// Write queued command lines to stdin
    async fn stdin_writer(
        mut stdin: tokio::process::ChildStdin,
        mut rx: mpsc::UnboundedReceiver<String>,
    ) {
        while let Some(command) = rx.recv().await {
            debug!("Sending to worker: {}", command);

            if let Err(e) = stdin.write_all(command.as_bytes()).await {
                error!("Failed to write to worker stdin: {}", e);
                break;
            }
            if let Err(e) = stdin.write_all(b"\n").await {
                error!("Failed to write newline: {}", e);
                break;
            }
            if let Err(e) = stdin.flush().await {
                error!("Failed to flush worker stdin: {}", e);
                break;
            }
        }

        debug!("stdin writer finished");
    }

    /// Encode a command and queue it for stdin
    pub fn send_command(&self, command: &commands::Command) -> Result<()> {
        self.commands.send(command)
    }

    /// Ask the worker to terminate, force-killing after `grace_period`.
    ///
    /// Returns immediately. Only the first call has an effect; returns
    /// whether this call delivered the request.
    pub fn request_stop(&mut self, grace_period: Duration) -> bool {
        let Some(tx) = self.stop_tx.take() else {
            debug!("Stop already requested for worker {}", self.pid);
            return false;
        };
        self.stop_requested.store(true, Ordering::Release);
        // The wait task may have finished already; nothing left to stop then.
        tx.send(grace_period).is_ok()
    }

    /// Check if the process has already exited.
    ///
    /// Backed by the flag the wait task sets; the OS is not probed.
    pub fn has_exited(&self) -> bool {
        self.exited.load(Ordering::Acquire)
    }

    pub fn is_running(&self) -> bool {
        !self.has_exited()
    }

    /// True once a stop was requested for this process
    pub fn stop_requested(&self) -> bool {
        self.stop_requested.load(Ordering::Acquire)
    }

    /// Get the process ID
    pub fn id(&self) -> u32 {
        self.pid
    }

    /// Handle for awaiting this process's exit without borrowing it
    pub fn exit_waiter(&self) -> ExitWaiter {
        ExitWaiter {
            exited: Arc::clone(&self.exited),
            exit_notify: Arc::clone(&self.exit_notify),
        }
    }
}

impl Drop for WorkerProcess {
    fn drop(&mut self) {
        if !self.has_exited() {
            warn!("WorkerProcess {} dropped while process may still be running", self.pid);
            self.stop_requested.store(true, Ordering::Release);
            // Dropping the stop sender tells the wait task to kill the child.
            self.stop_tx.take();
        }
        debug!("WorkerProcess {} dropped", self.pid);
    }
}

/// Shared state the wait task updates when the child is gone
struct ExitSignals {
    exited: Arc<AtomicBool>,
    stop_requested: Arc<AtomicBool>,
    exit_notify: Arc<Notify>,
    on_exit: ExitHook,
}

/// Awaits a worker's exit
#[derive(Debug, Clone)]
pub struct ExitWaiter {
    exited: Arc<AtomicBool>,
    exit_notify: Arc<Notify>,
}

impl ExitWaiter {
    /// Wait up to `timeout` for the process to exit. Returns whether it did.
    pub async fn wait(&self, timeout: Duration) -> bool {
        // Create the `notified()` future before the final flag check so a
        // notification between the check and the await cannot be missed.
        let notified = self.exit_notify.notified();
        if self.exited.load(Ordering::Acquire) {
            return true;
        }

        tokio::time::timeout(timeout, notified).await.is_ok()
    }
}

/// Send the polite termination signal.
#[cfg(unix)]
fn terminate(child: &mut Child) {
    use nix::sys::signal::{kill, Signal};
    use nix::unistd::Pid;

    let Some(pid) = child.id() else {
        debug!("Worker already reaped, skipping SIGTERM");
        return;
    };
    let Ok(raw) = i32::try_from(pid) else {
        force_kill(child);
        return;
    };
    if let Err(e) = kill(Pid::from_raw(raw), Signal::SIGTERM) {
        warn!("Failed to send SIGTERM to worker {}: {}", pid, e);
    }
}

/// Windows has no polite signal for a console child; terminate outright.
#[cfg(not(unix))]
fn terminate(child: &mut Child) {
    force_kill(child);
}

fn force_kill(child: &mut Child) {
    if let Err(e) = child.start_kill() {
        // InvalidInput means the child was already reaped.
        debug!("Force kill not delivered: {}", e);
    }
}

/// Read a stream in chunks and hand each complete line to `on_line`.
/// A final unterminated line is flushed at EOF.
async fn read_lines<R, F>(mut reader: R, mut on_line: F)
where
    R: AsyncRead + Unpin,
    F: FnMut(String),
{
    let mut buffer = LineBuffer::new();
    let mut chunk = vec![0u8; READ_CHUNK_SIZE];

    loop {
        match reader.read(&mut chunk).await {
            Ok(0) => break,
            Ok(n) => {
                for line in buffer.push(&chunk[..n]) {
                    on_line(line);
                }
            }
            Err(e) => {
                warn!("Failed to read worker output: {}", e);
                break;
            }
        }
    }

    if let Some(line) = buffer.finish() {
        on_line(line);
    }
}

/// Classify one stdout line and route it: events to subscribers, the rest to logs.
fn dispatch_line(line: &str, events: &broadcast::Sender<WorkerEvent>) {
    trace!("stdout: {}", line);

    match parse_worker_line(line) {
        WorkerLine::InvalidStatus { payload, error } => {
            warn!("Failed to parse worker status {:?}: {}", payload, error);
        }
        WorkerLine::Log(text) => {
            info!("Worker: {}", text);
        }
        parsed => {
            if let Some(event) = parsed.into_event() {
                debug!("{}", event.summary());
                // No subscribers is fine; the event is simply dropped.
                let _ = events.send(event);
            }
        }
    }
}
