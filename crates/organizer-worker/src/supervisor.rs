//! Single-worker supervisor
//!
//! Owns at most one [`WorkerProcess`] and exposes the operations the UI
//! bridge calls: start, stop, status, and send-command. Results that depend
//! on the process finishing arrive later as [`WorkerEvent`]s.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};
use std::time::Duration;

use tokio::sync::broadcast;

use super::commands::Command;
use super::process::{ExitHook, WorkerConfig, WorkerProcess};
use organizer_core::prelude::*;
use organizer_core::{WorkerEvent, WorkerStatus};

/// Capacity of the subscriber broadcast channel
const EVENT_CHANNEL_CAPACITY: usize = 256;

/// Extra time `shutdown()` allows beyond the grace period for the forced kill to land
const SHUTDOWN_SLACK: Duration = Duration::from_secs(1);

/// The tracked process and the generation it was spawned under.
///
/// The generation lets a late exit notification from an old process leave
/// a newer one alone.
#[derive(Debug, Default)]
struct Slot {
    process: Option<WorkerProcess>,
    generation: u64,
}

impl Slot {
    fn live(&self) -> Option<&WorkerProcess> {
        self.process.as_ref().filter(|p| p.is_running())
    }

    fn live_mut(&mut self) -> Option<&mut WorkerProcess> {
        self.process.as_mut().filter(|p| p.is_running())
    }
}

/// Supervises one external worker process.
///
/// Construct one per application and pass it to whatever wires UI requests.
/// All operations return without waiting on the child; they must be called
/// from within a tokio runtime. The tracked process is guarded by a mutex
/// that is never held across an `.await`.
#[derive(Debug)]
pub struct Supervisor {
    config: WorkerConfig,
    slot: Arc<Mutex<Slot>>,
    events: broadcast::Sender<WorkerEvent>,
}

impl Supervisor {
    pub fn new(config: WorkerConfig) -> Self {
        let (events, _) = broadcast::channel(EVENT_CHANNEL_CAPACITY);
        Self {
            config,
            slot: Arc::new(Mutex::new(Slot::default())),
            events,
        }
    }

    pub fn config(&self) -> &WorkerConfig {
        &self.config
    }

    /// Subscribe to worker events.
    ///
    /// Multiple subscribers are supported. A subscriber that falls more than
    /// the channel capacity behind loses the oldest events
    /// (`RecvError::Lagged`).
    pub fn subscribe(&self) -> broadcast::Receiver<WorkerEvent> {
        self.events.subscribe()
    }

    /// Start the worker, or return the running one's pid.
    pub fn start(&self) -> Result<u32> {
        let mut slot = self.lock();

        if let Some(process) = slot.live() {
            info!("Worker already running (PID: {})", process.id());
            return Ok(process.id());
        }

        // The hook blocks on this lock, so it cannot observe the slot before
        // the new generation is recorded below.
        let generation = slot.generation + 1;
        let on_exit = release_on_exit(Arc::downgrade(&self.slot), generation);

        let process = WorkerProcess::spawn(&self.config, self.events.clone(), on_exit)
            .context("Failed to start worker")?;
        let pid = process.id();

        // Any handle still here belongs to a process that already exited.
        slot.generation = generation;
        slot.process = Some(process);
        Ok(pid)
    }

    /// Request termination of the running worker.
    ///
    /// Returns immediately. The worker gets a termination signal and, if it
    /// is still alive after the grace period, a forced kill. The transition
    /// to stopped happens when the exit event fires. Stopping a stopped
    /// supervisor is a no-op.
    pub fn stop(&self) -> Result<()> {
        let mut slot = self.lock();

        match slot.live_mut() {
            Some(process) => {
                if process.request_stop(self.config.grace_period) {
                    info!("Worker stop requested (PID: {})", process.id());
                }
            }
            None => debug!("No worker running, nothing to stop"),
        }

        Ok(())
    }

    /// Last-known worker state. Does not probe the OS.
    pub fn status(&self) -> WorkerStatus {
        match self.lock().live() {
            Some(process) => WorkerStatus::Running { pid: process.id() },
            None => WorkerStatus::Stopped,
        }
    }

    /// Serialize `command` as one JSON line and queue it for the worker's stdin.
    ///
    /// Returns once queued; no acknowledgement is awaited.
    pub fn send_command(&self, command: &Command) -> Result<()> {
        let slot = self.lock();
        let process = slot.live().ok_or(Error::NotRunning)?;

        process.send_command(command)?;
        debug!("Command queued for worker (PID: {})", process.id());
        Ok(())
    }

    /// Stop the worker and wait for it to exit (host shutdown path).
    ///
    /// Waits at most the grace period plus a second.
    pub async fn shutdown(&self) {
        let waiter = {
            let mut slot = self.lock();
            match slot.live_mut() {
                Some(process) => {
                    info!("Shutting down worker (PID: {})", process.id());
                    process.request_stop(self.config.grace_period);
                    process.exit_waiter()
                }
                None => return,
            }
        };

        if waiter.wait(self.config.grace_period + SHUTDOWN_SLACK).await {
            info!("Worker exited");
        } else {
            warn!("Worker still running after shutdown wait");
        }
    }

    fn lock(&self) -> MutexGuard<'_, Slot> {
        lock_slot(&self.slot)
    }
}

/// A poisoned lock only means another caller panicked mid-operation; the
/// slot itself is still consistent.
fn lock_slot(slot: &Mutex<Slot>) -> MutexGuard<'_, Slot> {
    slot.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Build the hook that clears the slot when generation `generation` exits.
fn release_on_exit(slot: Weak<Mutex<Slot>>, generation: u64) -> ExitHook {
    Box::new(move || {
        let Some(slot) = slot.upgrade() else {
            return;
        };
        let mut slot = lock_slot(&slot);
        if slot.generation == generation {
            slot.process = None;
        } else {
            debug!(
                "Ignoring exit of stale worker generation {} (current {})",
                generation, slot.generation
            );
        }
    })
}
