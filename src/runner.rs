//! Headless bridge runner - request loop over stdin/stdout
//!
//! Request lines are read from stdin on a blocking thread and answered in
//! order. Supervisor events are forwarded to stdout by a separate task, so
//! they can appear between responses.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::broadcast::{self, error::RecvError};
use tokio::sync::mpsc;

use organizer_app::config::Settings;
use organizer_app::{spawn_signal_handler, Bridge, BridgeEvent, ShutdownReason};
use organizer_core::prelude::*;
use organizer_core::WorkerEvent;
use organizer_worker::Supervisor;

/// Pending request lines buffered between the stdin thread and the loop
const REQUEST_QUEUE_SIZE: usize = 64;

/// How long to wait for the final worker events after shutdown
const EVENT_FLUSH_TIMEOUT: Duration = Duration::from_secs(1);

/// Serve the bridge until stdin closes or a termination signal arrives
pub async fn run_bridge(settings: &Settings) -> Result<()> {
    let worker = settings.worker.to_worker_config();
    let watch_dir = settings.scanner.resolved_watch_dir();

    info!("Worker command: {}", worker.display_command());
    info!("Watch directory: {}", watch_dir.display());

    let supervisor = Arc::new(Supervisor::new(worker));
    let bridge = Bridge::new(Arc::clone(&supervisor), watch_dir);

    let forwarder = tokio::spawn(forward_events(supervisor.subscribe()));

    let (request_tx, request_rx) = mpsc::channel::<String>(REQUEST_QUEUE_SIZE);
    std::thread::spawn(move || read_requests_blocking(request_tx));

    let (shutdown_tx, shutdown_rx) = mpsc::channel::<ShutdownReason>(1);
    spawn_signal_handler(shutdown_tx);

    let reason = serve(&bridge, request_rx, shutdown_rx).await;
    info!("Shutting down: {:?}", reason);

    supervisor.shutdown().await;

    // The forwarder ends once every event sender is gone, which lets the
    // final exit event through first.
    drop(bridge);
    drop(supervisor);
    if tokio::time::timeout(EVENT_FLUSH_TIMEOUT, forwarder).await.is_err() {
        warn!("Event forwarder still running at exit");
    }

    Ok(())
}

/// Answer requests in arrival order until input ends or shutdown is requested
pub async fn serve(
    bridge: &Bridge,
    mut requests: mpsc::Receiver<String>,
    mut shutdown: mpsc::Receiver<ShutdownReason>,
) -> ShutdownReason {
    loop {
        tokio::select! {
            line = requests.recv() => match line {
                Some(line) => bridge.handle_line(&line).await.emit(),
                None => {
                    info!("Request stream closed");
                    return ShutdownReason::InputClosed;
                }
            },
            Some(reason) = shutdown.recv() => return reason,
        }
    }
}

/// Write every supervisor event to stdout until the supervisor is gone
async fn forward_events(mut events: broadcast::Receiver<WorkerEvent>) {
    loop {
        match events.recv().await {
            Ok(event) => {
                debug!("{}", event.summary());
                BridgeEvent::from(event).emit();
            }
            Err(RecvError::Lagged(skipped)) => {
                warn!("Bridge fell behind, {} worker events dropped", skipped);
            }
            Err(RecvError::Closed) => break,
        }
    }
}

/// Read request lines from stdin (blocking version)
fn read_requests_blocking(tx: mpsc::Sender<String>) {
    use std::io::BufRead;

    let stdin = std::io::stdin();
    for line in stdin.lock().lines() {
        match line {
            Ok(line) => {
                let trimmed = line.trim();
                if trimmed.is_empty() {
                    continue;
                }
                if tx.blocking_send(trimmed.to_string()).is_err() {
                    break;
                }
            }
            Err(e) => {
                error!("Failed to read stdin: {}", e);
                break;
            }
        }
    }

    info!("Stdin reader exiting");
}
