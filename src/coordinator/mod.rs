//! Cross-process coordination: the control surface lifecycle and the intent
//! loop that turns `shouldStart`/`shouldStop` into capture operations.
//!
//! The coordinator is the only component that performs the actual hardware
//! operations. Other windows express intent through the session status; the
//! coordinating process observes the intent states and acts on them.

pub mod surface;

use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use tokio_util::sync::CancellationToken;

use crate::capture::{Artifact, CaptureSource, Chunk, ChunkedCaptureManager};
use crate::session::{RecorderStatus, SessionStateMachine};

pub use surface::{
    ControlSurface, CoordinatorError, SimulatedControlSurface, SurfaceHandle, SurfaceParams,
};

/// Default control-surface poll interval.
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_millis(500);

/// Owns the secondary control surface for one session.
///
/// At most one surface is live at a time; reopening focuses the existing one.
/// A poll task watches for the user closing the surface externally and turns
/// that into a `ShouldStop` transition.
pub struct CrossProcessCoordinator {
    machine: Arc<SessionStateMachine>,
    surface: Arc<dyn ControlSurface>,
    params: SurfaceParams,
    handle: Arc<Mutex<Option<Box<dyn SurfaceHandle>>>>,
    watcher_cancel: CancellationToken,
}

impl CrossProcessCoordinator {
    /// Create the coordinator and start its lifecycle watcher.
    pub fn new(
        machine: Arc<SessionStateMachine>,
        surface: Arc<dyn ControlSurface>,
        params: SurfaceParams,
        poll_interval: Duration,
    ) -> Arc<Self> {
        let coordinator = Arc::new(Self {
            machine,
            surface,
            params,
            handle: Arc::new(Mutex::new(None)),
            watcher_cancel: CancellationToken::new(),
        });
        coordinator.spawn_watcher(poll_interval);
        coordinator
    }

    /// Open the control surface, or focus it if it is already open.
    ///
    /// Before opening, status is reset to `Idle` so a stale intent left by a
    /// previous session (say, an unconsumed `shouldStop`) is not acted on.
    pub fn open_control_surface(&self) -> Result<(), CoordinatorError> {
        let mut guard = self.handle.lock();
        if let Some(existing) = guard.as_ref() {
            if existing.is_open() {
                tracing::debug!("control surface already open; focusing");
                existing.focus();
                return Ok(());
            }
            *guard = None;
        }

        self.machine.request_transition(RecorderStatus::Idle);
        let handle = self.surface.open(&self.params)?;
        tracing::info!(name = %self.params.name, "control surface opened");
        *guard = Some(handle);
        Ok(())
    }

    /// Close the surface from this side. Deliberate close carries no stop
    /// intent; only an external close does.
    pub fn close_control_surface(&self) {
        if let Some(handle) = self.handle.lock().take() {
            handle.close();
            tracing::info!("control surface closed");
        }
    }

    pub fn is_surface_open(&self) -> bool {
        self.handle
            .lock()
            .as_ref()
            .map(|h| h.is_open())
            .unwrap_or(false)
    }

    fn spawn_watcher(self: &Arc<Self>, poll_interval: Duration) {
        let machine = self.machine.clone();
        let handle = self.handle.clone();
        let cancel = self.watcher_cancel.clone();

        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(poll_interval);
            ticker.tick().await;
            loop {
                tokio::select! {
                    _ = cancel.cancelled() => break,
                    _ = ticker.tick() => {}
                }

                let closed_externally = {
                    let mut guard = handle.lock();
                    match guard.as_ref() {
                        Some(h) if !h.is_open() => {
                            *guard = None;
                            true
                        }
                        _ => false,
                    }
                };

                // The user closed the controls: the recording has no way to
                // be stopped from there anymore, so stop it.
                if closed_externally {
                    tracing::info!("control surface closed externally; requesting stop");
                    machine.request_transition(RecorderStatus::ShouldStop);
                }
            }
        });
    }
}

impl Drop for CrossProcessCoordinator {
    fn drop(&mut self) {
        self.watcher_cancel.cancel();
    }
}

/// Guard for a running intent loop; dropping it stops the loop.
pub struct IntentLoopHandle {
    cancel: CancellationToken,
}

impl Drop for IntentLoopHandle {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}

/// Watch the machine for intent states and perform the capture operations.
///
/// `ShouldStart`: transition `Starting`, begin capturing from a fresh source,
/// transition `Recording`. `ShouldStop`: transition `Saving`, stop the
/// capture, hand the artifact to `on_artifact`, transition `Ready`. A capture
/// failure transitions to `Error`; `Error` is recoverable, the loop keeps
/// watching.
pub fn spawn_intent_loop<S, F, C, A>(
    machine: Arc<SessionStateMachine>,
    capture: Arc<ChunkedCaptureManager>,
    make_source: F,
    on_chunk: C,
    on_artifact: A,
) -> IntentLoopHandle
where
    S: CaptureSource,
    F: Fn() -> S + Send + 'static,
    C: Fn(Chunk) + Send + Sync + 'static,
    A: Fn(Artifact) + Send + 'static,
{
    let cancel = CancellationToken::new();
    let loop_cancel = cancel.clone();
    let on_chunk = Arc::new(on_chunk);

    tokio::spawn(async move {
        let mut status_rx = machine.subscribe();
        loop {
            let status = *status_rx.borrow_and_update();
            match status {
                RecorderStatus::ShouldStart => {
                    machine.request_transition(RecorderStatus::Starting);
                    let sink = on_chunk.clone();
                    capture.start_recording(make_source(), move |chunk| (*sink)(chunk));
                    machine.request_transition(RecorderStatus::Recording);
                }
                RecorderStatus::ShouldStop => {
                    machine.request_transition(RecorderStatus::Saving);
                    match capture.stop_recording().await {
                        Ok(artifact) => {
                            on_artifact(artifact);
                            machine.request_transition(RecorderStatus::Ready);
                        }
                        Err(err) => {
                            tracing::warn!(error = %err, "stop requested but capture failed");
                            machine.request_transition(RecorderStatus::Error);
                        }
                    }
                }
                _ => {}
            }

            tokio::select! {
                _ = loop_cancel.cancelled() => break,
                changed = status_rx.changed() => {
                    if changed.is_err() {
                        break;
                    }
                }
            }
        }
    });

    IntentLoopHandle { cancel }
}
