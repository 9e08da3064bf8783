//! The secondary control surface, abstracted away from any one windowing
//! system.
//!
//! The recording controls live in a second window/process. The coordinator
//! only needs three things from it: open it (with fixed geometry, singleton
//! by name), focus it, and observe whether it is still open. Concrete
//! transports (a browser window, local IPC, a socket-backed remote panel)
//! implement [`ControlSurface`]; the crate ships [`SimulatedControlSurface`]
//! for tests and the demo binary.

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;

use parking_lot::Mutex;

/// Fixed geometry and identity for the control surface.
#[derive(Debug, Clone)]
pub struct SurfaceParams {
    /// Singleton key: opening the same name twice must reuse the surface.
    pub name: String,
    pub width: u32,
    pub height: u32,
}

impl Default for SurfaceParams {
    fn default() -> Self {
        Self {
            name: "recorder-controls".to_string(),
            width: 420,
            height: 280,
        }
    }
}

/// Failure surfaced to the caller of `open_control_surface`.
#[derive(Debug, thiserror::Error)]
pub enum CoordinatorError {
    /// The transport refused to open the surface (e.g. popup blocked).
    #[error("control surface open blocked: {0}")]
    SurfaceOpen(String),
}

/// A live reference to an opened surface.
pub trait SurfaceHandle: Send + Sync {
    /// Whether the surface is still open. Goes false when the user closes it
    /// externally; the coordinator polls this.
    fn is_open(&self) -> bool;

    /// Bring the existing surface to the front.
    fn focus(&self);

    /// Close the surface from this side.
    fn close(&self);
}

/// Transport capable of opening the control surface.
pub trait ControlSurface: Send + Sync {
    fn open(&self, params: &SurfaceParams) -> Result<Box<dyn SurfaceHandle>, CoordinatorError>;
}

/// In-process surface for tests and the demo binary: open/close/focus are
/// plain flags, with open-failure injection.
#[derive(Default)]
pub struct SimulatedControlSurface {
    blocked: AtomicBool,
    opens: AtomicUsize,
    last: Mutex<Option<Arc<SimulatedHandleState>>>,
}

#[derive(Default)]
struct SimulatedHandleState {
    open: AtomicBool,
    focus_count: AtomicUsize,
}

/// Test-side view of the most recently opened simulated surface.
pub struct SimulatedSurfaceProbe {
    state: Arc<SimulatedHandleState>,
}

impl SimulatedSurfaceProbe {
    pub fn is_open(&self) -> bool {
        self.state.open.load(Ordering::SeqCst)
    }

    pub fn focus_count(&self) -> usize {
        self.state.focus_count.load(Ordering::SeqCst)
    }

    /// Emulate the user closing the window.
    pub fn close_externally(&self) {
        self.state.open.store(false, Ordering::SeqCst);
    }
}

impl SimulatedControlSurface {
    pub fn new() -> Self {
        Self::default()
    }

    /// When set, `open` fails with [`CoordinatorError::SurfaceOpen`].
    pub fn set_open_blocked(&self, blocked: bool) {
        self.blocked.store(blocked, Ordering::SeqCst);
    }

    /// How many surfaces were actually opened (focus reuse not counted).
    pub fn open_count(&self) -> usize {
        self.opens.load(Ordering::SeqCst)
    }

    pub fn last_opened(&self) -> Option<SimulatedSurfaceProbe> {
        self.last
            .lock()
            .as_ref()
            .map(|state| SimulatedSurfaceProbe {
                state: state.clone(),
            })
    }
}

struct SimulatedHandle {
    state: Arc<SimulatedHandleState>,
}

impl SurfaceHandle for SimulatedHandle {
    fn is_open(&self) -> bool {
        self.state.open.load(Ordering::SeqCst)
    }

    fn focus(&self) {
        self.state.focus_count.fetch_add(1, Ordering::SeqCst);
    }

    fn close(&self) {
        self.state.open.store(false, Ordering::SeqCst);
    }
}

impl ControlSurface for SimulatedControlSurface {
    fn open(&self, params: &SurfaceParams) -> Result<Box<dyn SurfaceHandle>, CoordinatorError> {
        if self.blocked.load(Ordering::SeqCst) {
            return Err(CoordinatorError::SurfaceOpen(format!(
                "'{}' blocked by policy",
                params.name
            )));
        }

        let state = Arc::new(SimulatedHandleState {
            open: AtomicBool::new(true),
            focus_count: AtomicUsize::new(0),
        });
        self.opens.fetch_add(1, Ordering::SeqCst);
        *self.last.lock() = Some(state.clone());
        Ok(Box::new(SimulatedHandle { state }))
    }
}
