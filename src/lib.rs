pub mod capture;
pub mod config;
pub mod coordinator;
pub mod queue;
pub mod session;

pub use capture::{
    Artifact, CaptureError, CaptureHandle, CaptureSource, Chunk, ChunkedCaptureManager,
    SyntheticSource,
};
pub use config::Settings;
pub use coordinator::{
    spawn_intent_loop, ControlSurface, CoordinatorError, CrossProcessCoordinator,
    IntentLoopHandle, SimulatedControlSurface, SurfaceHandle, SurfaceParams,
};
pub use queue::{QueueError, SerializedMutationQueue};
pub use session::{
    InMemoryMirror, OwnerId, RecorderStatus, RemoteMirror, RemoteSyncError, SessionStateMachine,
    StatusDocument, WriterId,
};
