//! Session state: the per-owner recording status shared across windows.
//!
//! One `SessionStateMachine` per process owns the local view; the
//! `RemoteMirror` boundary carries status between processes.

pub mod machine;
pub mod memory;
pub mod mirror;
pub mod status;

pub use machine::SessionStateMachine;
pub use memory::InMemoryMirror;
pub use mirror::{MirrorSubscription, RemoteMirror, RemoteSyncError, StatusHandler, WriterId};
pub use status::{OwnerId, RecorderStatus, StatusDocument};
