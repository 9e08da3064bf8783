//! Boundary to the durable status store.
//!
//! The mirror propagates session status across windows/processes. It is
//! best-effort by contract: publish failures are reported to the caller but
//! the session never blocks on, or rolls back because of, the mirror.

use async_trait::async_trait;
use uuid::Uuid;

use crate::session::status::{OwnerId, RecorderStatus};

/// Identifies one writing process/window at the mirror.
///
/// Subscribers receive statuses written by *other* writers, never their own
/// echoes; the mirror needs the origin of each write to guarantee that.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct WriterId(Uuid);

impl WriterId {
    #[allow(clippy::new_without_default)]
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl std::fmt::Display for WriterId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        self.0.fmt(f)
    }
}

/// Non-fatal failure while talking to the remote mirror.
///
/// Callers log these and keep going; local status is never affected.
#[derive(Debug, thiserror::Error)]
pub enum RemoteSyncError {
    /// The store could not be reached.
    #[error("remote mirror unavailable: {0}")]
    Unavailable(String),

    /// The store rejected the write.
    #[error("remote mirror rejected write: {0}")]
    Rejected(String),
}

/// Callback invoked with every status written for the subscribed owner by
/// another process.
pub type StatusHandler = Box<dyn Fn(RecorderStatus) + Send + Sync>;

/// Guard for an active mirror subscription. Dropping it unsubscribes.
pub struct MirrorSubscription {
    unsubscribe: Option<Box<dyn FnOnce() + Send>>,
}

impl MirrorSubscription {
    pub fn new(unsubscribe: impl FnOnce() + Send + 'static) -> Self {
        Self {
            unsubscribe: Some(Box::new(unsubscribe)),
        }
    }
}

impl Drop for MirrorSubscription {
    fn drop(&mut self) {
        if let Some(unsubscribe) = self.unsubscribe.take() {
            unsubscribe();
        }
    }
}

impl std::fmt::Debug for MirrorSubscription {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MirrorSubscription")
            .field("active", &self.unsubscribe.is_some())
            .finish()
    }
}

/// The durable store / pub-sub channel that carries session status between
/// processes. Implemented outside the core; tests and the demo binary use
/// [`crate::session::InMemoryMirror`].
#[async_trait]
pub trait RemoteMirror: Send + Sync {
    /// Merge-write the status document for `owner` on behalf of `writer`.
    /// Best-effort.
    async fn publish(
        &self,
        owner: &OwnerId,
        writer: WriterId,
        status: RecorderStatus,
        timestamp: u64,
    ) -> Result<(), RemoteSyncError>;

    /// Push every externally-written status for `owner` to `handler` until
    /// the returned subscription is dropped. Writes made by `writer` itself
    /// are not pushed back to it.
    fn subscribe(
        &self,
        owner: &OwnerId,
        writer: WriterId,
        handler: StatusHandler,
    ) -> MirrorSubscription;
}
