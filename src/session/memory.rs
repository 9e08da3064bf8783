//! In-memory stand-in for the durable status store.
//!
//! Several state machines sharing one `InMemoryMirror` behave like several
//! windows sharing one backend document: every publish is merge-written and
//! fanned out to the owner's other subscribers (never back to the writer).
//! Used by the demo binary and by tests; the production mirror lives in the
//! storage collaborator.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::Mutex;

use crate::session::mirror::{
    MirrorSubscription, RemoteMirror, RemoteSyncError, StatusHandler, WriterId,
};
use crate::session::status::{OwnerId, RecorderStatus, StatusDocument};

type SharedHandler = Arc<dyn Fn(RecorderStatus) + Send + Sync>;

struct Subscriber {
    id: u64,
    writer: WriterId,
    handler: SharedHandler,
}

#[derive(Default)]
struct MirrorState {
    documents: HashMap<OwnerId, StatusDocument>,
    subscribers: HashMap<OwnerId, Vec<Subscriber>>,
}

/// Process-local [`RemoteMirror`] with publish-failure injection for tests.
#[derive(Clone, Default)]
pub struct InMemoryMirror {
    state: Arc<Mutex<MirrorState>>,
    next_subscriber: Arc<AtomicU64>,
    fail_publishes: Arc<AtomicBool>,
}

impl InMemoryMirror {
    pub fn new() -> Self {
        Self::default()
    }

    /// When set, every `publish` fails with `RemoteSyncError::Unavailable`
    /// until cleared. Subscriptions keep working.
    pub fn set_publish_failures(&self, fail: bool) {
        self.fail_publishes.store(fail, Ordering::SeqCst);
    }

    /// The last document merge-written for `owner`, if any.
    pub fn document(&self, owner: &OwnerId) -> Option<StatusDocument> {
        self.state.lock().documents.get(owner).cloned()
    }
}

#[async_trait]
impl RemoteMirror for InMemoryMirror {
    async fn publish(
        &self,
        owner: &OwnerId,
        writer: WriterId,
        status: RecorderStatus,
        timestamp: u64,
    ) -> Result<(), RemoteSyncError> {
        if self.fail_publishes.load(Ordering::SeqCst) {
            return Err(RemoteSyncError::Unavailable(
                "simulated mirror outage".to_string(),
            ));
        }

        let handlers: Vec<SharedHandler> = {
            let mut state = self.state.lock();

            // Last write wins, arbitrated only by timestamp: a write older
            // than the stored document is dropped as stale.
            if let Some(existing) = state.documents.get(owner) {
                if timestamp < existing.last_updated {
                    tracing::debug!(
                        owner = %owner,
                        stale = timestamp,
                        current = existing.last_updated,
                        "dropping stale status write"
                    );
                    return Ok(());
                }
            }

            state.documents.insert(
                owner.clone(),
                StatusDocument {
                    recorder_status: status,
                    last_updated: timestamp,
                },
            );

            state
                .subscribers
                .get(owner)
                .map(|subs| {
                    subs.iter()
                        // The writer never hears its own write back.
                        .filter(|sub| sub.writer != writer)
                        .map(|sub| sub.handler.clone())
                        .collect::<Vec<_>>()
                })
                .unwrap_or_default()
        };

        // Handlers run outside the lock; one of them may publish again.
        for handler in handlers {
            handler(status);
        }

        Ok(())
    }

    fn subscribe(
        &self,
        owner: &OwnerId,
        writer: WriterId,
        handler: StatusHandler,
    ) -> MirrorSubscription {
        let id = self.next_subscriber.fetch_add(1, Ordering::SeqCst);
        let handler: SharedHandler = Arc::from(handler);

        self.state
            .lock()
            .subscribers
            .entry(owner.clone())
            .or_default()
            .push(Subscriber {
                id,
                writer,
                handler,
            });

        let state = self.state.clone();
        let owner = owner.clone();
        MirrorSubscription::new(move || {
            if let Some(subs) = state.lock().subscribers.get_mut(&owner) {
                subs.retain(|sub| sub.id != id);
            }
        })
    }
}
