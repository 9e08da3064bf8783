//! Per-owner recording status with optimistic local transitions and
//! best-effort cross-process sync.
//!
//! The machine is the only writer of its process's view of the session.
//! `request_transition` overwrites locally first and publishes in the
//! background; a failed publish is logged and otherwise ignored, so the UI
//! never blocks on the mirror. Transitions arriving from other processes
//! overwrite the local status unconditionally: there is no transition table,
//! by design, so a stop signal from any window always wins.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use parking_lot::Mutex;
use tokio::sync::watch;

use crate::session::mirror::{MirrorSubscription, RemoteMirror, WriterId};
use crate::session::status::{OwnerId, RecorderStatus};

pub struct SessionStateMachine {
    owner: OwnerId,
    writer: WriterId,
    mirror: Arc<dyn RemoteMirror>,
    status_tx: watch::Sender<RecorderStatus>,
    /// Last timestamp handed to the mirror; publishes are strictly monotonic
    /// per machine even when transitions land within the same millisecond.
    last_published: AtomicU64,
    subscription: Mutex<Option<MirrorSubscription>>,
}

impl SessionStateMachine {
    /// A session starts as `Idle` on first observation of an owner.
    pub fn new(owner: OwnerId, mirror: Arc<dyn RemoteMirror>) -> Arc<Self> {
        let (status_tx, _) = watch::channel(RecorderStatus::Idle);
        Arc::new(Self {
            owner,
            writer: WriterId::new(),
            mirror,
            status_tx,
            last_published: AtomicU64::new(0),
            subscription: Mutex::new(None),
        })
    }

    pub fn owner(&self) -> &OwnerId {
        &self.owner
    }

    pub fn current_status(&self) -> RecorderStatus {
        *self.status_tx.borrow()
    }

    /// Observe local status changes. The coordinator and UI read through
    /// this; nothing outside the machine writes the status.
    pub fn subscribe(&self) -> watch::Receiver<RecorderStatus> {
        self.status_tx.subscribe()
    }

    /// Overwrite the local status now and publish it in the background.
    ///
    /// Never fails: the local transition is synchronous and unconditional,
    /// and a remote publish failure is logged at `warn` without rolling
    /// anything back.
    pub fn request_transition(self: &Arc<Self>, status: RecorderStatus) {
        self.apply_local(status);

        let machine = self.clone();
        let timestamp = self.next_timestamp();
        tokio::spawn(async move {
            if let Err(err) = machine
                .mirror
                .publish(&machine.owner, machine.writer, status, timestamp)
                .await
            {
                tracing::warn!(
                    owner = %machine.owner,
                    status = %status,
                    error = %err,
                    "status publish failed; local state kept"
                );
            }
        });
    }

    /// Apply a transition reported by another process. Always overwrites,
    /// never republishes (republishing would echo between windows).
    pub fn on_external_transition(&self, status: RecorderStatus) {
        tracing::debug!(owner = %self.owner, status = %status, "external status transition");
        self.apply_local(status);
    }

    /// Wire this machine to the mirror's push channel for its owner.
    /// Replaces any previous subscription; the old one unhooks on drop.
    pub fn attach_mirror(self: &Arc<Self>) {
        let weak = Arc::downgrade(self);
        let subscription = self.mirror.subscribe(
            &self.owner,
            self.writer,
            Box::new(move |status| {
                if let Some(machine) = weak.upgrade() {
                    machine.on_external_transition(status);
                }
            }),
        );
        *self.subscription.lock() = Some(subscription);
    }

    fn apply_local(&self, status: RecorderStatus) {
        // Observers are only woken on an actual change; the overwrite itself
        // is unconditional either way.
        self.status_tx.send_if_modified(|current| {
            if *current == status {
                false
            } else {
                *current = status;
                true
            }
        });
    }

    fn next_timestamp(&self) -> u64 {
        let now = chrono::Utc::now().timestamp_millis().max(0) as u64;
        let mut last = self.last_published.load(Ordering::SeqCst);
        loop {
            let next = now.max(last + 1);
            match self.last_published.compare_exchange(
                last,
                next,
                Ordering::SeqCst,
                Ordering::SeqCst,
            ) {
                Ok(_) => return next,
                Err(actual) => last = actual,
            }
        }
    }
}

impl std::fmt::Debug for SessionStateMachine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionStateMachine")
            .field("owner", &self.owner)
            .field("status", &self.current_status())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;
    use crate::session::memory::InMemoryMirror;

    fn owner() -> OwnerId {
        OwnerId::new("owner-1")
    }

    #[tokio::test]
    async fn local_transition_is_immediate_and_published() {
        let mirror = Arc::new(InMemoryMirror::new());
        let machine = SessionStateMachine::new(owner(), mirror.clone());

        machine.request_transition(RecorderStatus::Ready);
        assert_eq!(machine.current_status(), RecorderStatus::Ready);

        // Publish happens on a background task.
        tokio::time::sleep(Duration::from_millis(10)).await;
        assert_eq!(
            mirror.document(&owner()).unwrap().recorder_status,
            RecorderStatus::Ready
        );
    }

    #[tokio::test]
    async fn publish_failure_keeps_local_status() {
        let mirror = Arc::new(InMemoryMirror::new());
        mirror.set_publish_failures(true);
        let machine = SessionStateMachine::new(owner(), mirror.clone());

        machine.request_transition(RecorderStatus::Recording);
        tokio::time::sleep(Duration::from_millis(10)).await;

        assert_eq!(machine.current_status(), RecorderStatus::Recording);
        assert!(mirror.document(&owner()).is_none());
    }

    #[tokio::test]
    async fn external_transition_overwrites_unconditionally() {
        let mirror = Arc::new(InMemoryMirror::new());
        let machine = SessionStateMachine::new(owner(), mirror);

        machine.request_transition(RecorderStatus::Recording);
        machine.on_external_transition(RecorderStatus::ShouldStop);

        // No validation: even a nonsensical jump lands.
        assert_eq!(machine.current_status(), RecorderStatus::ShouldStop);
        machine.on_external_transition(RecorderStatus::Idle);
        assert_eq!(machine.current_status(), RecorderStatus::Idle);
    }

    #[tokio::test]
    async fn timestamps_are_strictly_monotonic() {
        let mirror = Arc::new(InMemoryMirror::new());
        let machine = SessionStateMachine::new(owner(), mirror);

        let mut previous = 0;
        for _ in 0..100 {
            let ts = machine.next_timestamp();
            assert!(ts > previous, "{} should exceed {}", ts, previous);
            previous = ts;
        }
    }

    #[tokio::test]
    async fn attached_machine_receives_peer_transitions() {
        let mirror = Arc::new(InMemoryMirror::new());
        let window_a = SessionStateMachine::new(owner(), mirror.clone());
        let window_b = SessionStateMachine::new(owner(), mirror.clone());
        window_a.attach_mirror();
        window_b.attach_mirror();

        let mut observed = window_b.subscribe();
        window_a.request_transition(RecorderStatus::Recording);

        tokio::time::timeout(Duration::from_secs(1), observed.changed())
            .await
            .expect("peer transition should arrive")
            .unwrap();
        assert_eq!(window_b.current_status(), RecorderStatus::Recording);
    }
}
