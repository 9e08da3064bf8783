//! Cross-window status propagation through the remote mirror.
//!
//! Two state machines sharing one mirror stand in for two browser windows
//! of the same signed-in owner.

use std::sync::Arc;
use std::time::Duration;

use castline::{InMemoryMirror, OwnerId, RecorderStatus, SessionStateMachine};

fn owner() -> OwnerId {
    OwnerId::new("sync-owner")
}

async fn wait_for(
    machine: &Arc<SessionStateMachine>,
    status: RecorderStatus,
) -> Result<(), tokio::time::error::Elapsed> {
    let mut rx = machine.subscribe();
    tokio::time::timeout(Duration::from_secs(2), async {
        loop {
            if *rx.borrow_and_update() == status {
                return;
            }
            if rx.changed().await.is_err() {
                return;
            }
        }
    })
    .await
}

/// A window that never transitions anything itself still observes the
/// recording status written by its peer.
#[tokio::test]
async fn passive_window_observes_peer_recording() {
    let mirror = Arc::new(InMemoryMirror::new());
    let recorder = SessionStateMachine::new(owner(), mirror.clone());
    let viewer = SessionStateMachine::new(owner(), mirror.clone());
    recorder.attach_mirror();
    viewer.attach_mirror();

    for status in [
        RecorderStatus::Ready,
        RecorderStatus::ShouldStart,
        RecorderStatus::Starting,
        RecorderStatus::Recording,
    ] {
        recorder.request_transition(status);
    }

    wait_for(&viewer, RecorderStatus::Recording)
        .await
        .expect("viewer should observe recording via the mirror");
    assert_eq!(viewer.current_status(), RecorderStatus::Recording);
}

/// Any window can force any status on its peers; a stop signal sent from the
/// viewer lands on the recorder unconditionally.
#[tokio::test]
async fn stop_signal_from_any_window_wins() {
    let mirror = Arc::new(InMemoryMirror::new());
    let recorder = SessionStateMachine::new(owner(), mirror.clone());
    let viewer = SessionStateMachine::new(owner(), mirror.clone());
    recorder.attach_mirror();
    viewer.attach_mirror();

    recorder.request_transition(RecorderStatus::Recording);
    wait_for(&viewer, RecorderStatus::Recording).await.unwrap();

    viewer.request_transition(RecorderStatus::ShouldStop);
    wait_for(&recorder, RecorderStatus::ShouldStop)
        .await
        .expect("recorder should receive the stop signal");
}

/// Error is never terminal: a peer can recover the session back to idle.
#[tokio::test]
async fn error_recovers_to_idle_across_windows() {
    let mirror = Arc::new(InMemoryMirror::new());
    let recorder = SessionStateMachine::new(owner(), mirror.clone());
    let viewer = SessionStateMachine::new(owner(), mirror.clone());
    recorder.attach_mirror();
    viewer.attach_mirror();

    recorder.request_transition(RecorderStatus::Error);
    wait_for(&viewer, RecorderStatus::Error).await.unwrap();

    viewer.request_transition(RecorderStatus::Idle);
    wait_for(&recorder, RecorderStatus::Idle).await.unwrap();
}

/// A mirror outage leaves the publishing window's status intact and the
/// session keeps syncing once the mirror recovers.
#[tokio::test]
async fn sync_resumes_after_mirror_outage() {
    let mirror = Arc::new(InMemoryMirror::new());
    let recorder = SessionStateMachine::new(owner(), mirror.clone());
    let viewer = SessionStateMachine::new(owner(), mirror.clone());
    recorder.attach_mirror();
    viewer.attach_mirror();

    mirror.set_publish_failures(true);
    recorder.request_transition(RecorderStatus::Recording);
    tokio::time::sleep(Duration::from_millis(20)).await;

    // Local state moved; the peer saw nothing.
    assert_eq!(recorder.current_status(), RecorderStatus::Recording);
    assert_eq!(viewer.current_status(), RecorderStatus::Idle);

    mirror.set_publish_failures(false);
    recorder.request_transition(RecorderStatus::Saving);
    wait_for(&viewer, RecorderStatus::Saving).await.unwrap();
}
