//! End-to-end recording flow: control surface, intent loop, capture, and the
//! serialized credit deduction that follows a finished recording.

use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;

use castline::{
    spawn_intent_loop, Artifact, ChunkedCaptureManager, CrossProcessCoordinator, InMemoryMirror,
    OwnerId, RecorderStatus, SerializedMutationQueue, SessionStateMachine,
    SimulatedControlSurface, SurfaceParams, SyntheticSource,
};

const POLL: Duration = Duration::from_millis(500);

struct Harness {
    machine: Arc<SessionStateMachine>,
    viewer: Arc<SessionStateMachine>,
    capture: Arc<ChunkedCaptureManager>,
    coordinator: Arc<CrossProcessCoordinator>,
    surface: Arc<SimulatedControlSurface>,
    artifacts: Arc<Mutex<Vec<Artifact>>>,
    _intent: castline::IntentLoopHandle,
}

fn harness() -> Harness {
    let owner = OwnerId::new("flow-owner");
    let mirror = Arc::new(InMemoryMirror::new());
    let machine = SessionStateMachine::new(owner.clone(), mirror.clone());
    let viewer = SessionStateMachine::new(owner, mirror);
    machine.attach_mirror();
    viewer.attach_mirror();

    let capture = Arc::new(ChunkedCaptureManager::new(Duration::from_millis(100)));
    let surface = Arc::new(SimulatedControlSurface::new());
    let coordinator = CrossProcessCoordinator::new(
        machine.clone(),
        surface.clone(),
        SurfaceParams::default(),
        POLL,
    );

    let artifacts = Arc::new(Mutex::new(Vec::new()));
    let sink = artifacts.clone();
    let intent = spawn_intent_loop(
        machine.clone(),
        capture.clone(),
        || SyntheticSource::new(512, Duration::from_millis(10)),
        |_chunk| {},
        move |artifact| sink.lock().push(artifact),
    );

    Harness {
        machine,
        viewer,
        capture,
        coordinator,
        surface,
        artifacts,
        _intent: intent,
    }
}

/// The whole ride: open controls, start through intent, record, user closes
/// the controls, watcher stops the recording, artifact lands, peers settle
/// on `Ready`.
#[tokio::test(start_paused = true)]
async fn closing_the_surface_ends_the_recording() {
    let h = harness();

    h.coordinator.open_control_surface().unwrap();
    h.machine.request_transition(RecorderStatus::Ready);
    h.machine.request_transition(RecorderStatus::ShouldStart);

    tokio::time::sleep(Duration::from_millis(50)).await;
    assert_eq!(h.machine.current_status(), RecorderStatus::Recording);
    assert!(h.capture.is_recording());

    // Record across a few chunk boundaries, then the user closes the window.
    tokio::time::sleep(Duration::from_millis(350)).await;
    h.surface.last_opened().unwrap().close_externally();

    // One poll interval to notice, a little more to save and settle.
    tokio::time::sleep(POLL + Duration::from_millis(100)).await;

    assert_eq!(h.machine.current_status(), RecorderStatus::Ready);
    assert!(!h.capture.is_recording());

    let artifacts = h.artifacts.lock();
    assert_eq!(artifacts.len(), 1);
    assert!(!artifacts[0].is_empty());
    assert!(artifacts[0].chunk_count() >= 3);
}

/// The viewer window follows the whole lifecycle without ever requesting a
/// transition itself.
#[tokio::test(start_paused = true)]
async fn viewer_follows_the_full_lifecycle() {
    let h = harness();

    h.coordinator.open_control_surface().unwrap();
    h.machine.request_transition(RecorderStatus::ShouldStart);
    tokio::time::sleep(Duration::from_millis(50)).await;
    assert_eq!(h.viewer.current_status(), RecorderStatus::Recording);

    h.machine.request_transition(RecorderStatus::ShouldStop);
    tokio::time::sleep(Duration::from_millis(100)).await;
    assert_eq!(h.viewer.current_status(), RecorderStatus::Ready);
}

/// Two recordings back to back reuse the same manager; the second artifact
/// contains only the second capture.
#[tokio::test(start_paused = true)]
async fn back_to_back_recordings_do_not_bleed() {
    let h = harness();
    h.coordinator.open_control_surface().unwrap();

    for _ in 0..2 {
        h.machine.request_transition(RecorderStatus::ShouldStart);
        tokio::time::sleep(Duration::from_millis(250)).await;
        h.machine.request_transition(RecorderStatus::ShouldStop);
        tokio::time::sleep(Duration::from_millis(50)).await;
    }

    let artifacts = h.artifacts.lock();
    assert_eq!(artifacts.len(), 2);
    // Durations matched, so sizes should be in the same ballpark; a bleed
    // would roughly double the second artifact.
    assert!(artifacts[1].len() < artifacts[0].len() * 2);
}

/// Concurrent credit deductions after recordings: the race that loses an
/// update without serialization, plus a failing entry in the middle.
#[tokio::test]
async fn concurrent_deductions_settle_exactly() {
    let queue = SerializedMutationQueue::new();
    let balance = Arc::new(Mutex::new(100i64));

    let deduct = |amount: i64, remote_ok: bool| {
        let read = balance.clone();
        let apply = balance.clone();
        let restore = balance.clone();
        queue.execute(
            move || *read.lock(),
            move |current| current - amount,
            move |next| *apply.lock() = *next,
            move |_next| async move {
                if remote_ok {
                    Ok(())
                } else {
                    Err(anyhow::anyhow!("payment backend rejected the charge"))
                }
            },
            move |previous| *restore.lock() = previous,
        )
    };

    // Three windows deduct at once; the middle one fails remotely.
    let a = deduct(10, true);
    let b = deduct(5, false);
    let c = deduct(20, true);

    assert!(a.await.is_ok());
    assert!(b.await.is_err());
    assert!(c.await.is_ok());

    // 100 - 10 - 20, with the failed 5 rolled back exactly.
    assert_eq!(*balance.lock(), 70);
}
