use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use clap::Parser;
use parking_lot::Mutex;

use castline::{
    spawn_intent_loop, ChunkedCaptureManager, CrossProcessCoordinator, InMemoryMirror, OwnerId,
    RecorderStatus, SerializedMutationQueue, SessionStateMachine, Settings,
    SimulatedControlSurface, SyntheticSource,
};

/// Simulates a full recording session: two windows sharing one session
/// through the mirror, a chunked capture, and a serialized credit deduction.
#[derive(Debug, Parser)]
#[command(name = "castline", about = "Recording-session core demo")]
struct Cli {
    /// Owner of the simulated session.
    #[arg(long, default_value = "demo-owner")]
    owner: String,

    /// How long to record, in milliseconds.
    #[arg(long, default_value_t = 3000)]
    duration_ms: u64,

    /// Chunk interval override for the demo, in milliseconds.
    #[arg(long, default_value_t = 1000)]
    chunk_interval_ms: u64,

    /// Optional TOML settings file.
    #[arg(long)]
    config: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(tracing::Level::INFO.into()),
        )
        .init();

    let cli = Cli::parse();
    let mut settings = match &cli.config {
        Some(path) => Settings::load(path)?,
        None => Settings::default(),
    };
    settings.chunk_interval = Duration::from_millis(cli.chunk_interval_ms);

    let owner = OwnerId::new(cli.owner);
    let mirror = Arc::new(InMemoryMirror::new());

    // Two "windows" of the same owner, coupled only through the mirror.
    let recorder_window = SessionStateMachine::new(owner.clone(), mirror.clone());
    let viewer_window = SessionStateMachine::new(owner.clone(), mirror.clone());
    recorder_window.attach_mirror();
    viewer_window.attach_mirror();

    let capture = Arc::new(ChunkedCaptureManager::new(settings.chunk_interval));
    let surface = Arc::new(SimulatedControlSurface::new());
    let coordinator = CrossProcessCoordinator::new(
        recorder_window.clone(),
        surface.clone(),
        settings.surface.clone(),
        settings.poll_interval,
    );

    let artifacts = Arc::new(Mutex::new(Vec::new()));
    let artifact_sink = artifacts.clone();
    let _intent = spawn_intent_loop(
        recorder_window.clone(),
        capture.clone(),
        || SyntheticSource::new(4096, Duration::from_millis(50)),
        |chunk| tracing::info!(seq = chunk.seq(), bytes = chunk.len(), "chunk uploaded"),
        move |artifact| artifact_sink.lock().push(artifact),
    );

    coordinator.open_control_surface()?;
    recorder_window.request_transition(RecorderStatus::Ready);
    recorder_window.request_transition(RecorderStatus::ShouldStart);

    tokio::time::sleep(Duration::from_millis(cli.duration_ms)).await;
    tracing::info!("user closes the control surface");
    if let Some(probe) = surface.last_opened() {
        probe.close_externally();
    }

    // One poll interval for the watcher, a little more for save + sync.
    tokio::time::sleep(settings.poll_interval + Duration::from_millis(200)).await;

    let artifacts = artifacts.lock();
    match artifacts.first() {
        Some(artifact) => tracing::info!(
            bytes = artifact.len(),
            chunks = artifact.chunk_count(),
            "artifact assembled"
        ),
        None => tracing::warn!("no artifact was produced"),
    }
    tracing::info!(
        recorder = %recorder_window.current_status(),
        viewer = %viewer_window.current_status(),
        "final statuses"
    );

    // Deduct one recording's worth of credits, serialized and rollback-safe.
    let balance = Arc::new(Mutex::new(100i64));
    let queue = SerializedMutationQueue::new();
    let read = balance.clone();
    let apply = balance.clone();
    let restore = balance.clone();
    queue
        .execute(
            move || *read.lock(),
            |current| current - 10,
            move |next| *apply.lock() = *next,
            |_next| async { Ok(()) },
            move |previous| *restore.lock() = previous,
        )
        .await?;
    tracing::info!(balance = *balance.lock(), "credits after deduction");

    Ok(())
}
