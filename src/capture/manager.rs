//! Bounded chunk emission over a live capture source.
//!
//! A single unbounded buffer would grow for the whole length of a recording;
//! the manager instead cuts the stream into chunks on a fixed interval
//! (default 60 s), forwarding each chunk to the caller as it is emitted and
//! keeping the ordered sequence for final artifact assembly.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use tokio::sync::mpsc;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

use crate::capture::error::CaptureError;
use crate::capture::source::CaptureSource;

/// Default chunk emission interval: one minute of capture per chunk.
pub const DEFAULT_CHUNK_INTERVAL: Duration = Duration::from_millis(60_000);

/// One bounded slice of captured media. Immutable once emitted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Chunk {
    seq: u64,
    data: Vec<u8>,
}

impl Chunk {
    /// Emission sequence number, starting at 0 per capture.
    pub fn seq(&self) -> u64 {
        self.seq
    }

    pub fn data(&self) -> &[u8] {
        &self.data
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }
}

/// The assembled recording: all chunks of one capture, concatenated in
/// emission order. Immutable once returned.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Artifact {
    data: Vec<u8>,
    chunk_count: usize,
}

impl Artifact {
    pub fn data(&self) -> &[u8] {
        &self.data
    }

    pub fn into_bytes(self) -> Vec<u8> {
        self.data
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    pub fn chunk_count(&self) -> usize {
        self.chunk_count
    }
}

/// Callback invoked with every chunk, synchronously with emission.
pub type ChunkSink = Box<dyn Fn(Chunk) + Send>;

/// Identifies one capture started by [`ChunkedCaptureManager::start_recording`].
#[derive(Debug, Clone)]
pub struct CaptureHandle {
    id: Uuid,
    cancel: CancellationToken,
}

impl CaptureHandle {
    pub fn id(&self) -> Uuid {
        self.id
    }

    /// False once this capture was stopped, cleaned up, or replaced by a
    /// later `start_recording`.
    pub fn is_live(&self) -> bool {
        !self.cancel.is_cancelled()
    }
}

struct CaptureShared {
    chunks: Mutex<Vec<Chunk>>,
    pending: Mutex<Vec<u8>>,
    next_seq: AtomicU64,
    /// Set when the source aborts; reported by `stop_recording`.
    failure: Mutex<Option<String>>,
}

impl CaptureShared {
    fn emit(&self, sink: &ChunkSink) {
        let data = std::mem::take(&mut *self.pending.lock());
        if data.is_empty() {
            return;
        }
        let chunk = Chunk {
            seq: self.next_seq.fetch_add(1, Ordering::SeqCst),
            data,
        };
        tracing::debug!(seq = chunk.seq(), bytes = chunk.len(), "chunk emitted");
        self.chunks.lock().push(chunk.clone());
        sink(chunk);
    }
}

struct ActiveCapture {
    id: Uuid,
    cancel: CancellationToken,
    task: tokio::task::JoinHandle<()>,
    shared: Arc<CaptureShared>,
}

/// Owns at most one in-flight capture and turns it into bounded chunks.
pub struct ChunkedCaptureManager {
    chunk_interval: Duration,
    active: Mutex<Option<ActiveCapture>>,
}

impl Default for ChunkedCaptureManager {
    fn default() -> Self {
        Self::new(DEFAULT_CHUNK_INTERVAL)
    }
}

impl ChunkedCaptureManager {
    pub fn new(chunk_interval: Duration) -> Self {
        Self {
            chunk_interval,
            active: Mutex::new(None),
        }
    }

    /// Begin capturing from `source`, emitting a chunk every interval.
    ///
    /// Starting while a capture is already running resets it: the previous
    /// capture is cancelled and its chunks are discarded (last-start-wins).
    pub fn start_recording(
        &self,
        source: impl CaptureSource,
        on_chunk: impl Fn(Chunk) + Send + 'static,
    ) -> CaptureHandle {
        let shared = Arc::new(CaptureShared {
            chunks: Mutex::new(Vec::new()),
            pending: Mutex::new(Vec::new()),
            next_seq: AtomicU64::new(0),
            failure: Mutex::new(None),
        });
        let cancel = CancellationToken::new();
        let id = Uuid::new_v4();

        let task = tokio::spawn(Self::pump(
            source,
            shared.clone(),
            Box::new(on_chunk),
            cancel.clone(),
            self.chunk_interval,
        ));

        let previous = self.active.lock().replace(ActiveCapture {
            id,
            cancel: cancel.clone(),
            task,
            shared,
        });
        if let Some(previous) = previous {
            tracing::warn!(
                replaced = %previous.id,
                "start_recording while a capture was active; previous capture discarded"
            );
            previous.cancel.cancel();
            previous.task.abort();
        }

        tracing::info!(capture = %id, "capture started");
        CaptureHandle { id, cancel }
    }

    /// Stop the active capture and assemble the artifact.
    ///
    /// The final partial chunk (anything captured since the last interval
    /// boundary) is flushed through the sink before assembly. The chunk
    /// buffer is cleared; the artifact is the only remaining copy. If the
    /// source aborted mid-capture, the failure is reported here instead of
    /// an artifact.
    pub async fn stop_recording(&self) -> Result<Artifact, CaptureError> {
        let active = self
            .active
            .lock()
            .take()
            .ok_or(CaptureError::NoActiveCapture)?;

        active.cancel.cancel();
        let _ = active.task.await;

        if let Some(reason) = active.shared.failure.lock().take() {
            tracing::warn!(capture = %active.id, reason = %reason, "capture had failed");
            return Err(CaptureError::Source(reason));
        }

        let chunks = std::mem::take(&mut *active.shared.chunks.lock());
        let chunk_count = chunks.len();
        let mut data = Vec::with_capacity(chunks.iter().map(Chunk::len).sum());
        for chunk in chunks {
            data.extend_from_slice(chunk.data());
        }

        tracing::info!(capture = %active.id, chunks = chunk_count, bytes = data.len(), "capture stopped");
        Ok(Artifact { data, chunk_count })
    }

    /// Force-release everything, whatever state the manager is in.
    ///
    /// Idempotent: safe to call with no capture running, and safe to call
    /// again after itself. Buffered chunks are dropped, not returned.
    pub async fn cleanup(&self) {
        let active = self.active.lock().take();
        if let Some(active) = active {
            tracing::debug!(capture = %active.id, "cleanup forced an active capture to stop");
            active.cancel.cancel();
            let _ = active.task.await;
        }
    }

    pub fn is_recording(&self) -> bool {
        self.active.lock().is_some()
    }

    async fn pump(
        mut source: impl CaptureSource,
        shared: Arc<CaptureShared>,
        sink: ChunkSink,
        cancel: CancellationToken,
        chunk_interval: Duration,
    ) {
        // Bridge the source through a channel so the select below stays
        // cancellation-safe: a tick never loses a half-read frame.
        let (frame_tx, mut frame_rx) = mpsc::channel::<Vec<u8>>(64);
        let reader_cancel = cancel.clone();
        let reader_shared = shared.clone();
        let reader = tokio::spawn(async move {
            loop {
                tokio::select! {
                    _ = reader_cancel.cancelled() => break,
                    frame = source.next_frame() => match frame {
                        Ok(Some(frame)) => {
                            if frame_tx.send(frame).await.is_err() {
                                break;
                            }
                        }
                        Ok(None) => break,
                        Err(err) => {
                            tracing::warn!(error = %err, "capture source failed");
                            *reader_shared.failure.lock() = Some(err.to_string());
                            break;
                        }
                    },
                }
            }
        });

        let mut ticker = tokio::time::interval(chunk_interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        // The first tick of a tokio interval fires immediately; swallow it so
        // the first chunk covers a full interval.
        ticker.tick().await;

        loop {
            tokio::select! {
                _ = cancel.cancelled() => break,
                _ = ticker.tick() => shared.emit(&sink),
                frame = frame_rx.recv() => match frame {
                    Some(frame) => shared.pending.lock().extend_from_slice(&frame),
                    // Source ended on its own; wait for stop/cleanup.
                    None => {
                        cancel.cancelled().await;
                        break;
                    }
                },
            }
        }

        // Flush whatever arrived since the last boundary.
        while let Ok(frame) = frame_rx.try_recv() {
            shared.pending.lock().extend_from_slice(&frame);
        }
        shared.emit(&sink);

        reader.abort();
        let _ = reader.await;
    }
}
