//! Serialized, rollback-safe optimistic mutations.
//!
//! Naive optimistic updates lose writes under concurrency: two callers read
//! the same base value, both compute from it, and one update silently
//! vanishes. [`SerializedMutationQueue`] fixes this by running every
//! submitted mutation strictly in enqueue order, one at a time, so operation
//! *k+1* always computes from the value operation *k* left behind, whether
//! *k* committed or rolled back.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use futures::future::BoxFuture;
use futures::FutureExt;
use parking_lot::Mutex;
use tokio::sync::oneshot;

/// Failure of one queued mutation. Isolated: it never affects other entries.
#[derive(Debug, thiserror::Error)]
pub enum QueueError {
    /// The authoritative remote operation failed; the optimistic value was
    /// rolled back to the pre-operation state.
    #[error("mutation failed and was rolled back: {0}")]
    Operation(anyhow::Error),

    /// The entry was rejected by `clear()` before it started.
    #[error("mutation cancelled before it ran")]
    Cancelled,
}

type BoxedOp = Box<dyn FnOnce() -> BoxFuture<'static, Result<(), QueueError>> + Send>;

struct QueueEntry {
    seq: u64,
    op: BoxedOp,
    done: oneshot::Sender<Result<(), QueueError>>,
}

#[derive(Default)]
struct PendingState {
    entries: VecDeque<QueueEntry>,
    running: bool,
}

/// At-most-one-in-flight transactional wrapper for a scalar resource.
///
/// Callers never touch the resource directly; every change goes through
/// [`execute`](Self::execute).
#[derive(Clone, Default)]
pub struct SerializedMutationQueue {
    state: Arc<Mutex<PendingState>>,
    next_seq: Arc<AtomicU64>,
}

impl SerializedMutationQueue {
    pub fn new() -> Self {
        Self::default()
    }

    /// Enqueue one transactional mutation.
    ///
    /// Steps, in order: `get_current` reads the resource, `compute_next`
    /// derives the candidate value, `apply_optimistic` installs it
    /// synchronously so observers see the change immediately, then
    /// `perform_remote` runs the authoritative (possibly slow) operation.
    /// If `perform_remote` fails, `rollback` receives the pre-operation
    /// value and only this entry's future resolves to an error; the queue
    /// keeps processing.
    ///
    /// The returned future settles when the entry does; dropping it does not
    /// cancel the entry.
    pub fn execute<T, G, C, A, R, F, B>(
        &self,
        get_current: G,
        compute_next: C,
        apply_optimistic: A,
        perform_remote: R,
        rollback: B,
    ) -> impl std::future::Future<Output = Result<(), QueueError>>
    where
        T: Send + 'static,
        G: FnOnce() -> T + Send + 'static,
        C: FnOnce(&T) -> T + Send + 'static,
        A: FnOnce(&T) + Send + 'static,
        R: FnOnce(T) -> F + Send + 'static,
        F: std::future::Future<Output = Result<(), anyhow::Error>> + Send + 'static,
        B: FnOnce(T) + Send + 'static,
    {
        let seq = self.next_seq.fetch_add(1, Ordering::SeqCst);
        let op: BoxedOp = Box::new(move || {
            async move {
                let current = get_current();
                let next = compute_next(&current);
                apply_optimistic(&next);
                match perform_remote(next).await {
                    Ok(()) => Ok(()),
                    Err(err) => {
                        rollback(current);
                        Err(QueueError::Operation(err))
                    }
                }
            }
            .boxed()
        });

        let (done_tx, done_rx) = oneshot::channel();
        self.enqueue(QueueEntry {
            seq,
            op,
            done: done_tx,
        });

        async move {
            match done_rx.await {
                Ok(result) => result,
                // Sender dropped without settling; treat as cancellation.
                Err(_) => Err(QueueError::Cancelled),
            }
        }
    }

    /// Entries enqueued but not yet started. The in-flight entry, if any, is
    /// not counted.
    pub fn pending_operations(&self) -> usize {
        self.state.lock().entries.len()
    }

    /// Reject every not-yet-started entry with [`QueueError::Cancelled`].
    /// An entry currently executing is unaffected.
    pub fn clear(&self) {
        let drained: Vec<QueueEntry> = self.state.lock().entries.drain(..).collect();
        let count = drained.len();
        for entry in drained {
            let _ = entry.done.send(Err(QueueError::Cancelled));
        }
        if count > 0 {
            tracing::debug!(cancelled = count, "mutation queue cleared");
        }
    }

    fn enqueue(&self, entry: QueueEntry) {
        let start_pump = {
            let mut state = self.state.lock();
            state.entries.push_back(entry);
            if state.running {
                false
            } else {
                state.running = true;
                true
            }
        };

        if start_pump {
            let state = self.state.clone();
            tokio::spawn(async move {
                loop {
                    let entry = {
                        let mut guard = state.lock();
                        match guard.entries.pop_front() {
                            Some(entry) => entry,
                            None => {
                                guard.running = false;
                                break;
                            }
                        }
                    };

                    let seq = entry.seq;
                    let result = (entry.op)().await;
                    if let Err(err) = &result {
                        tracing::debug!(seq, error = %err, "queued mutation failed");
                    }
                    // Caller may have dropped its future; the entry still
                    // counts as settled.
                    let _ = entry.done.send(result);
                }
            });
        }
    }
}
