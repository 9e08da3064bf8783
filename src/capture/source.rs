use std::time::Duration;

use async_trait::async_trait;

use crate::capture::error::CaptureError;

/// A live capturable source of raw media frames.
///
/// The manager pulls frames until the source returns `None` (ended) or an
/// error (aborted). Concrete sources wrap whatever the platform provides; the
/// crate ships [`SyntheticSource`] for tests and the demo binary.
#[async_trait]
pub trait CaptureSource: Send + 'static {
    /// The next frame, `None` when the source has ended.
    async fn next_frame(&mut self) -> Result<Option<Vec<u8>>, CaptureError>;
}

/// Generates fixed-size patterned frames on a timer. Optionally bounded so a
/// test can let the source end on its own.
pub struct SyntheticSource {
    frame_len: usize,
    frame_interval: Duration,
    remaining: Option<usize>,
    counter: u8,
}

impl SyntheticSource {
    pub fn new(frame_len: usize, frame_interval: Duration) -> Self {
        Self {
            frame_len,
            frame_interval,
            remaining: None,
            counter: 0,
        }
    }

    /// End the source after `frames` frames instead of running forever.
    pub fn with_frame_limit(mut self, frames: usize) -> Self {
        self.remaining = Some(frames);
        self
    }
}

#[async_trait]
impl CaptureSource for SyntheticSource {
    async fn next_frame(&mut self) -> Result<Option<Vec<u8>>, CaptureError> {
        if let Some(remaining) = &mut self.remaining {
            if *remaining == 0 {
                return Ok(None);
            }
            *remaining -= 1;
        }

        tokio::time::sleep(self.frame_interval).await;
        let frame = vec![self.counter; self.frame_len];
        self.counter = self.counter.wrapping_add(1);
        Ok(Some(frame))
    }
}
