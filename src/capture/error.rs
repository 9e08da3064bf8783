/// Failure of an in-flight capture call. Fatal to that call only; the
/// manager itself stays usable.
#[derive(Debug, thiserror::Error)]
pub enum CaptureError {
    /// `stop_recording` was called with no capture running.
    #[error("no active capture")]
    NoActiveCapture,

    /// The capture source stopped producing frames abnormally.
    #[error("capture source failed: {0}")]
    Source(String),
}
