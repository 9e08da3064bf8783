pub mod recording_flow;
pub mod session_sync;
