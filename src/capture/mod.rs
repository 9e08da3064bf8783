//! Chunked capture: bounded, memory-safe recording of a live source.

pub mod error;
pub mod manager;
pub mod source;

pub use error::CaptureError;
pub use manager::{
    Artifact, CaptureHandle, Chunk, ChunkedCaptureManager, ChunkSink, DEFAULT_CHUNK_INTERVAL,
};
pub use source::{CaptureSource, SyntheticSource};
