//! Application layer - Recording pipeline and port interfaces
//!
//! Contains the pipeline that moves buffers from capture to the output
//! file, and the trait definitions for the systems it drives.

pub mod buffer_pool;
pub mod error;
pub mod pipeline;
pub mod ports;
pub mod recording_state;

#[cfg(test)]
pub(crate) mod test_support;

// Re-export the use case
pub use buffer_pool::{BufferLayout, BufferPool};
pub use error::{ErrorKind, RecorderError};
pub use pipeline::{RecordingPipeline, SessionOptions, SessionSummary, StopCause};
pub use recording_state::RecordingState;
