//! Port interfaces (traits) for external systems
//!
//! These traits define the boundaries between the recording pipeline
//! and the audio, file, and configuration adapters.

pub mod capture;
pub mod config;
pub mod format;
pub mod sink;

// Re-export common types
pub use capture::{
    BufferCompletion, BufferQueue, CaptureBackend, CaptureError, CaptureSession, FilledBuffer,
    RejectedBuffer,
};
pub use config::ConfigStore;
pub use format::{FormatError, FormatNegotiator};
pub use sink::{OutputSink, SinkError, SinkFactory};
