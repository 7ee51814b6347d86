//! Domain layer - Core recording concepts
//!
//! Contains value objects, the session state machine, and domain errors.
//! This layer has no dependencies on external systems.

pub mod config;
pub mod error;
pub mod recording;
pub mod session;

// Re-export common types
pub use config::AppConfig;
pub use error::*;
pub use recording::{
    BufferSlot, CaptureTimestamp, Codec, CodecSideInfo, ContainerFormat, Duration,
    PacketDescription, StreamFormat,
};
pub use session::{InvalidStateTransition, RecordingSession, SessionState};
