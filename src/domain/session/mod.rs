//! Recording session lifecycle

pub mod state;

pub use state::{InvalidStateTransition, RecordingSession, SessionState};
