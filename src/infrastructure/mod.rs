//! Infrastructure layer - Adapter implementations
//!
//! Contains concrete implementations of the port interfaces:
//! audio capture through cpal, CAF and Ogg output files, and the
//! XDG config file.

pub mod capture;
pub mod config;
pub mod sink;

// Re-export adapters
pub use capture::{CpalCaptureBackend, CpalFormatNegotiator};
pub use config::XdgConfigStore;
pub use sink::{FileSink, FileSinkFactory};
