//! queue-recorder - buffer-queue audio recording
//!
//! Records the default input device into a CAF or Ogg file. Capture runs
//! through a small ring of fixed-size buffers: the device fills a buffer,
//! a completion handler appends its packets to the file and hands the
//! buffer back, until the session is stopped.
//!
//! # Architecture
//!
//! The crate follows hexagonal (ports & adapters) architecture:
//!
//! - **Domain**: Stream formats, buffer slots, packet descriptions, durations, session states
//! - **Application**: The recording pipeline, buffer pool, and port interfaces (traits)
//! - **Infrastructure**: Adapter implementations (cpal capture, Opus encoding, CAF/Ogg files, config)
//! - **CLI**: Command-line interface, argument parsing, and stop triggers

pub mod application;
pub mod cli;
pub mod domain;
pub mod infrastructure;
