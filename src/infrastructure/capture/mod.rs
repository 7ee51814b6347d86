//! Capture infrastructure module
//!
//! Records from the default input device with cpal. Device audio is
//! converted to the negotiated rate and channel count, encoded to linear PCM
//! or Opus, and packed into the pipeline's buffers.

mod conditioner;
mod cpal_backend;
mod device;
mod encoder;
mod negotiator;
mod notifier;

pub use cpal_backend::{CpalCaptureBackend, CpalCaptureSession};
pub use encoder::{encoder_for, LinearPcmEncoder, OpusPacketEncoder, PacketEncoder, OPUS_MAX_PACKET_SIZE};
pub use negotiator::CpalFormatNegotiator;
