//! Capture port interfaces

use std::sync::Arc;
use thiserror::Error;

use crate::domain::recording::{BufferSlot, CaptureTimestamp, CodecSideInfo, StreamFormat};

/// Capture errors
#[derive(Debug, Clone, Error)]
pub enum CaptureError {
    #[error("No audio input device available")]
    NoInputDevice,

    #[error("Failed to open input stream: {0}")]
    StreamFailed(String),

    #[error("Encoder failed: {0}")]
    EncoderFailed(String),

    #[error("Buffer {slot} was rejected: {reason}")]
    EnqueueRejected { slot: usize, reason: String },

    #[error("Capture session has been disposed")]
    Disposed,

    #[error("Capture thread exited unexpectedly")]
    ThreadExited,
}

/// A buffer handed back by the capture side
#[derive(Debug)]
pub struct FilledBuffer {
    /// The drained slot; its packets and valid bytes are ready to write
    pub slot: BufferSlot,
    /// Where the buffer's first frame sits in the captured stream
    pub start_time: CaptureTimestamp,
}

impl FilledBuffer {
    pub fn packet_count(&self) -> u32 {
        self.slot.packet_count()
    }
}

/// A slot the queue refused, handed back to its owner
#[derive(Debug, Error)]
#[error("{error}")]
pub struct RejectedBuffer {
    pub slot: BufferSlot,
    pub error: CaptureError,
}

impl RejectedBuffer {
    pub fn new(slot: BufferSlot, error: CaptureError) -> Self {
        Self { slot, error }
    }
}

/// Queue of empty slots waiting to be filled
pub trait BufferQueue: Send + Sync {
    /// Hand a slot to the capture side. Any previous contents are discarded.
    /// A refused slot comes back with the error.
    fn enqueue(&self, slot: BufferSlot) -> Result<(), RejectedBuffer>;
}

/// Receiver of filled buffers.
///
/// Called on a thread owned by the capture session, one buffer at a time and
/// in capture order. `queue` is the session's own queue, for resubmission.
pub trait BufferCompletion: Send + Sync {
    fn on_buffer_filled(&self, queue: &dyn BufferQueue, filled: FilledBuffer);

    /// Captured audio could not be turned into packets. Capture goes on
    /// but its audio is lost from here on.
    fn on_capture_error(&self, error: CaptureError);
}

/// Asynchronous producer of filled buffers
pub trait CaptureSession: BufferQueue {
    /// Stream description as configured by the session.
    /// May carry fields that were unknown before the encoder existed.
    fn stream_format(&self) -> Result<StreamFormat, CaptureError>;

    /// Largest packet the encoder can emit, in bytes
    fn max_packet_size(&self) -> Result<usize, CaptureError>;

    /// Current codec configuration, if the codec has one
    fn codec_side_info(&self) -> Result<Option<CodecSideInfo>, CaptureError>;

    /// Begin delivering completions. Returns without waiting for audio.
    fn start(&mut self) -> Result<(), CaptureError>;

    /// Stop capturing. With `flush`, audio already captured is delivered in
    /// one final completion before this returns.
    fn stop(&mut self, flush: bool) -> Result<(), CaptureError>;

    /// Release the session. No completion runs after this returns.
    /// Returns every slot the session still held.
    fn dispose(&mut self) -> Result<Vec<BufferSlot>, CaptureError>;
}

/// Factory for capture sessions
pub trait CaptureBackend {
    type Session: CaptureSession;

    /// Create a session producing `format`, reporting to `completion`
    fn create(
        &self,
        format: &StreamFormat,
        completion: Arc<dyn BufferCompletion>,
    ) -> Result<Self::Session, CaptureError>;
}
