//! Output sink port interfaces

use std::path::Path;
use thiserror::Error;

use crate::domain::error::UnsupportedFormatError;
use crate::domain::recording::{CodecSideInfo, ContainerFormat, PacketDescription, StreamFormat};

/// Sink errors
#[derive(Debug, Clone, Error)]
pub enum SinkError {
    #[error("Output file already exists: {0}")]
    AlreadyExists(String),

    #[error("I/O error: {0}")]
    Io(String),

    #[error(transparent)]
    Unsupported(#[from] UnsupportedFormatError),

    #[error("Packets must be appended in order: expected packet {expected}, got {actual}")]
    OutOfOrder { expected: u64, actual: u64 },

    #[error("Malformed packet data: {0}")]
    InvalidPackets(String),

    #[error("Codec configuration is required before the first packet")]
    MissingSideInfo,

    #[error("Output file is closed")]
    Closed,
}

impl From<std::io::Error> for SinkError {
    fn from(err: std::io::Error) -> Self {
        Self::Io(err.to_string())
    }
}

/// Append-only, packet-indexed audio file
pub trait OutputSink: Send {
    /// Append `packet_count` packets starting at `start_packet`.
    ///
    /// `data` holds `byte_count` valid bytes laid out as `descriptions`
    /// says; descriptions are empty for constant bit rate formats. With
    /// `use_cache` false the bytes are pushed to the file before returning.
    ///
    /// # Returns
    /// The number of packets actually written
    fn write_packets(
        &mut self,
        use_cache: bool,
        byte_count: u32,
        descriptions: &[PacketDescription],
        start_packet: u64,
        packet_count: u32,
        data: &[u8],
    ) -> Result<u32, SinkError>;

    /// Store the codec configuration. May be called again later to revise it.
    fn set_codec_side_info(&mut self, info: &CodecSideInfo) -> Result<(), SinkError>;

    /// Write trailing metadata and close the file
    fn close(&mut self) -> Result<(), SinkError>;
}

/// Factory for output sinks
pub trait SinkFactory {
    type Sink: OutputSink + 'static;

    /// Create the output file.
    ///
    /// # Arguments
    /// * `erase_existing` - replace a file already at `path` instead of failing
    fn create(
        &self,
        path: &Path,
        container: ContainerFormat,
        format: &StreamFormat,
        erase_existing: bool,
    ) -> Result<Self::Sink, SinkError>;
}
