//! Packet-level value objects

use std::fmt;

/// Location of one encoded packet inside a buffer
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct PacketDescription {
    /// Byte offset of the packet within the buffer's data
    pub start_offset: u64,
    /// Frames in this packet, 0 when the format has a constant count
    pub variable_frames: u32,
    /// Length of the packet in bytes
    pub data_byte_size: u32,
}

impl PacketDescription {
    pub const fn new(start_offset: u64, data_byte_size: u32) -> Self {
        Self {
            start_offset,
            variable_frames: 0,
            data_byte_size,
        }
    }

    /// Offset one past the packet's last byte
    pub const fn end_offset(&self) -> u64 {
        self.start_offset + self.data_byte_size as u64
    }
}

/// Opaque codec configuration ("magic cookie").
///
/// The recorder never interprets these bytes; it copies them from the
/// encoder to the output file.
#[derive(Clone, PartialEq, Eq, Default)]
pub struct CodecSideInfo {
    bytes: Vec<u8>,
}

impl CodecSideInfo {
    pub fn new(bytes: Vec<u8>) -> Self {
        Self { bytes }
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes
    }

    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }
}

impl fmt::Debug for CodecSideInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "CodecSideInfo({} bytes)", self.bytes.len())
    }
}

impl From<Vec<u8>> for CodecSideInfo {
    fn from(bytes: Vec<u8>) -> Self {
        Self::new(bytes)
    }
}

/// Position of a filled buffer in the captured stream
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct CaptureTimestamp {
    /// Frames captured before the first frame of this buffer
    pub sample_time: u64,
}
