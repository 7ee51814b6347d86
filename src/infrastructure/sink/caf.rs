//! Core Audio Format writer
//!
//! Layout: `caff` file header, `desc`, then a `data` chunk whose size is
//! left open (-1) while recording. Closing patches the size and appends
//! `kuki` (codec configuration) and, for variable bit rate codecs, `pakt`.
//! All integers are big-endian.

use std::fs::File;
use std::io::{BufWriter, Seek, SeekFrom, Write};
use std::path::Path;

use crate::application::ports::{OutputSink, SinkError};
use crate::domain::recording::{Codec, CodecSideInfo, PacketDescription, StreamFormat};

use super::open_output;

const FILE_VERSION: u16 = 1;
const DESC_CHUNK_SIZE: i64 = 32;
const UNKNOWN_SIZE: i64 = -1;
/// Size of the edit count leading the data chunk
const EDIT_COUNT_SIZE: u64 = 4;

/// kCAFLinearPCMFormatFlagIsLittleEndian
const PCM_LITTLE_ENDIAN: u32 = 1 << 1;

/// Append a big-endian base-128 integer, as the packet table stores sizes
pub fn write_varint(mut value: u64, out: &mut Vec<u8>) {
    let mut bytes = [0u8; 10];
    let mut len = 0;
    loop {
        bytes[len] = (value & 0x7f) as u8;
        len += 1;
        value >>= 7;
        if value == 0 {
            break;
        }
    }
    for i in (0..len).rev() {
        let more = if i > 0 { 0x80 } else { 0 };
        out.push(bytes[i] | more);
    }
}

fn chunk_header(out: &mut Vec<u8>, kind: &[u8; 4], size: i64) {
    out.extend_from_slice(kind);
    out.extend_from_slice(&size.to_be_bytes());
}

fn desc_chunk(format: &StreamFormat) -> Vec<u8> {
    let flags = match format.codec {
        Codec::LinearPcm => PCM_LITTLE_ENDIAN,
        Codec::Opus => 0,
    };

    let mut out = Vec::with_capacity(12 + DESC_CHUNK_SIZE as usize);
    chunk_header(&mut out, b"desc", DESC_CHUNK_SIZE);
    out.extend_from_slice(&f64::from(format.sample_rate).to_be_bytes());
    out.extend_from_slice(&format.codec.four_cc());
    out.extend_from_slice(&flags.to_be_bytes());
    out.extend_from_slice(&format.bytes_per_packet.to_be_bytes());
    out.extend_from_slice(&format.frames_per_packet.to_be_bytes());
    out.extend_from_slice(&u32::from(format.channels).to_be_bytes());
    out.extend_from_slice(&u32::from(format.bits_per_channel).to_be_bytes());
    out
}

/// CAF file being recorded
pub struct CafSink {
    file: BufWriter<File>,
    format: StreamFormat,
    /// Position of the data chunk's size field
    data_size_offset: u64,
    data_bytes: u64,
    next_packet: u64,
    /// Byte size of every packet, kept for the packet table
    packet_sizes: Vec<u32>,
    side_info: Option<CodecSideInfo>,
    closed: bool,
}

impl CafSink {
    pub fn create(path: &Path, format: &StreamFormat, erase_existing: bool) -> Result<Self, SinkError> {
        let mut file = open_output(path, erase_existing)?;

        let mut header = Vec::with_capacity(64);
        header.extend_from_slice(b"caff");
        header.extend_from_slice(&FILE_VERSION.to_be_bytes());
        header.extend_from_slice(&0u16.to_be_bytes());
        header.extend_from_slice(&desc_chunk(format));

        let data_size_offset = header.len() as u64 + 4;
        chunk_header(&mut header, b"data", UNKNOWN_SIZE);
        header.extend_from_slice(&0u32.to_be_bytes()); // Edit count
        file.write_all(&header)?;

        log::debug!("created CAF file {} ({})", path.display(), format);
        Ok(Self {
            file,
            format: *format,
            data_size_offset,
            data_bytes: 0,
            next_packet: 0,
            packet_sizes: Vec::new(),
            side_info: None,
            closed: false,
        })
    }

    fn check_layout(
        &self,
        byte_count: u32,
        descriptions: &[PacketDescription],
        packet_count: u32,
        data: &[u8],
    ) -> Result<(), SinkError> {
        if byte_count as usize > data.len() {
            return Err(SinkError::InvalidPackets(format!(
                "{} bytes claimed, {} supplied",
                byte_count,
                data.len()
            )));
        }

        if self.format.is_variable_bit_rate() {
            if descriptions.len() != packet_count as usize {
                return Err(SinkError::InvalidPackets(format!(
                    "{} packets but {} descriptions",
                    packet_count,
                    descriptions.len()
                )));
            }
            if let Some(desc) = descriptions
                .iter()
                .find(|desc| desc.end_offset() > u64::from(byte_count))
            {
                return Err(SinkError::InvalidPackets(format!(
                    "packet at offset {} runs past the data",
                    desc.start_offset
                )));
            }
        } else {
            let expected = u64::from(packet_count) * u64::from(self.format.bytes_per_packet);
            if expected != u64::from(byte_count) {
                return Err(SinkError::InvalidPackets(format!(
                    "{} packets need {} bytes, got {}",
                    packet_count, expected, byte_count
                )));
            }
        }
        Ok(())
    }

    fn packet_table(&self) -> Vec<u8> {
        let packets = self.packet_sizes.len() as i64;
        let valid_frames = packets * i64::from(self.format.frames_per_packet);

        let mut body = Vec::with_capacity(24 + self.packet_sizes.len() * 2);
        body.extend_from_slice(&packets.to_be_bytes());
        body.extend_from_slice(&valid_frames.to_be_bytes());
        body.extend_from_slice(&0i32.to_be_bytes()); // Priming frames
        body.extend_from_slice(&0i32.to_be_bytes()); // Remainder frames
        for &size in &self.packet_sizes {
            write_varint(u64::from(size), &mut body);
        }

        let mut out = Vec::with_capacity(12 + body.len());
        chunk_header(&mut out, b"pakt", body.len() as i64);
        out.extend_from_slice(&body);
        out
    }

    fn finish(&mut self) -> Result<(), SinkError> {
        let data_size = EDIT_COUNT_SIZE + self.data_bytes;
        self.file.seek(SeekFrom::Start(self.data_size_offset))?;
        self.file.write_all(&(data_size as i64).to_be_bytes())?;

        let data_end = self.data_size_offset + 8 + data_size;
        self.file.seek(SeekFrom::Start(data_end))?;
        self.file.get_ref().set_len(data_end)?;

        let mut trailer = Vec::new();
        if let Some(info) = &self.side_info {
            chunk_header(&mut trailer, b"kuki", info.len() as i64);
            trailer.extend_from_slice(info.as_bytes());
        }
        if self.format.is_variable_bit_rate() {
            trailer.extend_from_slice(&self.packet_table());
        }
        self.file.write_all(&trailer)?;
        self.file.flush()?;
        self.file.get_ref().sync_all()?;

        log::debug!(
            "closed CAF file: {} packets, {} bytes of audio",
            self.next_packet,
            self.data_bytes
        );
        Ok(())
    }
}

impl OutputSink for CafSink {
    fn write_packets(
        &mut self,
        use_cache: bool,
        byte_count: u32,
        descriptions: &[PacketDescription],
        start_packet: u64,
        packet_count: u32,
        data: &[u8],
    ) -> Result<u32, SinkError> {
        if self.closed {
            return Err(SinkError::Closed);
        }
        if start_packet != self.next_packet {
            return Err(SinkError::OutOfOrder {
                expected: self.next_packet,
                actual: start_packet,
            });
        }
        self.check_layout(byte_count, descriptions, packet_count, data)?;

        // Nothing is counted until the bytes are accepted. Bytes of a failed
        // write lie past the data end and are cut off when closing.
        let written = if self.format.is_variable_bit_rate() {
            let mut written = 0u64;
            for desc in descriptions {
                let start = desc.start_offset as usize;
                let end = start + desc.data_byte_size as usize;
                self.file.write_all(&data[start..end])?;
                written += u64::from(desc.data_byte_size);
            }
            written
        } else {
            self.file.write_all(&data[..byte_count as usize])?;
            u64::from(byte_count)
        };

        if !use_cache {
            self.file.flush()?;
        }
        if self.format.is_variable_bit_rate() {
            self.packet_sizes
                .extend(descriptions.iter().map(|desc| desc.data_byte_size));
        }
        self.data_bytes += written;
        self.next_packet += u64::from(packet_count);
        Ok(packet_count)
    }

    fn set_codec_side_info(&mut self, info: &CodecSideInfo) -> Result<(), SinkError> {
        if self.closed {
            return Err(SinkError::Closed);
        }
        self.side_info = Some(info.clone());
        Ok(())
    }

    fn close(&mut self) -> Result<(), SinkError> {
        if self.closed {
            return Ok(());
        }
        self.closed = true;
        self.finish()
    }
}

impl Drop for CafSink {
    fn drop(&mut self) {
        if let Err(error) = self.close() {
            log::warn!("failed to finalize CAF file: {}", error);
        }
    }
}
