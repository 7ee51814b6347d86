//! Ogg Opus writer
//!
//! The codec configuration must arrive before the first packet: it becomes
//! the `OpusHead` page, followed by an `OpusTags` page. Audio packets carry
//! granule positions in 48 kHz samples. The newest packet is held back so
//! the last one can be flagged end-of-stream on close.

use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;

use ogg::writing::{PacketWriteEndInfo, PacketWriter};

use crate::application::ports::{OutputSink, SinkError};
use crate::domain::recording::format::OPUS_FALLBACK_SAMPLE_RATE;
use crate::domain::recording::{CodecSideInfo, ContainerFormat, PacketDescription, StreamFormat};

use super::open_output;

const VENDOR: &[u8] = b"queue-recorder";

/// Generate a pseudo-random serial number for the Ogg stream
fn stream_serial() -> u32 {
    use std::time::{SystemTime, UNIX_EPOCH};
    let duration = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default();
    (duration.as_secs() as u32) ^ duration.subsec_nanos()
}

fn opus_tags() -> Vec<u8> {
    let mut tags = Vec::with_capacity(8 + 4 + VENDOR.len() + 4);
    tags.extend_from_slice(b"OpusTags");
    tags.extend_from_slice(&(VENDOR.len() as u32).to_le_bytes());
    tags.extend_from_slice(VENDOR);
    tags.extend_from_slice(&0u32.to_le_bytes()); // No user comments
    tags
}

/// Ogg Opus file being recorded
pub struct OggOpusSink {
    writer: Option<PacketWriter<'static, BufWriter<File>>>,
    serial: u32,
    head: Option<CodecSideInfo>,
    /// Granule advance per packet
    granule_step: u64,
    granule: u64,
    held: Option<(Vec<u8>, u64)>,
    next_packet: u64,
}

impl OggOpusSink {
    pub fn create(path: &Path, format: &StreamFormat, erase_existing: bool) -> Result<Self, SinkError> {
        ContainerFormat::Ogg.check_codec(format.codec)?;
        let file = open_output(path, erase_existing)?;

        let granule_step = u64::from(format.frames_per_packet) * u64::from(OPUS_FALLBACK_SAMPLE_RATE)
            / u64::from(format.sample_rate.max(1));

        log::debug!("created Ogg file {} ({})", path.display(), format);
        Ok(Self {
            writer: Some(PacketWriter::new(file)),
            serial: stream_serial(),
            head: None,
            granule_step,
            granule: 0,
            held: None,
            next_packet: 0,
        })
    }

    fn writer(&mut self) -> Result<&mut PacketWriter<'static, BufWriter<File>>, SinkError> {
        self.writer.as_mut().ok_or(SinkError::Closed)
    }

    fn write_headers(&mut self, head: &CodecSideInfo) -> Result<(), SinkError> {
        if !head.as_bytes().starts_with(b"OpusHead") {
            return Err(SinkError::InvalidPackets(
                "codec configuration is not an OpusHead header".to_string(),
            ));
        }
        let serial = self.serial;
        let writer = self.writer()?;
        writer.write_packet(head.as_bytes().to_vec(), serial, PacketWriteEndInfo::EndPage, 0)?;
        writer.write_packet(opus_tags(), serial, PacketWriteEndInfo::EndPage, 0)?;
        Ok(())
    }
}

impl OutputSink for OggOpusSink {
    fn write_packets(
        &mut self,
        use_cache: bool,
        byte_count: u32,
        descriptions: &[PacketDescription],
        start_packet: u64,
        packet_count: u32,
        data: &[u8],
    ) -> Result<u32, SinkError> {
        self.writer()?;
        if self.head.is_none() {
            return Err(SinkError::MissingSideInfo);
        }
        if start_packet != self.next_packet {
            return Err(SinkError::OutOfOrder {
                expected: self.next_packet,
                actual: start_packet,
            });
        }
        if descriptions.len() != packet_count as usize {
            return Err(SinkError::InvalidPackets(format!(
                "{} packets but {} descriptions",
                packet_count,
                descriptions.len()
            )));
        }
        let limit = (byte_count as usize).min(data.len());
        if descriptions.iter().any(|desc| desc.end_offset() > limit as u64) {
            return Err(SinkError::InvalidPackets(
                "packet runs past the data".to_string(),
            ));
        }

        let serial = self.serial;
        for desc in descriptions {
            let start = desc.start_offset as usize;
            let packet = data[start..start + desc.data_byte_size as usize].to_vec();
            self.granule += self.granule_step;
            if let Some((previous, granule)) = self.held.replace((packet, self.granule)) {
                self.writer()?
                    .write_packet(previous, serial, PacketWriteEndInfo::NormalPacket, granule)?;
            }
        }

        if !use_cache {
            self.writer()?.inner_mut().flush()?;
        }
        self.next_packet += u64::from(packet_count);
        Ok(packet_count)
    }

    fn set_codec_side_info(&mut self, info: &CodecSideInfo) -> Result<(), SinkError> {
        self.writer()?;
        match &self.head {
            None => {
                self.write_headers(info)?;
                self.head = Some(info.clone());
            }
            Some(head) if head != info => {
                log::warn!("Ogg headers are already written, ignoring revised codec configuration");
            }
            Some(_) => {}
        }
        Ok(())
    }

    fn close(&mut self) -> Result<(), SinkError> {
        let Some(mut writer) = self.writer.take() else {
            return Ok(());
        };
        if let Some((last, granule)) = self.held.take() {
            writer.write_packet(last, self.serial, PacketWriteEndInfo::EndStream, granule)?;
        }
        let mut file = writer.into_inner();
        file.flush()?;
        file.get_ref().sync_all()?;

        log::debug!("closed Ogg file: {} packets", self.next_packet);
        Ok(())
    }
}

impl Drop for OggOpusSink {
    fn drop(&mut self) {
        if let Err(error) = self.close() {
            log::warn!("failed to finalize Ogg file: {}", error);
        }
    }
}
