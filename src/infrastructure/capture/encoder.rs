//! Packet encoders
//!
//! An encoder turns interleaved i16 audio into packets of the recorded
//! codec and knows how packets are laid out in a buffer slot.

use crate::application::ports::CaptureError;
use crate::domain::recording::format::OPUS_FALLBACK_SAMPLE_RATE;
use crate::domain::recording::{BufferSlot, Codec, CodecSideInfo, StreamFormat};

/// Frames of linear PCM grouped per encode call (10 ms at 48 kHz)
const PCM_CHUNK_DIVISOR: u32 = 100;

/// Largest packet a single Opus frame can produce
pub const OPUS_MAX_PACKET_SIZE: usize = 1275;

/// Scratch space handed to the Opus encoder
const OPUS_ENCODE_BUFFER: usize = 4000;

pub trait PacketEncoder: Send {
    fn stream_format(&self) -> StreamFormat;

    fn max_packet_size(&self) -> usize;

    /// Codec configuration to store with the file, if the codec has one
    fn side_info(&self) -> Option<CodecSideInfo>;

    /// Interleaved samples consumed by one `encode` call
    fn samples_per_chunk(&self) -> usize;

    /// Encode up to one chunk of samples into `packet`.
    /// A short final chunk is accepted.
    ///
    /// # Returns
    /// The number of frames the packet stands for
    fn encode(&mut self, samples: &[i16], packet: &mut Vec<u8>) -> Result<u32, CaptureError>;

    /// Append an encoded chunk to `slot`. Returns false when it does not fit.
    fn store(&self, slot: &mut BufferSlot, packet: &[u8], frames: u32) -> bool;
}

/// Create the encoder for a completed stream format
pub fn encoder_for(format: &StreamFormat) -> Result<Box<dyn PacketEncoder>, CaptureError> {
    match format.codec {
        Codec::LinearPcm => Ok(Box::new(LinearPcmEncoder::new(*format))),
        Codec::Opus => Ok(Box::new(OpusPacketEncoder::new(*format)?)),
    }
}

/// 16-bit little-endian interleaved PCM, one frame per packet
pub struct LinearPcmEncoder {
    format: StreamFormat,
}

impl LinearPcmEncoder {
    pub fn new(format: StreamFormat) -> Self {
        Self { format }
    }
}

impl PacketEncoder for LinearPcmEncoder {
    fn stream_format(&self) -> StreamFormat {
        self.format
    }

    fn max_packet_size(&self) -> usize {
        self.format.bytes_per_packet as usize
    }

    fn side_info(&self) -> Option<CodecSideInfo> {
        None
    }

    fn samples_per_chunk(&self) -> usize {
        let frames = (self.format.sample_rate / PCM_CHUNK_DIVISOR).max(1);
        frames as usize * self.format.channels as usize
    }

    fn encode(&mut self, samples: &[i16], packet: &mut Vec<u8>) -> Result<u32, CaptureError> {
        packet.clear();
        packet.extend(samples.iter().flat_map(|s| s.to_le_bytes()));
        Ok((samples.len() / self.format.channels as usize) as u32)
    }

    fn store(&self, slot: &mut BufferSlot, packet: &[u8], frames: u32) -> bool {
        slot.push_frames(packet, frames)
    }
}

/// Opus in 20 ms frames, variable bit rate
pub struct OpusPacketEncoder {
    encoder: opus::Encoder,
    format: StreamFormat,
    side_info: CodecSideInfo,
    frame: Vec<i16>,
    scratch: Vec<u8>,
}

impl OpusPacketEncoder {
    pub fn new(format: StreamFormat) -> Result<Self, CaptureError> {
        let channels = match format.channels {
            1 => opus::Channels::Mono,
            2 => opus::Channels::Stereo,
            n => {
                return Err(CaptureError::EncoderFailed(format!(
                    "Opus supports 1 or 2 channels, got {}",
                    n
                )))
            }
        };

        let mut encoder = opus::Encoder::new(format.sample_rate, channels, opus::Application::Audio)
            .map_err(|e| CaptureError::EncoderFailed(format!("Opus init failed: {}", e)))?;
        encoder
            .set_vbr(true)
            .map_err(|e| CaptureError::EncoderFailed(e.to_string()))?;

        let lookahead = encoder
            .get_lookahead()
            .map_err(|e| CaptureError::EncoderFailed(e.to_string()))?;
        let side_info = opus_head(&format, pre_skip(lookahead, format.sample_rate));

        Ok(Self {
            encoder,
            format,
            side_info,
            frame: Vec::with_capacity(format.frames_per_packet as usize * format.channels as usize),
            scratch: vec![0u8; OPUS_ENCODE_BUFFER],
        })
    }
}

impl PacketEncoder for OpusPacketEncoder {
    fn stream_format(&self) -> StreamFormat {
        self.format
    }

    fn max_packet_size(&self) -> usize {
        OPUS_MAX_PACKET_SIZE
    }

    fn side_info(&self) -> Option<CodecSideInfo> {
        Some(self.side_info.clone())
    }

    fn samples_per_chunk(&self) -> usize {
        self.format.frames_per_packet as usize * self.format.channels as usize
    }

    fn encode(&mut self, samples: &[i16], packet: &mut Vec<u8>) -> Result<u32, CaptureError> {
        // Pad the last frame if needed
        let chunk = self.samples_per_chunk();
        self.frame.clear();
        self.frame.extend_from_slice(samples);
        self.frame.resize(chunk, 0);

        let len = self
            .encoder
            .encode(&self.frame, &mut self.scratch)
            .map_err(|e| CaptureError::EncoderFailed(format!("Opus encoding failed: {}", e)))?;

        packet.clear();
        packet.extend_from_slice(&self.scratch[..len]);
        Ok(self.format.frames_per_packet)
    }

    fn store(&self, slot: &mut BufferSlot, packet: &[u8], _frames: u32) -> bool {
        slot.push_packet(packet, 0)
    }
}

/// Encoder lookahead expressed at 48 kHz, as Opus headers count it
pub fn pre_skip(lookahead: i32, sample_rate: u32) -> u16 {
    let samples = u64::from(lookahead.max(0) as u32) * u64::from(OPUS_FALLBACK_SAMPLE_RATE)
        / u64::from(sample_rate.max(1));
    samples.min(u64::from(u16::MAX)) as u16
}

/// Opus identification header (RFC 7845, channel mapping family 0)
pub fn opus_head(format: &StreamFormat, pre_skip: u16) -> CodecSideInfo {
    let mut header = Vec::with_capacity(19);
    header.extend_from_slice(b"OpusHead");
    header.push(1); // Version
    header.push(format.channels as u8);
    header.extend_from_slice(&pre_skip.to_le_bytes());
    header.extend_from_slice(&format.sample_rate.to_le_bytes());
    header.extend_from_slice(&0i16.to_le_bytes()); // Output gain
    header.push(0); // Channel mapping family
    CodecSideInfo::new(header)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn format(codec: Codec, channels: u16) -> StreamFormat {
        StreamFormat::partial(codec, channels, 48000).complete().unwrap()
    }

    #[test]
    fn opus_head_layout() {
        let head = opus_head(&format(Codec::Opus, 2), 312);
        let bytes = head.as_bytes();
        assert_eq!(bytes.len(), 19);
        assert!(bytes.starts_with(b"OpusHead"));
        assert_eq!(bytes[8], 1);
        assert_eq!(bytes[9], 2);
        assert_eq!(u16::from_le_bytes([bytes[10], bytes[11]]), 312);
        assert_eq!(
            u32::from_le_bytes([bytes[12], bytes[13], bytes[14], bytes[15]]),
            48000
        );
    }

    #[test]
    fn pre_skip_scales_to_48k() {
        assert_eq!(pre_skip(312, 48000), 312);
        assert_eq!(pre_skip(104, 16000), 312);
        assert_eq!(pre_skip(-1, 48000), 0);
    }

    #[test]
    fn pcm_packets_are_frames() {
        let mut encoder = LinearPcmEncoder::new(format(Codec::LinearPcm, 2));
        assert_eq!(encoder.samples_per_chunk(), 960);
        let mut packet = Vec::new();
        let frames = encoder.encode(&[1, -1, 2, -2], &mut packet).unwrap();
        assert_eq!(frames, 2);
        assert_eq!(packet, vec![1, 0, 0xff, 0xff, 2, 0, 0xfe, 0xff]);

        let mut slot = BufferSlot::with_capacity(0, 8, 0).unwrap();
        assert!(encoder.store(&mut slot, &packet, frames));
        assert_eq!(slot.packet_count(), 2);
        assert!(!encoder.store(&mut slot, &packet, frames));
    }

    #[test]
    fn opus_encodes_padded_frame() {
        let mut encoder = OpusPacketEncoder::new(format(Codec::Opus, 1)).unwrap();
        assert_eq!(encoder.samples_per_chunk(), 960);
        let mut packet = Vec::new();
        let frames = encoder.encode(&[0i16; 100], &mut packet).unwrap();
        assert_eq!(frames, 960);
        assert!(!packet.is_empty());
        assert!(packet.len() <= OPUS_MAX_PACKET_SIZE);

        let mut slot = BufferSlot::with_capacity(0, OPUS_MAX_PACKET_SIZE, 1).unwrap();
        assert!(encoder.store(&mut slot, &packet, frames));
        assert_eq!(slot.packet_descriptions().len(), 1);
    }

    #[test]
    fn opus_side_info_is_head() {
        let encoder = OpusPacketEncoder::new(format(Codec::Opus, 2)).unwrap();
        let info = encoder.side_info().unwrap();
        assert!(info.as_bytes().starts_with(b"OpusHead"));
    }

    #[test]
    fn opus_rejects_surround() {
        let mut fmt = format(Codec::Opus, 2);
        fmt.channels = 6;
        assert!(OpusPacketEncoder::new(fmt).is_err());
    }
}
