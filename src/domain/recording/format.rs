//! Stream format value objects

use std::fmt;
use std::str::FromStr;

use crate::domain::error::{InvalidCodecError, InvalidContainerError, UnsupportedFormatError};

/// Sample rates the Opus encoder accepts
pub const OPUS_SAMPLE_RATES: [u32; 5] = [8000, 12000, 16000, 24000, 48000];

/// Rate used when the device rate is not one Opus accepts
pub const OPUS_FALLBACK_SAMPLE_RATE: u32 = 48000;

/// Opus packet length in milliseconds
pub const OPUS_FRAME_MS: u32 = 20;

/// Sample width for linear PCM
pub const PCM_BITS_PER_CHANNEL: u16 = 16;

/// Largest channel count written for linear PCM
pub const MAX_PCM_CHANNELS: u16 = 8;

/// Audio codecs the recorder can produce
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Codec {
    /// 16-bit little-endian interleaved PCM
    LinearPcm,
    /// Opus, 20 ms packets, variable bit rate
    #[default]
    Opus,
}

impl Codec {
    /// Get the string representation
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::LinearPcm => "lpcm",
            Self::Opus => "opus",
        }
    }

    /// Four-character code used by container headers
    pub const fn four_cc(&self) -> [u8; 4] {
        match self {
            Self::LinearPcm => *b"lpcm",
            Self::Opus => *b"opus",
        }
    }

    /// All codecs, in display order
    pub const fn all() -> [Codec; 2] {
        [Self::LinearPcm, Self::Opus]
    }
}

impl FromStr for Codec {
    type Err = InvalidCodecError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "lpcm" | "pcm" => Ok(Self::LinearPcm),
            "opus" => Ok(Self::Opus),
            _ => Err(InvalidCodecError {
                input: s.to_string(),
            }),
        }
    }
}

impl fmt::Display for Codec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Container file formats
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum ContainerFormat {
    /// Core Audio Format
    #[default]
    Caf,
    /// Ogg (Opus only)
    Ogg,
}

impl ContainerFormat {
    /// Get the string representation
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Caf => "caf",
            Self::Ogg => "ogg",
        }
    }

    /// Conventional file extension
    pub const fn extension(&self) -> &'static str {
        match self {
            Self::Caf => "caf",
            Self::Ogg => "ogg",
        }
    }

    /// Check that this container can carry the given codec
    pub fn check_codec(&self, codec: Codec) -> Result<(), UnsupportedFormatError> {
        match (self, codec) {
            (Self::Caf, _) | (Self::Ogg, Codec::Opus) => Ok(()),
            (Self::Ogg, codec) => Err(UnsupportedFormatError::Container {
                container: self.as_str(),
                codec: codec.as_str(),
            }),
        }
    }
}

impl FromStr for ContainerFormat {
    type Err = InvalidContainerError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "caf" => Ok(Self::Caf),
            "ogg" | "opus" => Ok(Self::Ogg),
            _ => Err(InvalidContainerError {
                input: s.to_string(),
            }),
        }
    }
}

impl fmt::Display for ContainerFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Description of the encoded stream.
///
/// A *partial* description carries only codec, channel count and sample
/// rate. [`StreamFormat::complete`] fills in the codec-derived fields.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StreamFormat {
    /// Frames per second
    pub sample_rate: u32,
    /// Interleaved channel count
    pub channels: u16,
    pub codec: Codec,
    /// Bits per sample, 0 for compressed codecs
    pub bits_per_channel: u16,
    /// Frames in every packet
    pub frames_per_packet: u32,
    /// Bytes in every packet, 0 when packets vary in size
    pub bytes_per_packet: u32,
}

impl StreamFormat {
    /// Create a partial description
    pub const fn partial(codec: Codec, channels: u16, sample_rate: u32) -> Self {
        Self {
            sample_rate,
            channels,
            codec,
            bits_per_channel: 0,
            frames_per_packet: 0,
            bytes_per_packet: 0,
        }
    }

    /// Fill in every codec-derived field.
    ///
    /// Opus snaps unsupported sample rates to 48 kHz; the capture side
    /// resamples to whatever rate ends up here.
    pub fn complete(self) -> Result<Self, UnsupportedFormatError> {
        if self.sample_rate == 0 {
            return Err(UnsupportedFormatError::ZeroSampleRate);
        }

        match self.codec {
            Codec::LinearPcm => {
                if self.channels == 0 || self.channels > MAX_PCM_CHANNELS {
                    return Err(UnsupportedFormatError::Channels {
                        codec: self.codec.as_str(),
                        channels: self.channels,
                    });
                }
                let bytes_per_frame = u32::from(self.channels) * u32::from(PCM_BITS_PER_CHANNEL / 8);
                Ok(Self {
                    bits_per_channel: PCM_BITS_PER_CHANNEL,
                    frames_per_packet: 1,
                    bytes_per_packet: bytes_per_frame,
                    ..self
                })
            }
            Codec::Opus => {
                if !(1..=2).contains(&self.channels) {
                    return Err(UnsupportedFormatError::Channels {
                        codec: self.codec.as_str(),
                        channels: self.channels,
                    });
                }
                let sample_rate = if OPUS_SAMPLE_RATES.contains(&self.sample_rate) {
                    self.sample_rate
                } else {
                    OPUS_FALLBACK_SAMPLE_RATE
                };
                Ok(Self {
                    sample_rate,
                    bits_per_channel: 0,
                    frames_per_packet: sample_rate * OPUS_FRAME_MS / 1000,
                    bytes_per_packet: 0,
                    ..self
                })
            }
        }
    }

    /// Whether every codec-derived field has been filled in
    pub fn is_complete(&self) -> bool {
        self.sample_rate > 0 && self.channels > 0 && self.frames_per_packet > 0
    }

    /// Whether packets vary in size (and need packet descriptions)
    pub fn is_variable_bit_rate(&self) -> bool {
        self.bytes_per_packet == 0
    }

    /// Bytes in one frame, 0 for compressed codecs
    pub fn bytes_per_frame(&self) -> u32 {
        if self.frames_per_packet == 1 {
            self.bytes_per_packet
        } else {
            0
        }
    }

    /// Number of frames needed to cover `seconds` of audio, rounded up
    pub fn frames_for(&self, seconds: f64) -> u64 {
        (seconds * f64::from(self.sample_rate)).ceil().max(0.0) as u64
    }
}

impl fmt::Display for StreamFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}, {} Hz, {} ch",
            self.codec, self.sample_rate, self.channels
        )
    }
}
