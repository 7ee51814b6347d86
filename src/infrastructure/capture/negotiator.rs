//! Stream format negotiation against the default input device

use crate::application::ports::{CaptureError, FormatError, FormatNegotiator};
use crate::domain::recording::StreamFormat;

use super::device;

/// Derives stream formats from the default cpal input device
#[derive(Debug, Default, Clone, Copy)]
pub struct CpalFormatNegotiator;

impl CpalFormatNegotiator {
    pub fn new() -> Self {
        Self
    }
}

impl FormatNegotiator for CpalFormatNegotiator {
    fn default_input_sample_rate(&self) -> Result<u32, FormatError> {
        device::default_sample_rate().map_err(|e| match e {
            CaptureError::NoInputDevice => FormatError::NoInputDevice,
            other => FormatError::DeviceQuery(other.to_string()),
        })
    }

    fn complete_stream_description(
        &self,
        partial: StreamFormat,
    ) -> Result<StreamFormat, FormatError> {
        let format = partial.complete()?;
        if format.sample_rate != partial.sample_rate {
            log::info!(
                "{} does not support {} Hz, recording at {} Hz",
                format.codec,
                partial.sample_rate,
                format.sample_rate
            );
        }
        Ok(format)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::recording::Codec;

    #[test]
    fn completes_opus_at_unsupported_rate() {
        let negotiator = CpalFormatNegotiator::new();
        let format = negotiator
            .complete_stream_description(StreamFormat::partial(Codec::Opus, 2, 44100))
            .unwrap();
        assert_eq!(format.sample_rate, 48000);
        assert_eq!(format.frames_per_packet, 960);
        assert!(format.is_complete());
    }

    #[test]
    fn rejects_surround_opus() {
        let negotiator = CpalFormatNegotiator::new();
        let err = negotiator
            .complete_stream_description(StreamFormat::partial(Codec::Opus, 6, 48000))
            .unwrap_err();
        assert!(matches!(err, FormatError::Unsupported(_)));
    }

    #[test]
    fn pcm_keeps_device_rate() {
        let negotiator = CpalFormatNegotiator::new();
        let format = negotiator
            .complete_stream_description(StreamFormat::partial(Codec::LinearPcm, 1, 44100))
            .unwrap();
        assert_eq!(format.sample_rate, 44100);
        assert_eq!(format.bytes_per_packet, 2);
    }
}
