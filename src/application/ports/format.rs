//! Format negotiation port interface

use thiserror::Error;

use crate::domain::error::UnsupportedFormatError;
use crate::domain::recording::StreamFormat;

/// Format negotiation errors
#[derive(Debug, Clone, Error)]
pub enum FormatError {
    #[error("No audio input device available")]
    NoInputDevice,

    #[error("Failed to query input device: {0}")]
    DeviceQuery(String),

    #[error(transparent)]
    Unsupported(#[from] UnsupportedFormatError),
}

/// Port for deriving the stream description
pub trait FormatNegotiator {
    /// Nominal sample rate of the default input device
    fn default_input_sample_rate(&self) -> Result<u32, FormatError>;

    /// Fill in every field a partial description leaves open
    fn complete_stream_description(
        &self,
        partial: StreamFormat,
    ) -> Result<StreamFormat, FormatError>;
}
