//! Application configuration value object

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::domain::recording::{Codec, ContainerFormat, Duration};

/// Default output file, relative to the working directory
pub const DEFAULT_OUTPUT_PATH: &str = "output.caf";

/// Default channel count
pub const DEFAULT_CHANNELS: u16 = 2;

/// Default number of capture buffers
pub const DEFAULT_BUFFER_COUNT: usize = 3;

/// Application configuration.
/// All fields are optional to support partial configs and merging.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AppConfig {
    pub output: Option<String>,
    pub container: Option<String>,
    pub codec: Option<String>,
    pub channels: Option<u16>,
    pub buffer_count: Option<usize>,
    pub buffer_duration: Option<String>,
    pub max_duration: Option<String>,
}

impl AppConfig {
    /// Create config with default values
    pub fn defaults() -> Self {
        Self {
            output: Some(DEFAULT_OUTPUT_PATH.to_string()),
            container: Some(ContainerFormat::default().to_string()),
            codec: Some(Codec::default().to_string()),
            channels: Some(DEFAULT_CHANNELS),
            buffer_count: Some(DEFAULT_BUFFER_COUNT),
            buffer_duration: Some(Duration::default_buffer_duration().to_string()),
            max_duration: None,
        }
    }

    /// Create an empty config (all None)
    pub fn empty() -> Self {
        Self::default()
    }

    /// Merge this config with another, where other takes precedence.
    /// Only non-None values from other will override this.
    pub fn merge(self, other: Self) -> Self {
        Self {
            output: other.output.or(self.output),
            container: other.container.or(self.container),
            codec: other.codec.or(self.codec),
            channels: other.channels.or(self.channels),
            buffer_count: other.buffer_count.or(self.buffer_count),
            buffer_duration: other.buffer_duration.or(self.buffer_duration),
            max_duration: other.max_duration.or(self.max_duration),
        }
    }

    /// Get the output path, or "output.caf" if not set
    pub fn output_or_default(&self) -> PathBuf {
        PathBuf::from(self.output.as_deref().unwrap_or(DEFAULT_OUTPUT_PATH))
    }

    /// Get container as parsed ContainerFormat, or default if not set/invalid
    pub fn container_or_default(&self) -> ContainerFormat {
        self.container
            .as_ref()
            .and_then(|s| s.parse().ok())
            .unwrap_or_default()
    }

    /// Get codec as parsed Codec, or default if not set/invalid
    pub fn codec_or_default(&self) -> Codec {
        self.codec
            .as_ref()
            .and_then(|s| s.parse().ok())
            .unwrap_or_default()
    }

    /// Get channel count, or 2 if not set
    pub fn channels_or_default(&self) -> u16 {
        self.channels.unwrap_or(DEFAULT_CHANNELS)
    }

    /// Get buffer count, or 3 if not set
    pub fn buffer_count_or_default(&self) -> usize {
        self.buffer_count.unwrap_or(DEFAULT_BUFFER_COUNT)
    }

    /// Get buffer_duration as parsed Duration, or default if not set/invalid
    pub fn buffer_duration_or_default(&self) -> Duration {
        self.buffer_duration
            .as_ref()
            .and_then(|s| s.parse().ok())
            .unwrap_or_else(Duration::default_buffer_duration)
    }

    /// Get max_duration as parsed Duration; unset or invalid means no limit
    pub fn max_duration(&self) -> Option<Duration> {
        self.max_duration.as_ref().and_then(|s| s.parse().ok())
    }
}
