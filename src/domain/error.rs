//! Domain error types

use thiserror::Error;

/// Error when parsing a duration string
#[derive(Debug, Clone, Error)]
#[error("Invalid duration format: \"{input}\". Expected format: <number>ms, <number>s, <number>m, or a combination (e.g., 500ms, 30s, 1m, 2m30s)")]
pub struct DurationParseError {
    pub input: String,
}

/// Error when an unknown codec name is provided
#[derive(Debug, Clone, Error)]
#[error("Invalid codec: \"{input}\". Valid codecs are: lpcm, opus")]
pub struct InvalidCodecError {
    pub input: String,
}

/// Error when an unknown container name is provided
#[derive(Debug, Clone, Error)]
#[error("Invalid container: \"{input}\". Valid containers are: caf, ogg")]
pub struct InvalidContainerError {
    pub input: String,
}

/// Error when a stream description cannot be completed for a codec
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum UnsupportedFormatError {
    #[error("{codec} does not support {channels} channel(s)")]
    Channels { codec: &'static str, channels: u16 },

    #[error("Sample rate must be greater than zero")]
    ZeroSampleRate,

    #[error("The {container} container cannot hold {codec} audio")]
    Container {
        container: &'static str,
        codec: &'static str,
    },
}

/// Error when configuration fails
#[derive(Debug, Clone, Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    ReadError(String),

    #[error("Failed to parse config file: {0}")]
    ParseError(String),

    #[error("Failed to write config file: {0}")]
    WriteError(String),

    #[error("Invalid config value for '{key}': {message}")]
    ValidationError { key: String, message: String },

    #[error("Config file already exists at: {0}")]
    AlreadyExists(String),
}
