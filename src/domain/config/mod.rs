//! Configuration value objects

pub mod app_config;

pub use app_config::{AppConfig, DEFAULT_BUFFER_COUNT, DEFAULT_CHANNELS, DEFAULT_OUTPUT_PATH};
