//! Default input device lookup

use cpal::traits::{DeviceTrait, HostTrait};
use cpal::{SampleFormat, StreamConfig};

use crate::application::ports::CaptureError;

/// Get the default input device
pub fn default_input_device() -> Result<cpal::Device, CaptureError> {
    let host = cpal::default_host();
    host.default_input_device()
        .ok_or(CaptureError::NoInputDevice)
}

fn is_usable(format: SampleFormat) -> bool {
    format == SampleFormat::I16 || format == SampleFormat::F32
}

/// Pick the input configuration to open.
///
/// The device's default configuration is used when its samples are i16 or
/// f32. Otherwise the first usable configuration covering the default rate
/// is taken.
pub fn input_config(device: &cpal::Device) -> Result<(StreamConfig, SampleFormat), CaptureError> {
    let default = device
        .default_input_config()
        .map_err(|e| CaptureError::StreamFailed(format!("Failed to get default config: {}", e)))?;

    if is_usable(default.sample_format()) {
        return Ok((default.config(), default.sample_format()));
    }

    let rate = default.sample_rate();
    let supported_configs = device
        .supported_input_configs()
        .map_err(|e| CaptureError::StreamFailed(format!("Failed to get configs: {}", e)))?;

    for range in supported_configs {
        if !is_usable(range.sample_format()) {
            continue;
        }
        if range.min_sample_rate() <= rate && range.max_sample_rate() >= rate {
            let supported = range.with_sample_rate(rate);
            return Ok((supported.config(), supported.sample_format()));
        }
    }

    Err(CaptureError::StreamFailed(format!(
        "No i16 or f32 input config at {} Hz",
        rate.0
    )))
}

/// Nominal sample rate of the default input device
pub fn default_sample_rate() -> Result<u32, CaptureError> {
    let device = default_input_device()?;
    let (config, _) = input_config(&device)?;
    Ok(config.sample_rate.0)
}
