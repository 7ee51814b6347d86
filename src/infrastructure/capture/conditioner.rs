//! Channel mapping, resampling and sample conversion
//!
//! Turns device audio (interleaved f32 at the device rate and channel count)
//! into interleaved i16 at the rate and channel count being recorded.

use rubato::{FftFixedIn, Resampler};

use crate::application::ports::CaptureError;

/// Input frames per resampler chunk
const RESAMPLE_CHUNK: usize = 1024;

/// Map one interleaved frame onto `target` channels.
///
/// Mono output averages every input channel. Otherwise output channel `c`
/// takes input channel `c`, repeating the last input channel when there are
/// fewer.
pub fn map_channels(frame: &[f32], target: usize, out: &mut Vec<f32>) {
    if frame.is_empty() {
        return;
    }
    if frame.len() == target {
        out.extend_from_slice(frame);
    } else if target == 1 {
        out.push(frame.iter().sum::<f32>() / frame.len() as f32);
    } else {
        let last = frame.len() - 1;
        out.extend((0..target).map(|c| frame[c.min(last)]));
    }
}

pub fn to_i16(sample: f32) -> i16 {
    (sample.clamp(-1.0, 1.0) * 32767.0) as i16
}

struct Resampling {
    resampler: FftFixedIn<f32>,
    /// Deinterleaved input waiting for a full chunk
    pending: Vec<Vec<f32>>,
    ratio: f64,
    frames_in: u64,
    frames_out: u64,
}

impl Resampling {
    fn push_frame(&mut self, frame: &[f32]) {
        for (channel, &sample) in self.pending.iter_mut().zip(frame) {
            channel.push(sample);
        }
        self.frames_in += 1;
    }

    /// Run every complete chunk through the resampler
    fn drain(&mut self, out: &mut Vec<i16>, pad: bool) -> Result<(), CaptureError> {
        loop {
            let needed = self.resampler.input_frames_next();
            let available = self.pending.first().map_or(0, Vec::len);
            if available == 0 || (available < needed && !pad) {
                return Ok(());
            }

            let chunk: Vec<Vec<f32>> = self
                .pending
                .iter_mut()
                .map(|channel| {
                    let take = needed.min(channel.len());
                    let mut chunk: Vec<f32> = channel.drain(..take).collect();
                    chunk.resize(needed, 0.0);
                    chunk
                })
                .collect();

            let resampled = self
                .resampler
                .process(&chunk, None)
                .map_err(|e| CaptureError::StreamFailed(format!("Resampling failed: {}", e)))?;

            // Padding must not add frames past the input's true length
            let expected = (self.frames_in as f64 * self.ratio).ceil() as u64;
            let frames = resampled.first().map_or(0, Vec::len);
            let keep = if pad {
                frames.min(expected.saturating_sub(self.frames_out) as usize)
            } else {
                frames
            };

            for i in 0..keep {
                out.extend(resampled.iter().map(|channel| to_i16(channel[i])));
            }
            self.frames_out += keep as u64;
        }
    }
}

/// Streaming converter from device audio to recorded audio
pub struct Conditioner {
    source_channels: usize,
    target_channels: usize,
    resampling: Option<Resampling>,
    mapped: Vec<f32>,
}

impl Conditioner {
    pub fn new(
        source_rate: u32,
        source_channels: u16,
        target_rate: u32,
        target_channels: u16,
    ) -> Result<Self, CaptureError> {
        if source_channels == 0 || target_channels == 0 {
            return Err(CaptureError::StreamFailed("Channel count must be non-zero".into()));
        }

        let resampling = if source_rate != target_rate {
            let resampler = FftFixedIn::<f32>::new(
                source_rate as usize,
                target_rate as usize,
                RESAMPLE_CHUNK,
                2,
                target_channels as usize,
            )
            .map_err(|e| CaptureError::StreamFailed(format!("Resampler init failed: {}", e)))?;
            log::debug!("resampling input from {} Hz to {} Hz", source_rate, target_rate);
            Some(Resampling {
                resampler,
                pending: vec![Vec::with_capacity(RESAMPLE_CHUNK); target_channels as usize],
                ratio: f64::from(target_rate) / f64::from(source_rate),
                frames_in: 0,
                frames_out: 0,
            })
        } else {
            None
        };

        Ok(Self {
            source_channels: source_channels as usize,
            target_channels: target_channels as usize,
            resampling,
            mapped: Vec::new(),
        })
    }

    /// Convert interleaved device samples, appending to `out`.
    /// A trailing partial frame is dropped.
    pub fn process(&mut self, input: &[f32], out: &mut Vec<i16>) -> Result<(), CaptureError> {
        for frame in input.chunks_exact(self.source_channels) {
            self.mapped.clear();
            map_channels(frame, self.target_channels, &mut self.mapped);
            match self.resampling.as_mut() {
                Some(resampling) => resampling.push_frame(&self.mapped),
                None => out.extend(self.mapped.iter().copied().map(to_i16)),
            }
        }

        if let Some(resampling) = self.resampling.as_mut() {
            resampling.drain(out, false)?;
        }
        Ok(())
    }

    /// Push out audio still held by the resampler
    pub fn flush(&mut self, out: &mut Vec<i16>) -> Result<(), CaptureError> {
        match self.resampling.as_mut() {
            Some(resampling) => resampling.drain(out, true),
            None => Ok(()),
        }
    }

    /// Forget buffered input
    pub fn reset(&mut self) {
        if let Some(resampling) = self.resampling.as_mut() {
            for channel in &mut resampling.pending {
                channel.clear();
            }
        }
    }
}
