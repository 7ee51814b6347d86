//! Capture sessions on the default cpal input device
//!
//! The stream is owned by a thread of its own, since `cpal::Stream` is not
//! `Send`. The data callback forwards samples to the notifier thread, which
//! fills slots and calls the completion handler.

use std::sync::mpsc::{self, Receiver, Sender, SyncSender};
use std::sync::Arc;
use std::thread::{self, JoinHandle};

use cpal::traits::{DeviceTrait, StreamTrait};
use cpal::SampleFormat;

use crate::application::ports::{
    BufferCompletion, BufferQueue, CaptureBackend, CaptureError, CaptureSession, RejectedBuffer,
};
use crate::domain::recording::{BufferSlot, CodecSideInfo, StreamFormat};

use super::conditioner::Conditioner;
use super::device::{default_input_device, input_config};
use super::encoder::encoder_for;
use super::notifier::{Notifier, NotifierMessage, SharedSideInfo, SlotQueue};

type Reply = Sender<Result<(), CaptureError>>;

enum StreamCommand {
    Play(Reply),
    Pause(Reply),
    Shutdown,
}

/// What the device actually delivers
#[derive(Debug, Clone, Copy)]
struct InputInfo {
    sample_rate: u32,
    channels: u16,
}

fn open_stream(
    samples: Sender<NotifierMessage>,
) -> Result<(cpal::Stream, InputInfo), CaptureError> {
    let device = default_input_device()?;
    let (config, sample_format) = input_config(&device)?;
    let info = InputInfo {
        sample_rate: config.sample_rate.0,
        channels: config.channels,
    };

    let on_error = |err: cpal::StreamError| log::error!("Audio stream error: {}", err);
    let stream = match sample_format {
        SampleFormat::I16 => device.build_input_stream(
            &config,
            move |data: &[i16], _: &cpal::InputCallbackInfo| {
                let converted = data.iter().map(|&s| f32::from(s) / 32768.0).collect();
                let _ = samples.send(NotifierMessage::Samples(converted));
            },
            on_error,
            None,
        ),
        SampleFormat::F32 => device.build_input_stream(
            &config,
            move |data: &[f32], _: &cpal::InputCallbackInfo| {
                let _ = samples.send(NotifierMessage::Samples(data.to_vec()));
            },
            on_error,
            None,
        ),
        other => {
            return Err(CaptureError::StreamFailed(format!(
                "Unsupported sample format {:?}",
                other
            )))
        }
    }
    .map_err(|e| CaptureError::StreamFailed(e.to_string()))?;

    Ok((stream, info))
}

fn run_stream_thread(
    commands: Receiver<StreamCommand>,
    samples: Sender<NotifierMessage>,
    ready: SyncSender<Result<InputInfo, CaptureError>>,
) {
    let stream = match open_stream(samples) {
        Ok((stream, info)) => {
            let _ = ready.send(Ok(info));
            stream
        }
        Err(error) => {
            let _ = ready.send(Err(error));
            return;
        }
    };

    while let Ok(command) = commands.recv() {
        match command {
            StreamCommand::Play(reply) => {
                let _ = reply.send(
                    stream
                        .play()
                        .map_err(|e| CaptureError::StreamFailed(e.to_string())),
                );
            }
            StreamCommand::Pause(reply) => {
                let _ = reply.send(
                    stream
                        .pause()
                        .map_err(|e| CaptureError::StreamFailed(e.to_string())),
                );
            }
            StreamCommand::Shutdown => break,
        }
    }
}

/// Opens capture sessions on the default input device
#[derive(Debug, Default, Clone, Copy)]
pub struct CpalCaptureBackend;

impl CpalCaptureBackend {
    pub fn new() -> Self {
        Self
    }
}

impl CaptureBackend for CpalCaptureBackend {
    type Session = CpalCaptureSession;

    fn create(
        &self,
        format: &StreamFormat,
        completion: Arc<dyn BufferCompletion>,
    ) -> Result<CpalCaptureSession, CaptureError> {
        let encoder = encoder_for(format)?;

        let (notifier_tx, notifier_rx) = mpsc::channel();
        let (command_tx, command_rx) = mpsc::channel();
        let (ready_tx, ready_rx) = mpsc::sync_channel(1);

        let samples = notifier_tx.clone();
        let stream_thread = thread::Builder::new()
            .name("capture-stream".into())
            .spawn(move || run_stream_thread(command_rx, samples, ready_tx))
            .map_err(|e| CaptureError::StreamFailed(e.to_string()))?;

        let mut session = CpalCaptureSession {
            format: encoder.stream_format(),
            max_packet_size: encoder.max_packet_size(),
            side_info: SharedSideInfo::new(encoder.side_info()),
            queue: Arc::new(SlotQueue::new()),
            commands: command_tx,
            notifier: notifier_tx,
            stream_thread: Some(stream_thread),
            notifier_thread: None,
            disposed: false,
        };

        // From here on, dropping `session` shuts the threads down
        let input = ready_rx.recv().map_err(|_| CaptureError::ThreadExited)??;
        log::info!(
            "capturing from default input: {} Hz, {} channels",
            input.sample_rate,
            input.channels
        );

        let conditioner = Conditioner::new(
            input.sample_rate,
            input.channels,
            format.sample_rate,
            format.channels,
        )?;
        let notifier = Notifier::new(
            session.queue.clone(),
            completion,
            conditioner,
            encoder,
            session.side_info.clone(),
        );
        let notifier_thread = thread::Builder::new()
            .name("capture-notifier".into())
            .spawn(move || notifier.run(notifier_rx))
            .map_err(|e| CaptureError::StreamFailed(e.to_string()))?;
        session.notifier_thread = Some(notifier_thread);

        Ok(session)
    }
}

/// One capture session on the default input device
pub struct CpalCaptureSession {
    format: StreamFormat,
    max_packet_size: usize,
    /// Refreshed by the notifier when it flushes the encoder
    side_info: SharedSideInfo,
    queue: Arc<SlotQueue>,
    commands: Sender<StreamCommand>,
    notifier: Sender<NotifierMessage>,
    stream_thread: Option<JoinHandle<()>>,
    notifier_thread: Option<JoinHandle<Option<BufferSlot>>>,
    disposed: bool,
}

impl CpalCaptureSession {
    fn request(&self, command: fn(Reply) -> StreamCommand) -> Result<(), CaptureError> {
        let (reply, response) = mpsc::channel();
        self.commands
            .send(command(reply))
            .map_err(|_| CaptureError::ThreadExited)?;
        response.recv().map_err(|_| CaptureError::ThreadExited)?
    }

    fn ensure_live(&self) -> Result<(), CaptureError> {
        if self.disposed {
            Err(CaptureError::Disposed)
        } else {
            Ok(())
        }
    }
}

impl BufferQueue for CpalCaptureSession {
    fn enqueue(&self, slot: BufferSlot) -> Result<(), RejectedBuffer> {
        self.queue.enqueue(slot)
    }
}

impl CaptureSession for CpalCaptureSession {
    fn stream_format(&self) -> Result<StreamFormat, CaptureError> {
        self.ensure_live()?;
        Ok(self.format)
    }

    fn max_packet_size(&self) -> Result<usize, CaptureError> {
        self.ensure_live()?;
        Ok(self.max_packet_size)
    }

    fn codec_side_info(&self) -> Result<Option<CodecSideInfo>, CaptureError> {
        self.ensure_live()?;
        Ok(self.side_info.get())
    }

    fn start(&mut self) -> Result<(), CaptureError> {
        self.ensure_live()?;
        self.request(StreamCommand::Play)
    }

    fn stop(&mut self, flush: bool) -> Result<(), CaptureError> {
        self.ensure_live()?;
        let paused = self.request(StreamCommand::Pause);

        // Samples sent before the pause are ahead of this message
        let (ack, done) = mpsc::channel();
        let message = if flush {
            NotifierMessage::Flush(ack)
        } else {
            NotifierMessage::Discard(ack)
        };
        self.notifier
            .send(message)
            .map_err(|_| CaptureError::ThreadExited)?;
        done.recv().map_err(|_| CaptureError::ThreadExited)?;

        paused
    }

    fn dispose(&mut self) -> Result<Vec<BufferSlot>, CaptureError> {
        if self.disposed {
            return Ok(Vec::new());
        }
        self.disposed = true;

        let mut result = Ok(());
        let _ = self.commands.send(StreamCommand::Shutdown);
        if let Some(handle) = self.stream_thread.take() {
            if handle.join().is_err() {
                result = Err(CaptureError::ThreadExited);
            }
        }

        let _ = self.notifier.send(NotifierMessage::Shutdown);
        let mut current = None;
        if let Some(handle) = self.notifier_thread.take() {
            match handle.join() {
                Ok(slot) => current = slot,
                Err(_) => result = Err(CaptureError::ThreadExited),
            }
        }

        let mut slots = self.queue.close();
        slots.extend(current);
        log::debug!("capture session disposed, {} buffers returned", slots.len());
        result.map(|()| slots)
    }
}

impl Drop for CpalCaptureSession {
    fn drop(&mut self) {
        if let Err(error) = self.dispose() {
            log::warn!("capture session cleanup failed: {}", error);
        }
    }
}
