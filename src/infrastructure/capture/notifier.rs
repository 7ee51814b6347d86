//! Buffer filling and completion delivery
//!
//! Runs on the capture session's notifier thread. Device audio arrives as
//! messages, is encoded into the slot at the head of the queue, and every
//! full slot is handed to the completion handler.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::{Receiver, Sender};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use crate::application::ports::{
    BufferCompletion, BufferQueue, CaptureError, FilledBuffer, RejectedBuffer,
};
use crate::domain::recording::{BufferSlot, CaptureTimestamp, CodecSideInfo};

use super::conditioner::Conditioner;
use super::encoder::PacketEncoder;

pub enum NotifierMessage {
    /// Interleaved device samples
    Samples(Vec<f32>),
    /// Encode everything pending, deliver the partial slot, then ack
    Flush(Sender<()>),
    /// Drop everything pending, then ack
    Discard(Sender<()>),
    Shutdown,
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Empty slots waiting to be filled, oldest first
#[derive(Debug, Default)]
pub struct SlotQueue {
    slots: Mutex<VecDeque<BufferSlot>>,
    closed: AtomicBool,
}

impl SlotQueue {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn pop(&self) -> Option<BufferSlot> {
        lock(&self.slots).pop_front()
    }

    pub fn len(&self) -> usize {
        lock(&self.slots).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Refuse further slots and hand back the ones queued
    pub fn close(&self) -> Vec<BufferSlot> {
        self.closed.store(true, Ordering::SeqCst);
        lock(&self.slots).drain(..).collect()
    }
}

impl BufferQueue for SlotQueue {
    fn enqueue(&self, mut slot: BufferSlot) -> Result<(), RejectedBuffer> {
        if self.closed.load(Ordering::SeqCst) {
            return Err(RejectedBuffer::new(slot, CaptureError::Disposed));
        }
        slot.clear();
        lock(&self.slots).push_back(slot);
        Ok(())
    }
}

/// The encoder's codec configuration as last published by the notifier
#[derive(Debug, Clone, Default)]
pub struct SharedSideInfo(Arc<Mutex<Option<CodecSideInfo>>>);

impl SharedSideInfo {
    pub fn new(info: Option<CodecSideInfo>) -> Self {
        Self(Arc::new(Mutex::new(info)))
    }

    pub fn get(&self) -> Option<CodecSideInfo> {
        lock(&self.0).clone()
    }

    fn set(&self, info: Option<CodecSideInfo>) {
        *lock(&self.0) = info;
    }
}

pub struct Notifier {
    queue: Arc<SlotQueue>,
    completion: Arc<dyn BufferCompletion>,
    conditioner: Conditioner,
    encoder: Box<dyn PacketEncoder>,
    side_info: SharedSideInfo,
    /// Set once a capture error was reported; later audio is dropped
    failed: bool,
    /// Conditioned samples not yet encoded
    backlog: Vec<i16>,
    packet: Vec<u8>,
    current: Option<BufferSlot>,
    slot_start: u64,
    frames_encoded: u64,
    dropped_packets: u64,
}

impl Notifier {
    pub fn new(
        queue: Arc<SlotQueue>,
        completion: Arc<dyn BufferCompletion>,
        conditioner: Conditioner,
        encoder: Box<dyn PacketEncoder>,
        side_info: SharedSideInfo,
    ) -> Self {
        side_info.set(encoder.side_info());
        Self {
            queue,
            completion,
            conditioner,
            encoder,
            side_info,
            failed: false,
            backlog: Vec::new(),
            packet: Vec::new(),
            current: None,
            slot_start: 0,
            frames_encoded: 0,
            dropped_packets: 0,
        }
    }

    /// Handle messages until shutdown.
    ///
    /// # Returns
    /// The slot being filled, if any
    pub fn run(mut self, messages: Receiver<NotifierMessage>) -> Option<BufferSlot> {
        while let Ok(message) = messages.recv() {
            match message {
                NotifierMessage::Samples(samples) => {
                    if !self.failed {
                        let result = self.on_samples(&samples);
                        self.report(result);
                    }
                }
                NotifierMessage::Flush(ack) => {
                    let result = if self.failed {
                        self.discard();
                        self.deliver_current();
                        Ok(())
                    } else {
                        self.flush()
                    };
                    self.report(result);
                    let _ = ack.send(());
                }
                NotifierMessage::Discard(ack) => {
                    self.discard();
                    let _ = ack.send(());
                }
                NotifierMessage::Shutdown => break,
            }
        }
        log::debug!("notifier stopped after {} frames", self.frames_encoded);
        self.current.take()
    }

    pub fn on_samples(&mut self, samples: &[f32]) -> Result<(), CaptureError> {
        self.conditioner.process(samples, &mut self.backlog)?;
        self.encode_backlog(false)
    }

    /// Encode the rest of the backlog, publish the encoder's final side
    /// info, and deliver the slot being filled
    pub fn flush(&mut self) -> Result<(), CaptureError> {
        self.conditioner.flush(&mut self.backlog)?;
        self.encode_backlog(true)?;
        self.side_info.set(self.encoder.side_info());
        self.deliver_current();
        Ok(())
    }

    pub fn discard(&mut self) {
        self.conditioner.reset();
        self.backlog.clear();
    }

    /// Hand a failure to the completion handler. Only the first is reported.
    fn report(&mut self, result: Result<(), CaptureError>) {
        if let Err(error) = result {
            if self.failed {
                log::debug!("ignoring capture error after failure: {}", error);
                return;
            }
            self.failed = true;
            log::error!("capture failed: {}", error);
            self.completion.on_capture_error(error);
        }
    }

    /// Encode whole chunks; with `flush`, the short tail too
    fn encode_backlog(&mut self, flush: bool) -> Result<(), CaptureError> {
        let chunk = self.encoder.samples_per_chunk();
        let mut offset = 0;

        while self.backlog.len() - offset >= chunk || (flush && offset < self.backlog.len()) {
            let end = (offset + chunk).min(self.backlog.len());
            let frames = match self.encoder.encode(&self.backlog[offset..end], &mut self.packet) {
                Ok(frames) => frames,
                Err(error) => {
                    self.backlog.clear();
                    return Err(error);
                }
            };
            offset = end;
            self.store_packet(frames);
        }

        self.backlog.drain(..offset);
        Ok(())
    }

    fn store_packet(&mut self, frames: u32) {
        if let Some(slot) = self.current.as_mut() {
            if self.encoder.store(slot, &self.packet, frames) {
                self.frames_encoded += u64::from(frames);
                return;
            }
            self.deliver_current();
        }

        match self.next_slot() {
            Some(mut slot) => {
                if !self.encoder.store(&mut slot, &self.packet, frames) {
                    log::warn!(
                        "dropping {}-byte packet larger than an empty buffer",
                        self.packet.len()
                    );
                }
                self.current = Some(slot);
            }
            None => {
                if self.dropped_packets == 0 {
                    log::warn!("no free buffer, dropping audio");
                }
                self.dropped_packets += 1;
            }
        }
        self.frames_encoded += u64::from(frames);
    }

    fn next_slot(&mut self) -> Option<BufferSlot> {
        let slot = self.queue.pop()?;
        if self.dropped_packets > 0 {
            log::warn!("buffer available again after {} dropped packets", self.dropped_packets);
            self.dropped_packets = 0;
        }
        self.slot_start = self.frames_encoded;
        Some(slot)
    }

    fn deliver_current(&mut self) {
        if let Some(slot) = self.current.take() {
            let filled = FilledBuffer {
                slot,
                start_time: CaptureTimestamp {
                    sample_time: self.slot_start,
                },
            };
            self.completion.on_buffer_filled(&*self.queue, filled);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::recording::{Codec, StreamFormat};
    use crate::infrastructure::capture::encoder::LinearPcmEncoder;

    #[derive(Default)]
    struct Recorder {
        filled: Mutex<Vec<(usize, u32, u64)>>,
        errors: Mutex<Vec<String>>,
        hold: bool,
    }

    impl BufferCompletion for Recorder {
        fn on_buffer_filled(&self, queue: &dyn BufferQueue, filled: FilledBuffer) {
            self.filled.lock().unwrap().push((
                filled.slot.id(),
                filled.packet_count(),
                filled.start_time.sample_time,
            ));
            if !self.hold {
                queue.enqueue(filled.slot).unwrap();
            }
        }

        fn on_capture_error(&self, error: CaptureError) {
            self.errors.lock().unwrap().push(error.to_string());
        }
    }

    /// PCM encoder that can fail and whose side info counts encoded chunks
    struct ScriptedEncoder {
        inner: LinearPcmEncoder,
        fail: bool,
        chunks: u8,
    }

    impl PacketEncoder for ScriptedEncoder {
        fn stream_format(&self) -> StreamFormat {
            self.inner.stream_format()
        }

        fn max_packet_size(&self) -> usize {
            self.inner.max_packet_size()
        }

        fn side_info(&self) -> Option<CodecSideInfo> {
            Some(CodecSideInfo::new(vec![self.chunks]))
        }

        fn samples_per_chunk(&self) -> usize {
            self.inner.samples_per_chunk()
        }

        fn encode(&mut self, samples: &[i16], packet: &mut Vec<u8>) -> Result<u32, CaptureError> {
            if self.fail {
                return Err(CaptureError::EncoderFailed("corrupt state".to_string()));
            }
            self.chunks += 1;
            self.inner.encode(samples, packet)
        }

        fn store(&self, slot: &mut BufferSlot, packet: &[u8], frames: u32) -> bool {
            self.inner.store(slot, packet, frames)
        }
    }

    fn pcm_format() -> StreamFormat {
        StreamFormat::partial(Codec::LinearPcm, 1, 1000)
            .complete()
            .unwrap()
    }

    /// Mono 16-bit PCM at 1 kHz: 10-frame chunks, 20-frame slots
    fn notifier(slots: usize, completion: Arc<Recorder>) -> (Notifier, Arc<SlotQueue>) {
        let encoder = Box::new(LinearPcmEncoder::new(pcm_format()));
        notifier_with(slots, completion, encoder, SharedSideInfo::default())
    }

    fn notifier_with(
        slots: usize,
        completion: Arc<Recorder>,
        encoder: Box<dyn PacketEncoder>,
        side_info: SharedSideInfo,
    ) -> (Notifier, Arc<SlotQueue>) {
        let queue = Arc::new(SlotQueue::new());
        for id in 0..slots {
            queue
                .enqueue(BufferSlot::with_capacity(id, 40, 0).unwrap())
                .unwrap();
        }
        let notifier = Notifier::new(
            queue.clone(),
            completion,
            Conditioner::new(1000, 1, 1000, 1).unwrap(),
            encoder,
            side_info,
        );
        (notifier, queue)
    }

    #[test]
    fn full_slots_are_delivered_in_order() {
        let completion = Arc::new(Recorder::default());
        let (mut notifier, _queue) = notifier(3, completion.clone());

        notifier.on_samples(&[0.0; 50]).unwrap();
        assert_eq!(
            *completion.filled.lock().unwrap(),
            vec![(0, 20, 0), (1, 20, 20)]
        );

        notifier.flush().unwrap();
        assert_eq!(completion.filled.lock().unwrap()[2], (2, 10, 40));
    }

    #[test]
    fn partial_chunk_waits_for_flush() {
        let completion = Arc::new(Recorder::default());
        let (mut notifier, _queue) = notifier(2, completion.clone());

        notifier.on_samples(&[0.0; 15]).unwrap();
        notifier.flush().unwrap();
        assert_eq!(*completion.filled.lock().unwrap(), vec![(0, 15, 0)]);
    }

    #[test]
    fn missing_slots_drop_audio() {
        let completion = Arc::new(Recorder {
            hold: true,
            ..Recorder::default()
        });
        let (mut notifier, queue) = notifier(1, completion.clone());

        notifier.on_samples(&[0.0; 60]).unwrap();
        assert_eq!(*completion.filled.lock().unwrap(), vec![(0, 20, 0)]);
        assert!(queue.is_empty());

        queue
            .enqueue(BufferSlot::with_capacity(7, 40, 0).unwrap())
            .unwrap();
        notifier.on_samples(&[0.0; 10]).unwrap();
        notifier.flush().unwrap();
        assert_eq!(completion.filled.lock().unwrap()[1], (7, 10, 60));
    }

    #[test]
    fn discard_forgets_backlog() {
        let completion = Arc::new(Recorder::default());
        let (mut notifier, _queue) = notifier(2, completion.clone());

        notifier.on_samples(&[0.0; 5]).unwrap();
        notifier.discard();
        notifier.flush().unwrap();
        assert!(completion.filled.lock().unwrap().is_empty());
    }

    #[test]
    fn closed_queue_hands_rejected_slot_back() {
        let queue = SlotQueue::new();
        queue
            .enqueue(BufferSlot::with_capacity(0, 4, 0).unwrap())
            .unwrap();
        assert_eq!(queue.close().len(), 1);
        let rejected = queue
            .enqueue(BufferSlot::with_capacity(1, 4, 0).unwrap())
            .unwrap_err();
        assert_eq!(rejected.slot.id(), 1);
        assert!(matches!(rejected.error, CaptureError::Disposed));
    }

    #[test]
    fn encoder_failure_reaches_completion_once() {
        let completion = Arc::new(Recorder::default());
        let encoder = Box::new(ScriptedEncoder {
            inner: LinearPcmEncoder::new(pcm_format()),
            fail: true,
            chunks: 0,
        });
        let (notifier, queue) =
            notifier_with(2, completion.clone(), encoder, SharedSideInfo::default());

        let (tx, rx) = std::sync::mpsc::channel();
        for _ in 0..5 {
            tx.send(NotifierMessage::Samples(vec![0.0; 10])).unwrap();
        }
        let (ack, done) = std::sync::mpsc::channel();
        tx.send(NotifierMessage::Flush(ack)).unwrap();
        tx.send(NotifierMessage::Shutdown).unwrap();

        assert!(notifier.run(rx).is_none());
        done.recv().unwrap();
        let errors = completion.errors.lock().unwrap().clone();
        assert_eq!(errors.len(), 1);
        assert!(errors[0].contains("corrupt state"));
        assert!(completion.filled.lock().unwrap().is_empty());
        assert_eq!(queue.len(), 2);
    }

    #[test]
    fn flush_publishes_final_side_info() {
        let completion = Arc::new(Recorder::default());
        let encoder = Box::new(ScriptedEncoder {
            inner: LinearPcmEncoder::new(pcm_format()),
            fail: false,
            chunks: 0,
        });
        let side_info = SharedSideInfo::default();
        let (mut notifier, _queue) =
            notifier_with(2, completion.clone(), encoder, side_info.clone());
        assert_eq!(side_info.get(), Some(CodecSideInfo::new(vec![0])));

        notifier.on_samples(&[0.0; 25]).unwrap();
        assert_eq!(side_info.get(), Some(CodecSideInfo::new(vec![0])));

        notifier.flush().unwrap();
        assert_eq!(side_info.get(), Some(CodecSideInfo::new(vec![3])));
        assert!(completion.errors.lock().unwrap().is_empty());
    }
}
