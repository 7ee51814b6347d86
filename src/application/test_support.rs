//! In-memory fakes for the recording ports

use std::collections::VecDeque;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use crate::domain::recording::{
    BufferSlot, CaptureTimestamp, CodecSideInfo, ContainerFormat, PacketDescription, StreamFormat,
};

use super::ports::{
    BufferCompletion, BufferQueue, CaptureBackend, CaptureError, CaptureSession, FilledBuffer,
    FormatError, FormatNegotiator, OutputSink, RejectedBuffer, SinkError, SinkFactory,
};

/// A slot already holding `packets` packets
pub fn filled(id: usize, packets: u32) -> FilledBuffer {
    let mut slot = BufferSlot::with_capacity(id, 16, 0).unwrap();
    slot.push_frames(&[], packets);
    FilledBuffer {
        slot,
        start_time: CaptureTimestamp::default(),
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SinkCall {
    Write { start: u64, count: u32 },
    Cookie(Vec<u8>),
    Close,
}

/// Calls seen by every sink sharing the log
#[derive(Debug, Clone, Default)]
pub struct SinkLog(Arc<Mutex<Vec<SinkCall>>>);

impl SinkLog {
    pub fn calls(&self) -> Vec<SinkCall> {
        self.0.lock().unwrap().clone()
    }

    pub fn writes(&self) -> Vec<(u64, u32)> {
        self.calls()
            .into_iter()
            .filter_map(|call| match call {
                SinkCall::Write { start, count } => Some((start, count)),
                _ => None,
            })
            .collect()
    }

    pub fn cookie_count(&self) -> usize {
        self.calls()
            .iter()
            .filter(|call| matches!(call, SinkCall::Cookie(_)))
            .count()
    }

    fn push(&self, call: SinkCall) {
        self.0.lock().unwrap().push(call);
    }
}

/// Sink that records calls and fails its `fail_on_write`-th write (0-based)
pub struct FakeSink {
    log: SinkLog,
    fail_on_write: Option<usize>,
    writes: usize,
    next_packet: u64,
    closed: bool,
}

impl FakeSink {
    pub fn new(log: SinkLog, fail_on_write: Option<usize>) -> Self {
        Self {
            log,
            fail_on_write,
            writes: 0,
            next_packet: 0,
            closed: false,
        }
    }
}

impl OutputSink for FakeSink {
    fn write_packets(
        &mut self,
        _use_cache: bool,
        _byte_count: u32,
        _descriptions: &[PacketDescription],
        start_packet: u64,
        packet_count: u32,
        _data: &[u8],
    ) -> Result<u32, SinkError> {
        if self.closed {
            return Err(SinkError::Closed);
        }
        let index = self.writes;
        self.writes += 1;
        if self.fail_on_write == Some(index) {
            return Err(SinkError::Io("disk full".to_string()));
        }
        if start_packet != self.next_packet {
            return Err(SinkError::OutOfOrder {
                expected: self.next_packet,
                actual: start_packet,
            });
        }
        self.next_packet += u64::from(packet_count);
        self.log.push(SinkCall::Write {
            start: start_packet,
            count: packet_count,
        });
        Ok(packet_count)
    }

    fn set_codec_side_info(&mut self, info: &CodecSideInfo) -> Result<(), SinkError> {
        if self.closed {
            return Err(SinkError::Closed);
        }
        self.log.push(SinkCall::Cookie(info.as_bytes().to_vec()));
        Ok(())
    }

    fn close(&mut self) -> Result<(), SinkError> {
        self.closed = true;
        self.log.push(SinkCall::Close);
        Ok(())
    }
}

#[derive(Default)]
pub struct FakeSinkFactory {
    pub log: SinkLog,
    pub fail_on_write: Option<usize>,
    pub fail_create: bool,
    pub created: Mutex<Vec<(PathBuf, bool)>>,
}

impl SinkFactory for FakeSinkFactory {
    type Sink = FakeSink;

    fn create(
        &self,
        path: &Path,
        container: ContainerFormat,
        format: &StreamFormat,
        erase_existing: bool,
    ) -> Result<FakeSink, SinkError> {
        if self.fail_create {
            return Err(SinkError::AlreadyExists(path.display().to_string()));
        }
        container.check_codec(format.codec)?;
        self.created
            .lock()
            .unwrap()
            .push((path.to_path_buf(), erase_existing));
        Ok(FakeSink::new(self.log.clone(), self.fail_on_write))
    }
}

pub struct FakeNegotiator {
    pub sample_rate: u32,
    pub fail: bool,
}

impl Default for FakeNegotiator {
    fn default() -> Self {
        Self {
            sample_rate: 48000,
            fail: false,
        }
    }
}

impl FormatNegotiator for FakeNegotiator {
    fn default_input_sample_rate(&self) -> Result<u32, FormatError> {
        if self.fail {
            return Err(FormatError::NoInputDevice);
        }
        Ok(self.sample_rate)
    }

    fn complete_stream_description(
        &self,
        partial: StreamFormat,
    ) -> Result<StreamFormat, FormatError> {
        Ok(partial.complete()?)
    }
}

/// Capture side driven by the test.
///
/// Holds the queued slots and the completion handler; tests call
/// [`FakeCapture::deliver`] to play the notifier thread.
#[derive(Default)]
pub struct FakeCapture {
    pub(crate) queue: Mutex<VecDeque<BufferSlot>>,
    pub(crate) completion: Mutex<Option<Arc<dyn BufferCompletion>>>,
    pub(crate) started: AtomicBool,
    pub(crate) stopped: AtomicBool,
    pub(crate) disposed: AtomicBool,
    pub(crate) resubmitted_after_stop: AtomicUsize,
    /// Packet counts delivered from inside `stop(true)`
    pub in_flight_on_stop: Mutex<Vec<u32>>,
    pub side_info: Mutex<Option<CodecSideInfo>>,
    pub fail_start: bool,
    pub fail_stop: bool,
}

impl FakeCapture {
    pub fn with_side_info(bytes: &[u8]) -> Self {
        Self {
            side_info: Mutex::new(Some(CodecSideInfo::new(bytes.to_vec()))),
            ..Self::default()
        }
    }

    pub fn queued_ids(&self) -> Vec<usize> {
        self.queue.lock().unwrap().iter().map(BufferSlot::id).collect()
    }

    pub fn is_started(&self) -> bool {
        self.started.load(Ordering::SeqCst)
    }

    pub fn is_disposed(&self) -> bool {
        self.disposed.load(Ordering::SeqCst)
    }

    pub fn resubmitted_after_stop(&self) -> usize {
        self.resubmitted_after_stop.load(Ordering::SeqCst)
    }

    /// Fill the oldest queued slot and hand it to the completion handler.
    /// Returns false when no slot is queued.
    pub fn deliver(&self, packets: u32) -> bool {
        let slot = self.queue.lock().unwrap().pop_front();
        match slot {
            Some(slot) => {
                self.complete(slot, packets);
                true
            }
            None => false,
        }
    }

    /// Fill a specific queued slot, wherever it sits in the queue
    pub fn deliver_slot(&self, id: usize, packets: u32) -> bool {
        let slot = {
            let mut queue = self.queue.lock().unwrap();
            let position = queue.iter().position(|slot| slot.id() == id);
            position.and_then(|position| queue.remove(position))
        };
        match slot {
            Some(slot) => {
                self.complete(slot, packets);
                true
            }
            None => false,
        }
    }

    /// Report a capture failure the way the notifier thread would
    pub fn fail_capture(&self, error: CaptureError) {
        let completion = self.completion.lock().unwrap().clone();
        if let Some(completion) = completion {
            completion.on_capture_error(error);
        }
    }

    fn complete(&self, mut slot: BufferSlot, packets: u32) {
        slot.push_frames(&[], packets);
        let completion = self.completion.lock().unwrap().clone();
        if let Some(completion) = completion {
            completion.on_buffer_filled(
                self,
                FilledBuffer {
                    slot,
                    start_time: CaptureTimestamp::default(),
                },
            );
        }
    }
}

impl BufferQueue for FakeCapture {
    fn enqueue(&self, mut slot: BufferSlot) -> Result<(), RejectedBuffer> {
        if self.disposed.load(Ordering::SeqCst) {
            return Err(RejectedBuffer::new(slot, CaptureError::Disposed));
        }
        if self.stopped.load(Ordering::SeqCst) {
            self.resubmitted_after_stop.fetch_add(1, Ordering::SeqCst);
        }
        slot.clear();
        self.queue.lock().unwrap().push_back(slot);
        Ok(())
    }
}

pub struct FakeSession {
    capture: Arc<FakeCapture>,
    format: StreamFormat,
}

impl BufferQueue for FakeSession {
    fn enqueue(&self, slot: BufferSlot) -> Result<(), RejectedBuffer> {
        self.capture.enqueue(slot)
    }
}

impl CaptureSession for FakeSession {
    fn stream_format(&self) -> Result<StreamFormat, CaptureError> {
        Ok(self.format)
    }

    fn max_packet_size(&self) -> Result<usize, CaptureError> {
        Ok(64)
    }

    fn codec_side_info(&self) -> Result<Option<CodecSideInfo>, CaptureError> {
        Ok(self.capture.side_info.lock().unwrap().clone())
    }

    fn start(&mut self) -> Result<(), CaptureError> {
        if self.capture.fail_start {
            return Err(CaptureError::StreamFailed("device busy".to_string()));
        }
        self.capture.started.store(true, Ordering::SeqCst);
        Ok(())
    }

    fn stop(&mut self, flush: bool) -> Result<(), CaptureError> {
        self.capture.stopped.store(true, Ordering::SeqCst);
        if flush {
            let in_flight = std::mem::take(&mut *self.capture.in_flight_on_stop.lock().unwrap());
            for packets in in_flight {
                self.capture.deliver(packets);
            }
        }
        if self.capture.fail_stop {
            return Err(CaptureError::StreamFailed("stop refused".to_string()));
        }
        Ok(())
    }

    fn dispose(&mut self) -> Result<Vec<BufferSlot>, CaptureError> {
        self.capture.disposed.store(true, Ordering::SeqCst);
        self.capture.completion.lock().unwrap().take();
        Ok(self.capture.queue.lock().unwrap().drain(..).collect())
    }
}

pub struct FakeBackend {
    pub capture: Arc<FakeCapture>,
    pub fail_create: bool,
}

impl FakeBackend {
    pub fn new(capture: FakeCapture) -> Self {
        Self {
            capture: Arc::new(capture),
            fail_create: false,
        }
    }
}

impl CaptureBackend for FakeBackend {
    type Session = FakeSession;

    fn create(
        &self,
        format: &StreamFormat,
        completion: Arc<dyn BufferCompletion>,
    ) -> Result<FakeSession, CaptureError> {
        if self.fail_create {
            return Err(CaptureError::NoInputDevice);
        }
        *self.capture.completion.lock().unwrap() = Some(completion);
        Ok(FakeSession {
            capture: self.capture.clone(),
            format: *format,
        })
    }
}
