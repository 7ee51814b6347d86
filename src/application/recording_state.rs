//! State shared between the pipeline and the capture thread

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Mutex, MutexGuard, PoisonError};
use tokio::sync::Notify;

use crate::domain::recording::{BufferSlot, CodecSideInfo};

use super::error::RecorderError;
use super::ports::{BufferCompletion, BufferQueue, CaptureError, FilledBuffer, OutputSink, SinkError};

/// The sink and its write cursor, always updated together
struct Output<S> {
    sink: Option<S>,
    next_packet_index: u64,
    bytes_written: u64,
}

/// Recording context handed to the capture session.
///
/// `running` decides whether a drained buffer goes back to capture. The sink
/// and the packet cursor live behind one lock so a write and its cursor
/// advance are never observed apart.
pub struct RecordingState<S: OutputSink> {
    running: AtomicBool,
    output: Mutex<Output<S>>,
    faulted: AtomicBool,
    fault: Mutex<Option<RecorderError>>,
    fault_notify: Notify,
    retired: Mutex<Vec<BufferSlot>>,
    buffers_drained: AtomicU64,
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

impl<S: OutputSink> RecordingState<S> {
    /// Empty state; the sink is attached once the output file exists
    pub fn new() -> Self {
        Self {
            running: AtomicBool::new(false),
            output: Mutex::new(Output {
                sink: None,
                next_packet_index: 0,
                bytes_written: 0,
            }),
            faulted: AtomicBool::new(false),
            fault: Mutex::new(None),
            fault_notify: Notify::new(),
            retired: Mutex::new(Vec::new()),
            buffers_drained: AtomicU64::new(0),
        }
    }

    pub fn attach_sink(&self, sink: S) {
        lock(&self.output).sink = Some(sink);
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    pub fn set_running(&self, running: bool) {
        self.running.store(running, Ordering::SeqCst);
    }

    /// Index the next appended packet will get
    pub fn next_packet_index(&self) -> u64 {
        lock(&self.output).next_packet_index
    }

    pub fn bytes_written(&self) -> u64 {
        lock(&self.output).bytes_written
    }

    /// Completions handled so far, including empty ones
    pub fn buffers_drained(&self) -> u64 {
        self.buffers_drained.load(Ordering::SeqCst)
    }

    pub fn is_faulted(&self) -> bool {
        self.faulted.load(Ordering::SeqCst)
    }

    /// The first fault recorded, if any
    pub fn fault(&self) -> Option<RecorderError> {
        lock(&self.fault).clone()
    }

    /// Record a fault and stop taking buffers. Only the first fault is kept.
    pub fn fail(&self, error: RecorderError) {
        self.set_running(false);
        {
            let mut fault = lock(&self.fault);
            if fault.is_some() {
                log::debug!("ignoring secondary fault: {}", error);
                return;
            }
            log::error!("recording fault: {}", error);
            *fault = Some(error);
        }
        self.faulted.store(true, Ordering::SeqCst);
        self.fault_notify.notify_waiters();
    }

    /// Resolve once a fault has been recorded
    pub async fn faulted(&self) -> RecorderError {
        loop {
            let notified = self.fault_notify.notified();
            if let Some(error) = self.fault() {
                return error;
            }
            notified.await;
        }
    }

    /// Hand the codec configuration to the sink
    pub fn apply_side_info(&self, info: &CodecSideInfo) -> Result<(), SinkError> {
        let mut output = lock(&self.output);
        let sink = output.sink.as_mut().ok_or(SinkError::Closed)?;
        sink.set_codec_side_info(info)
    }

    /// Close the sink. Later calls are no-ops.
    pub fn close_sink(&self) -> Result<(), SinkError> {
        let sink = lock(&self.output).sink.take();
        match sink {
            Some(mut sink) => sink.close(),
            None => Ok(()),
        }
    }

    /// Slots taken out of circulation, drained
    pub fn take_retired(&self) -> Vec<BufferSlot> {
        std::mem::take(&mut *lock(&self.retired))
    }

    fn retire(&self, slot: BufferSlot) {
        log::trace!("retiring buffer {}", slot.id());
        lock(&self.retired).push(slot);
    }

    fn write_slot(&self, slot: &BufferSlot) -> Result<(), RecorderError> {
        let mut output = lock(&self.output);
        let start_packet = output.next_packet_index;
        let packet_count = slot.packet_count();

        let sink = output
            .sink
            .as_mut()
            .ok_or(SinkError::Closed)
            .map_err(RecorderError::write("write packets"))?;
        let written = sink
            .write_packets(
                false,
                slot.byte_len() as u32,
                slot.packet_descriptions(),
                start_packet,
                packet_count,
                slot.data(),
            )
            .map_err(RecorderError::write("write packets"))?;

        if written != packet_count {
            return Err(RecorderError::Write {
                operation: "write packets",
                message: format!("short write: {} of {} packets", written, packet_count),
            });
        }

        output.next_packet_index += u64::from(packet_count);
        output.bytes_written += slot.byte_len() as u64;
        Ok(())
    }
}

impl<S: OutputSink> Default for RecordingState<S> {
    fn default() -> Self {
        Self::new()
    }
}

impl<S: OutputSink> BufferCompletion for RecordingState<S> {
    fn on_buffer_filled(&self, queue: &dyn BufferQueue, filled: FilledBuffer) {
        let FilledBuffer { slot, start_time } = filled;
        self.buffers_drained.fetch_add(1, Ordering::SeqCst);

        if self.is_faulted() {
            self.retire(slot);
            return;
        }

        log::trace!(
            "buffer {} filled: {} packets, {} bytes, sample time {}",
            slot.id(),
            slot.packet_count(),
            slot.byte_len(),
            start_time.sample_time
        );

        if slot.packet_count() > 0 {
            if let Err(error) = self.write_slot(&slot) {
                self.fail(error);
                self.retire(slot);
                return;
            }
        }

        if self.is_running() {
            if let Err(rejected) = queue.enqueue(slot) {
                self.fail(RecorderError::resubmit("enqueue buffer")(rejected.error));
                self.retire(rejected.slot);
            }
        } else {
            self.retire(slot);
        }
    }

    fn on_capture_error(&self, error: CaptureError) {
        self.fail(RecorderError::write("encode audio")(error));
    }
}
