//! Fixed pool of capture buffers

use crate::domain::recording::{BufferSlot, StreamFormat};

use super::error::RecorderError;
use super::ports::BufferQueue;

/// Size of every buffer in a pool
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BufferLayout {
    /// Bytes of audio data per buffer
    pub byte_size: usize,
    /// Packet descriptions per buffer, 0 for constant bit rate formats
    pub packet_capacity: usize,
}

impl BufferLayout {
    /// Layout holding at least `seconds` of audio in `format`.
    ///
    /// Formats with a fixed frame size are sized exactly. Compressed formats
    /// reserve room for every packet at `max_packet_size`.
    pub fn for_duration(format: &StreamFormat, max_packet_size: usize, seconds: f64) -> Self {
        let frames = format.frames_for(seconds);
        let bytes_per_frame = u64::from(format.bytes_per_frame());

        if bytes_per_frame > 0 {
            return Self {
                byte_size: (frames * bytes_per_frame) as usize,
                packet_capacity: 0,
            };
        }

        let max_packet = if format.bytes_per_packet > 0 {
            format.bytes_per_packet as usize
        } else {
            max_packet_size
        };
        let packets = if format.frames_per_packet > 0 {
            (frames / u64::from(format.frames_per_packet)).max(1)
        } else {
            frames.max(1)
        } as usize;

        Self {
            byte_size: packets * max_packet,
            packet_capacity: if format.is_variable_bit_rate() {
                packets
            } else {
                0
            },
        }
    }
}

/// Accounting for the buffers of one session.
///
/// Buffers are allocated once, all submitted before capture starts, and
/// handed back here at teardown.
#[derive(Debug)]
pub struct BufferPool {
    layout: BufferLayout,
    allocated: usize,
    reclaimed: usize,
}

impl BufferPool {
    /// Allocate `count` buffers with the given layout.
    ///
    /// # Returns
    /// The pool and its freshly allocated slots
    pub fn allocate(
        count: usize,
        layout: BufferLayout,
    ) -> Result<(Self, Vec<BufferSlot>), RecorderError> {
        if count == 0 {
            return Err(RecorderError::Setup {
                operation: "allocate buffers",
                message: "buffer count must be at least 1".to_string(),
            });
        }
        if layout.byte_size == 0 {
            return Err(RecorderError::Setup {
                operation: "allocate buffers",
                message: "buffer size must be greater than zero".to_string(),
            });
        }

        let slots = (0..count)
            .map(|id| BufferSlot::with_capacity(id, layout.byte_size, layout.packet_capacity))
            .collect::<Result<Vec<_>, _>>()
            .map_err(RecorderError::setup("allocate buffers"))?;

        log::debug!(
            "allocated {} buffers of {} bytes ({} packet descriptions each)",
            count,
            layout.byte_size,
            layout.packet_capacity
        );

        Ok((
            Self {
                layout,
                allocated: count,
                reclaimed: 0,
            },
            slots,
        ))
    }

    /// Hand every slot to the capture queue
    pub fn submit_all(
        &self,
        slots: Vec<BufferSlot>,
        queue: &dyn BufferQueue,
    ) -> Result<(), RecorderError> {
        for slot in slots {
            queue
                .enqueue(slot)
                .map_err(RecorderError::setup("enqueue buffer"))?;
        }
        Ok(())
    }

    /// Take back slots at teardown. Returns how many were taken.
    pub fn reclaim(&mut self, slots: impl IntoIterator<Item = BufferSlot>) -> usize {
        let count = slots.into_iter().count();
        self.reclaimed += count;
        count
    }

    /// Slots allocated but not yet reclaimed
    pub fn outstanding(&self) -> usize {
        self.allocated.saturating_sub(self.reclaimed)
    }

    pub fn layout(&self) -> BufferLayout {
        self.layout
    }

    pub fn len(&self) -> usize {
        self.allocated
    }

    pub fn is_empty(&self) -> bool {
        self.allocated == 0
    }
}
