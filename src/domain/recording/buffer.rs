//! Reusable capture buffer

use std::collections::TryReserveError;

use super::packet::PacketDescription;

/// One fixed-capacity capture buffer.
///
/// A slot is moved by value between the capture side (filling it) and the
/// pipeline (draining it), so only one side can touch it at a time. Its
/// allocations are made once and never grow.
#[derive(Debug)]
pub struct BufferSlot {
    id: usize,
    data: Vec<u8>,
    byte_capacity: usize,
    descriptions: Vec<PacketDescription>,
    packet_capacity: usize,
    packet_count: u32,
}

impl BufferSlot {
    /// Allocate a slot holding `byte_capacity` bytes and, for variable bit
    /// rate formats, up to `packet_capacity` packet descriptions.
    pub fn with_capacity(
        id: usize,
        byte_capacity: usize,
        packet_capacity: usize,
    ) -> Result<Self, TryReserveError> {
        let mut data = Vec::new();
        data.try_reserve_exact(byte_capacity)?;
        let mut descriptions = Vec::new();
        descriptions.try_reserve_exact(packet_capacity)?;

        Ok(Self {
            id,
            data,
            byte_capacity,
            descriptions,
            packet_capacity,
            packet_count: 0,
        })
    }

    pub fn id(&self) -> usize {
        self.id
    }

    pub fn byte_capacity(&self) -> usize {
        self.byte_capacity
    }

    /// Number of valid bytes currently held
    pub fn byte_len(&self) -> usize {
        self.data.len()
    }

    pub fn remaining(&self) -> usize {
        self.byte_capacity - self.data.len()
    }

    /// Valid audio bytes
    pub fn data(&self) -> &[u8] {
        &self.data
    }

    /// Per-packet layout, empty for constant bit rate data
    pub fn packet_descriptions(&self) -> &[PacketDescription] {
        &self.descriptions
    }

    pub fn packet_count(&self) -> u32 {
        self.packet_count
    }

    pub fn packet_capacity(&self) -> usize {
        self.packet_capacity
    }

    pub fn is_empty(&self) -> bool {
        self.packet_count == 0
    }

    /// Whether a packet of `len` bytes still fits
    pub fn can_fit(&self, len: usize) -> bool {
        let has_description_room =
            self.packet_capacity == 0 || self.descriptions.len() < self.packet_capacity;
        has_description_room && self.remaining() >= len
    }

    /// Append one variable-size packet and its description.
    /// Returns false, leaving the slot untouched, when it does not fit.
    pub fn push_packet(&mut self, bytes: &[u8], variable_frames: u32) -> bool {
        if self.packet_capacity == 0 || !self.can_fit(bytes.len()) {
            return false;
        }
        self.descriptions.push(PacketDescription {
            start_offset: self.data.len() as u64,
            variable_frames,
            data_byte_size: bytes.len() as u32,
        });
        self.data.extend_from_slice(bytes);
        self.packet_count += 1;
        true
    }

    /// Append `packets` constant-size packets stored back to back.
    /// Returns false, leaving the slot untouched, when they do not fit.
    pub fn push_frames(&mut self, bytes: &[u8], packets: u32) -> bool {
        if self.remaining() < bytes.len() {
            return false;
        }
        self.data.extend_from_slice(bytes);
        self.packet_count += packets;
        true
    }

    /// Forget the contents, keeping the allocations
    pub fn clear(&mut self) {
        self.data.clear();
        self.descriptions.clear();
        self.packet_count = 0;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_slot_is_empty() {
        let slot = BufferSlot::with_capacity(0, 64, 4).unwrap();
        assert!(slot.is_empty());
        assert_eq!(slot.byte_len(), 0);
        assert_eq!(slot.remaining(), 64);
        assert!(slot.data.capacity() >= 64);
    }

    #[test]
    fn push_packet_records_description() {
        let mut slot = BufferSlot::with_capacity(1, 64, 4).unwrap();
        assert!(slot.push_packet(&[1, 2, 3], 0));
        assert!(slot.push_packet(&[4, 5], 0));

        assert_eq!(slot.packet_count(), 2);
        assert_eq!(slot.data(), &[1, 2, 3, 4, 5]);
        let descs = slot.packet_descriptions();
        assert_eq!(descs[1].start_offset, 3);
        assert_eq!(descs[1].data_byte_size, 2);
    }

    #[test]
    fn push_packet_respects_description_capacity() {
        let mut slot = BufferSlot::with_capacity(0, 64, 1).unwrap();
        assert!(slot.push_packet(&[1], 0));
        assert!(!slot.push_packet(&[2], 0));
        assert_eq!(slot.packet_count(), 1);
    }

    #[test]
    fn push_packet_respects_byte_capacity() {
        let mut slot = BufferSlot::with_capacity(0, 4, 8).unwrap();
        assert!(!slot.push_packet(&[0; 5], 0));
        assert!(slot.is_empty());
    }

    #[test]
    fn push_frames_counts_packets() {
        let mut slot = BufferSlot::with_capacity(0, 16, 0).unwrap();
        assert!(slot.push_frames(&[0; 8], 2));
        assert!(slot.push_frames(&[0; 8], 2));
        assert!(!slot.push_frames(&[0; 4], 1));
        assert_eq!(slot.packet_count(), 4);
        assert!(slot.packet_descriptions().is_empty());
    }

    #[test]
    fn cbr_slot_rejects_described_packets() {
        let mut slot = BufferSlot::with_capacity(0, 16, 0).unwrap();
        assert!(!slot.push_packet(&[1], 0));
    }

    #[test]
    fn clear_keeps_capacity() {
        let mut slot = BufferSlot::with_capacity(0, 32, 2).unwrap();
        slot.push_packet(&[9; 10], 0);
        slot.clear();
        assert!(slot.is_empty());
        assert_eq!(slot.remaining(), 32);
        assert!(slot.packet_descriptions().is_empty());
    }
}
