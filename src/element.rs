//! Elements - timestamped records stored in a timeline
//!
//! The atomic unit of storage. An element is immutable once built: its
//! payload bytes are reference counted, so handing a clone to a reader never
//! copies the data and never lets the reader change what the timeline holds.
//!
//! Fixed-stride elements are built through a [`BufferWriter`] carved from the
//! timeline's pool, then frozen with [`BufferWriter::finish`].

use std::time::{SystemTime, UNIX_EPOCH};

use bytes::{Bytes, BytesMut};

use crate::config::{ElementKind, SlotLayout};
use crate::error::{Result, TimelineError};

/// Clock reading in milliseconds.
pub type Timestamp = f64;

/// Current wall-clock time in milliseconds since the Unix epoch.
pub fn timestamp_now() -> Timestamp {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs_f64() * 1000.0)
        .unwrap_or_default()
}

/// Payload of an element.
#[derive(Clone, Debug, PartialEq)]
pub enum Payload {
    /// Pool-backed fixed-stride buffer.
    Slots(SlotBuffer),
    /// Independently allocated bytes of any length.
    Blob(Bytes),
}

/// An immutable, timestamped record.
#[derive(Clone, Debug, PartialEq)]
pub struct Element {
    timestamp: Timestamp,
    payload: Payload,
}

impl Element {
    /// Variable-size element owning `data`.
    pub fn blob(timestamp: Timestamp, data: impl Into<Bytes>) -> Self {
        Self {
            timestamp,
            payload: Payload::Blob(data.into()),
        }
    }

    #[inline]
    pub fn timestamp(&self) -> Timestamp {
        self.timestamp
    }

    #[inline]
    pub fn payload(&self) -> &Payload {
        &self.payload
    }

    /// Kind this element satisfies.
    pub fn kind(&self) -> ElementKind {
        match &self.payload {
            Payload::Slots(buffer) => ElementKind::FixedStride(buffer.layout),
            Payload::Blob(_) => ElementKind::Variable,
        }
    }

    pub fn as_slots(&self) -> Option<&SlotBuffer> {
        match &self.payload {
            Payload::Slots(buffer) => Some(buffer),
            Payload::Blob(_) => None,
        }
    }

    pub fn as_blob(&self) -> Option<&Bytes> {
        match &self.payload {
            Payload::Blob(data) => Some(data),
            Payload::Slots(_) => None,
        }
    }

    /// Same payload under a different timestamp. The bytes are shared.
    pub fn with_timestamp(self, timestamp: Timestamp) -> Self {
        Self { timestamp, ..self }
    }

    /// True when both handles point at the same payload memory.
    pub fn shares_payload_with(&self, other: &Element) -> bool {
        let (a, b) = (self.raw_bytes(), other.raw_bytes());
        a.as_ptr() == b.as_ptr() && a.len() == b.len()
    }

    pub(crate) fn raw_bytes(&self) -> &Bytes {
        match &self.payload {
            Payload::Slots(buffer) => &buffer.data,
            Payload::Blob(data) => data,
        }
    }

    pub(crate) fn from_slots(timestamp: Timestamp, buffer: SlotBuffer) -> Self {
        Self {
            timestamp,
            payload: Payload::Slots(buffer),
        }
    }
}

/// Frozen fixed-stride buffer: up to `max_element_num` slots plus a presence
/// mask. Absent slots read as zeros.
#[derive(Clone, Debug, PartialEq)]
pub struct SlotBuffer {
    layout: SlotLayout,
    mask: u64,
    data: Bytes,
}

impl SlotBuffer {
    pub fn layout(&self) -> SlotLayout {
        self.layout
    }

    pub fn element_size(&self) -> usize {
        self.layout.element_size
    }

    pub fn max_element_num(&self) -> usize {
        self.layout.max_element_num
    }

    /// Bit `i` set when slot `i` was written.
    pub fn mask(&self) -> u64 {
        self.mask
    }

    pub fn is_present(&self, index: usize) -> bool {
        index < self.layout.max_element_num && self.mask & (1 << index) != 0
    }

    pub fn present_element_num(&self) -> u32 {
        self.mask.count_ones()
    }

    /// Bytes of slot `index`, `None` past the last slot.
    pub fn element(&self, index: usize) -> Option<&[u8]> {
        if index >= self.layout.max_element_num {
            return None;
        }
        let start = index * self.layout.element_size;
        Some(&self.data[start..start + self.layout.element_size])
    }

    /// Slot `index` decoded as little-endian `f32` values.
    pub fn f32s(&self, index: usize) -> Option<Vec<f32>> {
        self.element(index).map(|bytes| {
            bytes
                .chunks_exact(4)
                .map(|c| f32::from_le_bytes([c[0], c[1], c[2], c[3]]))
                .collect()
        })
    }

    /// Present slots in index order.
    pub fn present_elements(&self) -> impl Iterator<Item = (usize, &[u8])> + '_ {
        (0..self.layout.max_element_num)
            .filter(|&i| self.is_present(i))
            .filter_map(|i| self.element(i).map(|bytes| (i, bytes)))
    }

    /// The whole buffer, absent slots included.
    pub fn as_bytes(&self) -> &[u8] {
        &self.data
    }
}

/// Mutable fixed-stride buffer handed out by
/// [`Timeline::create_buffer`](crate::Timeline::create_buffer).
#[derive(Debug)]
pub struct BufferWriter {
    timestamp: Timestamp,
    layout: SlotLayout,
    mask: u64,
    data: BytesMut,
}

impl BufferWriter {
    /// `data` must be exactly `layout.stride()` zeroed bytes.
    pub(crate) fn new(timestamp: Timestamp, layout: SlotLayout, data: BytesMut) -> Self {
        debug_assert_eq!(data.len(), layout.stride());
        Self {
            timestamp,
            layout,
            mask: 0,
            data,
        }
    }

    pub fn timestamp(&self) -> Timestamp {
        self.timestamp
    }

    pub fn layout(&self) -> SlotLayout {
        self.layout
    }

    pub fn mask(&self) -> u64 {
        self.mask
    }

    /// Mark slot `index` present and return it for writing in place.
    pub fn add_element(&mut self, index: usize) -> Result<&mut [u8]> {
        self.check_index(index)?;
        self.mask |= 1 << index;
        let start = index * self.layout.element_size;
        Ok(&mut self.data[start..start + self.layout.element_size])
    }

    /// Copy `value` into slot `index`. Writing a slot twice keeps the last value.
    pub fn set_element(&mut self, index: usize, value: &[u8]) -> Result<()> {
        if value.len() != self.layout.element_size {
            return Err(TimelineError::InvalidArgument(format!(
                "slot holds {} bytes, got {}",
                self.layout.element_size,
                value.len()
            )));
        }
        self.add_element(index)?.copy_from_slice(value);
        Ok(())
    }

    /// Write `values` into slot `index` as little-endian `f32`s.
    pub fn set_f32s(&mut self, index: usize, values: &[f32]) -> Result<()> {
        if values.len() * 4 != self.layout.element_size {
            return Err(TimelineError::InvalidArgument(format!(
                "slot holds {} bytes, got {} floats",
                self.layout.element_size,
                values.len()
            )));
        }
        let slot = self.add_element(index)?;
        for (chunk, v) in slot.chunks_exact_mut(4).zip(values) {
            chunk.copy_from_slice(&v.to_le_bytes());
        }
        Ok(())
    }

    /// Freeze into an immutable element.
    pub fn finish(self) -> Element {
        Element::from_slots(
            self.timestamp,
            SlotBuffer {
                layout: self.layout,
                mask: self.mask,
                data: self.data.freeze(),
            },
        )
    }

    /// Copy of a frozen buffer written into fresh storage.
    pub(crate) fn copy_of(buffer: &SlotBuffer, timestamp: Timestamp, mut data: BytesMut) -> Self {
        data.copy_from_slice(buffer.as_bytes());
        Self {
            timestamp,
            layout: buffer.layout,
            mask: buffer.mask,
            data,
        }
    }

    fn check_index(&self, index: usize) -> Result<()> {
        if index >= self.layout.max_element_num {
            return Err(TimelineError::InvalidArgument(format!(
                "slot index {index} out of range for {} slots",
                self.layout.max_element_num
            )));
        }
        Ok(())
    }
}

impl From<BufferWriter> for Element {
    fn from(writer: BufferWriter) -> Self {
        writer.finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn writer(element_size: usize, slots: usize) -> BufferWriter {
        let layout = SlotLayout::new(element_size, slots);
        BufferWriter::new(10.0, layout, BytesMut::zeroed(layout.stride()))
    }

    #[test]
    fn test_presence_mask() {
        let mut w = writer(16, 3);
        w.set_f32s(0, &[1.0, 5.2, 7.5, 1.0]).unwrap();
        w.set_f32s(2, &[2.0, 2.2, -2.9, 0.2]).unwrap();

        let element = w.finish();
        let buffer = element.as_slots().unwrap();

        assert_eq!(buffer.mask(), 5);
        assert_eq!(buffer.present_element_num(), 2);
        assert!(buffer.is_present(0));
        assert!(!buffer.is_present(1));
        assert!(buffer.is_present(2));
        assert!(!buffer.is_present(3));
        assert_eq!(buffer.f32s(1).unwrap(), vec![0.0; 4]);
        assert_eq!(buffer.f32s(2).unwrap(), vec![2.0, 2.2, -2.9, 0.2]);
        assert!(buffer.element(3).is_none());
    }

    #[test]
    fn test_overwrite_keeps_last_value() {
        let mut w = writer(4, 2);
        w.set_element(1, &[1, 2, 3, 4]).unwrap();
        w.set_element(1, &[9, 9, 9, 9]).unwrap();

        let element = w.finish();
        let buffer = element.as_slots().unwrap();
        assert_eq!(buffer.element(1).unwrap(), &[9, 9, 9, 9]);
        assert_eq!(buffer.mask(), 2);
    }

    #[test]
    fn test_add_element_in_place() {
        let mut w = writer(2, 3);
        w.add_element(2).unwrap().copy_from_slice(&[7, 8]);
        let element = w.finish();
        let present: Vec<_> = element.as_slots().unwrap().present_elements().collect();
        assert_eq!(present, vec![(2, &[7u8, 8][..])]);
    }

    #[test]
    fn test_bad_writes_rejected() {
        let mut w = writer(4, 2);
        assert!(matches!(w.set_element(2, &[0; 4]), Err(TimelineError::InvalidArgument(_))));
        assert!(matches!(w.set_element(0, &[0; 3]), Err(TimelineError::InvalidArgument(_))));
        assert_eq!(w.mask(), 0);
    }

    #[test]
    fn test_kind_and_restamp() {
        let blob = Element::blob(5.0, vec![1u8, 2, 3]);
        assert_eq!(blob.kind(), ElementKind::Variable);
        assert!(blob.as_slots().is_none());

        let moved = blob.clone().with_timestamp(7.0);
        assert_eq!(moved.timestamp(), 7.0);
        assert!(moved.shares_payload_with(&blob));

        let slots = writer(4, 1).finish();
        assert_eq!(slots.kind(), ElementKind::FixedStride(SlotLayout::new(4, 1)));
    }

    #[test]
    fn test_timestamp_now_is_epoch_millis() {
        let earlier = timestamp_now();
        let later = timestamp_now();
        // Past September 2017 in milliseconds, not seconds.
        assert!(earlier > 1.5e12);
        assert!(later >= earlier);
    }
}
