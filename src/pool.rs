//! Arena backing fixed-stride elements
//!
//! One contiguous zeroed block of `slots * stride` bytes. Each slot is carved
//! off the front in O(1) and shares the block's allocation, so pushing a
//! sample never touches the heap until the arena runs dry.
//!
//! When it does, the pool asks for the whole block back. If every slot handed
//! out has been dropped (evicted, popped, cleared) the original allocation is
//! reclaimed in place; otherwise a fresh block is allocated. Slots are never
//! tracked individually.

use bytes::BytesMut;

use crate::error::{Result, TimelineError};

#[derive(Debug)]
pub struct Pool {
    arena: BytesMut,
    slots: usize,
    stride: usize,
}

impl Pool {
    /// Allocate an arena for `slots` elements of `stride` bytes.
    pub fn new(slots: usize, stride: usize) -> Result<Self> {
        if slots == 0 || stride == 0 {
            return Err(TimelineError::InvalidArgument(format!(
                "pool needs slots > 0 and stride > 0, got {slots} x {stride}"
            )));
        }
        let size = slots.checked_mul(stride).ok_or_else(|| {
            TimelineError::InvalidArgument(format!("pool size {slots} x {stride} overflows"))
        })?;
        Ok(Self {
            arena: BytesMut::zeroed(size),
            slots,
            stride,
        })
    }

    /// Carve one zeroed slot of `stride` bytes. The flag is set when the
    /// arena had to be refilled first; the caller logs it once unlocked.
    pub fn take_slot(&mut self) -> (BytesMut, bool) {
        let refilled = self.arena.len() < self.stride;
        if refilled {
            self.refill();
        }
        (self.arena.split_to(self.stride), refilled)
    }

    pub fn slots(&self) -> usize {
        self.slots
    }

    pub fn stride(&self) -> usize {
        self.stride
    }

    fn refill(&mut self) {
        let size = self.slots * self.stride;
        self.arena.clear();
        // Reclaims the original block when no slot handle is alive.
        self.arena.reserve(size);
        self.arena.resize(size, 0);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_zero_sizes_rejected() {
        assert!(matches!(Pool::new(0, 16), Err(TimelineError::InvalidArgument(_))));
        assert!(matches!(Pool::new(4, 0), Err(TimelineError::InvalidArgument(_))));
    }

    #[test]
    fn test_slots_are_contiguous() {
        let mut pool = Pool::new(3, 8).unwrap();
        let (a, _) = pool.take_slot();
        let (b, refilled) = pool.take_slot();
        assert!(!refilled);
        assert_eq!(a.len(), 8);
        assert_eq!(b.len(), 8);
        assert_eq!(a.as_ptr() as usize + 8, b.as_ptr() as usize);
        assert_eq!(pool.arena.len(), 8);
    }

    #[test]
    fn test_refill_when_exhausted() {
        let mut pool = Pool::new(2, 4).unwrap();
        let mut held = Vec::new();
        for i in 0..5 {
            let (mut slot, refilled) = pool.take_slot();
            assert_eq!(refilled, i == 2 || i == 4);
            assert!(slot.iter().all(|&b| b == 0));
            slot.copy_from_slice(&[0xAB; 4]);
            held.push(slot);
        }
        assert_eq!(held.len(), 5);
    }

    #[test]
    fn test_reclaimed_slots_are_zeroed() {
        let mut pool = Pool::new(2, 4).unwrap();
        for _ in 0..2 {
            let (mut slot, _) = pool.take_slot();
            slot.copy_from_slice(&[0xFF; 4]);
        }
        let (slot, refilled) = pool.take_slot();
        assert!(refilled);
        assert_eq!(&slot[..], &[0; 4]);
    }
}
