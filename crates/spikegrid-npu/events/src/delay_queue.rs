// Copyright 2025 Neuraville Inc.
// SPDX-License-Identifier: Apache-2.0

/*
 * Copyright 2025 Neuraville Inc.
 *
 * Licensed under the Apache License, Version 2.0 (the "License");
 * you may not use this file except in compliance with the License.
 */

//! DelayRingEventQueue - per-cluster bitmask ring of pending synaptic deliveries.
//!
//! Key semantics:
//! - One word per local synapse slot. Bit `b` of word `i` means "slot `i` has a delivery
//!   pending at ring position `b`".
//! - A single ring pointer `p` in `[0, L)` marks "now". Scheduling with delay `d` sets the
//!   bit at `(p + d) mod L`; consuming with delay `d` tests the bit at `(p - d) mod L`.
//! - Scheduling onto an already-set bit is always an error, never a silent merge.
//! - Checkpoints hold the pointer and the raw words only. Cross-cluster staging state is
//!   transient and belongs to the router.

use std::io::{Read, Write};

use crate::error::{EventQueueError, Result};
use tracing::{debug, trace};

/// Storage word of one synapse slot
pub type QueueWord = u32;

/// Largest representable delay horizon (one ring position per bit)
pub const MAX_DELAY_HORIZON: u32 = QueueWord::BITS;

/// Fixed-capacity bit-packed delay ring
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DelayRingEventQueue {
    words: Vec<QueueWord>,
    pointer: u32,
    horizon: u32,
}

impl DelayRingEventQueue {
    /// Allocate `capacity` zeroed slots with delay horizon `horizon` (ring length L).
    pub fn new(capacity: usize, horizon: u32) -> Result<Self> {
        if horizon == 0 || horizon > MAX_DELAY_HORIZON {
            return Err(EventQueueError::InvalidHorizon {
                horizon,
                max: MAX_DELAY_HORIZON,
            });
        }

        debug!(
            "[QUEUE] Allocated delay ring: {} slots, horizon {}",
            capacity, horizon
        );
        Ok(Self {
            words: vec![0; capacity],
            pointer: 0,
            horizon,
        })
    }

    pub fn capacity(&self) -> usize {
        self.words.len()
    }

    pub fn horizon(&self) -> u32 {
        self.horizon
    }

    /// Current ring pointer, always in `[0, horizon)`
    pub fn pointer(&self) -> u32 {
        self.pointer
    }

    /// Raw slot words in slot order
    pub fn words(&self) -> &[QueueWord] {
        &self.words
    }

    /// Total number of pending deliveries across all slots
    pub fn pending_events(&self) -> usize {
        self.words.iter().map(|w| w.count_ones() as usize).sum()
    }

    /// Set the bit at the current pointer (zero-delay delivery).
    pub fn schedule_at_current(&mut self, slot: usize) -> Result<()> {
        let position = self.pointer;
        self.set_bit(slot, position)
    }

    /// Set the bit `delay` positions ahead of the pointer, `0 <= delay < horizon`.
    pub fn schedule_with_delay(&mut self, slot: usize, delay: u32) -> Result<()> {
        let position = self.position_ahead(delay)?;
        self.set_bit(slot, position)
    }

    /// Test and clear the bit at the current pointer.
    ///
    /// Returns whether a delivery was pending. Consuming an empty position is a no-op.
    pub fn consume_at_current(&mut self, slot: usize) -> Result<bool> {
        let position = self.pointer;
        self.take_bit(slot, position)
    }

    /// Test and clear the bit that was current `delay` steps ago.
    pub fn consume_at_delay(&mut self, slot: usize, delay: u32) -> Result<bool> {
        let position = self.position_behind(delay)?;
        self.take_bit(slot, position)
    }

    /// Whether a delivery is pending `delay` positions ahead of the pointer (no side effects).
    pub fn is_pending(&self, slot: usize, delay: u32) -> Result<bool> {
        let position = self.position_ahead(delay)?;
        let word = self.word(slot)?;
        Ok(word & (1 << position) != 0)
    }

    /// Drop every pending delivery of one slot (structural reset of a synapse).
    pub fn clear(&mut self, slot: usize) -> Result<()> {
        *self.word_mut(slot)? = 0;
        Ok(())
    }

    /// Zero all slots and rewind the pointer.
    pub fn reset(&mut self) {
        self.words.iter_mut().for_each(|w| *w = 0);
        self.pointer = 0;
    }

    /// Rotate the pointer forward by one position, wrapping at the horizon.
    pub fn advance(&mut self) {
        self.pointer += 1;
        if self.pointer >= self.horizon {
            self.pointer = 0;
        }
    }

    /// Write pointer, slot count and every slot word (little endian, slot order).
    pub fn serialize<W: Write>(&self, writer: &mut W) -> Result<()> {
        writer.write_all(&self.pointer.to_le_bytes())?;
        writer.write_all(&(self.words.len() as u64).to_le_bytes())?;
        for word in &self.words {
            writer.write_all(&word.to_le_bytes())?;
        }
        Ok(())
    }

    /// Restore from `serialize` output.
    ///
    /// The stored slot count must equal this queue's capacity; the check happens before
    /// any state is overwritten, and a failed read leaves the queue untouched.
    pub fn deserialize<R: Read>(&mut self, reader: &mut R) -> Result<()> {
        let pointer = read_u32(reader)?;
        let stored = read_u64(reader)?;
        let stored = usize::try_from(stored).map_err(|_| {
            EventQueueError::CorruptCheckpoint(format!("slot count {} does not fit usize", stored))
        })?;

        if stored != self.capacity() {
            return Err(EventQueueError::ConfigMismatch {
                stored,
                configured: self.capacity(),
            });
        }
        if pointer >= self.horizon {
            return Err(EventQueueError::CorruptCheckpoint(format!(
                "ring pointer {} outside horizon {}",
                pointer, self.horizon
            )));
        }

        let mut words = Vec::with_capacity(stored);
        for _ in 0..stored {
            words.push(read_u32(reader)?);
        }

        self.words = words;
        self.pointer = pointer;
        trace!("[QUEUE] Restored {} slots at pointer {}", stored, pointer);
        Ok(())
    }

    /// Serialized form as an owned buffer
    pub fn to_bytes(&self) -> Result<Vec<u8>> {
        let mut buf = Vec::with_capacity(12 + self.words.len() * 4);
        self.serialize(&mut buf)?;
        Ok(buf)
    }

    fn position_ahead(&self, delay: u32) -> Result<u32> {
        self.check_delay(delay)?;
        let mut position = self.pointer + delay;
        if position >= self.horizon {
            position -= self.horizon;
        }
        Ok(position)
    }

    fn position_behind(&self, delay: u32) -> Result<u32> {
        self.check_delay(delay)?;
        Ok(if delay > self.pointer {
            self.pointer + self.horizon - delay
        } else {
            self.pointer - delay
        })
    }

    fn check_delay(&self, delay: u32) -> Result<()> {
        if delay >= self.horizon {
            return Err(EventQueueError::DelayOutOfRange {
                delay,
                horizon: self.horizon,
            });
        }
        Ok(())
    }

    fn word(&self, slot: usize) -> Result<QueueWord> {
        self.words
            .get(slot)
            .copied()
            .ok_or(EventQueueError::SlotOutOfRange {
                slot,
                capacity: self.words.len(),
            })
    }

    fn word_mut(&mut self, slot: usize) -> Result<&mut QueueWord> {
        let capacity = self.words.len();
        self.words
            .get_mut(slot)
            .ok_or(EventQueueError::SlotOutOfRange { slot, capacity })
    }

    fn set_bit(&mut self, slot: usize, position: u32) -> Result<()> {
        let word = self.word_mut(slot)?;
        let mask = 1 << position;
        if *word & mask != 0 {
            return Err(EventQueueError::DoubleSchedule {
                slot,
                ring_offset: position,
            });
        }
        *word |= mask;
        Ok(())
    }

    fn take_bit(&mut self, slot: usize, position: u32) -> Result<bool> {
        let word = self.word_mut(slot)?;
        let mask = 1 << position;
        let pending = *word & mask != 0;
        *word &= !mask;
        Ok(pending)
    }
}

fn read_u32<R: Read>(reader: &mut R) -> Result<u32> {
    let mut buf = [0u8; 4];
    reader.read_exact(&mut buf)?;
    Ok(u32::from_le_bytes(buf))
}

fn read_u64<R: Read>(reader: &mut R) -> Result<u64> {
    let mut buf = [0u8; 8];
    reader.read_exact(&mut buf)?;
    Ok(u64::from_le_bytes(buf))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_queue_is_empty() {
        let queue = DelayRingEventQueue::new(4, 8).unwrap();
        assert_eq!(queue.capacity(), 4);
        assert_eq!(queue.pointer(), 0);
        assert_eq!(queue.pending_events(), 0);
    }

    #[test]
    fn test_invalid_horizon_rejected() {
        assert!(matches!(
            DelayRingEventQueue::new(4, 0),
            Err(EventQueueError::InvalidHorizon { .. })
        ));
        assert!(matches!(
            DelayRingEventQueue::new(4, MAX_DELAY_HORIZON + 1),
            Err(EventQueueError::InvalidHorizon { .. })
        ));
        assert!(DelayRingEventQueue::new(4, MAX_DELAY_HORIZON).is_ok());
    }

    #[test]
    fn test_delayed_event_arrives_after_delay_advances() {
        let mut queue = DelayRingEventQueue::new(8, 8).unwrap();
        queue.schedule_with_delay(3, 5).unwrap();

        for _ in 0..4 {
            queue.advance();
            assert!(!queue.consume_at_current(3).unwrap());
        }
        queue.advance();
        assert!(queue.consume_at_current(3).unwrap());
        assert!(!queue.consume_at_current(3).unwrap());
    }

    #[test]
    fn test_double_schedule_is_detected() {
        let mut queue = DelayRingEventQueue::new(2, 8).unwrap();
        queue.schedule_at_current(1).unwrap();
        let err = queue.schedule_with_delay(1, 0).unwrap_err();
        assert!(matches!(
            err,
            EventQueueError::DoubleSchedule {
                slot: 1,
                ring_offset: 0
            }
        ));
        // First event survives the rejected second schedule
        assert!(queue.consume_at_current(1).unwrap());
    }

    #[test]
    fn test_consume_at_delay_looks_backwards() {
        let mut queue = DelayRingEventQueue::new(1, 8).unwrap();
        queue.schedule_at_current(0).unwrap();
        for _ in 0..3 {
            queue.advance();
        }
        assert!(!queue.consume_at_delay(0, 2).unwrap());
        assert!(queue.consume_at_delay(0, 3).unwrap());
        assert!(!queue.consume_at_delay(0, 3).unwrap());
    }

    #[test]
    fn test_consume_at_delay_wraps_below_zero() {
        let mut queue = DelayRingEventQueue::new(1, 4).unwrap();
        queue.schedule_with_delay(0, 3).unwrap(); // position 3
        queue.advance();
        queue.advance();
        queue.advance();
        queue.advance(); // pointer back at 0
        assert!(queue.consume_at_delay(0, 1).unwrap());
    }

    #[test]
    fn test_out_of_range_arguments() {
        let mut queue = DelayRingEventQueue::new(2, 8).unwrap();
        assert!(matches!(
            queue.schedule_at_current(2),
            Err(EventQueueError::SlotOutOfRange { slot: 2, capacity: 2 })
        ));
        assert!(matches!(
            queue.schedule_with_delay(0, 8),
            Err(EventQueueError::DelayOutOfRange { delay: 8, horizon: 8 })
        ));
        assert!(matches!(
            queue.consume_at_delay(0, 9),
            Err(EventQueueError::DelayOutOfRange { .. })
        ));
    }

    #[test]
    fn test_clear_and_reset() {
        let mut queue = DelayRingEventQueue::new(2, 8).unwrap();
        queue.schedule_with_delay(0, 1).unwrap();
        queue.schedule_with_delay(0, 2).unwrap();
        queue.schedule_with_delay(1, 2).unwrap();
        queue.clear(0).unwrap();
        assert_eq!(queue.words()[0], 0);
        assert_eq!(queue.pending_events(), 1);

        queue.advance();
        queue.reset();
        assert_eq!(queue.pointer(), 0);
        assert_eq!(queue.pending_events(), 0);
    }

    #[test]
    fn test_roundtrip_through_bytes() {
        let mut queue = DelayRingEventQueue::new(3, 16).unwrap();
        queue.schedule_with_delay(0, 4).unwrap();
        queue.schedule_with_delay(2, 15).unwrap();
        queue.advance();

        let bytes = queue.to_bytes().unwrap();
        let mut restored = DelayRingEventQueue::new(3, 16).unwrap();
        restored.deserialize(&mut bytes.as_slice()).unwrap();
        assert_eq!(restored, queue);
    }

    #[test]
    fn test_mismatched_capacity_leaves_queue_untouched() {
        let mut source = DelayRingEventQueue::new(3, 8).unwrap();
        source.schedule_at_current(1).unwrap();
        let bytes = source.to_bytes().unwrap();

        let mut target = DelayRingEventQueue::new(4, 8).unwrap();
        target.schedule_with_delay(3, 2).unwrap();
        let before = target.clone();

        let err = target.deserialize(&mut bytes.as_slice()).unwrap_err();
        assert!(matches!(
            err,
            EventQueueError::ConfigMismatch {
                stored: 3,
                configured: 4
            }
        ));
        assert!(err.is_recoverable());
        assert_eq!(target, before);
    }

    #[test]
    fn test_truncated_checkpoint_leaves_queue_untouched() {
        let source = DelayRingEventQueue::new(3, 8).unwrap();
        let bytes = source.to_bytes().unwrap();

        let mut target = DelayRingEventQueue::new(3, 8).unwrap();
        target.schedule_at_current(0).unwrap();
        let before = target.clone();

        let truncated = &bytes[..bytes.len() - 2];
        assert!(matches!(
            target.deserialize(&mut &truncated[..]),
            Err(EventQueueError::Io(_))
        ));
        assert_eq!(target, before);
    }
}
