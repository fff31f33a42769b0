// Copyright 2025 Neuraville Inc.
// SPDX-License-Identifier: Apache-2.0

//! # Delay Ring Property Tests
//!
//! Timing properties of the delay ring that must hold for every slot, delay and horizon.

use proptest::prelude::*;
use spikegrid_npu_events::{DelayRingEventQueue, EventQueueError, MAX_DELAY_HORIZON};

fn queue_strategy() -> impl Strategy<Value = (usize, u32)> {
    (1usize..64, 1u32..=MAX_DELAY_HORIZON)
}

proptest! {
    #[test]
    fn scheduled_event_is_delivered_exactly_once(
        (capacity, horizon) in queue_strategy(),
        slot_seed in any::<usize>(),
        delay_seed in any::<u32>(),
        warmup in 0u32..64,
    ) {
        let slot = slot_seed % capacity;
        let delay = delay_seed % horizon;
        let mut queue = DelayRingEventQueue::new(capacity, horizon).unwrap();
        for _ in 0..warmup {
            queue.advance();
        }

        queue.schedule_with_delay(slot, delay).unwrap();
        for _ in 0..delay {
            prop_assert!(!queue.consume_at_current(slot).unwrap());
            queue.advance();
        }

        prop_assert!(queue.consume_at_current(slot).unwrap());
        prop_assert!(!queue.consume_at_current(slot).unwrap());
        prop_assert_eq!(queue.pending_events(), 0);
    }

    #[test]
    fn full_rotation_restores_pointer_and_bits(
        (capacity, horizon) in queue_strategy(),
        events in prop::collection::vec((any::<usize>(), any::<u32>()), 0..32),
    ) {
        let mut queue = DelayRingEventQueue::new(capacity, horizon).unwrap();
        for (slot_seed, delay_seed) in events {
            // Duplicates are rejected and leave the ring unchanged
            let _ = queue.schedule_with_delay(slot_seed % capacity, delay_seed % horizon);
        }

        let before = queue.clone();
        for _ in 0..horizon {
            queue.advance();
        }
        prop_assert_eq!(queue.pointer(), before.pointer());
        prop_assert_eq!(queue.words(), before.words());
    }

    #[test]
    fn consume_at_delay_finds_event_scheduled_delay_steps_ago(
        (capacity, horizon) in queue_strategy(),
        slot_seed in any::<usize>(),
        delay_seed in any::<u32>(),
    ) {
        let slot = slot_seed % capacity;
        let delay = delay_seed % horizon;
        let mut queue = DelayRingEventQueue::new(capacity, horizon).unwrap();

        queue.schedule_at_current(slot).unwrap();
        for _ in 0..delay {
            queue.advance();
        }
        prop_assert!(queue.consume_at_delay(slot, delay).unwrap());
        prop_assert!(!queue.consume_at_delay(slot, delay).unwrap());
    }

    #[test]
    fn second_schedule_to_same_bit_is_rejected(
        (capacity, horizon) in queue_strategy(),
        slot_seed in any::<usize>(),
        delay_seed in any::<u32>(),
    ) {
        let slot = slot_seed % capacity;
        let delay = delay_seed % horizon;
        let mut queue = DelayRingEventQueue::new(capacity, horizon).unwrap();

        queue.schedule_with_delay(slot, delay).unwrap();
        let is_double_schedule = matches!(
            queue.schedule_with_delay(slot, delay),
            Err(EventQueueError::DoubleSchedule { .. })
        );
        prop_assert!(is_double_schedule);
        prop_assert!(queue.is_pending(slot, delay).unwrap());
        prop_assert_eq!(queue.pending_events(), 1);
    }

    #[test]
    fn serialize_roundtrip_is_exact(
        (capacity, horizon) in queue_strategy(),
        events in prop::collection::vec((any::<usize>(), any::<u32>()), 0..32),
        rotation in 0u32..64,
    ) {
        let mut queue = DelayRingEventQueue::new(capacity, horizon).unwrap();
        for (slot_seed, delay_seed) in events {
            let _ = queue.schedule_with_delay(slot_seed % capacity, delay_seed % horizon);
        }
        for _ in 0..rotation {
            queue.advance();
        }

        let bytes = queue.to_bytes().unwrap();
        let mut restored = DelayRingEventQueue::new(capacity, horizon).unwrap();
        restored.deserialize(&mut bytes.as_slice()).unwrap();
        prop_assert_eq!(restored, queue);
    }
}

#[test]
fn test_concrete_delay_five_on_ring_of_eight() {
    let mut queue = DelayRingEventQueue::new(8, 8).unwrap();
    queue.schedule_with_delay(3, 5).unwrap();
    for _ in 0..5 {
        queue.advance();
    }
    assert!(queue.consume_at_current(3).unwrap());
    assert!(!queue.consume_at_current(3).unwrap());
}

#[test]
fn test_consuming_empty_slot_is_noop() {
    let mut queue = DelayRingEventQueue::new(4, 8).unwrap();
    queue.schedule_with_delay(1, 2).unwrap();
    let before = queue.clone();

    assert!(!queue.consume_at_current(1).unwrap());
    assert!(!queue.consume_at_current(0).unwrap());
    assert!(!queue.consume_at_delay(2, 7).unwrap());
    assert_eq!(queue, before);
}

#[test]
fn test_mismatched_capacity_raises_config_mismatch() {
    let queue = DelayRingEventQueue::new(10, 8).unwrap();
    let bytes = queue.to_bytes().unwrap();

    let mut other = DelayRingEventQueue::new(11, 8).unwrap();
    let err = other.deserialize(&mut bytes.as_slice()).unwrap_err();
    assert!(matches!(
        err,
        EventQueueError::ConfigMismatch {
            stored: 10,
            configured: 11
        }
    ));
}
