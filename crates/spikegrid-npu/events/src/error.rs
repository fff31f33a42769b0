// Copyright 2025 Neuraville Inc.
// SPDX-License-Identifier: Apache-2.0

//! Error types for event queue and relay operations

use crate::ids::ClusterId;
use core::fmt;

/// Which bounded staging buffer of a router overflowed
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StagingBuffer {
    /// Cross-cluster events waiting for `flush_outgoing`
    Outgoing,
    /// Relayed events waiting for `drain_incoming`
    Incoming,
}

impl fmt::Display for StagingBuffer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StagingBuffer::Outgoing => write!(f, "outgoing"),
            StagingBuffer::Incoming => write!(f, "incoming"),
        }
    }
}

/// Event queue and router errors
///
/// `DoubleSchedule`, `CapacityExceeded` and `DeviceTransfer` are fatal for a run.
/// `ConfigMismatch` is raised on restore before any queue data is overwritten.
#[derive(Debug, thiserror::Error)]
pub enum EventQueueError {
    #[error("slot {slot} already has an event pending at ring offset {ring_offset}")]
    DoubleSchedule { slot: usize, ring_offset: u32 },

    #[error("{buffer} staging buffer of {cluster} is full (capacity {capacity})")]
    CapacityExceeded {
        cluster: ClusterId,
        buffer: StagingBuffer,
        capacity: usize,
    },

    #[error("stored queue has {stored} slots, configured queue has {configured}")]
    ConfigMismatch { stored: usize, configured: usize },

    #[error("memory-domain transfer failed for {cluster}: {reason}")]
    DeviceTransfer { cluster: ClusterId, reason: String },

    #[error("slot {slot} out of range (queue capacity {capacity})")]
    SlotOutOfRange { slot: usize, capacity: usize },

    #[error("delay {delay} out of range (delay horizon {horizon})")]
    DelayOutOfRange { delay: u32, horizon: u32 },

    #[error("delay horizon must be in 1..={max}, got {horizon}")]
    InvalidHorizon { horizon: u32, max: u32 },

    #[error("{buffer} staging buffer of {cluster} still holds {pending} events")]
    StagingNotEmpty {
        cluster: ClusterId,
        buffer: StagingBuffer,
        pending: usize,
    },

    #[error("no event handler registered for {0}")]
    UnknownCluster(ClusterId),

    #[error("corrupt queue checkpoint: {0}")]
    CorruptCheckpoint(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl EventQueueError {
    /// True for the one failure a caller may recover from (restore-time mismatch)
    pub fn is_recoverable(&self) -> bool {
        matches!(self, EventQueueError::ConfigMismatch { .. })
    }
}

/// Result type for event queue operations
pub type Result<T> = std::result::Result<T, EventQueueError>;
