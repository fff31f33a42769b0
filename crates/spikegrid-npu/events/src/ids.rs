// Copyright 2025 Neuraville Inc.
// SPDX-License-Identifier: Apache-2.0

//! Identity types for clusters and relayed events

use core::fmt;
use serde::{Deserialize, Serialize};

/// Stable cluster identifier (never changes for the lifetime of a simulation)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ClusterId(pub u32);

impl fmt::Display for ClusterId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Cluster({})", self.0)
    }
}

/// One spike event addressed to a synapse slot owned by another cluster.
///
/// Only ever lives inside bounded router staging buffers; never persisted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct CrossClusterEventRecord {
    pub synapse_index: usize,
    pub destination: ClusterId,
}

impl CrossClusterEventRecord {
    pub fn new(synapse_index: usize, destination: ClusterId) -> Self {
        Self {
            synapse_index,
            destination,
        }
    }

    /// Pack into a single word for device-resident buffers.
    ///
    /// Layout: destination cluster in the high 32 bits, synapse index in the low 32 bits.
    /// Returns `None` when the synapse index does not fit in 32 bits.
    pub fn pack(&self) -> Option<u64> {
        let synapse = u32::try_from(self.synapse_index).ok()?;
        Some(((self.destination.0 as u64) << 32) | synapse as u64)
    }

    pub fn unpack(word: u64) -> Self {
        Self {
            synapse_index: (word & 0xFFFF_FFFF) as usize,
            destination: ClusterId((word >> 32) as u32),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pack_layout() {
        let record = CrossClusterEventRecord::new(7, ClusterId(3));
        let word = record.pack().unwrap();
        assert_eq!(word, (3u64 << 32) | 7);
        assert_eq!(CrossClusterEventRecord::unpack(word), record);
    }

    #[test]
    fn test_pack_rejects_wide_synapse_index() {
        let record = CrossClusterEventRecord::new(u32::MAX as usize + 1, ClusterId(0));
        assert!(record.pack().is_none());
    }
}
