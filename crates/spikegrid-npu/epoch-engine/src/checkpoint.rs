// Copyright 2025 Neuraville Inc.
// SPDX-License-Identifier: Apache-2.0

//! # Simulation checkpoints
//!
//! A checkpoint holds the clock and every cluster's delay ring. Staging buffers are
//! never saved: they are empty between epochs.
//!
//! ## Format
//! ```text
//! [Header]
//! - Magic: "SPKGQ" (5 bytes)
//! - Version: u32 LE (4 bytes)
//! [Data]
//! - Bincode-serialized SimulationSnapshot
//! ```
//! Each cluster's queue bytes are the ring's own stable layout (pointer, slot count,
//! raw words), so a queue can be restored without bincode.

use std::collections::BTreeMap;
use std::fs::File;
use std::io::{BufReader, BufWriter, Read, Write};
use std::path::Path;

use serde::{Deserialize, Serialize};
use spikegrid_npu_events::{ClusterId, DelayRingEventQueue};
use tracing::info;

use crate::error::{EngineError, Result};
use crate::scheduler::{EpochScheduler, SchedulerState};

/// Magic number for checkpoint files
const MAGIC: &[u8; 5] = b"SPKGQ";

/// Current format version (increment when format changes)
const FORMAT_VERSION: u32 = 1;

/// One cluster's persisted state
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClusterSnapshot {
    pub cluster_id: ClusterId,
    /// `DelayRingEventQueue::serialize` output
    pub queue: Vec<u8>,
}

/// Complete persisted state of a simulation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SimulationSnapshot {
    pub simulation_step: u64,
    pub epochs_completed: u32,
    pub delay_horizon: u32,
    pub clusters: Vec<ClusterSnapshot>,
}

/// Write header and snapshot
pub fn write_snapshot<W: Write>(writer: &mut W, snapshot: &SimulationSnapshot) -> Result<()> {
    writer.write_all(MAGIC)?;
    writer.write_all(&FORMAT_VERSION.to_le_bytes())?;
    bincode::serialize_into(&mut *writer, snapshot)?;
    writer.flush()?;
    Ok(())
}

/// Read and verify header, then the snapshot
pub fn read_snapshot<R: Read>(reader: &mut R) -> Result<SimulationSnapshot> {
    let mut magic = [0u8; 5];
    reader.read_exact(&mut magic)?;
    if &magic != MAGIC {
        return Err(EngineError::InvalidMagic(magic));
    }

    let mut version_bytes = [0u8; 4];
    reader.read_exact(&mut version_bytes)?;
    let version = u32::from_le_bytes(version_bytes);
    if version != FORMAT_VERSION {
        return Err(EngineError::VersionMismatch {
            file_version: version,
            expected_version: FORMAT_VERSION,
        });
    }

    Ok(bincode::deserialize_from(reader)?)
}

impl EpochScheduler {
    /// Capture the clock and every queue. Device mirrors are synced to host first.
    pub fn snapshot(&mut self) -> Result<SimulationSnapshot> {
        self.expect_state(
            "take a snapshot",
            &[SchedulerState::Setup, SchedulerState::GrowthUpdate],
        )?;

        let mut clusters = Vec::with_capacity(self.clusters().len());
        for cluster in self.clusters_mut() {
            cluster.sync_to_host()?;
            clusters.push(ClusterSnapshot {
                cluster_id: cluster.id(),
                queue: cluster.queue().to_bytes()?,
            });
        }

        Ok(SimulationSnapshot {
            simulation_step: self.clock().simulation_step(),
            epochs_completed: self.clock().epochs_completed(),
            delay_horizon: self.delay_horizon(),
            clusters,
        })
    }

    /// Restore clock and queues from `snapshot`.
    ///
    /// Every cluster is checked before any queue is replaced: a snapshot for other
    /// clusters, another delay horizon or other slot counts leaves the scheduler untouched
    /// and returns a recoverable error.
    pub fn restore_snapshot(&mut self, snapshot: &SimulationSnapshot) -> Result<()> {
        self.expect_state(
            "restore a snapshot",
            &[SchedulerState::Setup, SchedulerState::GrowthUpdate],
        )?;

        if snapshot.delay_horizon != self.delay_horizon() {
            return Err(EngineError::TopologyMismatch(format!(
                "stored delay horizon {}, configured {}",
                snapshot.delay_horizon,
                self.delay_horizon()
            )));
        }

        let stored: BTreeMap<ClusterId, &ClusterSnapshot> = snapshot
            .clusters
            .iter()
            .map(|c| (c.cluster_id, c))
            .collect();
        if stored.len() != snapshot.clusters.len() {
            return Err(EngineError::TopologyMismatch(
                "checkpoint lists a cluster more than once".to_string(),
            ));
        }
        if stored.len() != self.clusters().len() {
            return Err(EngineError::TopologyMismatch(format!(
                "stored {} clusters, configured {}",
                stored.len(),
                self.clusters().len()
            )));
        }

        let mut restored = Vec::with_capacity(self.clusters().len());
        for cluster in self.clusters() {
            let entry = stored.get(&cluster.id()).ok_or_else(|| {
                EngineError::TopologyMismatch(format!("{} missing from checkpoint", cluster.id()))
            })?;
            let mut queue = DelayRingEventQueue::new(cluster.synapse_count(), self.delay_horizon())?;
            queue.deserialize(&mut entry.queue.as_slice())?;
            restored.push(queue);
        }

        for (cluster, queue) in self.clusters_mut().iter_mut().zip(restored) {
            cluster.replace_queue(queue)?;
        }
        self.restore_clock(snapshot.simulation_step, snapshot.epochs_completed);
        Ok(())
    }

    /// Save a checkpoint file
    pub fn save_checkpoint<P: AsRef<Path>>(&mut self, path: P) -> Result<()> {
        let snapshot = self.snapshot()?;
        let mut writer = BufWriter::new(File::create(path.as_ref())?);
        write_snapshot(&mut writer, &snapshot)?;
        info!(
            "[CHECKPOINT] Saved {} clusters at step {} to {}",
            snapshot.clusters.len(),
            snapshot.simulation_step,
            path.as_ref().display()
        );
        Ok(())
    }

    /// Restore from a checkpoint file
    pub fn restore_checkpoint<P: AsRef<Path>>(&mut self, path: P) -> Result<()> {
        let mut reader = BufReader::new(File::open(path.as_ref())?);
        let snapshot = read_snapshot(&mut reader)?;
        self.restore_snapshot(&snapshot)?;
        info!(
            "[CHECKPOINT] Restored {} clusters at step {} (epoch {}) from {}",
            snapshot.clusters.len(),
            snapshot.simulation_step,
            snapshot.epochs_completed,
            path.as_ref().display()
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn snapshot() -> SimulationSnapshot {
        SimulationSnapshot {
            simulation_step: 42,
            epochs_completed: 3,
            delay_horizon: 8,
            clusters: vec![ClusterSnapshot {
                cluster_id: ClusterId(7),
                queue: vec![1, 2, 3],
            }],
        }
    }

    #[test]
    fn test_header_roundtrip() {
        let mut bytes = Vec::new();
        write_snapshot(&mut bytes, &snapshot()).unwrap();
        assert_eq!(&bytes[..5], MAGIC);
        assert_eq!(read_snapshot(&mut bytes.as_slice()).unwrap(), snapshot());
    }

    #[test]
    fn test_rejects_bad_magic() {
        let mut bytes = Vec::new();
        write_snapshot(&mut bytes, &snapshot()).unwrap();
        bytes[0] = b'X';
        assert!(matches!(
            read_snapshot(&mut bytes.as_slice()),
            Err(EngineError::InvalidMagic(_))
        ));
    }

    #[test]
    fn test_rejects_future_version() {
        let mut bytes = Vec::new();
        write_snapshot(&mut bytes, &snapshot()).unwrap();
        bytes[5..9].copy_from_slice(&(FORMAT_VERSION + 1).to_le_bytes());
        assert!(matches!(
            read_snapshot(&mut bytes.as_slice()),
            Err(EngineError::VersionMismatch {
                file_version: 2,
                expected_version: 1
            })
        ));
    }

    #[test]
    fn test_truncated_payload() {
        let mut bytes = Vec::new();
        write_snapshot(&mut bytes, &snapshot()).unwrap();
        bytes.truncate(12);
        assert!(matches!(
            read_snapshot(&mut bytes.as_slice()),
            Err(EngineError::Checkpoint(_))
        ));
    }
}
