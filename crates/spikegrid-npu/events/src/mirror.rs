// Copyright 2025 Neuraville Inc.
// SPDX-License-Identifier: Apache-2.0

/*
 * Copyright 2025 Neuraville Inc.
 *
 * Licensed under the Apache License, Version 2.0 (the "License");
 * you may not use this file except in compliance with the License.
 */

//! # Memory-domain mirrors
//!
//! A cluster whose queue lives in a different memory domain (an accelerator, or any
//! buffer the host cannot touch directly) needs an explicit bulk transfer before relayed
//! events cross the boundary. Routers call their mirror only at the barrier:
//!
//! - `copy_out`: outgoing records, device -> host, before they are relayed
//! - `copy_in`: staged incoming synapse indices, host -> device, before they are applied
//!
//! Single-domain clusters use [`HostMirror`], which performs no transfer.

use serde::{Deserialize, Serialize};
use tracing::trace;

use crate::delay_queue::DelayRingEventQueue;
use crate::error::{EventQueueError, Result};
use crate::ids::{ClusterId, CrossClusterEventRecord};

/// Where a cluster's queue and staging buffers reside
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MemoryDomain {
    #[default]
    Host,
    Device,
}

/// Explicit transfer capability across a memory-domain boundary
pub trait DeviceMirror: Send + Sync {
    fn domain(&self) -> MemoryDomain;

    /// Bring the outgoing staging buffer into host memory, in place.
    fn copy_out(&mut self, cluster: ClusterId, records: &mut Vec<CrossClusterEventRecord>)
        -> Result<()>;

    /// Push staged incoming synapse indices into the queue's memory domain, in place.
    fn copy_in(&mut self, cluster: ClusterId, synapses: &mut Vec<usize>) -> Result<()>;

    /// Make the host copy of the queue current (before checkpointing)
    fn sync_to_host(&mut self, _queue: &DelayRingEventQueue) -> Result<()> {
        Ok(())
    }

    /// Push a host-restored queue back to the device (after restoring)
    fn sync_to_device(&mut self, _queue: &DelayRingEventQueue) -> Result<()> {
        Ok(())
    }

    /// Change staging bounds between epochs
    fn resize(&mut self, _outgoing_capacity: usize, _incoming_capacity: usize) {}
}

/// Mirror for clusters that share the host memory domain
#[derive(Debug, Default, Clone, Copy)]
pub struct HostMirror;

impl DeviceMirror for HostMirror {
    fn domain(&self) -> MemoryDomain {
        MemoryDomain::Host
    }

    fn copy_out(
        &mut self,
        _cluster: ClusterId,
        _records: &mut Vec<CrossClusterEventRecord>,
    ) -> Result<()> {
        Ok(())
    }

    fn copy_in(&mut self, _cluster: ClusterId, _synapses: &mut Vec<usize>) -> Result<()> {
        Ok(())
    }
}

/// Mirror for device-resident clusters.
///
/// Keeps fixed-size transfer buffers in the device layout: outgoing records packed into one
/// `u64` each, incoming synapse indices as `u32`. Every barrier transfer goes through these
/// buffers, so a record that cannot be represented on the device, or a transfer larger than
/// the allocated buffer, is reported as `DeviceTransfer` instead of being truncated.
#[derive(Debug, Clone)]
pub struct PackedDeviceMirror {
    outgoing_words: Vec<u64>,
    incoming_words: Vec<u32>,
    outgoing_capacity: usize,
    incoming_capacity: usize,
    transfers: u64,
}

impl PackedDeviceMirror {
    pub fn new(outgoing_capacity: usize, incoming_capacity: usize) -> Self {
        Self {
            outgoing_words: Vec::with_capacity(outgoing_capacity),
            incoming_words: Vec::with_capacity(incoming_capacity),
            outgoing_capacity,
            incoming_capacity,
            transfers: 0,
        }
    }

    /// Number of bulk transfers performed so far
    pub fn transfers(&self) -> u64 {
        self.transfers
    }
}

impl DeviceMirror for PackedDeviceMirror {
    fn domain(&self) -> MemoryDomain {
        MemoryDomain::Device
    }

    fn copy_out(
        &mut self,
        cluster: ClusterId,
        records: &mut Vec<CrossClusterEventRecord>,
    ) -> Result<()> {
        if records.len() > self.outgoing_capacity {
            return Err(EventQueueError::DeviceTransfer {
                cluster,
                reason: format!(
                    "{} outgoing records exceed device buffer of {}",
                    records.len(),
                    self.outgoing_capacity
                ),
            });
        }

        self.outgoing_words.clear();
        for record in records.iter() {
            let word = record.pack().ok_or_else(|| EventQueueError::DeviceTransfer {
                cluster,
                reason: format!(
                    "synapse index {} does not fit the packed record layout",
                    record.synapse_index
                ),
            })?;
            self.outgoing_words.push(word);
        }

        records.clear();
        records.extend(
            self.outgoing_words
                .iter()
                .map(|&word| CrossClusterEventRecord::unpack(word)),
        );
        self.transfers += 1;
        trace!(
            "[ROUTER] {} copied {} outgoing records to host",
            cluster,
            records.len()
        );
        Ok(())
    }

    fn copy_in(&mut self, cluster: ClusterId, synapses: &mut Vec<usize>) -> Result<()> {
        if synapses.len() > self.incoming_capacity {
            return Err(EventQueueError::DeviceTransfer {
                cluster,
                reason: format!(
                    "{} incoming events exceed device buffer of {}",
                    synapses.len(),
                    self.incoming_capacity
                ),
            });
        }

        self.incoming_words.clear();
        for &synapse in synapses.iter() {
            let word = u32::try_from(synapse).map_err(|_| EventQueueError::DeviceTransfer {
                cluster,
                reason: format!("synapse index {} does not fit a device word", synapse),
            })?;
            self.incoming_words.push(word);
        }

        synapses.clear();
        synapses.extend(self.incoming_words.iter().map(|&word| word as usize));
        self.transfers += 1;
        Ok(())
    }

    fn resize(&mut self, outgoing_capacity: usize, incoming_capacity: usize) {
        self.outgoing_capacity = outgoing_capacity;
        self.incoming_capacity = incoming_capacity;
        self.outgoing_words = Vec::with_capacity(outgoing_capacity);
        self.incoming_words = Vec::with_capacity(incoming_capacity);
    }
}

/// Default mirror for a memory domain
pub fn mirror_for(
    domain: MemoryDomain,
    outgoing_capacity: usize,
    incoming_capacity: usize,
) -> Box<dyn DeviceMirror> {
    match domain {
        MemoryDomain::Host => Box::new(HostMirror),
        MemoryDomain::Device => Box::new(PackedDeviceMirror::new(
            outgoing_capacity,
            incoming_capacity,
        )),
    }
}
