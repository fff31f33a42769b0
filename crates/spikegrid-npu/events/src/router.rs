// Copyright 2025 Neuraville Inc.
// SPDX-License-Identifier: Apache-2.0

/*
 * Copyright 2025 Neuraville Inc.
 *
 * Licensed under the Apache License, Version 2.0 (the "License");
 * you may not use this file except in compliance with the License.
 */

//! # Cluster Event Router
//!
//! Routes spike events either straight into the owning cluster's delay ring or, for a
//! foreign destination, into a bounded outgoing buffer that is relayed at the barrier.
//!
//! ## Barrier protocol
//! 1. Every cluster finishes neuron-advance (events are only staged, no foreign queue is touched)
//! 2. `flush_outgoing` on every cluster: records go to the destination's inbox
//! 3. `drain_incoming` on every cluster: inbox contents are applied to the local ring
//! 4. Synapse-advance may start
//!
//! A cluster's ring is only ever written by its own router, so no locking is needed on it.

use std::sync::Arc;

use tracing::{debug, trace};

use crate::delay_queue::DelayRingEventQueue;
use crate::error::{EventQueueError, Result, StagingBuffer};
use crate::handler::{ClusterInbox, EventHandler};
use crate::ids::{ClusterId, CrossClusterEventRecord};
use crate::mirror::{DeviceMirror, MemoryDomain};

/// Per-cluster router with bounded staging in both directions
pub struct ClusterEventRouter {
    cluster_id: ClusterId,
    outgoing: Vec<CrossClusterEventRecord>,
    outgoing_capacity: usize,
    inbox: Arc<ClusterInbox>,
    handler: Arc<dyn EventHandler>,
    mirror: Box<dyn DeviceMirror>,
    total_relayed: u64,
    total_drained: u64,
}

impl ClusterEventRouter {
    /// Create a router.
    ///
    /// # Arguments
    /// * `outgoing_capacity` - worst-case cross-cluster fan-out of this cluster per step
    /// * `inbox` - this cluster's incoming staging buffer (also registered in the directory)
    /// * `handler` - capability used to reach foreign clusters at flush time
    /// * `mirror` - transfer capability for this cluster's memory domain
    pub fn new(
        cluster_id: ClusterId,
        outgoing_capacity: usize,
        inbox: Arc<ClusterInbox>,
        handler: Arc<dyn EventHandler>,
        mirror: Box<dyn DeviceMirror>,
    ) -> Self {
        Self {
            cluster_id,
            outgoing: Vec::with_capacity(outgoing_capacity),
            outgoing_capacity,
            inbox,
            handler,
            mirror,
            total_relayed: 0,
            total_drained: 0,
        }
    }

    pub fn cluster_id(&self) -> ClusterId {
        self.cluster_id
    }

    pub fn memory_domain(&self) -> MemoryDomain {
        self.mirror.domain()
    }

    pub fn inbox(&self) -> &Arc<ClusterInbox> {
        &self.inbox
    }

    pub fn outgoing_capacity(&self) -> usize {
        self.outgoing_capacity
    }

    /// Number of staged outgoing records
    pub fn outgoing_len(&self) -> usize {
        self.outgoing.len()
    }

    /// Staged outgoing records in enqueue order
    pub fn outgoing(&self) -> &[CrossClusterEventRecord] {
        &self.outgoing
    }

    pub fn incoming_len(&self) -> usize {
        self.inbox.len()
    }

    /// Events relayed to foreign clusters since construction
    pub fn total_relayed(&self) -> u64 {
        self.total_relayed
    }

    /// Relayed events applied to the local ring since construction
    pub fn total_drained(&self) -> u64 {
        self.total_drained
    }

    /// Deliver an event for `synapse_index` of cluster `destination`.
    ///
    /// Local destinations are scheduled at the current ring position immediately; foreign
    /// ones are staged until `flush_outgoing`.
    pub fn add_an_event(
        &mut self,
        queue: &mut DelayRingEventQueue,
        synapse_index: usize,
        destination: ClusterId,
    ) -> Result<()> {
        if destination == self.cluster_id {
            return queue.schedule_at_current(synapse_index);
        }

        if self.outgoing.len() >= self.outgoing_capacity {
            return Err(EventQueueError::CapacityExceeded {
                cluster: self.cluster_id,
                buffer: StagingBuffer::Outgoing,
                capacity: self.outgoing_capacity,
            });
        }
        self.outgoing
            .push(CrossClusterEventRecord::new(synapse_index, destination));
        Ok(())
    }

    /// Relay every staged record to its destination, in enqueue order.
    ///
    /// Returns the number of records relayed. The outgoing count is zero afterwards.
    pub fn flush_outgoing(&mut self) -> Result<usize> {
        if self.outgoing.is_empty() {
            return Ok(0);
        }

        self.mirror.copy_out(self.cluster_id, &mut self.outgoing)?;

        let count = self.outgoing.len();
        for record in self.outgoing.drain(..) {
            self.handler
                .add_an_event(record.synapse_index, record.destination)?;
        }
        self.total_relayed += count as u64;
        trace!("[ROUTER] {} flushed {} outgoing events", self.cluster_id, count);
        Ok(count)
    }

    /// Stage one relayed event for this cluster
    pub fn accept_incoming(&self, synapse_index: usize) -> Result<()> {
        self.inbox.accept_incoming(synapse_index)
    }

    /// Apply every staged incoming event to the local ring at the current position.
    ///
    /// Returns the number of events applied. The incoming count is zero afterwards.
    pub fn drain_incoming(&mut self, queue: &mut DelayRingEventQueue) -> Result<usize> {
        let mut staged = self.inbox.take_staged();
        if staged.is_empty() {
            return Ok(0);
        }

        self.mirror.copy_in(self.cluster_id, &mut staged)?;
        for &synapse_index in &staged {
            queue.schedule_at_current(synapse_index)?;
        }

        self.total_drained += staged.len() as u64;
        trace!(
            "[ROUTER] {} drained {} incoming events",
            self.cluster_id,
            staged.len()
        );
        Ok(staged.len())
    }

    /// Re-bound both staging buffers (between epochs, when both are empty)
    pub fn resize(&mut self, outgoing_capacity: usize, incoming_capacity: usize) -> Result<()> {
        if !self.outgoing.is_empty() {
            return Err(EventQueueError::StagingNotEmpty {
                cluster: self.cluster_id,
                buffer: StagingBuffer::Outgoing,
                pending: self.outgoing.len(),
            });
        }
        self.inbox.resize(incoming_capacity)?;
        self.mirror.resize(outgoing_capacity, incoming_capacity);
        self.outgoing_capacity = outgoing_capacity;
        self.outgoing = Vec::with_capacity(outgoing_capacity);
        debug!(
            "[ROUTER] {} staging resized: outgoing {}, incoming {}",
            self.cluster_id, outgoing_capacity, incoming_capacity
        );
        Ok(())
    }

    /// Discard both staging buffers (teardown / reset only)
    pub fn clear_staging(&mut self) {
        self.outgoing.clear();
        self.inbox.take_staged();
    }

    pub fn sync_to_host(&mut self, queue: &DelayRingEventQueue) -> Result<()> {
        self.mirror.sync_to_host(queue)
    }

    pub fn sync_to_device(&mut self, queue: &DelayRingEventQueue) -> Result<()> {
        self.mirror.sync_to_device(queue)
    }
}

impl std::fmt::Debug for ClusterEventRouter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ClusterEventRouter")
            .field("cluster_id", &self.cluster_id)
            .field("outgoing", &self.outgoing.len())
            .field("outgoing_capacity", &self.outgoing_capacity)
            .field("incoming", &self.inbox.len())
            .field("memory_domain", &self.mirror.domain())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::handler::ClusterDirectory;
    use crate::mirror::HostMirror;

    fn router_pair() -> (ClusterEventRouter, ClusterEventRouter) {
        let inbox_a = Arc::new(ClusterInbox::new(ClusterId(0), 4));
        let inbox_b = Arc::new(ClusterInbox::new(ClusterId(1), 4));
        let directory: Arc<dyn EventHandler> = Arc::new(ClusterDirectory::from_inboxes([
            inbox_a.clone(),
            inbox_b.clone(),
        ]));
        let a = ClusterEventRouter::new(
            ClusterId(0),
            4,
            inbox_a,
            directory.clone(),
            Box::new(HostMirror),
        );
        let b = ClusterEventRouter::new(ClusterId(1), 4, inbox_b, directory, Box::new(HostMirror));
        (a, b)
    }

    #[test]
    fn test_local_event_goes_straight_to_queue() {
        let (mut a, _) = router_pair();
        let mut queue = DelayRingEventQueue::new(4, 8).unwrap();
        a.add_an_event(&mut queue, 2, ClusterId(0)).unwrap();
        assert_eq!(a.outgoing_len(), 0);
        assert!(queue.consume_at_current(2).unwrap());
    }

    #[test]
    fn test_foreign_event_waits_for_barrier() {
        let (mut a, mut b) = router_pair();
        let mut queue_a = DelayRingEventQueue::new(4, 8).unwrap();
        let mut queue_b = DelayRingEventQueue::new(4, 8).unwrap();

        a.add_an_event(&mut queue_a, 3, ClusterId(1)).unwrap();
        assert_eq!(a.outgoing_len(), 1);
        assert_eq!(queue_b.pending_events(), 0);

        assert_eq!(a.flush_outgoing().unwrap(), 1);
        assert_eq!(a.outgoing_len(), 0);
        assert_eq!(b.incoming_len(), 1);
        assert_eq!(queue_b.pending_events(), 0);

        assert_eq!(b.drain_incoming(&mut queue_b).unwrap(), 1);
        assert_eq!(b.incoming_len(), 0);
        assert!(queue_b.consume_at_current(3).unwrap());
        assert_eq!(queue_a.pending_events(), 0);
    }

    #[test]
    fn test_resize_rejected_with_staged_outgoing() {
        let (mut a, _) = router_pair();
        let mut queue = DelayRingEventQueue::new(4, 8).unwrap();
        a.add_an_event(&mut queue, 0, ClusterId(1)).unwrap();
        assert!(matches!(
            a.resize(8, 8),
            Err(EventQueueError::StagingNotEmpty {
                buffer: StagingBuffer::Outgoing,
                ..
            })
        ));
        a.clear_staging();
        a.resize(8, 8).unwrap();
        assert_eq!(a.outgoing_capacity(), 8);
        assert_eq!(a.inbox().capacity(), 8);
    }
}
