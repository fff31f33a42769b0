// Copyright 2025 Neuraville Inc.
// SPDX-License-Identifier: Apache-2.0

//! # Cluster
//!
//! One partition of the neuron population: a stable id, its delay ring and its router.
//! The ring is only written through this struct, so within a step it has a single writer.

use std::sync::Arc;

use spikegrid_config::ClusterConfig;
use spikegrid_npu_events::{
    mirror_for, ClusterEventRouter, ClusterId, ClusterInbox, DelayRingEventQueue, EventHandler,
    Result,
};

#[derive(Debug)]
pub struct Cluster {
    id: ClusterId,
    queue: DelayRingEventQueue,
    router: ClusterEventRouter,
}

impl Cluster {
    /// Assemble a cluster from an existing queue and router
    pub fn new(queue: DelayRingEventQueue, router: ClusterEventRouter) -> Self {
        Self {
            id: router.cluster_id(),
            queue,
            router,
        }
    }

    /// Build a cluster from its configuration.
    ///
    /// `inbox` must be the inbox registered for this cluster in the directory behind
    /// `handler`; it is how other clusters reach this one.
    pub fn from_config(
        config: &ClusterConfig,
        delay_horizon: u32,
        inbox: Arc<ClusterInbox>,
        handler: Arc<dyn EventHandler>,
    ) -> Result<Self> {
        let queue = DelayRingEventQueue::new(config.synapse_count, delay_horizon)?;
        let mirror = mirror_for(
            config.memory_domain,
            config.outgoing_capacity,
            config.incoming_capacity,
        );
        let router = ClusterEventRouter::new(
            config.cluster_id(),
            config.outgoing_capacity,
            inbox,
            handler,
            mirror,
        );
        Ok(Self::new(queue, router))
    }

    pub fn id(&self) -> ClusterId {
        self.id
    }

    /// Number of locally owned synapses (queue slots)
    pub fn synapse_count(&self) -> usize {
        self.queue.capacity()
    }

    pub fn queue(&self) -> &DelayRingEventQueue {
        &self.queue
    }

    pub fn queue_mut(&mut self) -> &mut DelayRingEventQueue {
        &mut self.queue
    }

    pub fn router(&self) -> &ClusterEventRouter {
        &self.router
    }

    pub fn router_mut(&mut self) -> &mut ClusterEventRouter {
        &mut self.router
    }

    /// Queue and router together, for code that schedules locally and relays in one pass
    pub fn parts_mut(&mut self) -> (&mut DelayRingEventQueue, &mut ClusterEventRouter) {
        (&mut self.queue, &mut self.router)
    }

    /// Capability other clusters use to reach this one
    pub fn handler(&self) -> Arc<dyn EventHandler> {
        self.router.inbox().clone()
    }

    /// Deliver an event to `synapse_index` of `destination`, local or foreign
    pub fn add_an_event(&mut self, synapse_index: usize, destination: ClusterId) -> Result<()> {
        self.router
            .add_an_event(&mut self.queue, synapse_index, destination)
    }

    pub(crate) fn flush_outgoing(&mut self) -> Result<usize> {
        self.router.flush_outgoing()
    }

    pub(crate) fn drain_incoming(&mut self) -> Result<usize> {
        self.router.drain_incoming(&mut self.queue)
    }

    pub(crate) fn advance_ring(&mut self) {
        self.queue.advance();
    }

    pub(crate) fn sync_to_host(&mut self) -> Result<()> {
        self.router.sync_to_host(&self.queue)
    }

    pub(crate) fn replace_queue(&mut self, queue: DelayRingEventQueue) -> Result<()> {
        self.queue = queue;
        self.router.clear_staging();
        self.router.sync_to_device(&self.queue)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use spikegrid_npu_events::{ClusterDirectory, MemoryDomain};

    fn pair() -> (Cluster, Cluster) {
        let configs = [
            ClusterConfig {
                id: 0,
                synapse_count: 8,
                outgoing_capacity: 2,
                incoming_capacity: 2,
                memory_domain: MemoryDomain::Host,
            },
            ClusterConfig {
                id: 1,
                synapse_count: 4,
                outgoing_capacity: 2,
                incoming_capacity: 2,
                memory_domain: MemoryDomain::Device,
            },
        ];
        let inboxes: Vec<_> = configs
            .iter()
            .map(|c| Arc::new(ClusterInbox::new(c.cluster_id(), c.incoming_capacity)))
            .collect();
        let directory: Arc<dyn EventHandler> =
            Arc::new(ClusterDirectory::from_inboxes(inboxes.iter().cloned()));
        let mut clusters = configs
            .iter()
            .zip(inboxes)
            .map(|(config, inbox)| Cluster::from_config(config, 16, inbox, directory.clone()).unwrap());
        (clusters.next().unwrap(), clusters.next().unwrap())
    }

    #[test]
    fn test_from_config() {
        let (a, b) = pair();
        assert_eq!(a.id(), ClusterId(0));
        assert_eq!(a.synapse_count(), 8);
        assert_eq!(b.queue().horizon(), 16);
        assert_eq!(b.router().memory_domain(), MemoryDomain::Device);
    }

    #[test]
    fn test_relay_between_clusters() {
        let (mut a, mut b) = pair();
        a.add_an_event(1, ClusterId(0)).unwrap();
        a.add_an_event(3, ClusterId(1)).unwrap();

        assert_eq!(a.flush_outgoing().unwrap(), 1);
        assert_eq!(b.drain_incoming().unwrap(), 1);
        assert!(a.queue_mut().consume_at_current(1).unwrap());
        assert!(b.queue_mut().consume_at_current(3).unwrap());
    }

    #[test]
    fn test_handler_reaches_cluster_inbox() {
        let (a, mut b) = pair();
        b.handler().add_an_event(2, ClusterId(1)).unwrap();
        assert_eq!(b.router().incoming_len(), 1);
        assert!(a.handler().add_an_event(2, ClusterId(1)).is_err());
        b.drain_incoming().unwrap();
        assert!(b.queue().is_pending(2, 0).unwrap());
    }
}
