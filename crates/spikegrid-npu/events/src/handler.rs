// Copyright 2025 Neuraville Inc.
// SPDX-License-Identifier: Apache-2.0

//! # Event handler capability
//!
//! Every cluster exposes the same narrow interface, `add_an_event(synapse_index, cluster_id)`,
//! so any cluster can address any other without knowing how its queue is laid out.
//!
//! - [`ClusterInbox`]: a cluster's bounded incoming staging buffer. Relayed events land here
//!   and are only applied to the destination queue by that cluster's own `drain_incoming`.
//! - [`ClusterDirectory`]: resolves a destination cluster id to its inbox. Routers are
//!   constructed with the directory as their injected handler.

use std::collections::BTreeMap;
use std::sync::Arc;

use parking_lot::Mutex;
use tracing::trace;

use crate::error::{EventQueueError, Result, StagingBuffer};
use crate::ids::ClusterId;

/// Capability to deliver one event to a cluster
pub trait EventHandler: Send + Sync {
    /// Deliver an event for `synapse_index` owned by cluster `cluster_id`
    fn add_an_event(&self, synapse_index: usize, cluster_id: ClusterId) -> Result<()>;
}

#[derive(Debug)]
struct InboxState {
    staged: Vec<usize>,
    capacity: usize,
}

/// Bounded incoming staging buffer of one cluster
#[derive(Debug)]
pub struct ClusterInbox {
    cluster_id: ClusterId,
    state: Mutex<InboxState>,
}

impl ClusterInbox {
    pub fn new(cluster_id: ClusterId, capacity: usize) -> Self {
        Self {
            cluster_id,
            state: Mutex::new(InboxState {
                staged: Vec::with_capacity(capacity),
                capacity,
            }),
        }
    }

    pub fn cluster_id(&self) -> ClusterId {
        self.cluster_id
    }

    pub fn capacity(&self) -> usize {
        self.state.lock().capacity
    }

    /// Number of staged events not yet drained
    pub fn len(&self) -> usize {
        self.state.lock().staged.len()
    }

    pub fn is_empty(&self) -> bool {
        self.state.lock().staged.is_empty()
    }

    /// Stage one relayed event. Fails with `CapacityExceeded` when full; nothing is dropped.
    pub fn accept_incoming(&self, synapse_index: usize) -> Result<()> {
        let mut state = self.state.lock();
        if state.staged.len() >= state.capacity {
            return Err(EventQueueError::CapacityExceeded {
                cluster: self.cluster_id,
                buffer: StagingBuffer::Incoming,
                capacity: state.capacity,
            });
        }
        state.staged.push(synapse_index);
        Ok(())
    }

    /// Take every staged event in arrival order, resetting the count to zero
    pub fn take_staged(&self) -> Vec<usize> {
        let mut state = self.state.lock();
        let capacity = state.capacity;
        std::mem::replace(&mut state.staged, Vec::with_capacity(capacity))
    }

    /// Change the bound between epochs. Staged events must already be drained.
    pub(crate) fn resize(&self, capacity: usize) -> Result<()> {
        let mut state = self.state.lock();
        if !state.staged.is_empty() {
            return Err(EventQueueError::StagingNotEmpty {
                cluster: self.cluster_id,
                buffer: StagingBuffer::Incoming,
                pending: state.staged.len(),
            });
        }
        state.capacity = capacity;
        state.staged = Vec::with_capacity(capacity);
        Ok(())
    }
}

impl EventHandler for ClusterInbox {
    fn add_an_event(&self, synapse_index: usize, cluster_id: ClusterId) -> Result<()> {
        if cluster_id != self.cluster_id {
            return Err(EventQueueError::UnknownCluster(cluster_id));
        }
        self.accept_incoming(synapse_index)
    }
}

/// Resolves cluster ids to their inboxes
#[derive(Debug, Default)]
pub struct ClusterDirectory {
    inboxes: BTreeMap<ClusterId, Arc<ClusterInbox>>,
}

impl ClusterDirectory {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a directory from the inboxes of every cluster in the simulation
    pub fn from_inboxes<I>(inboxes: I) -> Self
    where
        I: IntoIterator<Item = Arc<ClusterInbox>>,
    {
        let inboxes = inboxes
            .into_iter()
            .map(|inbox| (inbox.cluster_id(), inbox))
            .collect();
        Self { inboxes }
    }

    pub fn register(&mut self, inbox: Arc<ClusterInbox>) {
        self.inboxes.insert(inbox.cluster_id(), inbox);
    }

    pub fn inbox(&self, cluster_id: ClusterId) -> Option<&Arc<ClusterInbox>> {
        self.inboxes.get(&cluster_id)
    }

    pub fn cluster_ids(&self) -> impl Iterator<Item = ClusterId> + '_ {
        self.inboxes.keys().copied()
    }

    pub fn len(&self) -> usize {
        self.inboxes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inboxes.is_empty()
    }
}

impl EventHandler for ClusterDirectory {
    fn add_an_event(&self, synapse_index: usize, cluster_id: ClusterId) -> Result<()> {
        let inbox = self
            .inboxes
            .get(&cluster_id)
            .ok_or(EventQueueError::UnknownCluster(cluster_id))?;
        trace!(
            "[ROUTER] Relaying synapse {} to {}",
            synapse_index,
            cluster_id
        );
        inbox.add_an_event(synapse_index, cluster_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_inbox_bounded() {
        let inbox = ClusterInbox::new(ClusterId(1), 2);
        inbox.accept_incoming(4).unwrap();
        inbox.accept_incoming(5).unwrap();
        let err = inbox.accept_incoming(6).unwrap_err();
        assert!(matches!(
            err,
            EventQueueError::CapacityExceeded {
                buffer: StagingBuffer::Incoming,
                capacity: 2,
                ..
            }
        ));
        assert_eq!(inbox.take_staged(), vec![4, 5]);
        assert!(inbox.is_empty());
    }

    #[test]
    fn test_directory_routes_by_cluster_id() {
        let a = Arc::new(ClusterInbox::new(ClusterId(0), 4));
        let b = Arc::new(ClusterInbox::new(ClusterId(1), 4));
        let directory = ClusterDirectory::from_inboxes([a.clone(), b.clone()]);

        directory.add_an_event(9, ClusterId(1)).unwrap();
        assert!(a.is_empty());
        assert_eq!(b.take_staged(), vec![9]);

        assert!(matches!(
            directory.add_an_event(0, ClusterId(7)),
            Err(EventQueueError::UnknownCluster(ClusterId(7)))
        ));
    }

    #[test]
    fn test_resize_requires_empty_inbox() {
        let inbox = ClusterInbox::new(ClusterId(0), 1);
        inbox.accept_incoming(0).unwrap();
        assert!(matches!(
            inbox.resize(8),
            Err(EventQueueError::StagingNotEmpty { pending: 1, .. })
        ));
        inbox.take_staged();
        inbox.resize(8).unwrap();
        assert_eq!(inbox.capacity(), 8);
    }
}
