// Copyright 2025 Neuraville Inc.
// SPDX-License-Identifier: Apache-2.0

//! # Collaborator interfaces
//!
//! Neuron and synapse models, connectivity growth and history recording live outside the
//! scheduler. It only drives them through these traits, in a fixed order per increment:
//!
//! 1. [`NeuronAdvance`] on every cluster (may schedule locally or relay through the router)
//! 2. router barrier
//! 3. [`SynapseAdvance`] on every cluster, once per step of the increment (consumes
//!    queue bits), each call followed by one ring advance
//!
//! Delays are counted in steps. An event scheduled during neuron-advance with delay `d`
//! is consumed at step `increment_start + d`.
//!
//! and once per epoch [`ConnectivityGrowth`] followed by [`HistoryRecorder`].
//!
//! Per-cluster collaborators take `&self` and must be `Sync`: in parallel scheduling the
//! same instance is called for several clusters at once.

use spikegrid_npu_events::ClusterId;

use crate::clock::StepContext;
use crate::cluster::Cluster;
use crate::error::Result;

/// Neuron-advance phase of one cluster
pub trait NeuronAdvance: Send + Sync {
    fn advance_neurons(&self, cluster: &mut Cluster, ctx: &StepContext) -> Result<()>;
}

/// Synapse-advance phase of one cluster
pub trait SynapseAdvance: Send + Sync {
    fn advance_synapses(&self, cluster: &mut Cluster, ctx: &StepContext) -> Result<()>;
}

/// New staging bounds for one cluster's router
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ClusterFanOut {
    pub cluster_id: ClusterId,
    pub outgoing_capacity: usize,
    pub incoming_capacity: usize,
}

/// Connectivity and weight update between epochs
pub trait ConnectivityGrowth: Send {
    /// Recompute connectivity after `epoch` completed.
    ///
    /// Returns the cross-cluster fan-out of every cluster whose staging bounds changed.
    /// Clusters not listed keep their current bounds.
    fn update_connections(&mut self, clusters: &[Cluster], epoch: u32) -> Result<Vec<ClusterFanOut>>;
}

/// Receives the epoch-completion signal
pub trait HistoryRecorder: Send {
    fn epoch_completed(&mut self, epoch: u32, simulation_step: u64) -> Result<()>;
}

/// Collaborator that does nothing in every role
#[derive(Debug, Default, Clone, Copy)]
pub struct Quiescent;

impl NeuronAdvance for Quiescent {
    fn advance_neurons(&self, _cluster: &mut Cluster, _ctx: &StepContext) -> Result<()> {
        Ok(())
    }
}

impl SynapseAdvance for Quiescent {
    fn advance_synapses(&self, _cluster: &mut Cluster, _ctx: &StepContext) -> Result<()> {
        Ok(())
    }
}

impl ConnectivityGrowth for Quiescent {
    fn update_connections(&mut self, _clusters: &[Cluster], _epoch: u32) -> Result<Vec<ClusterFanOut>> {
        Ok(Vec::new())
    }
}

impl HistoryRecorder for Quiescent {
    fn epoch_completed(&mut self, _epoch: u32, _simulation_step: u64) -> Result<()> {
        Ok(())
    }
}

/// The four collaborators of one simulation
pub struct Collaborators {
    pub neurons: Box<dyn NeuronAdvance>,
    pub synapses: Box<dyn SynapseAdvance>,
    pub growth: Box<dyn ConnectivityGrowth>,
    pub history: Box<dyn HistoryRecorder>,
}

impl Collaborators {
    /// All roles filled by [`Quiescent`]
    pub fn quiescent() -> Self {
        Self {
            neurons: Box::new(Quiescent),
            synapses: Box::new(Quiescent),
            growth: Box::new(Quiescent),
            history: Box::new(Quiescent),
        }
    }

    pub fn with_neurons(mut self, neurons: impl NeuronAdvance + 'static) -> Self {
        self.neurons = Box::new(neurons);
        self
    }

    pub fn with_synapses(mut self, synapses: impl SynapseAdvance + 'static) -> Self {
        self.synapses = Box::new(synapses);
        self
    }

    pub fn with_growth(mut self, growth: impl ConnectivityGrowth + 'static) -> Self {
        self.growth = Box::new(growth);
        self
    }

    pub fn with_history(mut self, history: impl HistoryRecorder + 'static) -> Self {
        self.history = Box::new(history);
        self
    }
}

impl Default for Collaborators {
    fn default() -> Self {
        Self::quiescent()
    }
}

impl std::fmt::Debug for Collaborators {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Collaborators").finish_non_exhaustive()
    }
}
