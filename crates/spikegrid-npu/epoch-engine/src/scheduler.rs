// Copyright 2025 Neuraville Inc.
// SPDX-License-Identifier: Apache-2.0

/*
 * Copyright 2025 Neuraville Inc.
 *
 * Licensed under the Apache License, Version 2.0 (the "License");
 * you may not use this file except in compliance with the License.
 */

//! # Epoch Scheduler
//!
//! Drives every cluster through the same sequence of phases:
//!
//! ```text
//! Idle -> Setup -> Stepping -> GrowthUpdate -> Stepping -> ... -> Teardown -> Terminal
//! ```
//!
//! ## Inner increment of `k` steps
//! 1. Neuron-advance on every cluster (sequential or one rayon task per cluster)
//! 2. Barrier: `flush_outgoing` on every cluster, then `drain_incoming` on every cluster
//! 3. For each of the `k` steps: synapse-advance on the cluster, then its ring advances
//!
//! No cluster starts phase 3 before every cluster has finished phase 2. The ring moves
//! one position per simulated step, so a delay of `d` means `d` steps of `delta_t`.
//!
//! ## Failure
//! Any error while stepping or updating is fatal: the run is aborted, the error is logged
//! and returned, and the scheduler moves to `Terminal`. Only `reset` leaves `Terminal`.

use std::fmt;
use std::sync::Arc;
use std::time::Instant;

use rayon::prelude::*;
use rayon::ThreadPool;
use spikegrid_config::{ClusterConfig, SchedulingMode, SimulationConfig, SpikegridConfig};
use spikegrid_npu_events::{
    ClusterDirectory, ClusterId, ClusterInbox, EventHandler, EventQueueError,
};
use tracing::{debug, error, info};

use crate::clock::{InnerIncrements, SimulationClock, StepContext};
use crate::cluster::Cluster;
use crate::collaborators::{ClusterFanOut, Collaborators};
use crate::error::{EngineError, Result};
use crate::SchedulerStats;

/// Simulated steps between two progress log lines
pub const PROGRESS_LOG_INTERVAL: u64 = 10_000;

/// Lifecycle of a scheduler
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SchedulerState {
    Idle,
    /// Clusters built, no epoch run yet
    Setup,
    Stepping,
    /// Between epochs: growth and history have run (or are running)
    GrowthUpdate,
    Teardown,
    Terminal,
}

impl fmt::Display for SchedulerState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            SchedulerState::Idle => "idle",
            SchedulerState::Setup => "set up",
            SchedulerState::Stepping => "stepping",
            SchedulerState::GrowthUpdate => "updating connectivity",
            SchedulerState::Teardown => "tearing down",
            SchedulerState::Terminal => "terminal",
        };
        f.write_str(name)
    }
}

pub struct EpochScheduler {
    simulation: SimulationConfig,
    cluster_configs: Vec<ClusterConfig>,
    steps_per_epoch: u64,
    collaborators: Collaborators,
    pool: Option<ThreadPool>,
    clusters: Vec<Cluster>,
    clock: SimulationClock,
    state: SchedulerState,
    stats: SchedulerStats,
    next_progress_step: u64,
}

impl EpochScheduler {
    /// Create a scheduler for a validated configuration.
    ///
    /// # Errors
    /// `InvalidConfig` when the configuration fails validation or the worker pool cannot
    /// be built.
    pub fn new(config: &SpikegridConfig, collaborators: Collaborators) -> Result<Self> {
        spikegrid_config::validate_config(config)
            .map_err(|e| EngineError::InvalidConfig(e.to_string()))?;
        let steps_per_epoch = config.simulation.steps_per_epoch().ok_or_else(|| {
            EngineError::InvalidConfig("epoch_duration / delta_t is not a step count".into())
        })?;

        let pool = match config.simulation.scheduling {
            SchedulingMode::Sequential => None,
            SchedulingMode::Parallel => Some(
                rayon::ThreadPoolBuilder::new()
                    .num_threads(config.system.max_cores)
                    .thread_name(|i| format!("spikegrid-cluster-{}", i))
                    .build()
                    .map_err(|e| EngineError::InvalidConfig(format!("worker pool: {}", e)))?,
            ),
        };

        Ok(Self {
            simulation: config.simulation.clone(),
            cluster_configs: config.clusters.clone(),
            steps_per_epoch,
            collaborators,
            pool,
            clusters: Vec::new(),
            clock: SimulationClock::new(config.simulation.delta_t),
            state: SchedulerState::Idle,
            stats: SchedulerStats::default(),
            next_progress_step: PROGRESS_LOG_INTERVAL,
        })
    }

    pub fn state(&self) -> SchedulerState {
        self.state
    }

    pub fn clock(&self) -> &SimulationClock {
        &self.clock
    }

    pub fn clusters(&self) -> &[Cluster] {
        &self.clusters
    }

    pub fn cluster(&self, id: ClusterId) -> Option<&Cluster> {
        self.clusters.iter().find(|c| c.id() == id)
    }

    pub fn cluster_mut(&mut self, id: ClusterId) -> Option<&mut Cluster> {
        self.clusters.iter_mut().find(|c| c.id() == id)
    }

    pub fn stats(&self) -> &SchedulerStats {
        &self.stats
    }

    pub fn steps_per_epoch(&self) -> u64 {
        self.steps_per_epoch
    }

    pub fn max_epochs(&self) -> u32 {
        self.simulation.max_epochs
    }

    pub fn delay_horizon(&self) -> u32 {
        self.simulation.delay_horizon
    }

    pub fn scheduling(&self) -> SchedulingMode {
        self.simulation.scheduling
    }

    pub fn epochs_remaining(&self) -> u32 {
        self.simulation
            .max_epochs
            .saturating_sub(self.clock.epochs_completed())
    }

    pub(crate) fn expect_state(
        &self,
        operation: &'static str,
        allowed: &[SchedulerState],
    ) -> Result<()> {
        if allowed.contains(&self.state) {
            Ok(())
        } else {
            Err(EngineError::InvalidState {
                operation,
                state: self.state,
            })
        }
    }

    pub(crate) fn clusters_mut(&mut self) -> &mut [Cluster] {
        &mut self.clusters
    }

    pub(crate) fn restore_clock(&mut self, simulation_step: u64, epochs_completed: u32) {
        self.clock.restore(simulation_step, epochs_completed);
        self.next_progress_step =
            (simulation_step / PROGRESS_LOG_INTERVAL + 1) * PROGRESS_LOG_INTERVAL;
    }

    /// Build every cluster with its queue, router and inbox
    pub fn setup(&mut self) -> Result<()> {
        self.expect_state("set up", &[SchedulerState::Idle])?;
        self.state = SchedulerState::Setup;

        let horizon = self.simulation.delay_horizon;
        let inboxes: Vec<Arc<ClusterInbox>> = self
            .cluster_configs
            .iter()
            .map(|c| Arc::new(ClusterInbox::new(c.cluster_id(), c.incoming_capacity)))
            .collect();
        let directory: Arc<dyn EventHandler> =
            Arc::new(ClusterDirectory::from_inboxes(inboxes.iter().cloned()));

        let built: std::result::Result<Vec<Cluster>, EventQueueError> = self
            .cluster_configs
            .iter()
            .zip(inboxes)
            .map(|(config, inbox)| Cluster::from_config(config, horizon, inbox, directory.clone()))
            .collect();
        let clusters = self.abort_on_error("set up", built.map_err(EngineError::from))?;

        for cluster in &clusters {
            debug!(
                "[EPOCH] {}: {} synapses, outgoing {}, incoming {}, {:?} memory",
                cluster.id(),
                cluster.synapse_count(),
                cluster.router().outgoing_capacity(),
                cluster.router().inbox().capacity(),
                cluster.router().memory_domain()
            );
        }
        self.clusters = clusters;

        info!(
            "[EPOCH] Setup complete: {} clusters, {} steps per epoch, increments of at most {} steps, {:?} scheduling",
            self.clusters.len(),
            self.steps_per_epoch,
            self.simulation.min_synaptic_trans_delay,
            self.simulation.scheduling
        );
        Ok(())
    }

    /// Run one epoch and its connectivity/history update.
    ///
    /// Returns the sizes of the inner increments issued, e.g. `[3, 3, 3, 1]` for a
    /// 10-step epoch with a minimum synaptic transmission delay of 3.
    pub fn run_epoch(&mut self) -> Result<Vec<u64>> {
        self.expect_state(
            "run an epoch",
            &[SchedulerState::Setup, SchedulerState::GrowthUpdate],
        )?;
        if self.epochs_remaining() == 0 {
            return Err(EngineError::EpochsExhausted(self.simulation.max_epochs));
        }
        let result = self.run_epoch_inner();
        self.abort_on_error("run an epoch", result)
    }

    /// Set up if needed, then run every remaining epoch.
    ///
    /// Leaves the scheduler between epochs so a checkpoint can still be taken;
    /// call [`teardown`](Self::teardown) afterwards.
    pub fn simulate(&mut self) -> Result<&SchedulerStats> {
        if self.state == SchedulerState::Idle {
            self.setup()?;
        }
        while self.epochs_remaining() > 0 {
            self.run_epoch()?;
        }
        info!(
            "[EPOCH] Simulation complete: {} epochs, {} steps ({:.4} s simulated)",
            self.clock.epochs_completed(),
            self.clock.simulation_step(),
            self.clock.simulated_seconds()
        );
        Ok(&self.stats)
    }

    /// Release every cluster. Allowed between epochs and after an aborted run.
    pub fn teardown(&mut self) -> Result<()> {
        self.expect_state(
            "tear down",
            &[
                SchedulerState::Setup,
                SchedulerState::GrowthUpdate,
                SchedulerState::Terminal,
            ],
        )?;
        self.state = SchedulerState::Teardown;
        for cluster in &mut self.clusters {
            cluster.router_mut().clear_staging();
        }
        let released = self.clusters.len();
        self.clusters.clear();
        self.state = SchedulerState::Terminal;
        info!("[EPOCH] Teardown complete: {} clusters released", released);
        Ok(())
    }

    /// Tear down, zero the clock and statistics, and set up again
    pub fn reset(&mut self) -> Result<()> {
        for cluster in &mut self.clusters {
            cluster.router_mut().clear_staging();
        }
        self.clusters.clear();
        self.clock.reset();
        self.stats = SchedulerStats::default();
        self.next_progress_step = PROGRESS_LOG_INTERVAL;
        self.state = SchedulerState::Idle;
        info!("[EPOCH] Reset");
        self.setup()
    }

    fn run_epoch_inner(&mut self) -> Result<Vec<u64>> {
        self.state = SchedulerState::Stepping;
        let epoch = self.clock.epochs_completed();
        let stepping_started = Instant::now();

        let increments: Vec<u64> =
            InnerIncrements::new(self.steps_per_epoch, self.simulation.min_synaptic_trans_delay)
                .collect();
        for &steps in &increments {
            let ctx = StepContext {
                epoch,
                simulation_step: self.clock.simulation_step(),
                step_offset: 0,
                steps,
                delta_t: self.clock.delta_t(),
            };
            self.run_increment(&ctx)?;
            self.clock.advance(steps);
            self.stats.inner_increments += 1;
            self.stats.simulated_steps += steps;
            self.log_progress();
        }
        self.stats.stepping_time_us += stepping_started.elapsed().as_micros() as u64;

        self.state = SchedulerState::GrowthUpdate;
        let update_started = Instant::now();
        let fan_out = self
            .collaborators
            .growth
            .update_connections(&self.clusters, epoch)?;
        self.apply_fan_out(&fan_out)?;
        self.collaborators
            .history
            .epoch_completed(epoch, self.clock.simulation_step())?;
        self.stats.update_time_us += update_started.elapsed().as_micros() as u64;

        self.clock.complete_epoch();
        self.stats.epochs += 1;
        info!(
            "[EPOCH] Epoch {}/{} complete at step {} ({} increments)",
            self.clock.epochs_completed(),
            self.simulation.max_epochs,
            self.clock.simulation_step(),
            increments.len()
        );
        Ok(increments)
    }

    fn run_increment(&mut self, ctx: &StepContext) -> Result<()> {
        let pool = self.pool.as_ref();
        let clusters = &mut self.clusters;
        let neurons = &*self.collaborators.neurons;
        let synapses = &*self.collaborators.synapses;

        for_each_cluster(pool, clusters, |cluster| {
            neurons.advance_neurons(cluster, ctx)
        })?;

        // Barrier: every outgoing buffer reaches its destination inbox before any
        // cluster applies its inbox to its ring
        let staged: usize = clusters.iter().map(|c| c.router().outgoing_len()).sum();
        for_each_cluster(pool, clusters, |cluster| {
            cluster.flush_outgoing().map(drop).map_err(EngineError::from)
        })?;
        for_each_cluster(pool, clusters, |cluster| {
            cluster.drain_incoming().map(drop).map_err(EngineError::from)
        })?;
        self.stats.events_relayed += staged as u64;

        // Clusters no longer interact until the next barrier
        for_each_cluster(pool, clusters, |cluster| {
            for offset in 0..ctx.steps {
                synapses.advance_synapses(cluster, &ctx.at_offset(offset))?;
                cluster.advance_ring();
            }
            Ok(())
        })
    }

    fn apply_fan_out(&mut self, fan_out: &[ClusterFanOut]) -> Result<()> {
        for update in fan_out {
            let cluster = self
                .cluster_mut(update.cluster_id)
                .ok_or(EventQueueError::UnknownCluster(update.cluster_id))?;
            cluster
                .router_mut()
                .resize(update.outgoing_capacity, update.incoming_capacity)?;
        }
        if !fan_out.is_empty() {
            debug!("[EPOCH] Resized staging of {} clusters", fan_out.len());
        }
        Ok(())
    }

    fn log_progress(&mut self) {
        let step = self.clock.simulation_step();
        if step < self.next_progress_step {
            return;
        }
        debug!(
            "[EPOCH] Progress: step {} ({:.4} s simulated), epoch {}",
            step,
            self.clock.simulated_seconds(),
            self.clock.epochs_completed() + 1
        );
        self.next_progress_step = (step / PROGRESS_LOG_INTERVAL + 1) * PROGRESS_LOG_INTERVAL;
    }

    /// Abort the run on error: log it, drop any staged events, move to `Terminal`.
    pub(crate) fn abort_on_error<T>(&mut self, operation: &str, result: Result<T>) -> Result<T> {
        if let Err(e) = &result {
            error!(
                "[EPOCH] Aborting run: failed to {} at step {} ({}): {}",
                operation,
                self.clock.simulation_step(),
                self.state,
                e
            );
            for cluster in &mut self.clusters {
                cluster.router_mut().clear_staging();
            }
            self.state = SchedulerState::Terminal;
        }
        result
    }
}

impl fmt::Debug for EpochScheduler {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EpochScheduler")
            .field("state", &self.state)
            .field("clusters", &self.clusters.len())
            .field("steps_per_epoch", &self.steps_per_epoch)
            .field("clock", &self.clock)
            .finish()
    }
}

/// Run `f` on every cluster, on the worker pool when one is configured.
///
/// Returns the first error encountered; with a pool, which cluster's error is reported
/// is unspecified.
fn for_each_cluster<F>(pool: Option<&ThreadPool>, clusters: &mut [Cluster], f: F) -> Result<()>
where
    F: Fn(&mut Cluster) -> Result<()> + Send + Sync,
{
    match pool {
        None => clusters.iter_mut().try_for_each(f),
        Some(pool) => pool.install(|| clusters.par_iter_mut().try_for_each(f)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config(epoch_duration: f64, delay: u64) -> SpikegridConfig {
        let mut config = SpikegridConfig::with_uniform_clusters(2, 8, 4);
        config.simulation.epoch_duration = epoch_duration;
        config.simulation.delta_t = 1.0;
        config.simulation.min_synaptic_trans_delay = delay;
        config.simulation.max_epochs = 2;
        config
    }

    #[test]
    fn test_rejects_invalid_config() {
        let mut bad = config(10.0, 3);
        bad.simulation.delta_t = -1.0;
        assert!(matches!(
            EpochScheduler::new(&bad, Collaborators::quiescent()),
            Err(EngineError::InvalidConfig(_))
        ));
    }

    #[test]
    fn test_state_machine() {
        let mut scheduler = EpochScheduler::new(&config(10.0, 3), Collaborators::quiescent()).unwrap();
        assert_eq!(scheduler.state(), SchedulerState::Idle);
        assert!(matches!(
            scheduler.run_epoch(),
            Err(EngineError::InvalidState {
                state: SchedulerState::Idle,
                ..
            })
        ));

        scheduler.setup().unwrap();
        assert_eq!(scheduler.state(), SchedulerState::Setup);
        assert_eq!(scheduler.clusters().len(), 2);

        assert_eq!(scheduler.run_epoch().unwrap(), vec![3, 3, 3, 1]);
        assert_eq!(scheduler.state(), SchedulerState::GrowthUpdate);
        scheduler.run_epoch().unwrap();
        assert!(matches!(
            scheduler.run_epoch(),
            Err(EngineError::EpochsExhausted(2))
        ));
        // Running out of epochs is not an abort
        assert_eq!(scheduler.state(), SchedulerState::GrowthUpdate);

        scheduler.teardown().unwrap();
        assert_eq!(scheduler.state(), SchedulerState::Terminal);
        assert!(scheduler.clusters().is_empty());
    }

    #[test]
    fn test_reset_restarts_clock() {
        let mut scheduler = EpochScheduler::new(&config(4.0, 4), Collaborators::quiescent()).unwrap();
        scheduler.simulate().unwrap();
        assert_eq!(scheduler.clock().simulation_step(), 8);

        scheduler.reset().unwrap();
        assert_eq!(scheduler.state(), SchedulerState::Setup);
        assert_eq!(scheduler.clock().simulation_step(), 0);
        assert_eq!(scheduler.stats().epochs, 0);
        assert_eq!(scheduler.epochs_remaining(), 2);
        scheduler.teardown().unwrap();
    }

    #[test]
    fn test_ring_advances_once_per_step() {
        let mut scheduler = EpochScheduler::new(&config(10.0, 3), Collaborators::quiescent()).unwrap();
        scheduler.setup().unwrap();
        scheduler.run_epoch().unwrap();
        for cluster in scheduler.clusters() {
            assert_eq!(cluster.queue().pointer(), 10);
        }
        assert_eq!(scheduler.stats().inner_increments, 4);
        assert_eq!(scheduler.stats().simulated_steps, 10);
        scheduler.teardown().unwrap();

        // The pointer wraps on a shorter ring
        let mut short = config(10.0, 3);
        short.simulation.delay_horizon = 8;
        let mut scheduler = EpochScheduler::new(&short, Collaborators::quiescent()).unwrap();
        scheduler.setup().unwrap();
        scheduler.run_epoch().unwrap();
        for cluster in scheduler.clusters() {
            assert_eq!(cluster.queue().pointer(), 2);
        }
        scheduler.teardown().unwrap();
    }
}
