// Copyright 2025 Neuraville Inc.
// SPDX-License-Identifier: Apache-2.0

/*
 * Copyright 2025 Neuraville Inc.
 *
 * Licensed under the Apache License, Version 2.0 (the "License");
 * you may not use this file except in compliance with the License.
 * You may obtain a copy of the License at
 *
 *     http://www.apache.org/licenses/LICENSE-2.0
 *
 * Unless required by applicable law or agreed to in writing, software
 * distributed under the License is distributed on an "AS IS" BASIS,
 * WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
 * See the License for the specific language governing permissions and
 * limitations under the License.
 */

//! # spikegrid epoch engine
//!
//! Steps a partitioned spiking network forward in bounded inner increments and
//! reorganises connectivity between epochs.
//!
//! ## Architecture
//! - [`EpochScheduler`] owns every [`Cluster`] and the [`SimulationClock`]
//! - Neuron and synapse models plug in through [`NeuronAdvance`] / [`SynapseAdvance`]
//! - Rayon runs per-cluster phases concurrently in parallel scheduling
//! - Whole-simulation checkpoints use bincode behind a versioned header
//!
//! ## Usage
//! ```rust
//! use spikegrid_config::SpikegridConfig;
//! use spikegrid_npu_epoch_engine::{Collaborators, EpochScheduler};
//!
//! let mut config = SpikegridConfig::with_uniform_clusters(2, 64, 8);
//! config.simulation.epoch_duration = 10.0;
//! config.simulation.delta_t = 1.0;
//! config.simulation.min_synaptic_trans_delay = 3;
//!
//! let mut scheduler = EpochScheduler::new(&config, Collaborators::quiescent()).unwrap();
//! scheduler.setup().unwrap();
//! assert_eq!(scheduler.run_epoch().unwrap(), vec![3, 3, 3, 1]);
//! scheduler.teardown().unwrap();
//! ```

/// Crate version from Cargo.toml
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

pub mod checkpoint;
pub mod clock;
pub mod cluster;
pub mod collaborators;
pub mod error;
pub mod scheduler;

pub use checkpoint::{read_snapshot, write_snapshot, ClusterSnapshot, SimulationSnapshot};
pub use clock::{InnerIncrements, SimulationClock, StepContext};
pub use cluster::Cluster;
pub use collaborators::{
    ClusterFanOut, Collaborators, ConnectivityGrowth, HistoryRecorder, NeuronAdvance, Quiescent,
    SynapseAdvance,
};
pub use error::{EngineError, Result};
pub use scheduler::{EpochScheduler, SchedulerState, PROGRESS_LOG_INTERVAL};
pub use spikegrid_config::SchedulingMode;

/// Scheduler performance statistics
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SchedulerStats {
    pub epochs: u64,
    pub inner_increments: u64,
    pub simulated_steps: u64,
    /// Cross-cluster events relayed through router barriers
    pub events_relayed: u64,
    pub stepping_time_us: u64,
    /// Time spent in connectivity growth and history recording
    pub update_time_us: u64,
}

impl SchedulerStats {
    /// Average steps covered by one inner increment
    pub fn avg_steps_per_increment(&self) -> f64 {
        if self.inner_increments == 0 {
            0.0
        } else {
            self.simulated_steps as f64 / self.inner_increments as f64
        }
    }

    /// Average cross-cluster events relayed per increment
    pub fn avg_relayed_per_increment(&self) -> f64 {
        if self.inner_increments == 0 {
            0.0
        } else {
            self.events_relayed as f64 / self.inner_increments as f64
        }
    }

    /// Average wall time per epoch, stepping plus update (microseconds)
    pub fn avg_epoch_time_us(&self) -> f64 {
        if self.epochs == 0 {
            0.0
        } else {
            (self.stepping_time_us + self.update_time_us) as f64 / self.epochs as f64
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_scheduler_stats() {
        let stats = SchedulerStats {
            epochs: 2,
            inner_increments: 8,
            simulated_steps: 20,
            events_relayed: 40,
            stepping_time_us: 900,
            update_time_us: 100,
        };

        assert_eq!(stats.avg_steps_per_increment(), 2.5);
        assert_eq!(stats.avg_relayed_per_increment(), 5.0);
        assert_eq!(stats.avg_epoch_time_us(), 500.0);
        assert_eq!(SchedulerStats::default().avg_epoch_time_us(), 0.0);
    }
}
