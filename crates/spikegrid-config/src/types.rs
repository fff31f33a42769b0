// Copyright 2025 Neuraville Inc.
// SPDX-License-Identifier: Apache-2.0

//! Configuration type definitions
//!
//! This module defines all configuration structs that map to sections in
//! `spikegrid.toml`.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};
use spikegrid_npu_events::{ClusterId, MemoryDomain, MAX_DELAY_HORIZON};

/// Root configuration structure
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(default)]
pub struct SpikegridConfig {
    pub system: SystemConfig,
    pub simulation: SimulationConfig,
    pub clusters: Vec<ClusterConfig>,
    pub checkpoint: CheckpointConfig,
    pub logging: LoggingConfig,
}

impl SpikegridConfig {
    /// Configuration with `count` identical host clusters, ids `0..count`
    pub fn with_uniform_clusters(count: u32, synapse_count: usize, fan_out: usize) -> Self {
        Self {
            clusters: (0..count)
                .map(|id| ClusterConfig {
                    id,
                    synapse_count,
                    outgoing_capacity: fan_out,
                    incoming_capacity: fan_out.saturating_mul(count as usize),
                    memory_domain: MemoryDomain::Host,
                })
                .collect(),
            ..Self::default()
        }
    }
}

/// System-level configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct SystemConfig {
    /// Worker threads for parallel scheduling (0 = auto-detect)
    pub max_cores: usize,
    pub data_dir: PathBuf,
}

impl Default for SystemConfig {
    fn default() -> Self {
        Self {
            max_cores: 0,
            data_dir: PathBuf::from(""),
        }
    }
}

/// How neuron-advance is executed across clusters within one increment
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum SchedulingMode {
    /// One cluster after another on the calling thread
    #[default]
    Sequential,
    /// One execution context per cluster
    Parallel,
}

impl std::str::FromStr for SchedulingMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "sequential" => Ok(SchedulingMode::Sequential),
            "parallel" => Ok(SchedulingMode::Parallel),
            other => Err(format!(
                "unknown scheduling mode '{}' (expected sequential or parallel)",
                other
            )),
        }
    }
}

/// Relative slack applied before truncating `epoch_duration / delta_t`
const STEP_RATIO_TOLERANCE: f64 = 1e-9;

/// Simulation timing configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct SimulationConfig {
    /// Simulated seconds per epoch
    pub epoch_duration: f64,
    /// Seconds per simulation step
    pub delta_t: f64,
    pub max_epochs: u32,
    /// Upper bound on one inner increment, in steps
    pub min_synaptic_trans_delay: u64,
    /// Delay ring length L
    pub delay_horizon: u32,
    pub scheduling: SchedulingMode,
}

impl Default for SimulationConfig {
    fn default() -> Self {
        Self {
            epoch_duration: 1.0,
            delta_t: 1e-4,
            max_epochs: 1,
            min_synaptic_trans_delay: 8,
            delay_horizon: MAX_DELAY_HORIZON,
            scheduling: SchedulingMode::Sequential,
        }
    }
}

impl SimulationConfig {
    /// Whole steps per epoch, `epoch_duration / delta_t` truncated.
    ///
    /// A relative tolerance absorbs representation error, so `0.3 / 0.1` is 3 steps
    /// while `0.0015 / 0.001` is 1. `None` when the ratio is not a finite non-negative
    /// number that fits a `u64`.
    pub fn steps_per_epoch(&self) -> Option<u64> {
        let ratio = (self.epoch_duration / self.delta_t * (1.0 + STEP_RATIO_TOLERANCE)).floor();
        if ratio.is_finite() && ratio >= 0.0 && ratio <= u64::MAX as f64 {
            Some(ratio as u64)
        } else {
            None
        }
    }
}

/// One network partition
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct ClusterConfig {
    pub id: u32,
    pub synapse_count: usize,
    /// Worst-case cross-cluster events this cluster stages per increment
    pub outgoing_capacity: usize,
    /// Worst-case relayed events this cluster receives per increment
    pub incoming_capacity: usize,
    pub memory_domain: MemoryDomain,
}

impl Default for ClusterConfig {
    fn default() -> Self {
        Self {
            id: 0,
            synapse_count: 0,
            outgoing_capacity: 0,
            incoming_capacity: 0,
            memory_domain: MemoryDomain::Host,
        }
    }
}

impl ClusterConfig {
    pub fn cluster_id(&self) -> ClusterId {
        ClusterId(self.id)
    }
}

/// Checkpoint file locations
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(default)]
pub struct CheckpointConfig {
    /// Restore this checkpoint before the first epoch
    pub restore_path: Option<PathBuf>,
    /// Save a checkpoint after the last epoch
    pub save_path: Option<PathBuf>,
}

/// Logging configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct LoggingConfig {
    pub level: String,
    /// Write rolling log files under this directory
    pub log_dir: Option<PathBuf>,
    pub retention_days: u32,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            log_dir: None,
            retention_days: 7,
        }
    }
}
