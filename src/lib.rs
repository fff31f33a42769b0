//! # spikegrid - partitioned spiking network simulation
//!
//! A network is split into clusters. Each cluster owns a delay ring event queue for its
//! synapses and a router that stages spikes bound for other clusters. An epoch scheduler
//! advances every cluster in inner increments no longer than the minimum synaptic
//! transmission delay, so a relayed spike always reaches its destination before it is due.
//!
//! ## Quick Start
//!
//! ```toml
//! [dependencies]
//! spikegrid = "0.0.1-beta.18"
//! ```
//!
//! ```rust
//! use spikegrid::prelude::*;
//!
//! let mut config = SpikegridConfig::with_uniform_clusters(4, 1024, 64);
//! config.simulation.epoch_duration = 0.01;
//! config.simulation.delta_t = 1e-4;
//! config.simulation.min_synaptic_trans_delay = 8;
//!
//! let mut scheduler = EpochScheduler::new(&config, Collaborators::quiescent())?;
//! let stats = scheduler.simulate()?;
//! assert_eq!(stats.simulated_steps, 100);
//! scheduler.teardown()?;
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────┐
//! │  Foundation: spikegrid-config                           │
//! │  (TOML configuration, overrides, validation)            │
//! └─────────────────────────────────────────────────────────┘
//!                         ↓
//! ┌─────────────────────────────────────────────────────────┐
//! │  Events: spikegrid-npu-events                           │
//! │  (Delay rings, staging buffers, device mirrors)         │
//! └─────────────────────────────────────────────────────────┘
//!                         ↓
//! ┌─────────────────────────────────────────────────────────┐
//! │  Scheduling: spikegrid-npu-epoch-engine                 │
//! │  (Clusters, inner increments, checkpoints)              │
//! └─────────────────────────────────────────────────────────┘
//! ```
//!
//! Logging setup for binaries lives in `spikegrid-observability`.

pub use spikegrid_config as config;
pub use spikegrid_npu_epoch_engine as epoch_engine;
pub use spikegrid_npu_events as events;
pub use spikegrid_observability as observability;

/// Prelude for common imports
pub mod prelude {
    pub use crate::config::{load_config, validate_config, SchedulingMode, SpikegridConfig};
    pub use crate::epoch_engine::{
        Cluster, ClusterFanOut, Collaborators, ConnectivityGrowth, EngineError, EpochScheduler,
        HistoryRecorder, NeuronAdvance, SchedulerState, SchedulerStats, StepContext,
        SynapseAdvance,
    };
    pub use crate::events::{
        ClusterEventRouter, ClusterId, DelayRingEventQueue, EventHandler, EventQueueError,
        MemoryDomain,
    };
}

/// Version information
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
