// Copyright 2025 Neuraville Inc.
// SPDX-License-Identifier: Apache-2.0

//! End-to-end: TOML configuration through the umbrella crate to a checkpointed run.

use std::collections::HashMap;
use std::fs;
use std::sync::Arc;

use parking_lot::Mutex;
use spikegrid::epoch_engine::Result;
use spikegrid::prelude::*;
use tempfile::TempDir;

const CONFIG: &str = r#"
[simulation]
epoch_duration = 0.002
delta_t = 1e-4
max_epochs = 2
min_synaptic_trans_delay = 6
delay_horizon = 16
scheduling = "parallel"

[system]
max_cores = 2

[[clusters]]
id = 0
synapse_count = 128
outgoing_capacity = 16
incoming_capacity = 16

[[clusters]]
id = 1
synapse_count = 96
outgoing_capacity = 16
incoming_capacity = 16
memory_domain = "device"
"#;

/// Records (cluster, slot, step) for every event consumed
struct Consumed(Arc<Mutex<Vec<(ClusterId, usize, u64)>>>);

impl SynapseAdvance for Consumed {
    fn advance_synapses(&self, cluster: &mut Cluster, ctx: &StepContext) -> Result<()> {
        for slot in 0..cluster.synapse_count() {
            if cluster.queue_mut().consume_at_current(slot)? {
                self.0.lock().push((cluster.id(), slot, ctx.simulation_step));
            }
        }
        Ok(())
    }
}

#[test]
fn test_configured_run_checkpoints_and_resumes() {
    let dir = TempDir::new().unwrap();
    let config_path = dir.path().join("spikegrid.toml");
    let checkpoint = dir.path().join("after-two.spkg");
    fs::write(&config_path, CONFIG).unwrap();

    let config = load_config(Some(config_path.as_path()), None).unwrap();
    validate_config(&config).unwrap();
    assert_eq!(config.simulation.scheduling, SchedulingMode::Parallel);
    assert_eq!(config.clusters[1].memory_domain, MemoryDomain::Device);

    let mut first = EpochScheduler::new(&config, Collaborators::quiescent()).unwrap();
    first.setup().unwrap();
    assert_eq!(first.run_epoch().unwrap(), vec![6, 6, 6, 2]);
    first.simulate().unwrap();
    first
        .cluster_mut(ClusterId(1))
        .unwrap()
        .queue_mut()
        .schedule_with_delay(95, 12)
        .unwrap();
    first.save_checkpoint(&checkpoint).unwrap();
    first.teardown().unwrap();

    let overrides: HashMap<String, String> =
        [("simulation.max_epochs".to_string(), "3".to_string())].into();
    let config = load_config(Some(config_path.as_path()), Some(&overrides)).unwrap();
    let consumed = Arc::new(Mutex::new(Vec::new()));
    let collaborators = Collaborators::quiescent().with_synapses(Consumed(consumed.clone()));
    let mut resumed = EpochScheduler::new(&config, collaborators).unwrap();
    resumed.setup().unwrap();
    resumed.restore_checkpoint(&checkpoint).unwrap();
    assert_eq!(resumed.clock().simulation_step(), 40);
    assert_eq!(resumed.epochs_remaining(), 1);
    assert!(resumed
        .cluster(ClusterId(1))
        .unwrap()
        .queue()
        .is_pending(95, 12)
        .unwrap());

    let stats = resumed.simulate().unwrap();
    assert_eq!(stats.epochs, 1);
    assert_eq!(stats.simulated_steps, 20);
    assert_eq!(resumed.clock().simulation_step(), 60);
    // Twelve steps after the checkpoint, inside the third increment of six
    assert_eq!(*consumed.lock(), vec![(ClusterId(1), 95, 52)]);
    resumed.teardown().unwrap();
}

#[test]
fn test_invalid_configuration_is_reported() {
    let dir = TempDir::new().unwrap();
    let config_path = dir.path().join("spikegrid.toml");
    fs::write(&config_path, CONFIG.replace("delay_horizon = 16", "delay_horizon = 4")).unwrap();

    let config = load_config(Some(config_path.as_path()), None).unwrap();
    let err = validate_config(&config).unwrap_err().to_string();
    assert!(err.contains("delay horizon"), "{}", err);
    assert!(matches!(
        EpochScheduler::new(&config, Collaborators::quiescent()),
        Err(EngineError::InvalidConfig(_))
    ));
}
