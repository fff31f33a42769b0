// Copyright 2025 Neuraville Inc.
// SPDX-License-Identifier: Apache-2.0

//! Configuration validation
//!
//! A run assumes a statically validated configuration, so everything that can be
//! checked before the first step is checked here.

use std::collections::BTreeSet;

use spikegrid_npu_events::MAX_DELAY_HORIZON;

use crate::{ConfigError, ConfigResult, SpikegridConfig};

/// Validation errors that can occur during config validation
#[derive(Debug, Clone, PartialEq)]
pub enum ConfigValidationError {
    MissingRequired { field: String },
    InvalidValue { field: String, reason: String },
    DuplicateCluster { id: u32 },
}

impl std::fmt::Display for ConfigValidationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::MissingRequired { field } => {
                write!(f, "Missing required configuration: {}", field)
            }
            Self::InvalidValue { field, reason } => {
                write!(f, "Invalid configuration value for {}: {}", field, reason)
            }
            Self::DuplicateCluster { id } => {
                write!(f, "Cluster id {} is configured more than once", id)
            }
        }
    }
}

/// Validate the complete configuration
///
/// # Errors
///
/// Returns `ConfigError::ValidationError` listing every problem found
pub fn validate_config(config: &SpikegridConfig) -> ConfigResult<()> {
    let errors = collect_errors(config);
    if errors.is_empty() {
        return Ok(());
    }

    let error_messages = errors
        .iter()
        .map(|e| format!("  - {}", e))
        .collect::<Vec<_>>()
        .join("\n");
    Err(ConfigError::ValidationError(format!(
        "Configuration validation failed:\n{}",
        error_messages
    )))
}

/// Every validation problem in `config`, in a stable order
pub fn collect_errors(config: &SpikegridConfig) -> Vec<ConfigValidationError> {
    let mut errors = Vec::new();
    validate_timing(config, &mut errors);
    validate_clusters(config, &mut errors);
    errors
}

fn invalid(field: &str, reason: impl Into<String>) -> ConfigValidationError {
    ConfigValidationError::InvalidValue {
        field: field.to_string(),
        reason: reason.into(),
    }
}

fn validate_timing(config: &SpikegridConfig, errors: &mut Vec<ConfigValidationError>) {
    let sim = &config.simulation;

    let epoch_ok = sim.epoch_duration.is_finite() && sim.epoch_duration > 0.0;
    if !epoch_ok {
        errors.push(invalid(
            "simulation.epoch_duration",
            format!("must be a positive number, got {}", sim.epoch_duration),
        ));
    }
    let delta_ok = sim.delta_t.is_finite() && sim.delta_t > 0.0;
    if !delta_ok {
        errors.push(invalid(
            "simulation.delta_t",
            format!("must be a positive number, got {}", sim.delta_t),
        ));
    }
    if epoch_ok && delta_ok && sim.steps_per_epoch().unwrap_or(0) == 0 {
        errors.push(invalid(
            "simulation.epoch_duration",
            format!(
                "{} / {} is less than one step per epoch",
                sim.epoch_duration, sim.delta_t
            ),
        ));
    }

    if sim.max_epochs == 0 {
        errors.push(invalid("simulation.max_epochs", "must be at least 1"));
    }

    if sim.delay_horizon == 0 || sim.delay_horizon > MAX_DELAY_HORIZON {
        errors.push(invalid(
            "simulation.delay_horizon",
            format!(
                "must be in 1..={}, got {}",
                MAX_DELAY_HORIZON, sim.delay_horizon
            ),
        ));
    }

    if sim.min_synaptic_trans_delay == 0 {
        errors.push(invalid(
            "simulation.min_synaptic_trans_delay",
            "must be at least 1 step",
        ));
    } else if sim.min_synaptic_trans_delay > u64::from(sim.delay_horizon) {
        errors.push(invalid(
            "simulation.min_synaptic_trans_delay",
            format!(
                "{} steps exceeds the delay horizon of {}",
                sim.min_synaptic_trans_delay, sim.delay_horizon
            ),
        ));
    }
}

fn validate_clusters(config: &SpikegridConfig, errors: &mut Vec<ConfigValidationError>) {
    if config.clusters.is_empty() {
        errors.push(ConfigValidationError::MissingRequired {
            field: "clusters".to_string(),
        });
        return;
    }

    let mut seen = BTreeSet::new();
    for cluster in &config.clusters {
        if !seen.insert(cluster.id) {
            errors.push(ConfigValidationError::DuplicateCluster { id: cluster.id });
        }
    }
}
