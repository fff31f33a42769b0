// Copyright 2025 Neuraville Inc.
// SPDX-License-Identifier: Apache-2.0

//! Configuration file loading with override support
//!
//! Three tiers, later tiers winning:
//! 1. TOML file (base values)
//! 2. Environment variables (runtime overrides)
//! 3. CLI arguments (explicit user overrides)

use crate::{ConfigError, ConfigResult, SchedulingMode, SpikegridConfig};
use std::collections::HashMap;
use std::env;
use std::fs;
use std::path::{Path, PathBuf};

const CONFIG_FILE_NAME: &str = "spikegrid.toml";

/// Find the spikegrid configuration file
///
/// Search order:
/// 1. `SPIKEGRID_CONFIG_PATH` environment variable
/// 2. Current working directory: `./spikegrid.toml`
/// 3. Up to five parent directories
///
/// # Errors
///
/// Returns `ConfigError::FileNotFound` if no config file is found in any location
pub fn find_config_file() -> ConfigResult<PathBuf> {
    if let Ok(env_path) = env::var("SPIKEGRID_CONFIG_PATH") {
        let path = PathBuf::from(env_path);
        if path.exists() {
            return Ok(path);
        }
        return Err(ConfigError::FileNotFound(format!(
            "Config file specified by SPIKEGRID_CONFIG_PATH not found: {}",
            path.display()
        )));
    }

    let mut search_paths = Vec::new();
    if let Ok(cwd) = env::current_dir() {
        search_paths.push(cwd.join(CONFIG_FILE_NAME));
        search_paths.extend(
            cwd.ancestors()
                .skip(1)
                .take(5)
                .map(|dir| dir.join(CONFIG_FILE_NAME)),
        );
    }

    if let Some(path) = search_paths.iter().find(|path| path.exists()) {
        return Ok(path.clone());
    }

    let search_list = search_paths
        .iter()
        .map(|p| format!("  - {}", p.display()))
        .collect::<Vec<_>>()
        .join("\n");

    Err(ConfigError::FileNotFound(format!(
        "'{}' not found in any of these locations:\n{}\n\nSet SPIKEGRID_CONFIG_PATH to specify a custom location.",
        CONFIG_FILE_NAME, search_list
    )))
}

/// Load configuration from a TOML file
///
/// # Arguments
///
/// * `config_path` - Optional path to config file. If `None`, the file is searched for.
/// * `cli_args` - Optional CLI overrides keyed by dotted path (`simulation.max_epochs`)
///
/// # Errors
///
/// Returns an error if the file is missing, contains invalid TOML, or an override
/// value cannot be parsed. Validation is a separate step (`validate_config`).
pub fn load_config(
    config_path: Option<&Path>,
    cli_args: Option<&HashMap<String, String>>,
) -> ConfigResult<SpikegridConfig> {
    let config_file = match config_path {
        Some(path) => path.to_path_buf(),
        None => find_config_file()?,
    };

    let content = fs::read_to_string(&config_file)?;
    let mut config: SpikegridConfig = toml::from_str(&content)?;

    apply_environment_overrides(&mut config)?;
    if let Some(cli) = cli_args {
        apply_cli_overrides(&mut config, cli)?;
    }

    Ok(config)
}

fn parse_value<T>(key: &str, value: &str) -> ConfigResult<T>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    value
        .trim()
        .parse::<T>()
        .map_err(|e| ConfigError::InvalidValue(format!("{} = '{}': {}", key, value, e)))
}

/// Set one dotted key on the configuration
fn apply_override(config: &mut SpikegridConfig, key: &str, value: &str) -> ConfigResult<()> {
    match key {
        "simulation.epoch_duration" => config.simulation.epoch_duration = parse_value(key, value)?,
        "simulation.delta_t" => config.simulation.delta_t = parse_value(key, value)?,
        "simulation.max_epochs" => config.simulation.max_epochs = parse_value(key, value)?,
        "simulation.min_synaptic_trans_delay" => {
            config.simulation.min_synaptic_trans_delay = parse_value(key, value)?
        }
        "simulation.delay_horizon" => config.simulation.delay_horizon = parse_value(key, value)?,
        "simulation.scheduling" => {
            config.simulation.scheduling = parse_value::<SchedulingMode>(key, value)?
        }
        "system.max_cores" => config.system.max_cores = parse_value(key, value)?,
        "system.data_dir" => config.system.data_dir = PathBuf::from(value),
        "checkpoint.restore_path" => config.checkpoint.restore_path = Some(PathBuf::from(value)),
        "checkpoint.save_path" => config.checkpoint.save_path = Some(PathBuf::from(value)),
        "logging.level" => config.logging.level = value.to_string(),
        "logging.log_dir" => config.logging.log_dir = Some(PathBuf::from(value)),
        "logging.retention_days" => config.logging.retention_days = parse_value(key, value)?,
        other => {
            return Err(ConfigError::InvalidValue(format!(
                "unknown configuration key '{}'",
                other
            )))
        }
    }
    Ok(())
}

/// Environment variable -> dotted configuration key
const ENV_OVERRIDES: &[(&str, &str)] = &[
    ("SPIKEGRID_EPOCH_DURATION", "simulation.epoch_duration"),
    ("SPIKEGRID_DELTA_T", "simulation.delta_t"),
    ("SPIKEGRID_MAX_EPOCHS", "simulation.max_epochs"),
    (
        "SPIKEGRID_MIN_SYNAPTIC_TRANS_DELAY",
        "simulation.min_synaptic_trans_delay",
    ),
    ("SPIKEGRID_SCHEDULING", "simulation.scheduling"),
    ("SPIKEGRID_MAX_CORES", "system.max_cores"),
    ("SPIKEGRID_LOG_LEVEL", "logging.level"),
];

/// Apply environment variable overrides to configuration
///
/// Supported environment variables:
/// - `SPIKEGRID_EPOCH_DURATION` -> `simulation.epoch_duration`
/// - `SPIKEGRID_DELTA_T` -> `simulation.delta_t`
/// - `SPIKEGRID_MAX_EPOCHS` -> `simulation.max_epochs`
/// - `SPIKEGRID_MIN_SYNAPTIC_TRANS_DELAY` -> `simulation.min_synaptic_trans_delay`
/// - `SPIKEGRID_SCHEDULING` -> `simulation.scheduling`
/// - `SPIKEGRID_MAX_CORES` -> `system.max_cores`
/// - `SPIKEGRID_LOG_LEVEL` -> `logging.level`
pub fn apply_environment_overrides(config: &mut SpikegridConfig) -> ConfigResult<()> {
    for (var, key) in ENV_OVERRIDES {
        if let Ok(value) = env::var(var) {
            apply_override(config, key, &value)?;
        }
    }
    Ok(())
}

/// Apply CLI argument overrides to configuration
///
/// # Arguments
///
/// * `config` - Configuration to modify
/// * `cli_args` - dotted keys to values (e.g., `{"simulation.max_epochs": "20"}`)
pub fn apply_cli_overrides(
    config: &mut SpikegridConfig,
    cli_args: &HashMap<String, String>,
) -> ConfigResult<()> {
    // Sorted so a failure always names the same key
    let mut keys: Vec<&String> = cli_args.keys().collect();
    keys.sort();
    for key in keys {
        apply_override(config, key, &cli_args[key])?;
    }
    Ok(())
}
