// Copyright 2025 Neuraville Inc.
// SPDX-License-Identifier: Apache-2.0

//! Command-line runner: load a configuration, run every epoch, optionally checkpoint.
//!
//! No neuron or synapse model ships with spikegrid, so clusters run with quiescent
//! collaborators. The runner is useful for validating configurations, measuring
//! scheduling overhead and moving checkpoints between configurations.

use std::collections::HashMap;
use std::env;
use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;
use tracing::{info, warn};

use spikegrid::config::{load_config, validate_config};
use spikegrid::epoch_engine::{Collaborators, EpochScheduler};
use spikegrid::observability::{debug_flags_help, init_logging, parse_debug_flags, ObservabilityConfig};

/// spikegrid runner - epoch-scheduled spiking cluster simulation
#[derive(Parser, Debug)]
#[command(name = "spikegrid-run", version, long_about = None, after_help = debug_flags_help())]
struct Args {
    /// Path to the configuration file (default: search for spikegrid.toml)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Override a configuration key, e.g. `--set simulation.max_epochs=10` (repeatable)
    #[arg(long = "set", value_name = "KEY=VALUE", value_parser = parse_override)]
    overrides: Vec<(String, String)>,

    /// Checkpoint to restore before running (overrides checkpoint.restore_path)
    #[arg(long)]
    restore: Option<PathBuf>,

    /// Where to save a checkpoint after the last epoch (overrides checkpoint.save_path)
    #[arg(long)]
    save: Option<PathBuf>,

    /// Validate the configuration and exit
    #[arg(long, default_value_t = false)]
    check: bool,
}

fn parse_override(raw: &str) -> std::result::Result<(String, String), String> {
    let (key, value) = raw
        .split_once('=')
        .ok_or_else(|| format!("expected KEY=VALUE, got '{}'", raw))?;
    let key = key.trim();
    if key.is_empty() {
        return Err(format!("empty key in '{}'", raw));
    }
    Ok((key.to_string(), value.to_string()))
}

fn main() -> Result<()> {
    // --debug-* flags belong to the logging layer, not to clap
    let args = Args::parse_from(env::args().filter(|arg| !arg.starts_with("--debug-")));
    let debug_flags = parse_debug_flags();

    let overrides: HashMap<String, String> = args.overrides.iter().cloned().collect();
    let config = load_config(args.config.as_deref(), Some(&overrides))
        .context("Failed to load configuration")?;
    validate_config(&config).context("Invalid configuration")?;

    let observability = ObservabilityConfig {
        level: config.logging.level.clone(),
        log_dir: config.logging.log_dir.clone(),
        retention_days: u64::from(config.logging.retention_days),
        ..ObservabilityConfig::default()
    };
    let _logging = init_logging(&debug_flags, &observability)?;

    let steps_per_epoch = config.simulation.steps_per_epoch().unwrap_or_default();
    info!(
        "spikegrid {}: {} clusters, {} epochs of {} steps ({:?} scheduling)",
        spikegrid::VERSION,
        config.clusters.len(),
        config.simulation.max_epochs,
        steps_per_epoch,
        config.simulation.scheduling
    );
    if args.check {
        info!("Configuration is valid");
        return Ok(());
    }

    let restore_path = args.restore.or_else(|| config.checkpoint.restore_path.clone());
    let save_path = args.save.or_else(|| config.checkpoint.save_path.clone());

    let mut scheduler = EpochScheduler::new(&config, Collaborators::quiescent())?;
    scheduler.setup()?;

    if let Some(path) = &restore_path {
        scheduler
            .restore_checkpoint(path)
            .with_context(|| format!("Failed to restore checkpoint {}", path.display()))?;
        if scheduler.epochs_remaining() == 0 {
            warn!(
                "Checkpoint already completed all {} epochs; nothing to run",
                scheduler.max_epochs()
            );
        }
    }

    let stats = scheduler.simulate()?.clone();

    if let Some(path) = &save_path {
        scheduler
            .save_checkpoint(path)
            .with_context(|| format!("Failed to save checkpoint {}", path.display()))?;
    }
    scheduler.teardown()?;

    info!(
        "Run complete: {} epochs, {} increments ({:.2} steps each), {} events relayed, {:.0} us per epoch",
        stats.epochs,
        stats.inner_increments,
        stats.avg_steps_per_increment(),
        stats.events_relayed,
        stats.avg_epoch_time_us()
    );
    Ok(())
}
