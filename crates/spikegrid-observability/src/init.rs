// Copyright 2025 Neuraville Inc.
// SPDX-License-Identifier: Apache-2.0

//! Logging initialization for spikegrid binaries
//!
//! Console output is always installed. With the `file-logging` feature and a configured
//! log directory, every run also writes JSON log files into its own timestamped folder:
//! ```text
//! ./logs/
//!   └── run_20250101_120000/
//!       ├── spikegrid-npu-events.log
//!       ├── spikegrid-npu-epoch-engine.log
//!       └── spikegrid.log (combined)
//! ```

use std::path::{Path, PathBuf};

use anyhow::{anyhow, Context, Result};
use chrono::{DateTime, NaiveDateTime, TimeZone, Utc};
use tracing_subscriber::EnvFilter;

use crate::cli::CrateDebugFlags;
use crate::config::ObservabilityConfig;

const RUN_PREFIX: &str = "run_";
const RUN_TIMESTAMP_FORMAT: &str = "%Y%m%d_%H%M%S";
const MAX_RETENTION_DAYS: u64 = 365 * 100;

/// Keeps file writers alive; logs are flushed when dropped
pub struct LoggingGuard {
    #[cfg(feature = "file-logging")]
    _file_guards: Vec<tracing_appender::non_blocking::WorkerGuard>,
    log_dir: Option<PathBuf>,
}

impl LoggingGuard {
    /// Run folder of this process, when file logging is active
    pub fn log_dir(&self) -> Option<&Path> {
        self.log_dir.as_deref()
    }
}

/// Install a console-only subscriber
pub fn init_console_logging(debug_flags: &CrateDebugFlags, level: &str) -> Result<()> {
    let env_filter = EnvFilter::try_new(debug_flags.to_filter_string(level))
        .with_context(|| format!("Invalid log level '{}'", level))?;

    tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_target(false)
        .try_init()
        .map_err(|e| anyhow!("Failed to install tracing subscriber: {}", e))
}

/// Install logging as described by `config`
///
/// Falls back to console-only output when no log directory is configured, or when the
/// crate was built without `file-logging`.
pub fn init_logging(
    debug_flags: &CrateDebugFlags,
    config: &ObservabilityConfig,
) -> Result<LoggingGuard> {
    match &config.log_dir {
        #[cfg(feature = "file-logging")]
        Some(base_log_dir) => init_file_logging(debug_flags, config, base_log_dir),
        #[cfg(not(feature = "file-logging"))]
        Some(base_log_dir) => {
            init_console_logging(debug_flags, &config.level)?;
            tracing::warn!(
                "Log directory {} ignored: built without file-logging",
                base_log_dir.display()
            );
            Ok(LoggingGuard { log_dir: None })
        }
        None => {
            init_console_logging(debug_flags, &config.level)?;
            Ok(LoggingGuard {
                #[cfg(feature = "file-logging")]
                _file_guards: Vec::new(),
                log_dir: None,
            })
        }
    }
}

#[cfg(feature = "file-logging")]
fn init_file_logging(
    debug_flags: &CrateDebugFlags,
    config: &ObservabilityConfig,
    base_log_dir: &Path,
) -> Result<LoggingGuard> {
    use tracing_appender::rolling;
    use tracing_subscriber::layer::SubscriberExt;
    use tracing_subscriber::util::SubscriberInitExt;
    use tracing_subscriber::{Layer, Registry};

    let run_folder = base_log_dir.join(run_folder_name(Utc::now()));
    std::fs::create_dir_all(&run_folder)
        .with_context(|| format!("Failed to create log directory: {}", run_folder.display()))?;
    cleanup_old_logs(
        base_log_dir,
        config.retention_days,
        config.retention_runs,
        Utc::now(),
    )?;

    let env_filter = EnvFilter::try_new(debug_flags.to_filter_string(&config.level))
        .with_context(|| format!("Invalid log level '{}'", config.level))?;

    let mut layers = Vec::new();
    let mut file_guards = Vec::new();

    layers.push(
        tracing_subscriber::fmt::layer()
            .with_target(false)
            .with_filter(env_filter.clone())
            .boxed(),
    );

    // One file per crate
    for crate_name in crate::KNOWN_CRATES {
        let appender = rolling::daily(&run_folder, format!("{}.log", crate_name));
        let (writer, guard) = tracing_appender::non_blocking(appender);
        file_guards.push(guard);

        let filter = EnvFilter::try_new(format!("{}=debug,off", crate::crate_target(crate_name)))
            .with_context(|| format!("Invalid filter for {}", crate_name))?;
        layers.push(
            tracing_subscriber::fmt::layer()
                .with_writer(writer)
                .with_target(true)
                .with_file(true)
                .with_line_number(true)
                .json()
                .with_filter(filter)
                .boxed(),
        );
    }

    let (combined, combined_guard) =
        tracing_appender::non_blocking(rolling::daily(&run_folder, "spikegrid.log"));
    file_guards.push(combined_guard);
    layers.push(
        tracing_subscriber::fmt::layer()
            .with_writer(combined)
            .with_target(true)
            .json()
            .with_filter(env_filter)
            .boxed(),
    );

    Registry::default()
        .with(layers)
        .try_init()
        .map_err(|e| anyhow!("Failed to install tracing subscriber: {}", e))?;

    Ok(LoggingGuard {
        _file_guards: file_guards,
        log_dir: Some(run_folder),
    })
}

/// Folder name for a run started at `started`
pub fn run_folder_name(started: DateTime<Utc>) -> String {
    format!("{}{}", RUN_PREFIX, started.format(RUN_TIMESTAMP_FORMAT))
}

fn parse_run_folder(name: &str) -> Option<DateTime<Utc>> {
    let timestamp = name.strip_prefix(RUN_PREFIX)?;
    let naive = NaiveDateTime::parse_from_str(timestamp, RUN_TIMESTAMP_FORMAT).ok()?;
    Some(Utc.from_utc_datetime(&naive))
}

/// Remove run folders older than `retention_days`, then all but the newest
/// `retention_runs`. Returns the number of folders removed.
pub fn cleanup_old_logs(
    base_log_dir: &Path,
    retention_days: u64,
    retention_runs: usize,
    now: DateTime<Utc>,
) -> Result<usize> {
    if !base_log_dir.exists() {
        return Ok(0);
    }

    let mut runs: Vec<(PathBuf, DateTime<Utc>)> = Vec::new();
    for entry in std::fs::read_dir(base_log_dir)? {
        let path = entry?.path();
        if !path.is_dir() {
            continue;
        }
        let started = path
            .file_name()
            .and_then(|n| n.to_str())
            .and_then(parse_run_folder);
        if let Some(started) = started {
            runs.push((path, started));
        }
    }

    // Newest first
    runs.sort_by(|a, b| b.1.cmp(&a.1));

    let cutoff = now - chrono::Duration::days(retention_days.min(MAX_RETENTION_DAYS) as i64);
    let mut removed = 0;
    for (index, (path, started)) in runs.iter().enumerate() {
        if *started >= cutoff && index < retention_runs {
            continue;
        }
        match std::fs::remove_dir_all(path) {
            Ok(()) => removed += 1,
            Err(e) => eprintln!(
                "Warning: Failed to remove old log directory {}: {}",
                path.display(),
                e
            ),
        }
    }
    Ok(removed)
}
