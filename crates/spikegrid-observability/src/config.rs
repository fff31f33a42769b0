//! Observability configuration types

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Logging setup requested by a binary
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ObservabilityConfig {
    /// Default level for crates without a debug flag (trace, debug, info, warn, error)
    pub level: String,

    /// Base directory for run folders; console only when `None`
    pub log_dir: Option<PathBuf>,

    /// Remove run folders older than this many days
    pub retention_days: u64,

    /// Keep at most this many run folders
    pub retention_runs: usize,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        ObservabilityConfig {
            level: "info".to_string(),
            log_dir: None,
            retention_days: 30,
            retention_runs: 10,
        }
    }
}
