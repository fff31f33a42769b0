//! CLI argument parsing for per-crate debug flags
//!
//! Supports flags like `--debug-spikegrid-npu-events` and `--debug-all`.

use std::collections::BTreeSet;
use std::env;

use crate::{crate_target, KNOWN_CRATES};

/// Per-crate debug flags
///
/// # Example
/// ```rust
/// use spikegrid_observability::CrateDebugFlags;
///
/// let flags = CrateDebugFlags::from_args(vec!["--debug-spikegrid-config".to_string()]);
/// assert!(flags.is_enabled("spikegrid-config"));
/// ```
#[derive(Debug, Clone, Default)]
pub struct CrateDebugFlags {
    pub enabled_crates: BTreeSet<String>,
}

impl CrateDebugFlags {
    /// Parse debug flags from command-line arguments
    ///
    /// Looks for arguments matching `--debug-{crate-name}`.
    /// `--debug-all` enables every crate in `KNOWN_CRATES`.
    pub fn from_args<I>(args: I) -> Self
    where
        I: IntoIterator<Item = String>,
    {
        let mut flags = CrateDebugFlags::default();
        for arg in args {
            if arg == "--debug-all" {
                flags.enable_all();
            } else if let Some(crate_name) = arg.strip_prefix("--debug-") {
                flags.enabled_crates.insert(crate_name.to_string());
            }
        }
        flags
    }

    pub fn enable_all(&mut self) {
        self.enabled_crates
            .extend(KNOWN_CRATES.iter().map(|name| name.to_string()));
    }

    pub fn is_enabled(&self, crate_name: &str) -> bool {
        self.enabled_crates.contains(crate_name)
    }

    pub fn any_enabled(&self) -> bool {
        !self.enabled_crates.is_empty()
    }

    /// `DEBUG` for enabled crates, `INFO` otherwise
    pub fn log_level(&self, crate_name: &str) -> tracing::Level {
        if self.is_enabled(crate_name) {
            tracing::Level::DEBUG
        } else {
            tracing::Level::INFO
        }
    }

    /// Filter string for `EnvFilter`
    ///
    /// Format: `spikegrid_npu_events=debug,info`, or just the default level when no
    /// crate is enabled.
    pub fn to_filter_string(&self, default_level: &str) -> String {
        let mut filters: Vec<String> = self
            .enabled_crates
            .iter()
            .map(|name| format!("{}=debug", crate_target(name)))
            .collect();
        filters.push(default_level.to_string());
        filters.join(",")
    }
}

/// Debug flags from the process arguments plus the `SPIKEGRID_DEBUG` environment variable
///
/// Environment variable format: comma-separated crate names, or `all`.
pub fn parse_debug_flags() -> CrateDebugFlags {
    let mut flags = CrateDebugFlags::from_args(env::args());

    if let Ok(env_var) = env::var("SPIKEGRID_DEBUG") {
        if env_var == "all" {
            flags.enable_all();
        } else {
            flags.enabled_crates.extend(
                env_var
                    .split(',')
                    .map(str::trim)
                    .filter(|name| !name.is_empty())
                    .map(str::to_string),
            );
        }
    }

    flags
}

/// Help text for debug flags
pub fn debug_flags_help() -> String {
    format!(
        r#"Debug Flags:
  --debug-all                    Enable debug logging for all crates
  --debug-{{crate-name}}          Enable debug logging for specific crate

Available crates:
  {}

Environment Variable:
  SPIKEGRID_DEBUG={{crate-name}}[,{{crate-name}}]
  SPIKEGRID_DEBUG=all
"#,
        KNOWN_CRATES.join(", ")
    )
}
