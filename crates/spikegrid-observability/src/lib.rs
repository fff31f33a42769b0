// Copyright 2025 Neuraville Inc.
// SPDX-License-Identifier: Apache-2.0

//! # spikegrid-observability
//!
//! Logging setup shared by every spikegrid binary, with per-crate debug flag support.
//!
//! ## Features
//! - `file-logging`: rolling per-crate log files in timestamped run folders

/// Crate version from Cargo.toml
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

pub mod cli;
pub mod config;
pub mod init;

pub use cli::*;
pub use config::*;
pub use init::*;

/// Known spikegrid crate names for debug flags
pub const KNOWN_CRATES: &[&str] = &[
    "spikegrid",
    "spikegrid-npu-events",
    "spikegrid-npu-epoch-engine",
    "spikegrid-config",
];

/// Tracing target for a crate name (`spikegrid-npu-events` -> `spikegrid_npu_events`)
pub fn crate_target(crate_name: &str) -> String {
    crate_name.replace('-', "_")
}
