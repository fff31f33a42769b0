// Copyright 2025 Neuraville Inc.
// SPDX-License-Identifier: Apache-2.0

//! Error types for the epoch scheduler

use spikegrid_npu_events::EventQueueError;
use thiserror::Error;

use crate::scheduler::SchedulerState;

/// Scheduler errors
///
/// Every error raised while stepping aborts the run. Only a restore-time mismatch
/// between a checkpoint and the configured clusters is recoverable.
#[derive(Error, Debug)]
pub enum EngineError {
    #[error(transparent)]
    Events(#[from] EventQueueError),

    #[error("cannot {operation} while scheduler is {state}")]
    InvalidState {
        operation: &'static str,
        state: SchedulerState,
    },

    #[error("all {0} configured epochs have already run")]
    EpochsExhausted(u32),

    #[error("{collaborator} collaborator failed: {reason}")]
    Collaborator {
        collaborator: &'static str,
        reason: String,
    },

    #[error("checkpoint does not match configured clusters: {0}")]
    TopologyMismatch(String),

    #[error("checkpoint error: {0}")]
    Checkpoint(String),

    #[error("Invalid magic number: expected SPKGQ, got {0:?}")]
    InvalidMagic([u8; 5]),

    #[error("Version mismatch: file version {file_version}, expected {expected_version}")]
    VersionMismatch {
        file_version: u32,
        expected_version: u32,
    },

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("invalid configuration: {0}")]
    InvalidConfig(String),
}

impl EngineError {
    /// True when the caller may retry with a different checkpoint/configuration pairing
    pub fn is_recoverable(&self) -> bool {
        match self {
            EngineError::Events(e) => e.is_recoverable(),
            EngineError::TopologyMismatch(_) => true,
            _ => false,
        }
    }

    /// Wrap a failure reported by a collaborator
    pub fn collaborator(collaborator: &'static str, reason: impl Into<String>) -> Self {
        EngineError::Collaborator {
            collaborator,
            reason: reason.into(),
        }
    }
}

impl From<bincode::Error> for EngineError {
    fn from(err: bincode::Error) -> Self {
        EngineError::Checkpoint(err.to_string())
    }
}

pub type Result<T> = std::result::Result<T, EngineError>;
