// Copyright 2025 Neuraville Inc.
// SPDX-License-Identifier: Apache-2.0

//! Simulation clock owned by the scheduler
//!
//! The current step is never global state: collaborators receive a [`StepContext`]
//! describing the increment they are asked to process.

/// Simulated time of one scheduler instance
#[derive(Debug, Clone, PartialEq)]
pub struct SimulationClock {
    simulation_step: u64,
    epochs_completed: u32,
    delta_t: f64,
}

impl SimulationClock {
    pub fn new(delta_t: f64) -> Self {
        Self {
            simulation_step: 0,
            epochs_completed: 0,
            delta_t,
        }
    }

    /// Steps simulated since setup
    pub fn simulation_step(&self) -> u64 {
        self.simulation_step
    }

    pub fn epochs_completed(&self) -> u32 {
        self.epochs_completed
    }

    /// Seconds per step
    pub fn delta_t(&self) -> f64 {
        self.delta_t
    }

    /// Simulated seconds since setup
    pub fn simulated_seconds(&self) -> f64 {
        self.simulation_step as f64 * self.delta_t
    }

    pub(crate) fn advance(&mut self, steps: u64) {
        self.simulation_step += steps;
    }

    pub(crate) fn complete_epoch(&mut self) {
        self.epochs_completed += 1;
    }

    pub(crate) fn restore(&mut self, simulation_step: u64, epochs_completed: u32) {
        self.simulation_step = simulation_step;
        self.epochs_completed = epochs_completed;
    }

    pub(crate) fn reset(&mut self) {
        self.restore(0, 0);
    }
}

/// What a collaborator is asked to process.
///
/// Neuron-advance sees the increment as a whole (`step_offset == 0`, ring pointer at the
/// increment's first step). Synapse-advance is called once per step of the increment,
/// with the ring pointer at `simulation_step`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct StepContext {
    /// Zero-based index of the running epoch
    pub epoch: u32,
    /// Step being processed
    pub simulation_step: u64,
    /// Position of `simulation_step` within the increment
    pub step_offset: u64,
    /// Number of steps covered by this increment
    pub steps: u64,
    /// Seconds per step
    pub delta_t: f64,
}

impl StepContext {
    /// First step of the increment
    pub fn increment_start(&self) -> u64 {
        self.simulation_step - self.step_offset
    }

    /// Context for step `offset` of the same increment
    pub fn at_offset(&self, offset: u64) -> Self {
        Self {
            simulation_step: self.increment_start() + offset,
            step_offset: offset,
            ..*self
        }
    }
}

/// Splits an epoch into inner increments of at most `max_increment` steps.
///
/// `InnerIncrements::new(10, 3)` yields `3, 3, 3, 1`.
#[derive(Debug, Clone)]
pub struct InnerIncrements {
    remaining: u64,
    max_increment: u64,
}

impl InnerIncrements {
    pub fn new(total_steps: u64, max_increment: u64) -> Self {
        Self {
            remaining: total_steps,
            max_increment,
        }
    }
}

impl Iterator for InnerIncrements {
    type Item = u64;

    fn next(&mut self) -> Option<u64> {
        let step = self.remaining.min(self.max_increment);
        if step == 0 {
            return None;
        }
        self.remaining -= step;
        Some(step)
    }
}
