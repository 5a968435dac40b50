//! Engine and statistics errors.

use preempt_core::{ConfigError, Priority};
use thiserror::Error;

use crate::invariants::InvariantViolation;

/// Errors that can occur during simulation.
#[derive(Debug, Error)]
pub enum SimulationError {
    /// Scenario failed validation; no replicate was started
    #[error("Scenario rejected: {0}")]
    ConfigRejected(#[from] ConfigError),

    /// Event could not be scheduled properly
    #[error("Invalid event scheduling: {reason}")]
    InvalidEventScheduling {
        /// Reason why scheduling failed
        reason: String,
    },

    /// Event queue exceeded maximum capacity
    #[error("Event queue overflow: {count} events scheduled")]
    EventQueueOverflow {
        /// Number of events pending when the limit was hit
        count: usize,
    },

    /// A runtime invariant failed; this is an engine bug
    #[error("{0}")]
    InvariantViolated(InvariantViolation),
}

/// Errors raised when reading per-class accumulators.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum StatisticsError {
    /// The class recorded no completions inside the measurement window
    #[error("Class {class} has no completions after warm-up; mean is undefined")]
    NoSamples {
        /// Class without samples
        class: Priority,
    },
}
