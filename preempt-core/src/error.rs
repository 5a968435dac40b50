//! Configuration errors raised before a simulation is launched.

use thiserror::Error;

use crate::config::Priority;

/// Errors detected while validating a scenario.
///
/// All of these are fatal to the scenario: no replicate is started.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ConfigError {
    /// Offered load meets or exceeds server capacity
    #[error("Unstable system: offered load {load:.4} >= capacity {capacity}")]
    UnstableSystem {
        /// Total offered load across all streams
        load: f64,
        /// Number of server slots
        capacity: usize,
    },

    /// A stream has an infinite mean interarrival or service time
    #[error("Offered load of stream {stream} is undefined (infinite first moment)")]
    UndefinedLoad {
        /// Index of the offending stream
        stream: usize,
    },

    /// Second-moment ratio below one
    #[error("Second-moment ratio K must be at least 1, got {k}")]
    InvalidMomentRatio {
        /// Ratio of second moment to squared first moment
        k: f64,
    },

    /// Probability outside [0, 1]
    #[error("Probability {name} must be within [0, 1], got {value}")]
    ProbabilityOutOfRange {
        /// Parameter name
        name: &'static str,
        /// Rejected value
        value: f64,
    },

    /// Rate, duration or shape parameter is non-positive or not finite
    #[error("Parameter {name} is invalid: {value}")]
    InvalidParameter {
        /// Parameter name
        name: &'static str,
        /// Rejected value
        value: f64,
    },

    /// Trace-driven stream without any periods
    #[error("Trace for stream {stream} is empty")]
    EmptyTrace {
        /// Index of the offending stream
        stream: usize,
    },

    /// Trace whose periods sum to zero length
    #[error("Trace for stream {stream} has zero total cycle length")]
    DegenerateTrace {
        /// Index of the offending stream
        stream: usize,
    },

    /// Server configured without any slots
    #[error("Server capacity must be at least 1")]
    ZeroCapacity,

    /// Scenario declares no priority classes
    #[error("Scenario must declare at least one priority class")]
    NoClasses,

    /// More classes than a priority tag can address
    #[error("Scenario declares {classes} classes; at most {max} are supported")]
    TooManyClasses {
        /// Declared class count
        classes: usize,
        /// Largest supported count
        max: usize,
    },

    /// A stream assigns jobs to a class the scenario does not declare
    #[error("Priority {priority} is out of range for {classes} classes")]
    ClassOutOfRange {
        /// Assigned priority
        priority: Priority,
        /// Declared class count
        classes: usize,
    },

    /// Horizon is non-positive or not finite
    #[error("Simulation horizon must be positive and finite, got {horizon}")]
    InvalidHorizon {
        /// Rejected horizon
        horizon: f64,
    },

    /// Warm-up fraction is negative or not finite
    #[error("Warm-up fraction must be non-negative and finite, got {fraction}")]
    InvalidWarmupFraction {
        /// Rejected fraction
        fraction: f64,
    },

    /// Switchover phases are only defined for a single server
    #[error("Switchover phases require capacity 1, got {capacity}")]
    SwitchoverRequiresSingleServer {
        /// Configured capacity
        capacity: usize,
    },

    /// A phi sweep was requested for a scenario without a split stream
    #[error("Scenario '{scenario}' has no phi-split stream to sweep")]
    NoSplitStream {
        /// Scenario name
        scenario: String,
    },

    /// Replication settings are unusable
    #[error("Invalid replication settings: {reason}")]
    InvalidReplication {
        /// Why the settings were rejected
        reason: String,
    },
}
