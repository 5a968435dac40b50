//! Preempt Core - shared vocabulary for the priority-preemption simulator
//!
//! Scenario configuration, random-variate distributions, seeded random number
//! generation, configuration errors and tracing setup. The event engine lives
//! in `preempt-sim`.

#![warn(missing_docs)]

pub mod config;
pub mod distribution;
pub mod error;
pub mod rng;
pub mod tracing_setup;

pub use config::{
    ArrivalStreamConfig, ClassAssignment, Discipline, MAX_CLASSES, Priority, ReplicationConfig,
    ScenarioBuilder, ScenarioConfig, SetupTrigger, SwitchoverConfig, TracePeriod, WaitMeasure,
};
pub use distribution::{Distribution, Sampler};
pub use error::ConfigError;
pub use rng::DeterministicRng;

/// Errors surfaced to callers that load and run scenarios.
#[derive(Debug, thiserror::Error)]
pub enum PreemptError {
    /// Scenario rejected during validation
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    /// Scenario file could not be read or written
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Scenario file is not valid JSON for a scenario
    #[error("Scenario format error: {0}")]
    Format(#[from] serde_json::Error),
}

impl PreemptError {
    /// Returns a user-friendly error message suitable for display.
    pub fn user_message(&self) -> String {
        match self {
            PreemptError::Config(e) => match e {
                ConfigError::UnstableSystem { load, capacity } => format!(
                    "The system is unstable: offered load {load:.3} needs more than {capacity} server(s)"
                ),
                ConfigError::InvalidMomentRatio { k } => {
                    format!("Service second-moment ratio must be at least 1 (got {k})")
                }
                ConfigError::ProbabilityOutOfRange { name, value } => {
                    format!("{name} must be a probability between 0 and 1 (got {value})")
                }
                other => format!("Invalid scenario: {other}"),
            },
            PreemptError::Io(_) => "Could not access the scenario file".to_string(),
            PreemptError::Format(e) => format!("Scenario file is malformed: {e}"),
        }
    }

    /// Checks if this error is due to user input validation.
    pub fn is_user_error(&self) -> bool {
        matches!(self, PreemptError::Config(_) | PreemptError::Format(_))
    }
}

/// Result alias for fallible core operations.
pub type Result<T> = std::result::Result<T, PreemptError>;

/// Reads and validates a scenario from a JSON file.
///
/// # Errors
///
/// - `PreemptError::Io` - If the file cannot be read
/// - `PreemptError::Format` - If the contents are not a scenario
/// - `PreemptError::Config` - If the scenario fails validation
pub fn load_scenario(path: &std::path::Path) -> Result<ScenarioConfig> {
    let contents = std::fs::read_to_string(path)?;
    let config: ScenarioConfig = serde_json::from_str(&contents)?;
    let config = config.with_env_overrides();
    config.validate()?;
    Ok(config)
}
