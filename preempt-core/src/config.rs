//! Scenario configuration.
//!
//! A [`ScenarioConfig`] is built once per scenario, validated, and then passed
//! by reference to every replicate. Nothing in the engine mutates it.

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::distribution::{Distribution, require_probability};
use crate::error::ConfigError;

/// Class tag. Lower values are served first; class 0 is the incumbent.
pub type Priority = u8;

/// Largest class count a [`Priority`] can address.
pub const MAX_CLASSES: usize = Priority::MAX as usize + 1;

/// How a completed job's wait is measured.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WaitMeasure {
    /// Completion minus arrival
    #[default]
    FlowTime,
    /// Flow time minus the job's original service requirement
    QueueingDelay,
}

/// Whether a higher class interrupts a job already in service.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Discipline {
    /// A strictly higher class takes the slot; the victim resumes later
    #[default]
    PreemptiveResume,
    /// Service runs to completion; priority only orders the queue
    NonPreemptive,
}

/// Class chosen for each arrival of a renewal stream.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "mode", rename_all = "snake_case")]
pub enum ClassAssignment {
    /// Every arrival joins the same class
    Fixed {
        /// Class of every arrival
        priority: Priority,
    },
    /// Each arrival independently joins `high` with probability `phi`
    Split {
        /// Probability of joining the higher class
        phi: f64,
        /// Higher class
        high: Priority,
        /// Lower class
        low: Priority,
    },
}

/// One off/on pair of a trace-driven stream.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TracePeriod {
    /// Gap before the visit
    pub off: f64,
    /// Service demanded by the visit
    pub on: f64,
}

/// Source of jobs.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ArrivalStreamConfig {
    /// Independent interarrival and service draws
    Renewal {
        /// Interarrival time distribution
        interarrival: Distribution,
        /// Service time distribution
        service: Distribution,
        /// Class selection per arrival
        classes: ClassAssignment,
    },
    /// Alternating off/on durations replayed with wraparound
    Trace {
        /// Ordered periods
        periods: Vec<TracePeriod>,
        /// Class of every visit
        priority: Priority,
    },
}

impl ArrivalStreamConfig {
    /// Long-run fraction of one server this stream keeps busy.
    ///
    /// # Errors
    ///
    /// - `ConfigError::UndefinedLoad` - If a first moment is infinite
    /// - `ConfigError::DegenerateTrace` - If a trace cycle has zero length
    pub fn offered_load(&self, stream: usize) -> Result<f64, ConfigError> {
        match self {
            Self::Renewal {
                interarrival,
                service,
                ..
            } => {
                let gap = interarrival
                    .mean()
                    .ok_or(ConfigError::UndefinedLoad { stream })?;
                let work = service.mean().ok_or(ConfigError::UndefinedLoad { stream })?;
                if gap <= 0.0 {
                    return Err(ConfigError::UndefinedLoad { stream });
                }
                Ok(work / gap)
            }
            Self::Trace { periods, .. } => {
                let on: f64 = periods.iter().map(|p| p.on).sum();
                let cycle: f64 = periods.iter().map(|p| p.on + p.off).sum();
                if cycle <= 0.0 {
                    return Err(ConfigError::DegenerateTrace { stream });
                }
                Ok(on / cycle)
            }
        }
    }

    fn validate(&self, stream: usize, classes: usize) -> Result<(), ConfigError> {
        match self {
            Self::Renewal {
                interarrival,
                service,
                classes: assignment,
            } => {
                interarrival.validate()?;
                service.validate()?;
                match *assignment {
                    ClassAssignment::Fixed { priority } => check_class(priority, classes)?,
                    ClassAssignment::Split { phi, high, low } => {
                        require_probability("phi", phi)?;
                        check_class(high, classes)?;
                        check_class(low, classes)?;
                    }
                }
            }
            Self::Trace { periods, priority } => {
                if periods.is_empty() {
                    return Err(ConfigError::EmptyTrace { stream });
                }
                for period in periods {
                    for (name, value) in [("trace.off", period.off), ("trace.on", period.on)] {
                        if !value.is_finite() || value < 0.0 {
                            return Err(ConfigError::InvalidParameter { name, value });
                        }
                    }
                }
                check_class(*priority, classes)?;
            }
        }
        Ok(())
    }
}

fn check_class(priority: Priority, classes: usize) -> Result<(), ConfigError> {
    if usize::from(priority) >= classes {
        return Err(ConfigError::ClassOutOfRange { priority, classes });
    }
    Ok(())
}

/// When a setup phase is inserted in front of service.
///
/// Every variant is interrupted by a job of a strictly higher class than the
/// one it is setting up for. An interrupted setup restarts from scratch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SetupTrigger {
    /// After the last queued job of `class` or above departs; blocks lower classes
    #[default]
    AfterBusyPeriod,
    /// Before every service quantum of a job of `class` or below
    BeforeEachService,
    /// Before the first job below `class` served since the last job of `class` or above
    BusyPeriodStart,
}

/// Setup phase configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SwitchoverConfig {
    /// Class the trigger is defined against
    pub class: Priority,
    /// Setup length
    pub duration: Distribution,
    /// When the setup runs
    #[serde(default)]
    pub trigger: SetupTrigger,
}

/// Immutable parameters of one scenario.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScenarioConfig {
    /// Label used in logs and reports
    pub name: String,
    /// Number of priority classes
    pub classes: usize,
    /// Number of server slots
    pub capacity: usize,
    /// Whether arrivals preempt jobs in service
    pub discipline: Discipline,
    /// Simulated time at which dispatch stops
    pub horizon: f64,
    /// Fraction of the horizon discarded as warm-up
    pub warmup_fraction: f64,
    /// Random seed of the first replicate
    pub seed: u64,
    /// Wait definition used by the collector
    pub wait_measure: WaitMeasure,
    /// Job sources
    pub streams: Vec<ArrivalStreamConfig>,
    /// Optional setup phase
    pub switchover: Option<SwitchoverConfig>,
    /// Check runtime invariants after every event
    pub check_invariants: bool,
    /// Number of departures kept for inspection (0 disables the log)
    pub departure_log_limit: usize,
}

impl Default for ScenarioConfig {
    fn default() -> Self {
        Self {
            name: "scenario".to_string(),
            classes: 1,
            capacity: 1,
            discipline: Discipline::PreemptiveResume,
            horizon: 10_000.0,
            warmup_fraction: 0.05,
            seed: 42,
            wait_measure: WaitMeasure::FlowTime,
            streams: Vec::new(),
            switchover: None,
            check_invariants: false,
            departure_log_limit: 0,
        }
    }
}

impl ScenarioConfig {
    /// Warm-up cutoff; only completions strictly after it are recorded.
    pub fn t_start(&self) -> f64 {
        self.horizon * self.warmup_fraction
    }

    /// Total offered load of all streams.
    ///
    /// # Errors
    ///
    /// - `ConfigError` - If any stream has an undefined load
    pub fn offered_load(&self) -> Result<f64, ConfigError> {
        self.streams
            .iter()
            .enumerate()
            .map(|(index, stream)| stream.offered_load(index))
            .sum()
    }

    /// Checks the scenario before any replicate starts.
    ///
    /// # Errors
    ///
    /// - `ConfigError::ZeroCapacity` / `ConfigError::NoClasses` - Empty server or classes
    /// - `ConfigError::TooManyClasses` - More classes than [`Priority`] can tag
    /// - `ConfigError::InvalidHorizon` / `ConfigError::InvalidWarmupFraction` - Bad run window
    /// - `ConfigError::UnstableSystem` - If offered load reaches capacity
    /// - `ConfigError` - Any stream or distribution parameter out of domain
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.capacity == 0 {
            return Err(ConfigError::ZeroCapacity);
        }
        if self.classes == 0 {
            return Err(ConfigError::NoClasses);
        }
        if self.classes > MAX_CLASSES {
            return Err(ConfigError::TooManyClasses {
                classes: self.classes,
                max: MAX_CLASSES,
            });
        }
        if !self.horizon.is_finite() || self.horizon <= 0.0 {
            return Err(ConfigError::InvalidHorizon {
                horizon: self.horizon,
            });
        }
        if !self.warmup_fraction.is_finite() || self.warmup_fraction < 0.0 {
            return Err(ConfigError::InvalidWarmupFraction {
                fraction: self.warmup_fraction,
            });
        }

        for (index, stream) in self.streams.iter().enumerate() {
            stream.validate(index, self.classes)?;
        }

        if let Some(switchover) = &self.switchover {
            if self.capacity != 1 {
                return Err(ConfigError::SwitchoverRequiresSingleServer {
                    capacity: self.capacity,
                });
            }
            check_class(switchover.class, self.classes)?;
            switchover.duration.validate()?;
        }

        let load = self.offered_load()?;
        if load >= self.capacity as f64 {
            return Err(ConfigError::UnstableSystem {
                load,
                capacity: self.capacity,
            });
        }

        debug!(scenario = %self.name, load, "Scenario validated");
        Ok(())
    }

    /// Applies `PREEMPT_SEED`, `PREEMPT_HORIZON` and `PREEMPT_WARMUP_FRACTION`.
    ///
    /// Unparseable values are ignored.
    pub fn with_env_overrides(mut self) -> Self {
        if let Ok(seed) = std::env::var("PREEMPT_SEED") {
            if let Ok(seed) = seed.parse::<u64>() {
                self.seed = seed;
            }
        }

        if let Ok(horizon) = std::env::var("PREEMPT_HORIZON") {
            if let Ok(horizon) = horizon.parse::<f64>() {
                self.horizon = horizon;
            }
        }

        if let Ok(fraction) = std::env::var("PREEMPT_WARMUP_FRACTION") {
            if let Ok(fraction) = fraction.parse::<f64>() {
                self.warmup_fraction = fraction;
            }
        }

        self
    }

    /// Returns a copy with every split stream's phi replaced.
    pub fn with_phi(&self, phi: f64) -> Self {
        let mut config = self.clone();
        for stream in &mut config.streams {
            if let ArrivalStreamConfig::Renewal {
                classes: ClassAssignment::Split { phi: current, .. },
                ..
            } = stream
            {
                *current = phi;
            }
        }
        config
    }

    /// True when at least one renewal stream splits arrivals by phi.
    pub fn has_split(&self) -> bool {
        self.streams.iter().any(|stream| {
            matches!(
                stream,
                ArrivalStreamConfig::Renewal {
                    classes: ClassAssignment::Split { .. },
                    ..
                }
            )
        })
    }
}

/// Replication settings for the orchestrator.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ReplicationConfig {
    /// Number of independent replicates
    pub replications: usize,
    /// Significance level of the confidence interval
    pub alpha: f64,
    /// Seed of replicate 0; the scenario seed is used when absent
    pub base_seed: Option<u64>,
}

impl Default for ReplicationConfig {
    fn default() -> Self {
        Self {
            replications: 30,
            alpha: 0.05,
            base_seed: None,
        }
    }
}

impl ReplicationConfig {
    /// Spacing between consecutive replicate seeds.
    pub const SEED_STRIDE: u64 = 11;

    /// Seed of replicate `index`.
    pub fn seed_for(&self, scenario_seed: u64, index: usize) -> u64 {
        self.base_seed
            .unwrap_or(scenario_seed)
            .wrapping_add(Self::SEED_STRIDE.wrapping_mul(index as u64))
    }

    /// Checks the replication settings before any replicate runs.
    ///
    /// # Errors
    ///
    /// - `ConfigError::InvalidReplication` - No replicates or alpha outside (0, 1)
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.replications == 0 {
            return Err(ConfigError::InvalidReplication {
                reason: "at least one replicate is required".to_string(),
            });
        }
        if !(self.alpha > 0.0 && self.alpha < 1.0) {
            return Err(ConfigError::InvalidReplication {
                reason: format!("alpha must be within (0, 1), got {}", self.alpha),
            });
        }
        Ok(())
    }

    /// Small replicate count for fast tests.
    pub fn for_testing() -> Self {
        Self {
            replications: 4,
            ..Default::default()
        }
    }
}

/// Fluent constructor for [`ScenarioConfig`].
#[derive(Debug, Clone, Default)]
pub struct ScenarioBuilder {
    config: ScenarioConfig,
}

impl ScenarioBuilder {
    /// Starts from defaults with the given scenario name.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            config: ScenarioConfig {
                name: name.into(),
                ..Default::default()
            },
        }
    }

    /// Sets the number of priority classes.
    pub fn classes(mut self, classes: usize) -> Self {
        self.config.classes = classes;
        self
    }

    /// Sets the number of server slots.
    pub fn capacity(mut self, capacity: usize) -> Self {
        self.config.capacity = capacity;
        self
    }

    /// Sets the simulation horizon.
    pub fn horizon(mut self, horizon: f64) -> Self {
        self.config.horizon = horizon;
        self
    }

    /// Sets the warm-up fraction.
    pub fn warmup_fraction(mut self, fraction: f64) -> Self {
        self.config.warmup_fraction = fraction;
        self
    }

    /// Sets the seed of the first replicate.
    pub fn seed(mut self, seed: u64) -> Self {
        self.config.seed = seed;
        self
    }

    /// Sets the wait definition.
    pub fn wait_measure(mut self, measure: WaitMeasure) -> Self {
        self.config.wait_measure = measure;
        self
    }

    /// Adds a job source.
    pub fn stream(mut self, stream: ArrivalStreamConfig) -> Self {
        self.config.streams.push(stream);
        self
    }

    /// Adds a renewal stream feeding a single class.
    pub fn renewal(
        self,
        interarrival: Distribution,
        service: Distribution,
        priority: Priority,
    ) -> Self {
        self.stream(ArrivalStreamConfig::Renewal {
            interarrival,
            service,
            classes: ClassAssignment::Fixed { priority },
        })
    }

    /// Sets whether arrivals preempt jobs in service.
    pub fn discipline(mut self, discipline: Discipline) -> Self {
        self.config.discipline = discipline;
        self
    }

    /// Enables a switchover after each busy period of `class`.
    pub fn switchover(self, class: Priority, duration: Distribution) -> Self {
        self.setup(class, duration, SetupTrigger::AfterBusyPeriod)
    }

    /// Enables a setup phase with an explicit trigger.
    pub fn setup(
        mut self,
        class: Priority,
        duration: Distribution,
        trigger: SetupTrigger,
    ) -> Self {
        self.config.switchover = Some(SwitchoverConfig {
            class,
            duration,
            trigger,
        });
        self
    }

    /// Enables per-event invariant checks.
    pub fn check_invariants(mut self, enabled: bool) -> Self {
        self.config.check_invariants = enabled;
        self
    }

    /// Keeps up to `limit` departure records.
    pub fn departure_log_limit(mut self, limit: usize) -> Self {
        self.config.departure_log_limit = limit;
        self
    }

    /// Validates and returns the configuration.
    ///
    /// # Errors
    ///
    /// - `ConfigError` - If [`ScenarioConfig::validate`] rejects the result
    pub fn build(self) -> Result<ScenarioConfig, ConfigError> {
        self.config.validate()?;
        Ok(self.config)
    }

    /// Returns the configuration without validating it.
    pub fn build_unchecked(self) -> ScenarioConfig {
        self.config
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn poisson(rate: f64) -> Distribution {
        Distribution::Exponential { rate }
    }

    fn md1(lambda: f64) -> ScenarioBuilder {
        ScenarioBuilder::new("md1").renewal(
            poisson(lambda),
            Distribution::Deterministic { value: 1.0 },
            0,
        )
    }

    #[test]
    fn test_default_config_values() {
        let config = ScenarioConfig::default();

        assert_eq!(config.classes, 1);
        assert_eq!(config.capacity, 1);
        assert_eq!(config.horizon, 10_000.0);
        assert_eq!(config.t_start(), 500.0);
        assert_eq!(config.wait_measure, WaitMeasure::FlowTime);
        assert_eq!(config.discipline, Discipline::PreemptiveResume);
        assert!(config.switchover.is_none());
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_unstable_system_rejected() {
        let result = md1(1.0).build();
        assert!(matches!(
            result,
            Err(ConfigError::UnstableSystem { capacity: 1, .. })
        ));

        let config = md1(1.5).capacity(2).build().unwrap();
        assert!((config.offered_load().unwrap() - 1.5).abs() < 1e-12);
    }

    #[test]
    fn test_phi_out_of_range_rejected() {
        let result = ScenarioBuilder::new("split")
            .classes(3)
            .stream(ArrivalStreamConfig::Renewal {
                interarrival: poisson(0.5),
                service: poisson(2.0),
                classes: ClassAssignment::Split {
                    phi: 1.2,
                    high: 1,
                    low: 2,
                },
            })
            .build();

        assert_eq!(
            result,
            Err(ConfigError::ProbabilityOutOfRange {
                name: "phi",
                value: 1.2
            })
        );
    }

    #[test]
    fn test_class_out_of_range_rejected() {
        let result = ScenarioBuilder::new("bad")
            .classes(2)
            .renewal(poisson(0.1), poisson(1.0), 2)
            .build();

        assert_eq!(
            result,
            Err(ConfigError::ClassOutOfRange {
                priority: 2,
                classes: 2
            })
        );
    }

    #[test]
    fn test_trace_validation() {
        let empty = ScenarioBuilder::new("trace")
            .stream(ArrivalStreamConfig::Trace {
                periods: Vec::new(),
                priority: 0,
            })
            .build();
        assert_eq!(empty, Err(ConfigError::EmptyTrace { stream: 0 }));

        let zero = ScenarioBuilder::new("trace")
            .stream(ArrivalStreamConfig::Trace {
                periods: vec![TracePeriod { off: 0.0, on: 0.0 }],
                priority: 0,
            })
            .build();
        assert_eq!(zero, Err(ConfigError::DegenerateTrace { stream: 0 }));

        let duty = ScenarioBuilder::new("trace")
            .stream(ArrivalStreamConfig::Trace {
                periods: vec![
                    TracePeriod { off: 3.0, on: 1.0 },
                    TracePeriod { off: 5.0, on: 1.0 },
                ],
                priority: 0,
            })
            .build()
            .unwrap();
        assert!((duty.offered_load().unwrap() - 0.2).abs() < 1e-12);
    }

    #[test]
    fn test_class_count_limited_to_priority_range() {
        assert!(md1(0.5).classes(MAX_CLASSES).build().is_ok());
        assert_eq!(
            md1(0.5).classes(300).build(),
            Err(ConfigError::TooManyClasses {
                classes: 300,
                max: 256
            })
        );
    }

    #[test]
    fn test_discipline_and_trigger_deserialize_with_defaults() {
        let json = r#"{
            "discipline": "non_preemptive",
            "switchover": {
                "class": 0,
                "duration": { "kind": "deterministic", "value": 1.0 }
            }
        }"#;
        let config: ScenarioConfig = serde_json::from_str(json).unwrap();
        assert_eq!(config.discipline, Discipline::NonPreemptive);
        let switchover = config.switchover.unwrap();
        assert_eq!(switchover.trigger, SetupTrigger::AfterBusyPeriod);

        let json = r#"{ "class": 1, "duration": { "kind": "deterministic", "value": 1.0 },
            "trigger": "before_each_service" }"#;
        let setup: SwitchoverConfig = serde_json::from_str(json).unwrap();
        assert_eq!(setup.trigger, SetupTrigger::BeforeEachService);
    }

    #[test]
    fn test_switchover_requires_single_server() {
        let result = md1(0.5)
            .capacity(2)
            .switchover(0, poisson(4.0))
            .build();

        assert_eq!(
            result,
            Err(ConfigError::SwitchoverRequiresSingleServer { capacity: 2 })
        );
    }

    #[test]
    fn test_invalid_window_rejected() {
        assert!(matches!(
            md1(0.5).horizon(f64::INFINITY).build(),
            Err(ConfigError::InvalidHorizon { .. })
        ));
        assert!(matches!(
            md1(0.5).warmup_fraction(-0.1).build(),
            Err(ConfigError::InvalidWarmupFraction { .. })
        ));
        // Warm-up past the horizon is legal; it simply records nothing.
        assert!(md1(0.5).warmup_fraction(2.0).build().is_ok());
    }

    #[test]
    fn test_with_phi_rewrites_split_streams() {
        let config = ScenarioBuilder::new("split")
            .classes(3)
            .stream(ArrivalStreamConfig::Renewal {
                interarrival: poisson(0.3),
                service: poisson(1.0),
                classes: ClassAssignment::Split {
                    phi: 0.5,
                    high: 1,
                    low: 2,
                },
            })
            .build()
            .unwrap();

        let updated = config.with_phi(0.9);
        assert!(updated.has_split());
        match &updated.streams[0] {
            ArrivalStreamConfig::Renewal {
                classes: ClassAssignment::Split { phi, .. },
                ..
            } => assert_eq!(*phi, 0.9),
            other => panic!("unexpected stream {other:?}"),
        }
        assert!(!md1(0.5).build().unwrap().has_split());
    }

    #[test]
    fn test_replicate_seeds() {
        let replication = ReplicationConfig::default();
        assert_eq!(replication.replications, 30);
        assert_eq!(replication.alpha, 0.05);
        assert_eq!(replication.seed_for(100, 0), 100);
        assert_eq!(replication.seed_for(100, 3), 133);

        let explicit = ReplicationConfig {
            base_seed: Some(u64::MAX),
            ..Default::default()
        };
        assert_eq!(explicit.seed_for(0, 1), 10);
    }

    #[test]
    fn test_replication_validation() {
        assert!(ReplicationConfig::default().validate().is_ok());
        assert!(
            ReplicationConfig {
                replications: 0,
                ..Default::default()
            }
            .validate()
            .is_err()
        );
        assert!(
            ReplicationConfig {
                alpha: 1.0,
                ..Default::default()
            }
            .validate()
            .is_err()
        );
    }

    #[test]
    fn test_json_defaults_fill_missing_fields() {
        let json = r#"{
            "name": "from-json",
            "streams": [{
                "type": "renewal",
                "interarrival": {"kind": "exponential", "rate": 0.5},
                "service": {"kind": "deterministic", "value": 1.0},
                "classes": {"mode": "fixed", "priority": 0}
            }]
        }"#;

        let config: ScenarioConfig = serde_json::from_str(json).unwrap();
        assert_eq!(config.name, "from-json");
        assert_eq!(config.capacity, 1);
        assert_eq!(config.warmup_fraction, 0.05);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_env_override() {
        unsafe {
            std::env::set_var("PREEMPT_SEED", "12345");
            std::env::set_var("PREEMPT_HORIZON", "250.5");
            std::env::set_var("PREEMPT_WARMUP_FRACTION", "not-a-number");
        }

        let config = ScenarioConfig::default().with_env_overrides();

        assert_eq!(config.seed, 12345);
        assert_eq!(config.horizon, 250.5);
        assert_eq!(config.warmup_fraction, 0.05);

        unsafe {
            std::env::remove_var("PREEMPT_SEED");
            std::env::remove_var("PREEMPT_HORIZON");
            std::env::remove_var("PREEMPT_WARMUP_FRACTION");
        }
    }
}
