//! Named scenarios.

use preempt_core::{
    ArrivalStreamConfig, ClassAssignment, ConfigError, Discipline, Distribution, ScenarioBuilder,
    ScenarioConfig, SetupTrigger, TracePeriod, WaitMeasure,
};

/// Predefined scenario constructors.
pub struct ScenarioPresets;

impl ScenarioPresets {
    /// Names accepted by [`ScenarioPresets::by_name`].
    pub const NAMES: [&'static str; 6] = [
        "md1",
        "priority-split",
        "breakdown",
        "switchover",
        "non-preemptive",
        "setup",
    ];

    /// Single-class M/D/1 queue with service time `1 / mu`.
    ///
    /// # Errors
    ///
    /// - `ConfigError` - If `lambda >= mu` or a rate is not positive
    pub fn md1(lambda: f64, mu: f64) -> Result<ScenarioConfig, ConfigError> {
        ScenarioBuilder::new("md1")
            .renewal(
                Distribution::Exponential { rate: lambda },
                Distribution::from_moment_ratio(mu, 1.0)?,
                0,
            )
            .build()
    }

    /// Incumbent class 0 plus a customer stream split by `phi` into classes 1 and 2.
    ///
    /// Customer service has rate `mu` and second-moment ratio `k`.
    ///
    /// # Errors
    ///
    /// - `ConfigError` - Invalid rates, `k < 1`, phi outside [0, 1], or an unstable load
    pub fn mg1_priority_split(
        lambda_incumbent: f64,
        mu_incumbent: f64,
        lambda: f64,
        mu: f64,
        k: f64,
        phi: f64,
    ) -> Result<ScenarioConfig, ConfigError> {
        ScenarioBuilder::new("priority-split")
            .classes(3)
            .renewal(
                Distribution::Exponential {
                    rate: lambda_incumbent,
                },
                Distribution::Exponential { rate: mu_incumbent },
                0,
            )
            .stream(ArrivalStreamConfig::Renewal {
                interarrival: Distribution::Exponential { rate: lambda },
                service: Distribution::from_moment_ratio(mu, k)?,
                classes: ClassAssignment::Split {
                    phi,
                    high: 1,
                    low: 2,
                },
            })
            .build()
    }

    /// Trace-driven breakdowns (class 0) interrupting Poisson customers (class 1).
    ///
    /// # Errors
    ///
    /// - `ConfigError` - Empty or degenerate trace, invalid rates, or an unstable load
    pub fn breakdown_trace(
        periods: Vec<TracePeriod>,
        lambda: f64,
        mu: f64,
    ) -> Result<ScenarioConfig, ConfigError> {
        ScenarioBuilder::new("breakdown")
            .classes(2)
            .stream(ArrivalStreamConfig::Trace {
                periods,
                priority: 0,
            })
            .renewal(
                Distribution::Exponential { rate: lambda },
                Distribution::Exponential { rate: mu },
                1,
            )
            .build()
    }

    /// Two Poisson classes sharing rate `mu`; a switchover with rate `sigma`
    /// follows every class-0 busy period.
    ///
    /// # Errors
    ///
    /// - `ConfigError` - Invalid rates or an unstable load
    pub fn two_class_switchover(
        lambda_high: f64,
        lambda_low: f64,
        mu: f64,
        sigma: f64,
    ) -> Result<ScenarioConfig, ConfigError> {
        ScenarioBuilder::new("switchover")
            .classes(2)
            .warmup_fraction(0.1)
            .renewal(
                Distribution::Exponential { rate: lambda_high },
                Distribution::Exponential { rate: mu },
                0,
            )
            .renewal(
                Distribution::Exponential { rate: lambda_low },
                Distribution::Exponential { rate: mu },
                1,
            )
            .switchover(0, Distribution::Exponential { rate: sigma })
            .build()
    }

    /// Two Poisson classes under non-preemptive priority.
    ///
    /// Both classes share service rate `mu` and second-moment ratio `k`.
    ///
    /// # Errors
    ///
    /// - `ConfigError` - Invalid rates, `k < 1`, or an unstable load
    pub fn two_class_non_preemptive(
        lambda_high: f64,
        lambda_low: f64,
        mu: f64,
        k: f64,
    ) -> Result<ScenarioConfig, ConfigError> {
        let service = Distribution::from_moment_ratio(mu, k)?;
        ScenarioBuilder::new("non-preemptive")
            .classes(2)
            .discipline(Discipline::NonPreemptive)
            .renewal(
                Distribution::Exponential { rate: lambda_high },
                service.clone(),
                0,
            )
            .renewal(Distribution::Exponential { rate: lambda_low }, service, 1)
            .build()
    }

    /// Two Poisson classes where every service quantum is preceded by a setup
    /// with rate `sigma * mu`. Waits exclude the job's own service.
    ///
    /// # Errors
    ///
    /// - `ConfigError` - Invalid rates or an unstable load
    pub fn two_class_setup(
        lambda_high: f64,
        lambda_low: f64,
        mu: f64,
        sigma: f64,
    ) -> Result<ScenarioConfig, ConfigError> {
        ScenarioBuilder::new("setup")
            .classes(2)
            .wait_measure(WaitMeasure::QueueingDelay)
            .renewal(
                Distribution::Exponential { rate: lambda_high },
                Distribution::Exponential { rate: mu },
                0,
            )
            .renewal(
                Distribution::Exponential { rate: lambda_low },
                Distribution::Exponential { rate: mu },
                1,
            )
            .setup(
                0,
                Distribution::Exponential { rate: sigma * mu },
                SetupTrigger::BeforeEachService,
            )
            .build()
    }

    /// Preset with default parameters, or `None` for an unknown name.
    pub fn by_name(name: &str) -> Option<Result<ScenarioConfig, ConfigError>> {
        let config = match name {
            "md1" => Self::md1(0.9, 1.0),
            "priority-split" => Self::mg1_priority_split(0.1, 1.0, 0.5, 1.0, 2.0, 0.5),
            "breakdown" => Self::breakdown_trace(
                vec![
                    TracePeriod { off: 20.0, on: 2.0 },
                    TracePeriod { off: 35.0, on: 4.0 },
                    TracePeriod { off: 15.0, on: 1.5 },
                ],
                0.4,
                1.0,
            ),
            "switchover" => Self::two_class_switchover(0.2, 0.4, 1.0, 2.0),
            "non-preemptive" => Self::two_class_non_preemptive(0.3, 0.4, 1.0, 1.5),
            "setup" => Self::two_class_setup(0.2, 0.3, 1.0, 4.0),
            _ => return None,
        };
        Some(config)
    }
}
