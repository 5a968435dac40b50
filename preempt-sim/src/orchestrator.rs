//! Replicated runs and their aggregation.
//!
//! A scenario is validated once. Replicates then run in parallel on rayon
//! workers, each with its own seed (`base + 11·k`) and fully private state,
//! and their per-class means are reduced to normal-approximation confidence
//! intervals.

use preempt_core::{ConfigError, Priority, ReplicationConfig, ScenarioConfig};
use rayon::prelude::*;
use serde::Serialize;
use tracing::{debug, info, warn};

use crate::simulation::PriorityQueueSimulation;
use crate::stats::{ClassStatistics, PerClassStats};
use crate::{SimulationError, StatisticsError};

/// Sample mean with a confidence half-width.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Estimate {
    /// Mean across replicates
    pub mean: f64,
    /// Half-width of the confidence interval
    pub half_width: f64,
    /// Number of replicate values
    pub samples: usize,
}

impl Estimate {
    /// Reduces replicate values with the sample standard deviation (n - 1).
    ///
    /// A single value yields a zero half-width; no values yield `None`.
    pub fn from_samples(values: &[f64], z: f64) -> Option<Self> {
        let n = values.len();
        if n == 0 {
            return None;
        }
        let mean = values.iter().sum::<f64>() / n as f64;
        let half_width = if n < 2 {
            0.0
        } else {
            let variance =
                values.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / (n - 1) as f64;
            z * variance.sqrt() / (n as f64).sqrt()
        };
        Some(Self {
            mean,
            half_width,
            samples: n,
        })
    }

    /// Lower end of the interval.
    pub fn lower(&self) -> f64 {
        self.mean - self.half_width
    }

    /// Upper end of the interval.
    pub fn upper(&self) -> f64 {
        self.mean + self.half_width
    }

    /// True if `value` lies inside the interval.
    pub fn contains(&self, value: f64) -> bool {
        (self.lower()..=self.upper()).contains(&value)
    }
}

/// What to do with a replicate whose class recorded no completions.
#[derive(Debug, Clone, PartialEq, Default)]
pub enum EmptyClassPolicy {
    /// Leave the replicate out of that class's wait estimate
    #[default]
    Skip,
    /// Use the given per-class value instead; `None` entries fall back to skipping
    Substitute(Vec<Option<f64>>),
}

/// Linear cost of waiting plus a fixed charge per preemption.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct CostModel {
    /// Charge per preemption
    pub preemption_cost: f64,
    /// Class whose cost is subtracted in the gap
    pub high: Priority,
    /// Class whose cost is reduced by the high class's cost
    pub low: Priority,
}

impl CostModel {
    /// Expected cost per completion of one class.
    ///
    /// # Errors
    ///
    /// - `StatisticsError::NoSamples` - If the class recorded nothing
    pub fn class_cost(&self, stats: &ClassStatistics) -> Result<f64, StatisticsError> {
        if stats.count == 0 {
            return Err(StatisticsError::NoSamples { class: stats.class });
        }
        Ok((stats.total_wait + self.preemption_cost * stats.total_preemptions as f64)
            / stats.count as f64)
    }

    /// Cost of the low class minus cost of the high class.
    ///
    /// # Errors
    ///
    /// - `StatisticsError::NoSamples` - If either class recorded nothing
    pub fn cost_gap(&self, replicate: &PerClassStats) -> Result<f64, StatisticsError> {
        let cost = |class: Priority| {
            replicate
                .class(class)
                .ok_or(StatisticsError::NoSamples { class })
                .and_then(|stats| self.class_cost(stats))
        };
        Ok(cost(self.low)? - cost(self.high)?)
    }

    /// Upgrade revenue per unit of measured time.
    ///
    /// The fee is the cost gap, charged to every recorded high-class completion.
    ///
    /// # Errors
    ///
    /// - `StatisticsError::NoSamples` - If either class recorded nothing
    pub fn revenue(&self, replicate: &PerClassStats) -> Result<f64, StatisticsError> {
        let fee = self.cost_gap(replicate)?;
        let window = replicate.horizon - replicate.t_start;
        let upgraded = replicate.class(self.high).map_or(0, |stats| stats.count);
        if window <= 0.0 || upgraded == 0 {
            return Err(StatisticsError::NoSamples { class: self.high });
        }
        Ok(fee * upgraded as f64 / window)
    }

    /// Completion-weighted cost of the two customer classes.
    ///
    /// # Errors
    ///
    /// - `StatisticsError::NoSamples` - If neither class recorded anything
    pub fn social_welfare(&self, replicate: &PerClassStats) -> Result<f64, StatisticsError> {
        let customers = replicate
            .classes
            .iter()
            .filter(|stats| stats.class == self.high || stats.class == self.low);
        self.weighted_cost(customers)
            .ok_or(StatisticsError::NoSamples { class: self.high })
    }

    /// Completion-weighted cost over every class, incumbents included.
    ///
    /// # Errors
    ///
    /// - `StatisticsError::NoSamples` - If no class recorded anything
    pub fn system_welfare(&self, replicate: &PerClassStats) -> Result<f64, StatisticsError> {
        self.weighted_cost(replicate.classes.iter())
            .ok_or(StatisticsError::NoSamples { class: 0 })
    }

    fn weighted_cost<'a>(
        &self,
        classes: impl Iterator<Item = &'a ClassStatistics>,
    ) -> Option<f64> {
        let (total, count) = classes
            .filter_map(|stats| Some((self.class_cost(stats).ok()?, stats.count)))
            .fold((0.0, 0u64), |(total, count), (cost, n)| {
                (total + cost * n as f64, count + n)
            });
        (count > 0).then(|| total / count as f64)
    }
}

type ReplicateMetric = fn(&CostModel, &PerClassStats) -> Result<f64, StatisticsError>;

/// Aggregates for one class across replicates.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ClassSummary {
    /// Class
    pub class: Priority,
    /// Mean wait; `None` when no replicate has a value
    pub wait: Option<Estimate>,
    /// Recorded completions per replicate
    pub completions: Option<Estimate>,
    /// Mean preemptions per completion
    pub preemptions: Option<Estimate>,
    /// Expected cost per completion, when a cost model is set
    pub cost: Option<Estimate>,
    /// Replicates with no recorded completions
    pub empty_replicates: usize,
    /// Replicates whose wait was substituted
    pub substituted: usize,
}

/// Result of a replicated scenario.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ScenarioSummary {
    /// Scenario label
    pub scenario: String,
    /// Replicates run
    pub replications: usize,
    /// Significance level
    pub alpha: f64,
    /// Normal quantile used for the half-widths
    pub z: f64,
    /// Per-class aggregates
    pub classes: Vec<ClassSummary>,
    /// Fraction of slot-time spent serving jobs
    pub utilization: Option<Estimate>,
    /// Cost gap between the cost model's classes
    pub cost_gap: Option<Estimate>,
    /// Upgrade revenue per unit time
    pub revenue: Option<Estimate>,
    /// Completion-weighted cost of the cost model's classes
    pub social_welfare: Option<Estimate>,
    /// Completion-weighted cost of all classes
    pub system_welfare: Option<Estimate>,
}

impl ScenarioSummary {
    /// Aggregates of one class.
    pub fn class(&self, class: Priority) -> Option<&ClassSummary> {
        self.classes.get(usize::from(class))
    }

    /// Generates human-readable summary.
    pub fn summary(&self) -> String {
        let fmt = |estimate: &Option<Estimate>| match estimate {
            Some(e) => format!("{:.4} ± {:.4}", e.mean, e.half_width),
            None => "undefined".to_string(),
        };

        let mut summary = String::new();
        summary.push_str(&format!(
            "Scenario '{}': {} replicates, {:.0}% confidence\n",
            self.scenario,
            self.replications,
            (1.0 - self.alpha) * 100.0
        ));
        summary.push_str(&format!("Utilization: {}\n", fmt(&self.utilization)));

        for class in &self.classes {
            summary.push_str(&format!(
                "  class {}: wait {}  preemptions {}  completions {}",
                class.class,
                fmt(&class.wait),
                fmt(&class.preemptions),
                fmt(&class.completions)
            ));
            if class.cost.is_some() {
                summary.push_str(&format!("  cost {}", fmt(&class.cost)));
            }
            if class.empty_replicates > 0 {
                summary.push_str(&format!(
                    "  ({} empty, {} substituted)",
                    class.empty_replicates, class.substituted
                ));
            }
            summary.push('\n');
        }

        if self.cost_gap.is_some() {
            summary.push_str(&format!("Cost gap: {}\n", fmt(&self.cost_gap)));
            summary.push_str(&format!("Revenue: {}\n", fmt(&self.revenue)));
            summary.push_str(&format!(
                "Social welfare: {} (all classes {})\n",
                fmt(&self.social_welfare),
                fmt(&self.system_welfare)
            ));
        }
        summary
    }
}

/// Runs replicates of a scenario and aggregates them.
#[derive(Debug, Clone, Default)]
pub struct ReplicationRunner {
    replication: ReplicationConfig,
    empty_policy: EmptyClassPolicy,
    cost_model: Option<CostModel>,
}

impl ReplicationRunner {
    /// Creates a runner with the given replication settings.
    pub fn new(replication: ReplicationConfig) -> Self {
        Self {
            replication,
            ..Default::default()
        }
    }

    /// Sets the handling of empty classes.
    pub fn with_empty_class_policy(mut self, policy: EmptyClassPolicy) -> Self {
        self.empty_policy = policy;
        self
    }

    /// Adds cost estimates.
    pub fn with_cost_model(mut self, model: CostModel) -> Self {
        self.cost_model = Some(model);
        self
    }

    /// Replication settings.
    pub fn replication(&self) -> &ReplicationConfig {
        &self.replication
    }

    /// Validates once, then runs every replicate in parallel.
    ///
    /// Results are ordered by replicate index.
    ///
    /// # Errors
    ///
    /// - `SimulationError::ConfigRejected` - Invalid scenario or replication settings
    /// - `SimulationError` - The first engine failure of any replicate
    pub fn run_replicates(
        &self,
        config: &ScenarioConfig,
    ) -> Result<Vec<PerClassStats>, SimulationError> {
        self.replication.validate()?;
        config.validate()?;

        info!(
            scenario = %config.name,
            replications = self.replication.replications,
            "Running replicates"
        );

        (0..self.replication.replications)
            .into_par_iter()
            .map(|index| {
                let mut replicate = config.clone();
                replicate.seed = self.replication.seed_for(config.seed, index);
                debug!(index, seed = replicate.seed, "Launching replicate");
                PriorityQueueSimulation::new_validated(&replicate)?.run()
            })
            .collect()
    }

    /// Runs the replicates and reduces them to a summary.
    ///
    /// # Errors
    ///
    /// - `SimulationError` - See [`ReplicationRunner::run_replicates`]
    pub fn run(&self, config: &ScenarioConfig) -> Result<ScenarioSummary, SimulationError> {
        let replicates = self.run_replicates(config)?;
        let summary = self.summarize(config, &replicates);
        info!(scenario = %summary.scenario, "Scenario complete");
        Ok(summary)
    }

    /// Reduces replicate statistics to per-class estimates.
    pub fn summarize(
        &self,
        config: &ScenarioConfig,
        replicates: &[PerClassStats],
    ) -> ScenarioSummary {
        let z = normal_quantile(1.0 - self.replication.alpha / 2.0);

        let classes = (0..config.classes)
            .map(|index| {
                let class = Priority::try_from(index).unwrap_or(Priority::MAX);
                self.summarize_class(class, replicates, z)
            })
            .collect();

        let utilization: Vec<f64> = replicates.iter().map(PerClassStats::utilization).collect();
        let per_replicate = |metric: ReplicateMetric| {
            self.cost_model.and_then(|model| {
                let values: Vec<f64> = replicates
                    .iter()
                    .filter_map(|r| metric(&model, r).ok())
                    .collect();
                Estimate::from_samples(&values, z)
            })
        };

        ScenarioSummary {
            scenario: config.name.clone(),
            replications: replicates.len(),
            alpha: self.replication.alpha,
            z,
            classes,
            utilization: Estimate::from_samples(&utilization, z),
            cost_gap: per_replicate(CostModel::cost_gap),
            revenue: per_replicate(CostModel::revenue),
            social_welfare: per_replicate(CostModel::social_welfare),
            system_welfare: per_replicate(CostModel::system_welfare),
        }
    }

    fn summarize_class(
        &self,
        class: Priority,
        replicates: &[PerClassStats],
        z: f64,
    ) -> ClassSummary {
        let mut waits = Vec::with_capacity(replicates.len());
        let mut preemptions = Vec::with_capacity(replicates.len());
        let mut costs = Vec::new();
        let mut completions = Vec::with_capacity(replicates.len());
        let mut empty_replicates = 0;
        let mut substituted = 0;

        for replicate in replicates {
            let Some(stats) = replicate.class(class) else {
                continue;
            };
            completions.push(stats.count as f64);

            match stats.mean_wait() {
                Ok(wait) => waits.push(wait),
                Err(StatisticsError::NoSamples { .. }) => {
                    empty_replicates += 1;
                    if let Some(value) = self.substitute_for(class) {
                        warn!(
                            class,
                            seed = replicate.seed,
                            value,
                            "Class recorded no completions; substituting analytical wait"
                        );
                        waits.push(value);
                        substituted += 1;
                    }
                }
            }
            if let Ok(mean) = stats.mean_preemptions() {
                preemptions.push(mean);
            }
            if let Some(Ok(cost)) = self.cost_model.map(|model| model.class_cost(stats)) {
                costs.push(cost);
            }
        }

        ClassSummary {
            class,
            wait: Estimate::from_samples(&waits, z),
            completions: Estimate::from_samples(&completions, z),
            preemptions: Estimate::from_samples(&preemptions, z),
            cost: Estimate::from_samples(&costs, z),
            empty_replicates,
            substituted,
        }
    }

    fn substitute_for(&self, class: Priority) -> Option<f64> {
        match &self.empty_policy {
            EmptyClassPolicy::Skip => None,
            EmptyClassPolicy::Substitute(values) => {
                values.get(usize::from(class)).copied().flatten()
            }
        }
    }
}

/// Result of one phi value in a sweep.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PhiPoint {
    /// Split fraction used
    pub phi: f64,
    /// Aggregates at that phi
    pub summary: ScenarioSummary,
}

/// Re-runs a split scenario once per phi value.
///
/// # Errors
///
/// - `SimulationError::ConfigRejected` - No split stream, or a phi outside [0, 1]
/// - `SimulationError` - Engine failures of any replicate
pub fn sweep_phi(
    runner: &ReplicationRunner,
    base: &ScenarioConfig,
    phis: &[f64],
) -> Result<Vec<PhiPoint>, SimulationError> {
    if !base.has_split() {
        return Err(ConfigError::NoSplitStream {
            scenario: base.name.clone(),
        }
        .into());
    }

    phis.iter()
        .map(|&phi| {
            let config = base.with_phi(phi);
            info!(scenario = %config.name, phi, "Sweeping phi");
            Ok(PhiPoint {
                phi,
                summary: runner.run(&config)?,
            })
        })
        .collect()
}

/// Inverse of the standard normal CDF.
///
/// Rational approximation with relative error below 1.2e-9.
pub fn normal_quantile(p: f64) -> f64 {
    const A: [f64; 6] = [
        -3.969_683_028_665_376e1,
        2.209_460_984_245_205e2,
        -2.759_285_104_469_687e2,
        1.383_577_518_672_69e2,
        -3.066_479_806_614_716e1,
        2.506_628_277_459_239,
    ];
    const B: [f64; 5] = [
        -5.447_609_879_822_406e1,
        1.615_858_368_580_409e2,
        -1.556_989_798_598_866e2,
        6.680_131_188_771_972e1,
        -1.328_068_155_288_572e1,
    ];
    const C: [f64; 6] = [
        -7.784_894_002_430_293e-3,
        -3.223_964_580_411_365e-1,
        -2.400_758_277_161_838,
        -2.549_732_539_343_734,
        4.374_664_141_464_968,
        2.938_163_982_698_783,
    ];
    const D: [f64; 4] = [
        7.784_695_709_041_462e-3,
        3.224_671_290_700_398e-1,
        2.445_134_137_142_996,
        3.754_408_661_907_416,
    ];
    const P_LOW: f64 = 0.02425;

    if p <= 0.0 {
        return f64::NEG_INFINITY;
    }
    if p >= 1.0 {
        return f64::INFINITY;
    }

    let tail = |q: f64| {
        (((((C[0] * q + C[1]) * q + C[2]) * q + C[3]) * q + C[4]) * q + C[5])
            / ((((D[0] * q + D[1]) * q + D[2]) * q + D[3]) * q + 1.0)
    };

    if p < P_LOW {
        tail((-2.0 * p.ln()).sqrt())
    } else if p > 1.0 - P_LOW {
        -tail((-2.0 * (1.0 - p).ln()).sqrt())
    } else {
        let q = p - 0.5;
        let r = q * q;
        (((((A[0] * r + A[1]) * r + A[2]) * r + A[3]) * r + A[4]) * r + A[5]) * q
            / (((((B[0] * r + B[1]) * r + B[2]) * r + B[3]) * r + B[4]) * r + 1.0)
    }
}

#[cfg(test)]
mod tests {
    use preempt_core::{ArrivalStreamConfig, ClassAssignment, Distribution, ScenarioBuilder};

    use super::*;

    fn split_scenario(phi: f64) -> ScenarioConfig {
        ScenarioBuilder::new("split")
            .classes(3)
            .horizon(2_000.0)
            .seed(7)
            .stream(ArrivalStreamConfig::Renewal {
                interarrival: Distribution::Exponential { rate: 0.5 },
                service: Distribution::Exponential { rate: 1.0 },
                classes: ClassAssignment::Split { phi, high: 1, low: 2 },
            })
            .build()
            .unwrap()
    }

    #[test]
    fn test_normal_quantile() {
        assert!((normal_quantile(0.975) - 1.959_963_985).abs() < 1e-8);
        assert!((normal_quantile(0.5)).abs() < 1e-12);
        assert!((normal_quantile(0.005) + 2.575_829_304).abs() < 1e-8);
        assert_eq!(normal_quantile(1.0), f64::INFINITY);
    }

    #[test]
    fn test_estimate_uses_sample_deviation() {
        let estimate = Estimate::from_samples(&[1.0, 2.0, 3.0, 4.0], 2.0).unwrap();

        assert_eq!(estimate.mean, 2.5);
        let sd = (5.0_f64 / 3.0).sqrt();
        assert!((estimate.half_width - 2.0 * sd / 2.0).abs() < 1e-12);
        assert!(estimate.contains(2.0));

        assert_eq!(Estimate::from_samples(&[], 2.0), None);
        assert_eq!(Estimate::from_samples(&[5.0], 2.0).unwrap().half_width, 0.0);
    }

    #[test]
    fn test_replicate_seeds_are_spaced() {
        let runner = ReplicationRunner::new(ReplicationConfig {
            replications: 3,
            ..Default::default()
        });
        let replicates = runner.run_replicates(&split_scenario(0.5)).unwrap();

        let seeds: Vec<u64> = replicates.iter().map(|r| r.seed).collect();
        assert_eq!(seeds, vec![7, 18, 29]);
    }

    #[test]
    fn test_empty_class_skip_and_substitute() {
        let config = split_scenario(0.0);
        let runner = ReplicationRunner::new(ReplicationConfig::for_testing());

        let skipped = runner.run(&config).unwrap();
        let high = skipped.class(1).unwrap();
        assert_eq!(high.wait, None);
        assert_eq!(high.empty_replicates, 4);
        assert!(skipped.class(2).unwrap().wait.is_some());

        let substituted = runner
            .clone()
            .with_empty_class_policy(EmptyClassPolicy::Substitute(vec![None, Some(1.5), None]))
            .run(&config)
            .unwrap();
        let high = substituted.class(1).unwrap();
        assert_eq!(high.substituted, 4);
        assert_eq!(high.wait.unwrap().mean, 1.5);
        assert!(substituted.summary().contains("4 substituted"));
    }

    #[test]
    fn test_cost_model() {
        let model = CostModel {
            preemption_cost: 2.0,
            high: 1,
            low: 2,
        };
        let stats = ClassStatistics {
            class: 2,
            total_wait: 10.0,
            count: 4,
            total_preemptions: 3,
        };
        assert_eq!(model.class_cost(&stats), Ok(4.0));
        assert!(model.class_cost(&ClassStatistics::new(1)).is_err());

        let summary = ReplicationRunner::new(ReplicationConfig::for_testing())
            .with_cost_model(model)
            .run(&split_scenario(0.5))
            .unwrap();
        assert!(summary.cost_gap.unwrap().mean > 0.0);
    }

    #[test]
    fn test_summary_serializes_for_reports() {
        let summary = ReplicationRunner::new(ReplicationConfig::for_testing())
            .run(&split_scenario(0.5))
            .unwrap();
        let value = serde_json::to_value(&summary).unwrap();

        assert_eq!(value["scenario"], "split");
        assert_eq!(value["replications"], 4);
        assert_eq!(value["classes"].as_array().unwrap().len(), 3);
        assert!(value["classes"][0]["wait"].is_null());
        assert!(value["classes"][1]["wait"]["half_width"].is_f64());
        assert!(value["cost_gap"].is_null());
        assert!(value["revenue"].is_null());
    }

    #[test]
    fn test_revenue_and_welfare_on_split_scenario() {
        let model = CostModel {
            preemption_cost: 0.5,
            high: 1,
            low: 2,
        };
        let runner =
            ReplicationRunner::new(ReplicationConfig::for_testing()).with_cost_model(model);
        let config = split_scenario(0.5);
        let replicates = runner.run_replicates(&config).unwrap();

        let first = &replicates[0];
        let high = first.class(1).unwrap();
        let low = first.class(2).unwrap();
        let (high_cost, low_cost) = (
            model.class_cost(high).unwrap(),
            model.class_cost(low).unwrap(),
        );

        let window = config.horizon - config.t_start();
        let revenue = (low_cost - high_cost) * high.count as f64 / window;
        assert!((model.revenue(first).unwrap() - revenue).abs() < 1e-12);

        let n = (high.count + low.count) as f64;
        let welfare = (high.count as f64 * high_cost + low.count as f64 * low_cost) / n;
        assert!((model.social_welfare(first).unwrap() - welfare).abs() < 1e-12);
        assert!(welfare > high_cost && welfare < low_cost);
        // Class 0 has no arrivals, so all classes and customers agree.
        assert!((model.system_welfare(first).unwrap() - welfare).abs() < 1e-12);

        let summary = runner.summarize(&config, &replicates);
        assert!(summary.revenue.unwrap().mean > 0.0);
        assert_eq!(summary.social_welfare.unwrap().samples, 4);
        assert!(summary.summary().contains("Revenue:"));
    }

    #[test]
    fn test_revenue_undefined_without_upgrades() {
        let model = CostModel {
            preemption_cost: 0.0,
            high: 1,
            low: 2,
        };
        let replicates = ReplicationRunner::new(ReplicationConfig::for_testing())
            .run_replicates(&split_scenario(0.0))
            .unwrap();

        assert_eq!(
            model.revenue(&replicates[0]),
            Err(StatisticsError::NoSamples { class: 1 })
        );
        let low_only = model.class_cost(replicates[0].class(2).unwrap()).unwrap();
        let welfare = model.social_welfare(&replicates[0]).unwrap();
        assert!((welfare - low_only).abs() < 1e-9);
    }

    #[test]
    fn test_invalid_scenario_fails_once() {
        let config = split_scenario(0.5).with_phi(2.0);
        let result = ReplicationRunner::default().run(&config);

        assert!(matches!(
            result,
            Err(SimulationError::ConfigRejected(ConfigError::ProbabilityOutOfRange { .. }))
        ));
    }

    #[test]
    fn test_sweep_phi() {
        let runner = ReplicationRunner::new(ReplicationConfig::for_testing());
        let points = sweep_phi(&runner, &split_scenario(0.5), &[0.2, 0.8]).unwrap();

        assert_eq!(points.len(), 2);
        let high_share =
            |point: &PhiPoint| point.summary.class(1).unwrap().completions.unwrap().mean;
        assert!(high_share(&points[1]) > high_share(&points[0]));

        let plain = ScenarioBuilder::new("plain")
            .renewal(
                Distribution::Exponential { rate: 0.5 },
                Distribution::Exponential { rate: 1.0 },
                0,
            )
            .build()
            .unwrap();
        assert!(matches!(
            sweep_phi(&runner, &plain, &[0.5]),
            Err(SimulationError::ConfigRejected(ConfigError::NoSplitStream { .. }))
        ));
    }
}
