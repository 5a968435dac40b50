//! Closed-form M/G/1 references.
//!
//! Used to validate the engine and as substitute values for classes that
//! record no completions. All functions return `None` when the relevant
//! moments are infinite or the load leaves the stable region.

use preempt_core::{ArrivalStreamConfig, ClassAssignment, Discipline, ScenarioConfig};
use serde::Serialize;

/// Arrival rate and service moments of one class.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize)]
pub struct ClassLoad {
    /// Arrival rate
    pub lambda: f64,
    /// Mean service time
    pub mean_service: f64,
    /// Second moment of the service time
    pub second_moment: f64,
}

impl ClassLoad {
    /// Offered load of the class.
    pub fn rho(&self) -> f64 {
        self.lambda * self.mean_service
    }

    fn merge(&mut self, other: ClassLoad) {
        let lambda = self.lambda + other.lambda;
        if lambda > 0.0 {
            self.mean_service =
                (self.lambda * self.mean_service + other.lambda * other.mean_service) / lambda;
            self.second_moment =
                (self.lambda * self.second_moment + other.lambda * other.second_moment) / lambda;
        }
        self.lambda = lambda;
    }
}

/// Mean sojourn time of an M/G/1 FIFO queue (Pollaczek–Khinchine).
pub fn pollaczek_khinchine(lambda: f64, mean_service: f64, second_moment: f64) -> Option<f64> {
    let rho = lambda * mean_service;
    if !(0.0..1.0).contains(&rho) {
        return None;
    }
    Some(lambda * second_moment / (2.0 * (1.0 - rho)) + mean_service)
}

/// Mean sojourn time of class `k` under preemptive-resume priority.
///
/// Class 0 is served first. Lower classes never delay higher ones.
pub fn preemptive_resume_sojourn(classes: &[ClassLoad], k: usize) -> Option<f64> {
    let target = classes.get(k)?;
    let sigma_above: f64 = classes[..k].iter().map(ClassLoad::rho).sum();
    let sigma_k = sigma_above + target.rho();
    if sigma_k >= 1.0 {
        return None;
    }
    let residual: f64 = classes[..=k]
        .iter()
        .map(|c| c.lambda * c.second_moment)
        .sum::<f64>()
        / 2.0;
    Some(
        target.mean_service / (1.0 - sigma_above)
            + residual / ((1.0 - sigma_above) * (1.0 - sigma_k)),
    )
}

/// Mean sojourn time of class `k` under non-preemptive priority.
pub fn non_preemptive_sojourn(classes: &[ClassLoad], k: usize) -> Option<f64> {
    let target = classes.get(k)?;
    let total: f64 = classes.iter().map(ClassLoad::rho).sum();
    if total >= 1.0 {
        return None;
    }
    let sigma_above: f64 = classes[..k].iter().map(ClassLoad::rho).sum();
    let sigma_k = sigma_above + target.rho();
    let residual: f64 = classes
        .iter()
        .map(|c| c.lambda * c.second_moment)
        .sum::<f64>()
        / 2.0;
    Some(residual / ((1.0 - sigma_above) * (1.0 - sigma_k)) + target.mean_service)
}

/// Per-class arrival rates and service moments implied by a scenario.
///
/// Split streams contribute `phi` and `1 - phi` of their rate to the two
/// classes. Trace streams use the empirical moments of their on-periods.
/// Returns `None` if a stream has an infinite moment.
pub fn class_loads(config: &ScenarioConfig) -> Option<Vec<ClassLoad>> {
    let mut loads = vec![ClassLoad::default(); config.classes];

    for stream in &config.streams {
        match stream {
            ArrivalStreamConfig::Renewal {
                interarrival,
                service,
                classes,
            } => {
                let rate = 1.0 / interarrival.mean()?;
                let load = ClassLoad {
                    lambda: rate,
                    mean_service: service.mean()?,
                    second_moment: service.second_moment()?,
                };
                match *classes {
                    ClassAssignment::Fixed { priority } => {
                        loads.get_mut(usize::from(priority))?.merge(load);
                    }
                    ClassAssignment::Split { phi, high, low } => {
                        loads.get_mut(usize::from(high))?.merge(ClassLoad {
                            lambda: rate * phi,
                            ..load
                        });
                        loads.get_mut(usize::from(low))?.merge(ClassLoad {
                            lambda: rate * (1.0 - phi),
                            ..load
                        });
                    }
                }
            }
            ArrivalStreamConfig::Trace { periods, priority } => {
                let n = periods.len() as f64;
                let cycle: f64 = periods.iter().map(|p| p.on + p.off).sum();
                if n == 0.0 || cycle <= 0.0 {
                    return None;
                }
                loads.get_mut(usize::from(*priority))?.merge(ClassLoad {
                    lambda: n / cycle,
                    mean_service: periods.iter().map(|p| p.on).sum::<f64>() / n,
                    second_moment: periods.iter().map(|p| p.on * p.on).sum::<f64>() / n,
                });
            }
        }
    }

    Some(loads)
}

/// Sojourn of every class of a scenario under its scheduling discipline.
///
/// Classes without arrivals map to `None`. Setup phases are not modelled.
pub fn expected_sojourns(config: &ScenarioConfig) -> Option<Vec<Option<f64>>> {
    let loads = class_loads(config)?;
    let sojourn: fn(&[ClassLoad], usize) -> Option<f64> = match config.discipline {
        Discipline::PreemptiveResume => preemptive_resume_sojourn,
        Discipline::NonPreemptive => non_preemptive_sojourn,
    };
    Some(
        (0..loads.len())
            .map(|k| {
                if loads[k].lambda > 0.0 {
                    sojourn(&loads, k)
                } else {
                    None
                }
            })
            .collect(),
    )
}

#[cfg(test)]
mod tests {
    use preempt_core::{Distribution, ScenarioBuilder, TracePeriod};

    use super::*;

    #[test]
    fn test_pk_md1() {
        let w = pollaczek_khinchine(0.9, 1.0, 1.0).unwrap();
        assert!((w - 5.5).abs() < 1e-12);
        assert_eq!(pollaczek_khinchine(1.0, 1.0, 1.0), None);
    }

    #[test]
    fn test_single_class_priority_matches_pk() {
        let classes = [ClassLoad {
            lambda: 0.5,
            mean_service: 1.0,
            second_moment: 2.0,
        }];
        let pk = pollaczek_khinchine(0.5, 1.0, 2.0).unwrap();

        assert!((preemptive_resume_sojourn(&classes, 0).unwrap() - pk).abs() < 1e-12);
        assert!((non_preemptive_sojourn(&classes, 0).unwrap() - pk).abs() < 1e-12);
    }

    #[test]
    fn test_top_class_ignores_lower_classes_under_preemption() {
        let top = ClassLoad {
            lambda: 0.2,
            mean_service: 1.0,
            second_moment: 2.0,
        };
        let low = ClassLoad {
            lambda: 0.5,
            mean_service: 1.0,
            second_moment: 2.0,
        };

        let alone = preemptive_resume_sojourn(&[top], 0).unwrap();
        let shared = preemptive_resume_sojourn(&[top, low], 0).unwrap();
        assert!((alone - shared).abs() < 1e-12);
        assert!(non_preemptive_sojourn(&[top, low], 0).unwrap() > alone);
    }

    #[test]
    fn test_class_loads_from_split_and_trace() {
        let config = ScenarioBuilder::new("mixed")
            .classes(3)
            .stream(ArrivalStreamConfig::Trace {
                periods: vec![TracePeriod { off: 9.0, on: 1.0 }],
                priority: 0,
            })
            .stream(ArrivalStreamConfig::Renewal {
                interarrival: Distribution::Exponential { rate: 0.5 },
                service: Distribution::Deterministic { value: 1.0 },
                classes: ClassAssignment::Split {
                    phi: 0.25,
                    high: 1,
                    low: 2,
                },
            })
            .build()
            .unwrap();

        let loads = class_loads(&config).unwrap();
        assert!((loads[0].lambda - 0.1).abs() < 1e-12);
        assert!((loads[1].lambda - 0.125).abs() < 1e-12);
        assert!((loads[2].lambda - 0.375).abs() < 1e-12);

        let sojourns = expected_sojourns(&config).unwrap();
        assert!(sojourns.iter().all(Option::is_some));
    }

    #[test]
    fn test_expected_sojourns_follow_discipline() {
        let builder = ScenarioBuilder::new("two-class")
            .classes(2)
            .renewal(
                Distribution::Exponential { rate: 0.3 },
                Distribution::Exponential { rate: 1.0 },
                0,
            )
            .renewal(
                Distribution::Exponential { rate: 0.4 },
                Distribution::Exponential { rate: 1.0 },
                1,
            );
        let preemptive = builder.clone().build().unwrap();
        let non_preemptive = builder
            .discipline(Discipline::NonPreemptive)
            .build()
            .unwrap();

        let loads = class_loads(&preemptive).unwrap();
        let pr = expected_sojourns(&preemptive).unwrap();
        let np = expected_sojourns(&non_preemptive).unwrap();
        assert_eq!(pr[0], preemptive_resume_sojourn(&loads, 0));
        assert_eq!(np[0], non_preemptive_sojourn(&loads, 0));
        assert!(np[0].unwrap() > pr[0].unwrap());
    }
}
