//! Arrival generators.
//!
//! A generator only produces numbers; the simulation turns each draw into a
//! job submission and the next `Arrival` event.

use preempt_core::{
    ArrivalStreamConfig, ClassAssignment, ConfigError, DeterministicRng, Priority, Sampler,
    TracePeriod,
};

/// One arrival produced by a generator.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GeneratedArrival {
    /// Class of the new job
    pub priority: Priority,
    /// Service requirement of the new job
    pub service: f64,
    /// Delay until the stream's next arrival
    pub next_delay: f64,
}

/// Compiled job source.
#[derive(Debug, Clone)]
pub enum ArrivalGenerator {
    /// Independent interarrival and service draws
    Renewal {
        /// Interarrival sampler
        interarrival: Sampler,
        /// Service sampler
        service: Sampler,
        /// Class selection rule
        classes: ClassAssignment,
    },
    /// Replays off/on periods with wraparound
    Trace {
        /// Periods to replay
        periods: Vec<TracePeriod>,
        /// Class of every visit
        priority: Priority,
        /// Index of the next visit
        cursor: usize,
    },
}

impl ArrivalGenerator {
    /// Compiles a stream configuration.
    ///
    /// # Errors
    ///
    /// - `ConfigError` - If a distribution cannot be sampled or a trace is empty
    pub fn from_config(stream: usize, config: &ArrivalStreamConfig) -> Result<Self, ConfigError> {
        match config {
            ArrivalStreamConfig::Renewal {
                interarrival,
                service,
                classes,
            } => Ok(Self::Renewal {
                interarrival: interarrival.sampler()?,
                service: service.sampler()?,
                classes: classes.clone(),
            }),
            ArrivalStreamConfig::Trace { periods, priority } => {
                if periods.is_empty() {
                    return Err(ConfigError::EmptyTrace { stream });
                }
                Ok(Self::Trace {
                    periods: periods.clone(),
                    priority: *priority,
                    cursor: 0,
                })
            }
        }
    }

    /// Delay from time zero to the first arrival.
    pub fn first_delay(&mut self, rng: &mut DeterministicRng) -> f64 {
        match self {
            Self::Renewal { interarrival, .. } => interarrival.sample(rng),
            Self::Trace { periods, .. } => periods.first().map_or(0.0, |p| p.off),
        }
    }

    /// Produces the job arriving now and the delay to the following arrival.
    ///
    /// Renewal streams draw the class decision, then the service time, then
    /// the next interarrival time.
    pub fn arrive(&mut self, rng: &mut DeterministicRng) -> GeneratedArrival {
        match self {
            Self::Renewal {
                interarrival,
                service,
                classes,
            } => {
                let priority = match *classes {
                    ClassAssignment::Fixed { priority } => priority,
                    ClassAssignment::Split { phi, high, low } => {
                        if rng.random_unit_closed() <= phi {
                            high
                        } else {
                            low
                        }
                    }
                };
                let service = service.sample(rng);
                let next_delay = interarrival.sample(rng);
                GeneratedArrival {
                    priority,
                    service,
                    next_delay,
                }
            }
            Self::Trace {
                periods,
                priority,
                cursor,
            } => {
                let service = periods[*cursor].on;
                *cursor = (*cursor + 1) % periods.len();
                GeneratedArrival {
                    priority: *priority,
                    service,
                    next_delay: service + periods[*cursor].off,
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use preempt_core::Distribution;

    use super::*;

    fn split(phi: f64) -> ArrivalGenerator {
        ArrivalGenerator::from_config(
            0,
            &ArrivalStreamConfig::Renewal {
                interarrival: Distribution::Exponential { rate: 1.0 },
                service: Distribution::Deterministic { value: 1.0 },
                classes: ClassAssignment::Split {
                    phi,
                    high: 1,
                    low: 2,
                },
            },
        )
        .unwrap()
    }

    #[test]
    fn test_trace_replays_with_wraparound() {
        let mut generator = ArrivalGenerator::from_config(
            0,
            &ArrivalStreamConfig::Trace {
                periods: vec![
                    TracePeriod { off: 3.0, on: 1.0 },
                    TracePeriod { off: 5.0, on: 2.0 },
                ],
                priority: 0,
            },
        )
        .unwrap();
        let mut rng = DeterministicRng::from_seed(0);

        assert_eq!(generator.first_delay(&mut rng), 3.0);
        let first = generator.arrive(&mut rng);
        assert_eq!((first.service, first.next_delay), (1.0, 6.0));
        let second = generator.arrive(&mut rng);
        assert_eq!((second.service, second.next_delay), (2.0, 5.0));
        let third = generator.arrive(&mut rng);
        assert_eq!(third.service, 1.0);
    }

    #[test]
    fn test_phi_boundaries_are_exact() {
        let mut rng = DeterministicRng::from_seed(4);

        let mut never = split(0.0);
        assert!((0..1_000).all(|_| never.arrive(&mut rng).priority == 2));

        let mut always = split(1.0);
        assert!((0..1_000).all(|_| always.arrive(&mut rng).priority == 1));
    }

    #[test]
    fn test_phi_split_frequency() {
        let mut rng = DeterministicRng::from_seed(8);
        let mut generator = split(0.3);

        let draws = 50_000;
        let high = (0..draws)
            .filter(|_| generator.arrive(&mut rng).priority == 1)
            .count();
        let fraction = high as f64 / draws as f64;
        assert!((fraction - 0.3).abs() < 0.01, "fraction was {fraction}");
    }

    #[test]
    fn test_renewal_draw_order() {
        let mut generator = split(0.5);
        let mut rng = DeterministicRng::from_seed(21);
        let arrival = generator.arrive(&mut rng);

        let mut replay = DeterministicRng::from_seed(21);
        let decision = replay.random_unit_closed();
        let expected_class = if decision <= 0.5 { 1 } else { 2 };
        let next = Distribution::Exponential { rate: 1.0 }
            .sampler()
            .unwrap()
            .sample(&mut replay);

        assert_eq!(arrival.priority, expected_class);
        assert_eq!(arrival.next_delay, next);
    }
}
