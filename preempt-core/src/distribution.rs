//! Interarrival and service-time distributions.
//!
//! [`Distribution`] is the serializable description used in scenario files.
//! Before a run it is compiled into a [`Sampler`], which holds the prepared
//! `rand_distr` objects so the sampling path cannot fail.

use std::f64::consts::PI;

use rand::Rng;
use rand_distr::{Distribution as _, Exp, Gamma, LogNormal, Open01};
use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

/// Probability distribution of a non-negative duration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Distribution {
    /// Constant duration
    Deterministic {
        /// Duration returned on every draw
        value: f64,
    },
    /// Exponential with the given rate (mean `1 / rate`)
    Exponential {
        /// Rate parameter
        rate: f64,
    },
    /// Gamma with shape/scale parameterization
    Gamma {
        /// Shape parameter
        shape: f64,
        /// Scale parameter
        scale: f64,
    },
    /// Two-phase mixture of exponentials
    HyperExponential {
        /// Probability of drawing from the first phase
        p: f64,
        /// Rate of the first phase
        rate1: f64,
        /// Rate of the second phase
        rate2: f64,
    },
    /// Absolute value of a logistic variate
    Logistic {
        /// Location (mean of the underlying logistic)
        location: f64,
        /// Scale parameter
        scale: f64,
    },
    /// Generalized Pareto sampled by inverse CDF
    GeneralizedPareto {
        /// Location parameter
        location: f64,
        /// Scale parameter
        scale: f64,
        /// Shape parameter (xi)
        shape: f64,
    },
    /// Log-normal with parameters of the underlying normal
    LogNormal {
        /// Mean of the underlying normal
        mu: f64,
        /// Standard deviation of the underlying normal
        sigma: f64,
    },
}

impl Distribution {
    /// Builds a service distribution from a rate and second-moment ratio.
    ///
    /// `k` is defined so that the second moment is `k / mu^2`. `k == 1` is the
    /// deterministic case; `k > 1` yields a Gamma with mean `1 / mu`, and
    /// `k == 2` reduces to the exponential.
    ///
    /// # Errors
    ///
    /// - `ConfigError::InvalidMomentRatio` - If `k < 1` or not finite
    /// - `ConfigError::InvalidParameter` - If `mu` is not positive
    pub fn from_moment_ratio(mu: f64, k: f64) -> Result<Self, ConfigError> {
        require_positive("mu", mu)?;
        if !k.is_finite() || k < 1.0 {
            return Err(ConfigError::InvalidMomentRatio { k });
        }
        if k == 1.0 {
            return Ok(Self::Deterministic { value: 1.0 / mu });
        }
        Ok(Self::Gamma {
            shape: 1.0 / (k - 1.0),
            scale: (k - 1.0) / mu,
        })
    }

    /// Checks every parameter is within its domain.
    ///
    /// # Errors
    ///
    /// - `ConfigError::InvalidParameter` - Non-positive or non-finite parameter
    /// - `ConfigError::ProbabilityOutOfRange` - Mixture probability outside [0, 1]
    pub fn validate(&self) -> Result<(), ConfigError> {
        match *self {
            Self::Deterministic { value } => {
                if !value.is_finite() || value < 0.0 {
                    return Err(ConfigError::InvalidParameter {
                        name: "deterministic.value",
                        value,
                    });
                }
            }
            Self::Exponential { rate } => require_positive("exponential.rate", rate)?,
            Self::Gamma { shape, scale } => {
                require_positive("gamma.shape", shape)?;
                require_positive("gamma.scale", scale)?;
            }
            Self::HyperExponential { p, rate1, rate2 } => {
                require_probability("hyper_exponential.p", p)?;
                require_positive("hyper_exponential.rate1", rate1)?;
                require_positive("hyper_exponential.rate2", rate2)?;
            }
            Self::Logistic { location, scale } => {
                require_finite("logistic.location", location)?;
                require_positive("logistic.scale", scale)?;
            }
            Self::GeneralizedPareto {
                location,
                scale,
                shape,
            } => {
                if !location.is_finite() || location < 0.0 {
                    return Err(ConfigError::InvalidParameter {
                        name: "generalized_pareto.location",
                        value: location,
                    });
                }
                require_positive("generalized_pareto.scale", scale)?;
                // Negative shapes have bounded support; they must not reach below zero.
                require_finite("generalized_pareto.shape", shape)?;
                if shape < 0.0 && location - scale / shape < 0.0 {
                    return Err(ConfigError::InvalidParameter {
                        name: "generalized_pareto.shape",
                        value: shape,
                    });
                }
            }
            Self::LogNormal { mu, sigma } => {
                require_finite("log_normal.mu", mu)?;
                require_positive("log_normal.sigma", sigma)?;
            }
        }
        Ok(())
    }

    /// Returns the first moment, or `None` when it is infinite.
    pub fn mean(&self) -> Option<f64> {
        let mean = match *self {
            Self::Deterministic { value } => value,
            Self::Exponential { rate } => 1.0 / rate,
            Self::Gamma { shape, scale } => shape * scale,
            Self::HyperExponential { p, rate1, rate2 } => p / rate1 + (1.0 - p) / rate2,
            // E|X| for X ~ Logistic(location, scale)
            Self::Logistic { location, scale } => {
                location + 2.0 * scale * (-location / scale).exp().ln_1p()
            }
            Self::GeneralizedPareto {
                location,
                scale,
                shape,
            } => {
                if shape >= 1.0 {
                    return None;
                }
                location + scale / (1.0 - shape)
            }
            Self::LogNormal { mu, sigma } => (mu + sigma * sigma / 2.0).exp(),
        };
        Some(mean)
    }

    /// Returns the second moment, or `None` when it is infinite.
    pub fn second_moment(&self) -> Option<f64> {
        let moment = match *self {
            Self::Deterministic { value } => value * value,
            Self::Exponential { rate } => 2.0 / (rate * rate),
            Self::Gamma { shape, scale } => shape * (shape + 1.0) * scale * scale,
            Self::HyperExponential { p, rate1, rate2 } => {
                2.0 * p / (rate1 * rate1) + 2.0 * (1.0 - p) / (rate2 * rate2)
            }
            Self::Logistic { location, scale } => {
                location * location + PI * PI * scale * scale / 3.0
            }
            Self::GeneralizedPareto {
                location,
                scale,
                shape,
            } => {
                if shape >= 0.5 {
                    return None;
                }
                let mean = location + scale / (1.0 - shape);
                let variance = scale * scale / ((1.0 - shape).powi(2) * (1.0 - 2.0 * shape));
                variance + mean * mean
            }
            Self::LogNormal { mu, sigma } => (2.0 * mu + 2.0 * sigma * sigma).exp(),
        };
        Some(moment)
    }

    /// Compiles the distribution into a ready-to-use sampler.
    ///
    /// # Errors
    ///
    /// - `ConfigError` - If any parameter is outside its domain
    pub fn sampler(&self) -> Result<Sampler, ConfigError> {
        self.validate()?;
        let sampler = match *self {
            Self::Deterministic { value } => Sampler::Deterministic(value),
            Self::Exponential { rate } => Sampler::Exponential(exp(rate)?),
            Self::Gamma { shape, scale } => Sampler::Gamma(
                Gamma::new(shape, scale).map_err(|_| ConfigError::InvalidParameter {
                    name: "gamma.shape",
                    value: shape,
                })?,
            ),
            Self::HyperExponential { p, rate1, rate2 } => Sampler::HyperExponential {
                p,
                first: exp(rate1)?,
                second: exp(rate2)?,
            },
            Self::Logistic { location, scale } => Sampler::Logistic { location, scale },
            Self::GeneralizedPareto {
                location,
                scale,
                shape,
            } => Sampler::GeneralizedPareto {
                location,
                scale,
                shape,
            },
            Self::LogNormal { mu, sigma } => Sampler::LogNormal(
                LogNormal::new(mu, sigma).map_err(|_| ConfigError::InvalidParameter {
                    name: "log_normal.sigma",
                    value: sigma,
                })?,
            ),
        };
        Ok(sampler)
    }
}

/// Prepared sampler for a [`Distribution`].
#[derive(Debug, Clone)]
pub enum Sampler {
    /// Constant duration
    Deterministic(f64),
    /// Exponential variates
    Exponential(Exp<f64>),
    /// Gamma variates
    Gamma(Gamma<f64>),
    /// Mixture of two exponentials
    HyperExponential {
        /// Probability of the first phase
        p: f64,
        /// First phase
        first: Exp<f64>,
        /// Second phase
        second: Exp<f64>,
    },
    /// Folded logistic
    Logistic {
        /// Location
        location: f64,
        /// Scale
        scale: f64,
    },
    /// Generalized Pareto by inverse CDF
    GeneralizedPareto {
        /// Location
        location: f64,
        /// Scale
        scale: f64,
        /// Shape
        shape: f64,
    },
    /// Log-normal variates
    LogNormal(LogNormal<f64>),
}

impl Sampler {
    /// Draws one non-negative duration.
    pub fn sample<R: Rng + ?Sized>(&self, rng: &mut R) -> f64 {
        match self {
            Self::Deterministic(value) => *value,
            Self::Exponential(exp) => exp.sample(rng),
            Self::Gamma(gamma) => gamma.sample(rng),
            Self::HyperExponential { p, first, second } => {
                if rng.random::<f64>() <= *p {
                    first.sample(rng)
                } else {
                    second.sample(rng)
                }
            }
            Self::Logistic { location, scale } => {
                let u: f64 = rng.sample(Open01);
                // Logistic has negative support; fold onto the positive axis.
                (location + scale * (u / (1.0 - u)).ln()).abs()
            }
            Self::GeneralizedPareto {
                location,
                scale,
                shape,
            } => {
                let cdf = rng.random::<f64>();
                if *shape == 0.0 {
                    location - scale * (1.0 - cdf).ln()
                } else {
                    (scale / shape) * ((1.0 - cdf).powf(-shape) - 1.0) + location
                }
            }
            Self::LogNormal(log_normal) => log_normal.sample(rng),
        }
    }
}

fn exp(rate: f64) -> Result<Exp<f64>, ConfigError> {
    Exp::new(rate).map_err(|_| ConfigError::InvalidParameter {
        name: "exponential.rate",
        value: rate,
    })
}

fn require_positive(name: &'static str, value: f64) -> Result<(), ConfigError> {
    if !value.is_finite() || value <= 0.0 {
        return Err(ConfigError::InvalidParameter { name, value });
    }
    Ok(())
}

fn require_finite(name: &'static str, value: f64) -> Result<(), ConfigError> {
    if !value.is_finite() {
        return Err(ConfigError::InvalidParameter { name, value });
    }
    Ok(())
}

pub(crate) fn require_probability(name: &'static str, value: f64) -> Result<(), ConfigError> {
    if !(0.0..=1.0).contains(&value) {
        return Err(ConfigError::ProbabilityOutOfRange { name, value });
    }
    Ok(())
}
