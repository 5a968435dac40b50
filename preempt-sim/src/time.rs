//! Simulated time.

use std::cmp::Ordering;
use std::fmt;
use std::ops::{Add, Sub};

use serde::{Deserialize, Serialize};

use crate::SimulationError;

/// Point in simulated time.
///
/// Ordered with `f64::total_cmp`, so it can key a heap. Values produced by the
/// scheduler are always finite and non-negative.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct SimTime(f64);

impl SimTime {
    /// Start of every run.
    pub const ZERO: SimTime = SimTime(0.0);

    /// Wraps a raw time value.
    pub fn new(value: f64) -> Self {
        Self(value)
    }

    /// Returns the raw time value.
    pub fn as_f64(self) -> f64 {
        self.0
    }
}

impl PartialEq for SimTime {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for SimTime {}

impl Ord for SimTime {
    fn cmp(&self, other: &Self) -> Ordering {
        self.0.total_cmp(&other.0)
    }
}

impl PartialOrd for SimTime {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Add<f64> for SimTime {
    type Output = SimTime;

    fn add(self, delay: f64) -> SimTime {
        SimTime(self.0 + delay)
    }
}

impl Sub for SimTime {
    type Output = f64;

    fn sub(self, earlier: SimTime) -> f64 {
        self.0 - earlier.0
    }
}

impl fmt::Display for SimTime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "t={:.6}", self.0)
    }
}

/// Monotonic simulation clock.
#[derive(Debug, Clone, Default)]
pub struct SimulationClock {
    now: SimTime,
}

impl SimulationClock {
    /// Creates a clock at time zero.
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns current simulation time.
    pub fn now(&self) -> SimTime {
        self.now
    }

    /// Advances simulation time to `target`.
    ///
    /// # Errors
    ///
    /// - `SimulationError::InvalidEventScheduling` - If target time is in the past
    pub fn advance_to(&mut self, target: SimTime) -> Result<(), SimulationError> {
        if target < self.now {
            return Err(SimulationError::InvalidEventScheduling {
                reason: format!("Cannot advance time backwards from {} to {}", self.now, target),
            });
        }
        self.now = target;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_clock_moves_forward_only() {
        let mut clock = SimulationClock::new();
        assert_eq!(clock.now(), SimTime::ZERO);

        clock.advance_to(SimTime::new(2.5)).unwrap();
        clock.advance_to(SimTime::new(2.5)).unwrap();
        assert_eq!(clock.now().as_f64(), 2.5);

        let result = clock.advance_to(SimTime::new(1.0));
        assert!(matches!(
            result,
            Err(SimulationError::InvalidEventScheduling { .. })
        ));
        assert_eq!(clock.now().as_f64(), 2.5);
    }

    #[test]
    fn test_sim_time_arithmetic_and_order() {
        let start = SimTime::new(1.0);
        let later = start + 0.5;

        assert!(later > start);
        assert_eq!(later - start, 0.5);
        assert_eq!(later.to_string(), "t=1.500000");
    }
}
