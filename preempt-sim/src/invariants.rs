//! Runtime invariants checked after every dispatched event.
//!
//! A violation means the engine is wrong, not the scenario, so the first one
//! ends the run.

use std::fmt;

use preempt_core::Discipline;

use crate::server::{Server, SlotState};
use crate::time::SimTime;

/// Violation of a simulation invariant.
#[derive(Debug, Clone, PartialEq)]
pub struct InvariantViolation {
    /// Name of the violated invariant
    pub invariant: String,
    /// Detailed description of the violation
    pub description: String,
    /// When the violation occurred
    pub timestamp: SimTime,
}

impl fmt::Display for InvariantViolation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Invariant '{}' violated at {}: {}",
            self.invariant, self.timestamp, self.description
        )
    }
}

/// View of the model handed to invariants.
#[derive(Debug, Clone, Copy)]
pub struct SystemSnapshot<'a> {
    /// Current simulated time
    pub now: SimTime,
    /// Server state
    pub server: &'a Server,
    /// Jobs that entered the system
    pub arrivals: u64,
    /// Jobs that left the system
    pub departures: u64,
}

/// Trait for checking simulation invariants.
pub trait Invariant: Send + Sync {
    /// Checks if invariant holds for current state.
    ///
    /// # Errors
    /// Returns `InvariantViolation` if the invariant condition is not met.
    fn check(&self, snapshot: &SystemSnapshot<'_>) -> Result<(), InvariantViolation>;

    /// Returns name of this invariant.
    fn name(&self) -> &str;

    /// Builds a violation of this invariant.
    fn violation(&self, snapshot: &SystemSnapshot<'_>, description: String) -> InvariantViolation {
        InvariantViolation {
            invariant: self.name().to_string(),
            description,
            timestamp: snapshot.now,
        }
    }
}

/// No slot is idle while jobs wait.
pub struct WorkConservationInvariant;

impl Invariant for WorkConservationInvariant {
    fn check(&self, snapshot: &SystemSnapshot<'_>) -> Result<(), InvariantViolation> {
        let server = snapshot.server;
        let idle = server.slots().iter().filter(|s| s.is_idle()).count();
        if idle > 0 && !server.queue().is_empty() {
            return Err(self.violation(
                snapshot,
                format!("{idle} idle slot(s) with {} queued job(s)", server.queue().len()),
            ));
        }

        let busy = server.busy_time_at(snapshot.now);
        let available = snapshot.now.as_f64() * server.capacity() as f64;
        if busy > available + 1e-9 * available.max(1.0) {
            return Err(self.violation(
                snapshot,
                format!("busy time {busy} exceeds available slot-time {available}"),
            ));
        }
        Ok(())
    }

    fn name(&self) -> &str {
        "WorkConservation"
    }
}

/// No waiting job outranks a job in service.
///
/// Holds only when arrivals may preempt; a non-preemptive server is exempt.
pub struct PriorityOrderInvariant;

impl Invariant for PriorityOrderInvariant {
    fn check(&self, snapshot: &SystemSnapshot<'_>) -> Result<(), InvariantViolation> {
        let server = snapshot.server;
        if server.discipline() == Discipline::NonPreemptive {
            return Ok(());
        }
        let Some(best_waiting) = server.queue().peek() else {
            return Ok(());
        };
        if let Some(worst_serving) = server.in_service().max_by_key(|job| job.priority) {
            if best_waiting.priority < worst_serving.priority {
                return Err(self.violation(
                    snapshot,
                    format!(
                        "{} (class {}) waits while {} (class {}) is served",
                        best_waiting.id,
                        best_waiting.priority,
                        worst_serving.id,
                        worst_serving.priority
                    ),
                ));
            }
        }
        Ok(())
    }

    fn name(&self) -> &str {
        "PriorityOrder"
    }
}

/// Every arrival is queued, in service, or departed.
pub struct JobConservationInvariant;

impl Invariant for JobConservationInvariant {
    fn check(&self, snapshot: &SystemSnapshot<'_>) -> Result<(), InvariantViolation> {
        let in_system = snapshot.server.jobs_in_system() as u64;
        if snapshot.arrivals != in_system + snapshot.departures {
            return Err(self.violation(
                snapshot,
                format!(
                    "{} arrivals but {} in system and {} departed",
                    snapshot.arrivals, in_system, snapshot.departures
                ),
            ));
        }

        let negative = snapshot
            .server
            .slots()
            .iter()
            .filter_map(SlotState::job)
            .chain(snapshot.server.queue().iter())
            .find(|job| job.remaining_service < 0.0);
        if let Some(job) = negative {
            return Err(self.violation(
                snapshot,
                format!("{} has negative remaining service", job.id),
            ));
        }
        Ok(())
    }

    fn name(&self) -> &str {
        "JobConservation"
    }
}

/// The invariants enabled by `check_invariants`.
pub fn default_invariants() -> Vec<Box<dyn Invariant>> {
    vec![
        Box::new(WorkConservationInvariant),
        Box::new(PriorityOrderInvariant),
        Box::new(JobConservationInvariant),
    ]
}
