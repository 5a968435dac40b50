//! Preempt Sim - discrete-event priority-preemption queueing engine
//!
//! One replicate is a private [`EventScheduler`] driving a [`Server`] with a
//! shared priority queue, fed by arrival generators, with completions
//! recorded by a warm-up-gated statistics collector. The
//! [`ReplicationRunner`] runs independent replicates in parallel and reduces
//! them to confidence intervals.

#![warn(missing_docs)]

pub mod analytics;
mod error;
pub mod events;
pub mod generators;
pub mod invariants;
pub mod orchestrator;
pub mod presets;
pub mod queue;
pub mod scheduler;
pub mod server;
pub mod simulation;
pub mod stats;
pub mod time;

pub use error::{SimulationError, StatisticsError};
pub use events::{EventId, EventPriority, EventType, JobId, SimulationEvent};
pub use generators::{ArrivalGenerator, GeneratedArrival};
pub use invariants::{
    Invariant, InvariantViolation, JobConservationInvariant, PriorityOrderInvariant,
    SystemSnapshot, WorkConservationInvariant,
};
pub use orchestrator::{
    ClassSummary, CostModel, EmptyClassPolicy, Estimate, PhiPoint, ReplicationRunner,
    ScenarioSummary, normal_quantile, sweep_phi,
};
pub use presets::ScenarioPresets;
pub use queue::{Job, QueueKey, ReadyQueue};
pub use scheduler::{EventHandler, EventScheduler, MAX_EVENT_QUEUE_SIZE};
pub use server::{Departure, Server, SlotState};
pub use simulation::{PriorityQueueSimulation, run_simulation};
pub use stats::{ClassStatistics, PerClassStats, StatisticsCollector};
pub use time::{SimTime, SimulationClock};
