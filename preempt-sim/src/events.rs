//! Event types and ordering for the scheduler.

use std::cmp::Ordering;
use std::fmt;

use preempt_core::Priority;

use crate::time::SimTime;

/// Identifier assigned to every scheduled event, in submission order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct EventId(pub u64);

/// Identifier assigned to every job, in creation order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct JobId(pub u64);

impl fmt::Display for JobId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "job#{}", self.0)
    }
}

/// Dispatch order for events sharing a timestamp.
///
/// Departures run before arrivals, so a job whose service ends at the same
/// instant a higher-priority job arrives has already left and is never
/// preempted with zero remaining work.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum EventPriority {
    /// Service or switchover completion
    Departure = 0,
    /// Job entering the system
    Arrival = 1,
}

/// Types of events that can occur in the simulation.
#[derive(Debug, Clone, PartialEq)]
pub enum EventType {
    /// Next arrival of a configured stream
    Arrival {
        /// Index into the scenario's streams
        stream: usize,
    },
    /// Job in a server slot finished its remaining service
    ServiceComplete {
        /// Server slot
        slot: usize,
        /// Job that was in service when the event was scheduled
        job: JobId,
    },
    /// Switchover phase on a slot ran to completion
    SwitchoverComplete {
        /// Server slot
        slot: usize,
    },
    /// Single job injected at a fixed time, outside any stream
    Injected {
        /// Class of the job
        priority: Priority,
        /// Service requirement
        service: f64,
    },
}

impl EventType {
    /// Returns string representation of event type for logs.
    pub fn as_str(&self) -> &'static str {
        match self {
            EventType::Arrival { .. } => "Arrival",
            EventType::ServiceComplete { .. } => "ServiceComplete",
            EventType::SwitchoverComplete { .. } => "SwitchoverComplete",
            EventType::Injected { .. } => "Injected",
        }
    }
}

/// Simulation event with timestamp and priority.
#[derive(Debug, Clone)]
pub struct SimulationEvent {
    /// Unique event ID for deterministic ordering
    pub id: EventId,
    /// Scheduled execution time
    pub timestamp: SimTime,
    /// Type of event
    pub event_type: EventType,
    /// Priority for events at same timestamp
    pub priority: EventPriority,
}

impl SimulationEvent {
    /// Creates new simulation event.
    pub fn new(
        id: EventId,
        timestamp: SimTime,
        event_type: EventType,
        priority: EventPriority,
    ) -> Self {
        Self {
            id,
            timestamp,
            event_type,
            priority,
        }
    }

    fn key(&self) -> (SimTime, EventPriority, EventId) {
        (self.timestamp, self.priority, self.id)
    }
}

impl Eq for SimulationEvent {}

impl PartialEq for SimulationEvent {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl Ord for SimulationEvent {
    fn cmp(&self, other: &Self) -> Ordering {
        // Reversed so BinaryHeap pops the earliest (time, priority, id) first
        other.key().cmp(&self.key())
    }
}

impl PartialOrd for SimulationEvent {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

#[cfg(test)]
mod tests {
    use std::collections::BinaryHeap;

    use super::*;

    fn event(id: u64, at: f64, priority: EventPriority) -> SimulationEvent {
        SimulationEvent::new(
            EventId(id),
            SimTime::new(at),
            EventType::Arrival { stream: 0 },
            priority,
        )
    }

    #[test]
    fn test_event_timestamp_ordering() {
        let mut heap = BinaryHeap::new();
        heap.push(event(1, 5.0, EventPriority::Departure));
        heap.push(event(2, 1.0, EventPriority::Arrival));

        assert_eq!(heap.pop().unwrap().id, EventId(2));
        assert_eq!(heap.pop().unwrap().id, EventId(1));
    }

    #[test]
    fn test_departure_before_arrival_at_same_time() {
        let mut heap = BinaryHeap::new();
        heap.push(event(1, 3.0, EventPriority::Arrival));
        heap.push(event(2, 3.0, EventPriority::Departure));

        assert_eq!(heap.pop().unwrap().priority, EventPriority::Departure);
    }

    #[test]
    fn test_fifo_within_priority() {
        let mut heap = BinaryHeap::new();
        for id in [3, 1, 2] {
            heap.push(event(id, 7.0, EventPriority::Arrival));
        }

        let order: Vec<u64> = std::iter::from_fn(|| heap.pop().map(|e| e.id.0)).collect();
        assert_eq!(order, vec![1, 2, 3]);
    }
}
