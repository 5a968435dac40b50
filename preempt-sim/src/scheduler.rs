//! Time-ordered event list and dispatch loop.

use std::collections::{BinaryHeap, HashSet};

use tracing::trace;

use crate::SimulationError;
use crate::events::{EventId, EventPriority, EventType, SimulationEvent};
use crate::time::{SimTime, SimulationClock};

/// Maximum number of events that can be pending at once.
pub const MAX_EVENT_QUEUE_SIZE: usize = 1_000_000;

/// Receives events in time order from [`EventScheduler::run_until`].
pub trait EventHandler {
    /// Handles one event. The scheduler clock already reads the event's time.
    ///
    /// # Errors
    ///
    /// Any error aborts the run and is returned from `run_until`.
    fn handle(
        &mut self,
        event: SimulationEvent,
        scheduler: &mut EventScheduler,
    ) -> Result<(), SimulationError>;
}

/// Simulated clock plus the pending event list.
///
/// Events are dispatched by (time, [`EventPriority`], submission order).
/// Cancelled events stay in the heap and are skipped when they surface.
#[derive(Debug, Default)]
pub struct EventScheduler {
    clock: SimulationClock,
    event_queue: BinaryHeap<SimulationEvent>,
    live: HashSet<EventId>,
    cancelled: HashSet<EventId>,
    next_event_id: u64,
}

impl EventScheduler {
    /// Creates an empty scheduler at time zero.
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns current simulation time.
    pub fn now(&self) -> SimTime {
        self.clock.now()
    }

    /// Number of events still waiting to be dispatched.
    pub fn pending(&self) -> usize {
        self.live.len()
    }

    /// Schedules an event at `now + delay`.
    ///
    /// # Errors
    ///
    /// - `SimulationError::InvalidEventScheduling` - Negative or non-finite delay
    /// - `SimulationError::EventQueueOverflow` - Event queue is full
    pub fn schedule_after(
        &mut self,
        delay: f64,
        priority: EventPriority,
        event_type: EventType,
    ) -> Result<EventId, SimulationError> {
        if !delay.is_finite() || delay < 0.0 {
            return Err(SimulationError::InvalidEventScheduling {
                reason: format!(
                    "Delay {delay} for {} at {} must be finite and non-negative",
                    event_type.as_str(),
                    self.now()
                ),
            });
        }

        if self.event_queue.len() >= MAX_EVENT_QUEUE_SIZE {
            return Err(SimulationError::EventQueueOverflow {
                count: self.event_queue.len(),
            });
        }

        let id = EventId(self.next_event_id);
        self.next_event_id += 1;
        let timestamp = self.now() + delay;

        trace!(event_id = id.0, %timestamp, kind = event_type.as_str(), "Scheduled event");
        self.event_queue
            .push(SimulationEvent::new(id, timestamp, event_type, priority));
        self.live.insert(id);

        Ok(id)
    }

    /// Cancels a pending event.
    ///
    /// Returns false unless the event is still pending.
    pub fn cancel(&mut self, id: EventId) -> bool {
        if !self.live.remove(&id) {
            return false;
        }
        self.cancelled.insert(id)
    }

    /// Dispatches every event with time at or before `horizon`.
    ///
    /// Events after the horizon stay pending and the clock finishes at
    /// `horizon`. Returns the number of events handed to `handler`.
    ///
    /// # Errors
    ///
    /// - `SimulationError` - Propagated from the handler or the clock
    pub fn run_until<H: EventHandler>(
        &mut self,
        horizon: SimTime,
        handler: &mut H,
    ) -> Result<u64, SimulationError> {
        let mut dispatched = 0;

        while let Some(event) = self.pop_due(horizon) {
            self.clock.advance_to(event.timestamp)?;
            trace!(
                event_id = event.id.0,
                timestamp = %event.timestamp,
                kind = event.event_type.as_str(),
                "Dispatching event"
            );
            handler.handle(event, self)?;
            dispatched += 1;
        }

        if horizon > self.now() {
            self.clock.advance_to(horizon)?;
        }
        Ok(dispatched)
    }

    fn pop_due(&mut self, horizon: SimTime) -> Option<SimulationEvent> {
        loop {
            if self.event_queue.peek()?.timestamp > horizon {
                return None;
            }
            let event = self.event_queue.pop()?;
            if !self.cancelled.remove(&event.id) {
                self.live.remove(&event.id);
                return Some(event);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use proptest::prelude::*;

    use super::*;

    #[derive(Default)]
    struct Recorder {
        seen: Vec<(f64, EventId)>,
    }

    impl EventHandler for Recorder {
        fn handle(
            &mut self,
            event: SimulationEvent,
            scheduler: &mut EventScheduler,
        ) -> Result<(), SimulationError> {
            assert_eq!(scheduler.now(), event.timestamp);
            self.seen.push((event.timestamp.as_f64(), event.id));
            Ok(())
        }
    }

    fn arrival() -> EventType {
        EventType::Arrival { stream: 0 }
    }

    #[test]
    fn test_negative_delay_rejected() {
        let mut scheduler = EventScheduler::new();
        for delay in [-1.0, f64::NAN, f64::INFINITY] {
            let result = scheduler.schedule_after(delay, EventPriority::Arrival, arrival());
            assert!(matches!(
                result,
                Err(SimulationError::InvalidEventScheduling { .. })
            ));
        }
        assert_eq!(scheduler.pending(), 0);
    }

    #[test]
    fn test_run_until_stops_at_horizon() {
        let mut scheduler = EventScheduler::new();
        let mut recorder = Recorder::default();
        for delay in [1.0, 5.0, 5.0, 9.0] {
            scheduler
                .schedule_after(delay, EventPriority::Arrival, arrival())
                .unwrap();
        }

        let dispatched = scheduler
            .run_until(SimTime::new(5.0), &mut recorder)
            .unwrap();

        assert_eq!(dispatched, 3);
        assert_eq!(scheduler.now().as_f64(), 5.0);
        assert_eq!(scheduler.pending(), 1);
    }

    #[test]
    fn test_cancelled_event_is_skipped() {
        let mut scheduler = EventScheduler::new();
        let mut recorder = Recorder::default();
        let first = scheduler
            .schedule_after(1.0, EventPriority::Departure, arrival())
            .unwrap();
        let second = scheduler
            .schedule_after(2.0, EventPriority::Departure, arrival())
            .unwrap();

        assert!(scheduler.cancel(first));
        assert!(!scheduler.cancel(first));
        assert!(!scheduler.cancel(EventId(99)));
        assert_eq!(scheduler.pending(), 1);

        scheduler
            .run_until(SimTime::new(10.0), &mut recorder)
            .unwrap();
        assert_eq!(recorder.seen, vec![(2.0, second)]);
    }

    #[test]
    fn test_dispatched_event_cannot_be_cancelled() {
        let mut scheduler = EventScheduler::new();
        let mut recorder = Recorder::default();
        let done = scheduler
            .schedule_after(1.0, EventPriority::Departure, arrival())
            .unwrap();
        let later = scheduler
            .schedule_after(5.0, EventPriority::Departure, arrival())
            .unwrap();

        scheduler.run_until(SimTime::new(2.0), &mut recorder).unwrap();

        assert!(!scheduler.cancel(done));
        assert_eq!(scheduler.pending(), 1);
        assert!(scheduler.cancel(later));
        assert_eq!(scheduler.pending(), 0);

        scheduler
            .run_until(SimTime::new(10.0), &mut recorder)
            .unwrap();
        assert_eq!(recorder.seen, vec![(1.0, done)]);
    }

    struct Chain {
        remaining: u32,
    }

    impl EventHandler for Chain {
        fn handle(
            &mut self,
            _event: SimulationEvent,
            scheduler: &mut EventScheduler,
        ) -> Result<(), SimulationError> {
            if self.remaining > 0 {
                self.remaining -= 1;
                scheduler.schedule_after(0.5, EventPriority::Arrival, arrival())?;
            }
            Ok(())
        }
    }

    #[test]
    fn test_handler_can_schedule_follow_ups() {
        let mut scheduler = EventScheduler::new();
        scheduler
            .schedule_after(0.0, EventPriority::Arrival, arrival())
            .unwrap();

        let dispatched = scheduler
            .run_until(SimTime::new(100.0), &mut Chain { remaining: 4 })
            .unwrap();

        assert_eq!(dispatched, 5);
        assert_eq!(scheduler.now().as_f64(), 100.0);
        assert_eq!(scheduler.pending(), 0);
    }

    proptest! {
        #[test]
        fn test_dispatch_order_is_time_then_submission(
            delays in prop::collection::vec(0u8..20, 1..64)
        ) {
            let mut scheduler = EventScheduler::new();
            let mut recorder = Recorder::default();
            for delay in &delays {
                scheduler
                    .schedule_after(f64::from(*delay), EventPriority::Arrival, arrival())
                    .unwrap();
            }

            scheduler.run_until(SimTime::new(100.0), &mut recorder).unwrap();

            prop_assert_eq!(recorder.seen.len(), delays.len());
            for pair in recorder.seen.windows(2) {
                let ((t0, id0), (t1, id1)) = (pair[0], pair[1]);
                prop_assert!(t0 < t1 || (t0 == t1 && id0 < id1));
            }
        }
    }
}
