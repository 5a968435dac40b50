//! Priority/preemption server.
//!
//! Each slot is a small state machine:
//!
//! ```text
//! Idle -> Serving(job) -> Idle                     (service complete)
//!                      -> Idle + job requeued      (preempted, resume later)
//! Idle -> Setup(job)   -> Serving(job)             (setup complete)
//!                      -> Idle + job requeued      (interrupted, setup lost)
//! Idle -> Switchover   -> Idle                     (switchover complete)
//!                      -> Idle                     (interrupted, progress lost)
//! ```
//!
//! The server owns every job between submission and departure. Completion
//! timers live in the [`EventScheduler`]; preemption cancels the pending timer
//! and the requeued job is rescheduled with its remaining work when it next
//! reaches a slot.

use preempt_core::{DeterministicRng, Discipline, Priority, Sampler, SetupTrigger};
use serde::Serialize;
use tracing::{debug, trace};

use crate::SimulationError;
use crate::events::{EventId, EventPriority, EventType, JobId};
use crate::queue::{Job, QueueKey, ReadyQueue};
use crate::scheduler::EventScheduler;
use crate::time::SimTime;

/// State of one server slot.
#[derive(Debug)]
pub enum SlotState {
    /// Waiting for work
    Idle,
    /// Serving a job
    Serving {
        /// Job in service
        job: Job,
        /// Start of the current service quantum
        started: SimTime,
        /// Pending completion event
        event: EventId,
    },
    /// Running a setup phase that restarts from scratch when interrupted
    Switchover {
        /// Job waiting on the setup; `None` for a switchover between busy periods
        job: Option<Job>,
        /// Start of the phase
        started: SimTime,
        /// Pending completion event
        event: EventId,
    },
}

impl SlotState {
    /// True for [`SlotState::Idle`].
    pub fn is_idle(&self) -> bool {
        matches!(self, SlotState::Idle)
    }

    /// Job held by the slot, in service or in setup.
    pub fn job(&self) -> Option<&Job> {
        match self {
            SlotState::Serving { job, .. } => Some(job),
            SlotState::Switchover { job, .. } => job.as_ref(),
            SlotState::Idle => None,
        }
    }
}

/// Record of a job leaving the system.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Departure {
    /// Creation-order job identifier
    pub job_id: u64,
    /// Class of the job
    pub class: Priority,
    /// Time the job arrived
    pub arrival_time: f64,
    /// Time its service finished
    pub completion_time: f64,
    /// Service requirement at arrival
    pub original_service: f64,
    /// Times the job was preempted
    pub preemptions: u32,
    /// Total service quanta received
    pub service_received: f64,
    /// Total time spent waiting in the queue
    pub time_queued: f64,
    /// Total time spent in setup phases, including interrupted ones
    pub setup_time: f64,
}

impl Departure {
    /// Completion minus arrival.
    pub fn flow_time(&self) -> f64 {
        self.completion_time - self.arrival_time
    }

    /// Flow time minus the original service requirement.
    pub fn queueing_delay(&self) -> f64 {
        self.flow_time() - self.original_service
    }
}

#[derive(Debug)]
struct SetupPolicy {
    class: Priority,
    duration: Sampler,
    trigger: SetupTrigger,
    /// A job below `class` has been set up since the last start at or above it
    low_period: bool,
}

impl SetupPolicy {
    /// Decides whether a job of `priority` reaching a slot runs a setup first.
    fn admits(&mut self, priority: Priority) -> bool {
        match self.trigger {
            SetupTrigger::AfterBusyPeriod => false,
            SetupTrigger::BeforeEachService => priority >= self.class,
            SetupTrigger::BusyPeriodStart => {
                if priority <= self.class {
                    self.low_period = false;
                    false
                } else if self.low_period {
                    false
                } else {
                    self.low_period = true;
                    true
                }
            }
        }
    }
}

/// Shared ready queue in front of `capacity` slots.
#[derive(Debug)]
pub struct Server {
    slots: Vec<SlotState>,
    queue: ReadyQueue,
    discipline: Discipline,
    setup: Option<SetupPolicy>,
    busy_time: f64,
    switchover_time: f64,
    preemptions: u64,
    interrupted_switchovers: u64,
}

impl Server {
    /// Creates an idle preemptive-resume server with `capacity` slots.
    pub fn new(capacity: usize) -> Self {
        Self {
            slots: (0..capacity).map(|_| SlotState::Idle).collect(),
            queue: ReadyQueue::new(),
            discipline: Discipline::PreemptiveResume,
            setup: None,
            busy_time: 0.0,
            switchover_time: 0.0,
            preemptions: 0,
            interrupted_switchovers: 0,
        }
    }

    /// Sets whether arrivals preempt jobs in service.
    pub fn with_discipline(mut self, discipline: Discipline) -> Self {
        self.discipline = discipline;
        self
    }

    /// Enables setup phases for `class` under `trigger`.
    pub fn with_setup(
        mut self,
        class: Priority,
        duration: Sampler,
        trigger: SetupTrigger,
    ) -> Self {
        self.setup = Some(SetupPolicy {
            class,
            duration,
            trigger,
            low_period: false,
        });
        self
    }

    /// Number of slots.
    pub fn capacity(&self) -> usize {
        self.slots.len()
    }

    /// Scheduling discipline.
    pub fn discipline(&self) -> Discipline {
        self.discipline
    }

    /// Current slot states.
    pub fn slots(&self) -> &[SlotState] {
        &self.slots
    }

    /// Jobs waiting for a slot.
    pub fn queue(&self) -> &ReadyQueue {
        &self.queue
    }

    /// Jobs holding a slot, in service or in setup.
    pub fn in_service(&self) -> impl Iterator<Item = &Job> {
        self.slots.iter().filter_map(SlotState::job)
    }

    /// Jobs queued or holding a slot.
    pub fn jobs_in_system(&self) -> usize {
        self.queue.len() + self.in_service().count()
    }

    /// Total preemptions so far. Interrupted setups are not counted.
    pub fn preemptions(&self) -> u64 {
        self.preemptions
    }

    /// Setup and switchover phases cut short by a higher class.
    pub fn interrupted_switchovers(&self) -> u64 {
        self.interrupted_switchovers
    }

    /// Slot-time spent serving jobs up to `now`, including open quanta.
    pub fn busy_time_at(&self, now: SimTime) -> f64 {
        let open: f64 = self
            .slots
            .iter()
            .map(|slot| match slot {
                SlotState::Serving { started, .. } => now - *started,
                _ => 0.0,
            })
            .sum();
        self.busy_time + open
    }

    /// Slot-time spent in setup or switchover up to `now`, including interrupted phases.
    pub fn switchover_time_at(&self, now: SimTime) -> f64 {
        let open: f64 = self
            .slots
            .iter()
            .map(|slot| match slot {
                SlotState::Switchover { started, .. } => now - *started,
                _ => 0.0,
            })
            .sum();
        self.switchover_time + open
    }

    /// Accepts an arriving job, starting or preempting service as needed.
    ///
    /// Equal priority never preempts, and nothing preempts under
    /// [`Discipline::NonPreemptive`]. A switchover between busy periods is
    /// interrupted only by a job of its own class or higher; lower classes
    /// wait behind it.
    ///
    /// # Errors
    ///
    /// - `SimulationError` - If a completion event cannot be scheduled
    pub fn submit(
        &mut self,
        job: Job,
        scheduler: &mut EventScheduler,
        rng: &mut DeterministicRng,
    ) -> Result<(), SimulationError> {
        if let Some(policy) = &self.setup {
            if policy.trigger == SetupTrigger::AfterBusyPeriod && job.priority <= policy.class {
                self.interrupt_switchovers(scheduler);
            }
        }

        trace!(job = %job.id, priority = job.priority, at = %scheduler.now(), "Job submitted");
        self.queue.push(job);
        self.dispatch(scheduler, rng)
    }

    /// Finishes the job in `slot` and hands back its departure record.
    ///
    /// # Errors
    ///
    /// - `SimulationError::InvalidEventScheduling` - If `slot` is not serving `job_id`
    /// - `SimulationError` - If follow-up events cannot be scheduled
    pub fn complete_service(
        &mut self,
        slot: usize,
        job_id: JobId,
        scheduler: &mut EventScheduler,
        rng: &mut DeterministicRng,
    ) -> Result<Departure, SimulationError> {
        let now = scheduler.now();
        let state = self.take_slot(slot)?;
        let (mut job, started) = match state {
            SlotState::Serving { job, started, .. } if job.id == job_id => (job, started),
            other => {
                let reason = format!("Completion for {job_id} on slot {slot} found {other:?}");
                self.slots[slot] = other;
                return Err(SimulationError::InvalidEventScheduling { reason });
            }
        };

        let elapsed = now - started;
        self.busy_time += elapsed;
        job.service_received += elapsed;
        job.remaining_service = 0.0;

        let departure = Departure {
            job_id: job.id.0,
            class: job.priority,
            arrival_time: job.arrival_time.as_f64(),
            completion_time: now.as_f64(),
            original_service: job.original_service,
            preemptions: job.preemption_count,
            service_received: job.service_received,
            time_queued: job.time_queued,
            setup_time: job.setup_time,
        };
        trace!(job = %job.id, flow = departure.flow_time(), "Job departed");

        if self.ends_switchover_class_busy_period(job.priority) {
            self.start_switchover(slot, scheduler, rng)?;
        }
        self.dispatch(scheduler, rng)?;

        Ok(departure)
    }

    /// Ends the setup or switchover on `slot`, serving the job it held if any.
    ///
    /// # Errors
    ///
    /// - `SimulationError::InvalidEventScheduling` - If `slot` is not in setup
    /// - `SimulationError` - If follow-up events cannot be scheduled
    pub fn complete_switchover(
        &mut self,
        slot: usize,
        scheduler: &mut EventScheduler,
        rng: &mut DeterministicRng,
    ) -> Result<(), SimulationError> {
        let now = scheduler.now();
        match self.take_slot(slot)? {
            SlotState::Switchover { job, started, .. } => {
                let elapsed = now - started;
                self.switchover_time += elapsed;
                debug!(slot, at = %now, "Switchover complete");
                if let Some(mut job) = job {
                    job.setup_time += elapsed;
                    self.serve(slot, job, scheduler)?;
                }
            }
            other => {
                let reason = format!("Switchover completion on slot {slot} found {other:?}");
                self.slots[slot] = other;
                return Err(SimulationError::InvalidEventScheduling { reason });
            }
        }
        self.dispatch(scheduler, rng)
    }

    fn take_slot(&mut self, slot: usize) -> Result<SlotState, SimulationError> {
        let state = self
            .slots
            .get_mut(slot)
            .ok_or_else(|| SimulationError::InvalidEventScheduling {
                reason: format!("Slot {slot} does not exist"),
            })?;
        Ok(std::mem::replace(state, SlotState::Idle))
    }

    fn ends_switchover_class_busy_period(&self, departed: Priority) -> bool {
        match &self.setup {
            Some(policy) if policy.trigger == SetupTrigger::AfterBusyPeriod => {
                departed == policy.class && !self.queue.iter().any(|j| j.priority <= policy.class)
            }
            _ => false,
        }
    }

    fn start_switchover(
        &mut self,
        slot: usize,
        scheduler: &mut EventScheduler,
        rng: &mut DeterministicRng,
    ) -> Result<(), SimulationError> {
        let Some(policy) = &self.setup else {
            return Ok(());
        };
        let duration = policy.duration.sample(rng);
        let event = scheduler.schedule_after(
            duration,
            EventPriority::Departure,
            EventType::SwitchoverComplete { slot },
        )?;
        debug!(slot, duration, at = %scheduler.now(), "Switchover started");
        self.slots[slot] = SlotState::Switchover {
            job: None,
            started: scheduler.now(),
            event,
        };
        Ok(())
    }

    fn interrupt_switchovers(&mut self, scheduler: &mut EventScheduler) {
        let now = scheduler.now();
        for slot in &mut self.slots {
            if let SlotState::Switchover {
                job: None,
                started,
                event,
            } = *slot
            {
                scheduler.cancel(event);
                self.switchover_time += now - started;
                self.interrupted_switchovers += 1;
                *slot = SlotState::Idle;
                debug!(at = %now, lost = now - started, "Switchover interrupted");
            }
        }
    }

    /// Fills idle slots, then preempts while the queue head outranks a job in a slot.
    fn dispatch(
        &mut self,
        scheduler: &mut EventScheduler,
        rng: &mut DeterministicRng,
    ) -> Result<(), SimulationError> {
        while let Some(head) = self.queue.peek_key() {
            if let Some(slot) = self.slots.iter().position(SlotState::is_idle) {
                if let Some(job) = self.queue.pop() {
                    self.start(slot, job, scheduler, rng)?;
                }
                continue;
            }
            if self.discipline == Discipline::NonPreemptive {
                break;
            }

            match self.preemption_victim() {
                Some((slot, victim)) if head.priority < victim.priority => {
                    self.preempt(slot, scheduler);
                }
                _ => break,
            }
        }
        Ok(())
    }

    /// Slot holding the lowest-ranked job: greatest priority value, then latest key.
    fn preemption_victim(&self) -> Option<(usize, QueueKey)> {
        self.slots
            .iter()
            .enumerate()
            .filter_map(|(slot, state)| {
                state.job().map(|job| {
                    let key = QueueKey {
                        priority: job.priority,
                        arrival_time: job.arrival_time,
                        sequence: job.sequence().unwrap_or(u64::MAX),
                    };
                    (slot, key)
                })
            })
            .max_by_key(|(_, key)| *key)
    }

    /// Moves `job` from the queue onto `slot`, through a setup when one is due.
    fn start(
        &mut self,
        slot: usize,
        mut job: Job,
        scheduler: &mut EventScheduler,
        rng: &mut DeterministicRng,
    ) -> Result<(), SimulationError> {
        let now = scheduler.now();
        job.time_queued += now - job.enqueued_at;

        let setup = self.setup.as_mut().and_then(|policy| {
            policy
                .admits(job.priority)
                .then(|| policy.duration.sample(rng))
        });
        let Some(duration) = setup else {
            return self.serve(slot, job, scheduler);
        };
        let event = scheduler.schedule_after(
            duration,
            EventPriority::Departure,
            EventType::SwitchoverComplete { slot },
        )?;
        debug!(job = %job.id, slot, duration, at = %now, "Setup started");

        self.slots[slot] = SlotState::Switchover {
            job: Some(job),
            started: now,
            event,
        };
        Ok(())
    }

    fn serve(
        &mut self,
        slot: usize,
        job: Job,
        scheduler: &mut EventScheduler,
    ) -> Result<(), SimulationError> {
        let now = scheduler.now();
        let event = scheduler.schedule_after(
            job.remaining_service,
            EventPriority::Departure,
            EventType::ServiceComplete { slot, job: job.id },
        )?;
        trace!(
            job = %job.id,
            slot,
            remaining = job.remaining_service,
            at = %now,
            "Service started"
        );

        self.slots[slot] = SlotState::Serving {
            job,
            started: now,
            event,
        };
        Ok(())
    }

    fn preempt(&mut self, slot: usize, scheduler: &mut EventScheduler) {
        let now = scheduler.now();
        match std::mem::replace(&mut self.slots[slot], SlotState::Idle) {
            SlotState::Serving {
                mut job,
                started,
                event,
            } => {
                scheduler.cancel(event);
                let elapsed = now - started;
                self.busy_time += elapsed;
                job.service_received += elapsed;
                job.remaining_service = (job.remaining_service - elapsed).max(0.0);
                job.preemption_count += 1;
                job.enqueued_at = now;
                self.preemptions += 1;

                debug!(
                    job = %job.id,
                    priority = job.priority,
                    remaining = job.remaining_service,
                    at = %now,
                    "Job preempted"
                );
                self.queue.push(job);
            }
            SlotState::Switchover {
                job: Some(mut job),
                started,
                event,
            } => {
                scheduler.cancel(event);
                let lost = now - started;
                self.switchover_time += lost;
                job.setup_time += lost;
                job.enqueued_at = now;
                self.interrupted_switchovers += 1;
                if let Some(policy) = &mut self.setup {
                    policy.low_period = false;
                }

                debug!(job = %job.id, lost, at = %now, "Setup interrupted");
                self.queue.push(job);
            }
            other => self.slots[slot] = other,
        }
    }
}

#[cfg(test)]
mod tests {
    use preempt_core::Distribution;

    use super::*;
    use crate::events::SimulationEvent;
    use crate::scheduler::EventHandler;

    struct Harness {
        server: Server,
        rng: DeterministicRng,
        departures: Vec<Departure>,
    }

    impl EventHandler for Harness {
        fn handle(
            &mut self,
            event: SimulationEvent,
            scheduler: &mut EventScheduler,
        ) -> Result<(), SimulationError> {
            match event.event_type {
                EventType::ServiceComplete { slot, job } => {
                    let departure =
                        self.server
                            .complete_service(slot, job, scheduler, &mut self.rng)?;
                    self.departures.push(departure);
                }
                EventType::SwitchoverComplete { slot } => {
                    self.server
                        .complete_switchover(slot, scheduler, &mut self.rng)?;
                }
                _ => {}
            }
            Ok(())
        }
    }

    fn harness(server: Server) -> Harness {
        Harness {
            server,
            rng: DeterministicRng::from_seed(1),
            departures: Vec::new(),
        }
    }

    fn job(id: u64, priority: Priority, at: f64, service: f64) -> Job {
        Job::new(JobId(id), priority, SimTime::new(at), service)
    }

    fn setup_server(trigger: SetupTrigger) -> Server {
        let duration = Distribution::Deterministic { value: 1.0 }.sampler().unwrap();
        Server::new(1).with_setup(0, duration, trigger)
    }

    fn run_to(scheduler: &mut EventScheduler, harness: &mut Harness, until: f64) {
        scheduler.run_until(SimTime::new(until), harness).unwrap();
    }

    #[test]
    fn test_idle_server_starts_immediately() {
        let mut scheduler = EventScheduler::new();
        let mut h = harness(Server::new(1));

        h.server.submit(job(0, 0, 0.0, 2.0), &mut scheduler, &mut h.rng).unwrap();
        assert!(h.server.queue().is_empty());
        assert_eq!(h.server.in_service().count(), 1);

        run_to(&mut scheduler, &mut h, 10.0);
        assert_eq!(h.departures.len(), 1);
        assert_eq!(h.departures[0].completion_time, 2.0);
        assert_eq!(h.server.busy_time_at(scheduler.now()), 2.0);
    }

    #[test]
    fn test_higher_priority_preempts_and_low_resumes() {
        let mut scheduler = EventScheduler::new();
        let mut h = harness(Server::new(1));

        h.server.submit(job(0, 1, 0.0, 4.0), &mut scheduler, &mut h.rng).unwrap();
        run_to(&mut scheduler, &mut h, 1.0);
        h.server.submit(job(1, 0, 1.0, 2.0), &mut scheduler, &mut h.rng).unwrap();

        assert_eq!(h.server.preemptions(), 1);
        assert_eq!(h.server.queue().peek().unwrap().remaining_service, 3.0);

        run_to(&mut scheduler, &mut h, 100.0);
        let high = &h.departures[0];
        let low = &h.departures[1];
        assert_eq!((high.class, high.completion_time), (0, 3.0));
        assert_eq!((low.class, low.completion_time), (1, 6.0));
        assert_eq!(low.preemptions, 1);
        assert_eq!(low.service_received, 4.0);
        assert_eq!(low.time_queued, 2.0);
    }

    #[test]
    fn test_equal_priority_never_preempts() {
        let mut scheduler = EventScheduler::new();
        let mut h = harness(Server::new(1));

        h.server.submit(job(0, 1, 0.0, 3.0), &mut scheduler, &mut h.rng).unwrap();
        run_to(&mut scheduler, &mut h, 1.0);
        h.server.submit(job(1, 1, 1.0, 1.0), &mut scheduler, &mut h.rng).unwrap();

        assert_eq!(h.server.preemptions(), 0);
        run_to(&mut scheduler, &mut h, 100.0);
        assert_eq!(h.departures[0].job_id, 0);
        assert_eq!(h.departures[1].completion_time, 4.0);
    }

    #[test]
    fn test_victim_is_lowest_ranked_busy_slot() {
        let mut scheduler = EventScheduler::new();
        let mut h = harness(Server::new(2));

        h.server.submit(job(0, 2, 0.0, 5.0), &mut scheduler, &mut h.rng).unwrap();
        h.server.submit(job(1, 1, 0.0, 5.0), &mut scheduler, &mut h.rng).unwrap();
        h.server.submit(job(2, 0, 0.0, 5.0), &mut scheduler, &mut h.rng).unwrap();

        let served: Vec<u64> = h.server.in_service().map(|j| j.id.0).collect();
        assert!(served.contains(&1) && served.contains(&2));
        assert_eq!(h.server.queue().peek().unwrap().id, JobId(0));
    }

    #[test]
    fn test_switchover_blocks_low_class_and_is_interrupted_by_high() {
        let mut scheduler = EventScheduler::new();
        let duration = Distribution::Deterministic { value: 2.0 }.sampler().unwrap();
        let mut h = harness(Server::new(1).with_setup(0, duration, SetupTrigger::AfterBusyPeriod));

        h.server.submit(job(0, 0, 0.0, 1.0), &mut scheduler, &mut h.rng).unwrap();
        run_to(&mut scheduler, &mut h, 1.0);
        assert!(matches!(h.server.slots()[0], SlotState::Switchover { .. }));

        // Low class waits behind the switchover.
        h.server.submit(job(1, 1, 1.0, 1.0), &mut scheduler, &mut h.rng).unwrap();
        assert_eq!(h.server.queue().len(), 1);

        run_to(&mut scheduler, &mut h, 1.5);
        h.server.submit(job(2, 0, 1.5, 1.0), &mut scheduler, &mut h.rng).unwrap();
        assert_eq!(h.server.interrupted_switchovers(), 1);
        assert_eq!(h.server.in_service().next().unwrap().id, JobId(2));

        run_to(&mut scheduler, &mut h, 100.0);
        // Class 0 leaves at 2.5, a fresh switchover runs to 4.5, then class 1.
        let low = h.departures.iter().find(|d| d.class == 1).unwrap();
        assert_eq!(low.completion_time, 5.5);
        assert_eq!(h.server.switchover_time_at(scheduler.now()), 2.5);
        assert_eq!(h.server.busy_time_at(scheduler.now()), 3.0);
    }

    #[test]
    fn test_non_preemptive_lets_service_finish() {
        let mut scheduler = EventScheduler::new();
        let mut h = harness(Server::new(1).with_discipline(Discipline::NonPreemptive));

        h.server.submit(job(0, 1, 0.0, 10.0), &mut scheduler, &mut h.rng).unwrap();
        run_to(&mut scheduler, &mut h, 0.1);
        h.server.submit(job(1, 0, 0.1, 1.0), &mut scheduler, &mut h.rng).unwrap();

        assert_eq!(h.server.preemptions(), 0);
        assert_eq!(h.server.in_service().next().unwrap().id, JobId(0));

        run_to(&mut scheduler, &mut h, 100.0);
        let low = &h.departures[0];
        let high = &h.departures[1];
        assert_eq!((low.class, low.completion_time), (1, 10.0));
        assert_eq!((high.class, high.completion_time), (0, 11.0));
        assert_eq!(low.preemptions, 0);
    }

    #[test]
    fn test_setup_before_each_service_restarts_when_interrupted() {
        let mut scheduler = EventScheduler::new();
        let mut h = harness(setup_server(SetupTrigger::BeforeEachService));

        h.server.submit(job(0, 1, 0.0, 2.0), &mut scheduler, &mut h.rng).unwrap();
        assert!(matches!(
            h.server.slots()[0],
            SlotState::Switchover { job: Some(_), .. }
        ));

        run_to(&mut scheduler, &mut h, 0.5);
        h.server.submit(job(1, 0, 0.5, 1.0), &mut scheduler, &mut h.rng).unwrap();
        assert_eq!(h.server.interrupted_switchovers(), 1);
        assert_eq!(h.server.preemptions(), 0);
        assert_eq!(h.server.queue().peek().unwrap().id, JobId(0));

        run_to(&mut scheduler, &mut h, 100.0);
        // High: setup 0.5-1.5, service to 2.5. Low: fresh setup 2.5-3.5, service to 5.5.
        let high = &h.departures[0];
        assert_eq!((high.class, high.completion_time), (0, 2.5));
        assert_eq!(high.setup_time, 1.0);

        let low = &h.departures[1];
        assert_eq!(low.completion_time, 5.5);
        assert_eq!(low.setup_time, 1.5);
        assert_eq!(low.time_queued, 2.0);
        assert_eq!(low.preemptions, 0);
        assert_eq!(
            low.flow_time(),
            low.service_received + low.time_queued + low.setup_time
        );
        assert_eq!(h.server.switchover_time_at(scheduler.now()), 2.5);
        assert_eq!(h.server.busy_time_at(scheduler.now()), 3.0);
    }

    #[test]
    fn test_setup_runs_once_per_low_busy_period() {
        let mut scheduler = EventScheduler::new();
        let mut h = harness(setup_server(SetupTrigger::BusyPeriodStart));

        h.server.submit(job(0, 1, 0.0, 1.0), &mut scheduler, &mut h.rng).unwrap();
        h.server.submit(job(1, 1, 0.0, 1.0), &mut scheduler, &mut h.rng).unwrap();
        run_to(&mut scheduler, &mut h, 3.0);

        h.server.submit(job(2, 0, 3.0, 1.0), &mut scheduler, &mut h.rng).unwrap();
        run_to(&mut scheduler, &mut h, 3.5);
        h.server.submit(job(3, 1, 3.5, 1.0), &mut scheduler, &mut h.rng).unwrap();
        run_to(&mut scheduler, &mut h, 100.0);

        let done: Vec<(u64, f64, f64)> = h
            .departures
            .iter()
            .map(|d| (d.job_id, d.completion_time, d.setup_time))
            .collect();
        // The high class never sets up; the low busy period after it does.
        assert_eq!(
            done,
            vec![(0, 2.0, 1.0), (1, 3.0, 0.0), (2, 4.0, 0.0), (3, 6.0, 1.0)]
        );
        assert_eq!(h.server.switchover_time_at(scheduler.now()), 2.0);
    }

    #[test]
    fn test_interrupted_busy_period_setup_is_repeated() {
        let mut scheduler = EventScheduler::new();
        let mut h = harness(setup_server(SetupTrigger::BusyPeriodStart));

        h.server.submit(job(0, 1, 0.0, 1.0), &mut scheduler, &mut h.rng).unwrap();
        run_to(&mut scheduler, &mut h, 0.25);
        h.server.submit(job(1, 0, 0.25, 1.0), &mut scheduler, &mut h.rng).unwrap();
        assert_eq!(h.server.interrupted_switchovers(), 1);

        run_to(&mut scheduler, &mut h, 100.0);
        let low = h.departures.iter().find(|d| d.class == 1).unwrap();
        assert_eq!(low.completion_time, 3.25);
        assert_eq!(low.setup_time, 1.25);
    }

    #[test]
    fn test_stale_completion_is_rejected() {
        let mut scheduler = EventScheduler::new();
        let mut server = Server::new(1);
        let mut rng = DeterministicRng::from_seed(0);

        server
            .submit(job(0, 0, 0.0, 1.0), &mut scheduler, &mut rng)
            .unwrap();
        let result = server.complete_service(0, JobId(7), &mut scheduler, &mut rng);

        assert!(matches!(
            result,
            Err(SimulationError::InvalidEventScheduling { .. })
        ));
        assert_eq!(server.in_service().count(), 1);
    }
}
