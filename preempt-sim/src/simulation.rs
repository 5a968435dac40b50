//! Single-replicate priority queue simulation.

use preempt_core::{ConfigError, DeterministicRng, Priority, ScenarioConfig};
use tracing::{debug, error, info_span};

use crate::SimulationError;
use crate::events::{EventId, EventPriority, EventType, JobId, SimulationEvent};
use crate::generators::ArrivalGenerator;
use crate::invariants::{Invariant, SystemSnapshot, default_invariants};
use crate::queue::Job;
use crate::scheduler::{EventHandler, EventScheduler};
use crate::server::{Departure, Server};
use crate::stats::{PerClassStats, StatisticsCollector};
use crate::time::SimTime;

/// Everything the event handler mutates: server, generators, RNG and statistics.
struct QueueModel {
    classes: usize,
    rng: DeterministicRng,
    server: Server,
    generators: Vec<ArrivalGenerator>,
    collector: StatisticsCollector,
    invariants: Vec<Box<dyn Invariant>>,
    arrivals: u64,
    departures: u64,
    next_job_id: u64,
    departure_log: Vec<Departure>,
    departure_log_limit: usize,
}

impl QueueModel {
    fn new_job(&mut self, priority: Priority, now: SimTime, service: f64) -> Job {
        let id = JobId(self.next_job_id);
        self.next_job_id += 1;
        self.arrivals += 1;
        Job::new(id, priority, now, service)
    }

    fn on_arrival(
        &mut self,
        stream: usize,
        scheduler: &mut EventScheduler,
    ) -> Result<(), SimulationError> {
        let generator = self.generators.get_mut(stream).ok_or_else(|| {
            SimulationError::InvalidEventScheduling {
                reason: format!("Arrival for unknown stream {stream}"),
            }
        })?;
        let arrival = generator.arrive(&mut self.rng);

        let job = self.new_job(arrival.priority, scheduler.now(), arrival.service);
        self.server.submit(job, scheduler, &mut self.rng)?;
        scheduler.schedule_after(
            arrival.next_delay,
            EventPriority::Arrival,
            EventType::Arrival { stream },
        )?;
        Ok(())
    }

    fn on_departure(&mut self, departure: Departure) {
        self.departures += 1;
        self.collector.record(&departure);
        if self.departure_log.len() < self.departure_log_limit {
            self.departure_log.push(departure);
        }
    }

    fn check_invariants(&self, now: SimTime) -> Result<(), SimulationError> {
        let snapshot = SystemSnapshot {
            now,
            server: &self.server,
            arrivals: self.arrivals,
            departures: self.departures,
        };
        for invariant in &self.invariants {
            if let Err(violation) = invariant.check(&snapshot) {
                error!(%violation, "Invariant violated");
                return Err(SimulationError::InvariantViolated(violation));
            }
        }
        Ok(())
    }
}

impl EventHandler for QueueModel {
    fn handle(
        &mut self,
        event: SimulationEvent,
        scheduler: &mut EventScheduler,
    ) -> Result<(), SimulationError> {
        match event.event_type {
            EventType::Arrival { stream } => self.on_arrival(stream, scheduler)?,
            EventType::Injected { priority, service } => {
                let job = self.new_job(priority, scheduler.now(), service);
                self.server.submit(job, scheduler, &mut self.rng)?;
            }
            EventType::ServiceComplete { slot, job } => {
                let departure =
                    self.server
                        .complete_service(slot, job, scheduler, &mut self.rng)?;
                self.on_departure(departure);
            }
            EventType::SwitchoverComplete { slot } => {
                self.server
                    .complete_switchover(slot, scheduler, &mut self.rng)?;
            }
        }

        if !self.invariants.is_empty() {
            self.check_invariants(scheduler.now())?;
        }
        Ok(())
    }
}

/// One replicate: a private scheduler, server, generator set, RNG and collector.
pub struct PriorityQueueSimulation {
    scenario: String,
    seed: u64,
    horizon: SimTime,
    capacity: usize,
    events_dispatched: u64,
    scheduler: EventScheduler,
    model: QueueModel,
}

impl PriorityQueueSimulation {
    /// Validates `config` and builds a replicate ready to run.
    ///
    /// # Errors
    ///
    /// - `SimulationError::ConfigRejected` - If the scenario fails validation
    /// - `SimulationError` - If the first arrivals cannot be scheduled
    pub fn new(config: &ScenarioConfig) -> Result<Self, SimulationError> {
        config.validate()?;
        Self::new_validated(config)
    }

    /// Builds a replicate from a configuration that already passed validation.
    pub(crate) fn new_validated(config: &ScenarioConfig) -> Result<Self, SimulationError> {
        let mut rng = DeterministicRng::from_seed(config.seed);
        let mut generators = config
            .streams
            .iter()
            .enumerate()
            .map(|(index, stream)| ArrivalGenerator::from_config(index, stream))
            .collect::<Result<Vec<_>, ConfigError>>()?;

        let mut server = Server::new(config.capacity).with_discipline(config.discipline);
        if let Some(setup) = &config.switchover {
            server = server.with_setup(setup.class, setup.duration.sampler()?, setup.trigger);
        }

        let mut scheduler = EventScheduler::new();
        for (stream, generator) in generators.iter_mut().enumerate() {
            let delay = generator.first_delay(&mut rng);
            scheduler.schedule_after(delay, EventPriority::Arrival, EventType::Arrival { stream })?;
        }

        let invariants = if config.check_invariants {
            default_invariants()
        } else {
            Vec::new()
        };

        Ok(Self {
            scenario: config.name.clone(),
            seed: config.seed,
            horizon: SimTime::new(config.horizon),
            capacity: config.capacity,
            events_dispatched: 0,
            scheduler,
            model: QueueModel {
                classes: config.classes,
                rng,
                server,
                generators,
                collector: StatisticsCollector::new(
                    config.classes,
                    config.t_start(),
                    config.wait_measure,
                ),
                invariants,
                arrivals: 0,
                departures: 0,
                next_job_id: 0,
                departure_log: Vec::new(),
                departure_log_limit: config.departure_log_limit,
            },
        })
    }

    /// Adds an invariant to check after every event.
    pub fn add_invariant(&mut self, invariant: Box<dyn Invariant>) {
        self.model.invariants.push(invariant);
    }

    /// Schedules a single job to arrive at absolute time `at`.
    ///
    /// # Errors
    ///
    /// - `SimulationError::ConfigRejected` - Unknown class or invalid service time
    /// - `SimulationError::InvalidEventScheduling` - If `at` is in the past
    pub fn inject_job(
        &mut self,
        at: f64,
        priority: Priority,
        service: f64,
    ) -> Result<EventId, SimulationError> {
        if usize::from(priority) >= self.model.classes {
            return Err(ConfigError::ClassOutOfRange {
                priority,
                classes: self.model.classes,
            }
            .into());
        }
        if !service.is_finite() || service < 0.0 {
            return Err(ConfigError::InvalidParameter {
                name: "service",
                value: service,
            }
            .into());
        }

        let delay = at - self.scheduler.now().as_f64();
        self.scheduler.schedule_after(
            delay,
            EventPriority::Arrival,
            EventType::Injected { priority, service },
        )
    }

    /// Current simulated time.
    pub fn now(&self) -> SimTime {
        self.scheduler.now()
    }

    /// Server state.
    pub fn server(&self) -> &Server {
        &self.model.server
    }

    /// Departures retained so far.
    pub fn departures(&self) -> &[Departure] {
        &self.model.departure_log
    }

    /// Dispatches events up to `until`, capped at the horizon.
    ///
    /// # Errors
    ///
    /// - `SimulationError` - Scheduling failures and invariant violations
    pub fn advance_to(&mut self, until: f64) -> Result<u64, SimulationError> {
        let target = SimTime::new(until).min(self.horizon);
        let dispatched = self.scheduler.run_until(target, &mut self.model)?;
        self.events_dispatched += dispatched;
        Ok(dispatched)
    }

    /// Runs to the horizon and returns the replicate statistics.
    ///
    /// # Errors
    ///
    /// - `SimulationError` - Scheduling failures and invariant violations
    pub fn run(mut self) -> Result<PerClassStats, SimulationError> {
        let span = info_span!("replicate", scenario = %self.scenario, seed = self.seed);
        let _guard = span.enter();

        debug!(horizon = %self.horizon, "Replicate started");
        self.advance_to(self.horizon.as_f64())?;
        let stats = self.finish();
        debug!(
            events = stats.events_dispatched,
            arrivals = stats.arrivals,
            recorded = stats.recorded_completions(),
            "Replicate finished"
        );
        Ok(stats)
    }

    /// Collects statistics at the current time without dispatching further.
    pub fn finish(self) -> PerClassStats {
        let now = self.scheduler.now();
        let model = self.model;
        PerClassStats {
            scenario: self.scenario,
            seed: self.seed,
            horizon: self.horizon.as_f64(),
            t_start: model.collector.t_start(),
            busy_time: model.server.busy_time_at(now),
            switchover_time: model.server.switchover_time_at(now),
            capacity: self.capacity,
            arrivals: model.arrivals,
            departures: model.departures,
            preemptions: model.server.preemptions(),
            events_dispatched: self.events_dispatched,
            departure_log: model.departure_log,
            classes: model.collector.into_classes(),
        }
    }
}

/// Runs one replicate of `config`.
///
/// # Errors
///
/// - `SimulationError::ConfigRejected` - If the scenario fails validation
/// - `SimulationError` - Engine failures during the run
pub fn run_simulation(config: &ScenarioConfig) -> Result<PerClassStats, SimulationError> {
    PriorityQueueSimulation::new(config)?.run()
}
