//! Time, work and job accounting across full random replicates.

use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex};

use preempt_core::{
    ArrivalStreamConfig, ClassAssignment, Distribution, Priority, ScenarioBuilder, ScenarioConfig,
};
use preempt_sim::{
    Invariant, InvariantViolation, JobId, PriorityQueueSimulation, ScenarioPresets, SlotState,
    StatisticsError, SystemSnapshot, run_simulation,
};
use proptest::prelude::*;

fn three_class(seed: u64, horizon: f64) -> ScenarioConfig {
    ScenarioBuilder::new("three-class")
        .classes(3)
        .horizon(horizon)
        .seed(seed)
        .check_invariants(true)
        .departure_log_limit(usize::MAX)
        .renewal(
            Distribution::Exponential { rate: 0.15 },
            Distribution::Exponential { rate: 1.0 },
            0,
        )
        .stream(ArrivalStreamConfig::Renewal {
            interarrival: Distribution::Exponential { rate: 0.5 },
            service: Distribution::Gamma {
                shape: 0.5,
                scale: 2.0,
            },
            classes: ClassAssignment::Split {
                phi: 0.4,
                high: 1,
                low: 2,
            },
        })
        .build()
        .unwrap()
}

#[test]
fn test_every_departure_conserves_time() {
    let stats = run_simulation(&three_class(7, 5_000.0)).unwrap();
    assert!(stats.departures > 1_000);
    assert_eq!(stats.departure_log.len() as u64, stats.departures);

    for departure in &stats.departure_log {
        let flow = departure.completion_time - departure.arrival_time;
        let accounted = departure.service_received + departure.time_queued + departure.setup_time;
        assert!(
            (flow - accounted).abs() < 1e-6,
            "job {} flow {flow} != {accounted}",
            departure.job_id
        );
        assert!((departure.service_received - departure.original_service).abs() < 1e-6);
        assert!(departure.time_queued >= -1e-9);
    }
}

#[test]
fn test_setup_time_is_part_of_every_flow() {
    let mut config = ScenarioPresets::by_name("setup").unwrap().unwrap();
    config.horizon = 3_000.0;
    config.check_invariants = true;
    config.departure_log_limit = usize::MAX;

    let stats = run_simulation(&config).unwrap();
    assert!(stats.switchover_time > 0.0);

    let mut setup_total = 0.0;
    for departure in &stats.departure_log {
        let accounted = departure.service_received + departure.time_queued + departure.setup_time;
        assert!((departure.flow_time() - accounted).abs() < 1e-6);
        assert!(departure.setup_time > 0.0);
        setup_total += departure.setup_time;
    }
    assert!(setup_total <= stats.switchover_time + 1e-6);
}

/// Service windows and arrivals observed after every event.
#[derive(Default)]
struct ServiceLog {
    seen: HashSet<JobId>,
    arrivals: Vec<(f64, Priority)>,
    open: HashMap<JobId, (Priority, f64)>,
    windows: Vec<(Priority, f64, f64)>,
}

struct ServiceWindowRecorder(Arc<Mutex<ServiceLog>>);

impl Invariant for ServiceWindowRecorder {
    fn check(&self, snapshot: &SystemSnapshot<'_>) -> Result<(), InvariantViolation> {
        let mut log = self
            .0
            .lock()
            .map_err(|_| self.violation(snapshot, "service log poisoned".to_string()))?;
        let now = snapshot.now.as_f64();
        let server = snapshot.server;

        for job in server.queue().iter().chain(server.in_service()) {
            if log.seen.insert(job.id) {
                log.arrivals.push((job.arrival_time.as_f64(), job.priority));
            }
        }

        let serving: HashMap<JobId, (Priority, f64)> = server
            .slots()
            .iter()
            .filter_map(|slot| match slot {
                SlotState::Serving { job, started, .. } => {
                    Some((job.id, (job.priority, started.as_f64())))
                }
                _ => None,
            })
            .collect();
        let previous = std::mem::replace(&mut log.open, serving);
        for (id, (class, started)) in previous {
            if log.open.get(&id) != Some(&(class, started)) {
                log.windows.push((class, started, now));
            }
        }
        Ok(())
    }

    fn name(&self) -> &str {
        "ServiceWindowRecorder"
    }
}

#[test]
fn test_preemptions_bounded_by_higher_arrivals_in_service() {
    let config = three_class(11, 5_000.0);
    let log = Arc::new(Mutex::new(ServiceLog::default()));
    let mut sim = PriorityQueueSimulation::new(&config).unwrap();
    sim.add_invariant(Box::new(ServiceWindowRecorder(Arc::clone(&log))));

    let stats = sim.run().unwrap();
    let log = log.lock().unwrap();
    assert!(stats.preemptions > 0);
    assert_eq!(log.arrivals.len() as u64, stats.arrivals);

    for class in 0..3u8 {
        let preempted: u64 = stats
            .departure_log
            .iter()
            .filter(|d| d.class == class)
            .map(|d| u64::from(d.preemptions))
            .sum();
        let interrupting = log
            .windows
            .iter()
            .filter(|(owner, ..)| *owner == class)
            .map(|&(_, start, end)| {
                log.arrivals
                    .iter()
                    .filter(|&&(at, priority)| priority < class && start <= at && at <= end)
                    .count() as u64
            })
            .sum::<u64>();

        assert!(
            preempted <= interrupting,
            "class {class}: {preempted} preemptions but {interrupting} higher arrivals in service"
        );
        if class == 0 {
            assert_eq!(preempted, 0);
        }
    }
}

#[test]
fn test_warmup_past_horizon_records_nothing() {
    let mut config = three_class(3, 1_000.0);
    config.warmup_fraction = 1.5;
    let stats = run_simulation(&config).unwrap();

    assert!(stats.arrivals > 0);
    assert!(stats.departures > 0);
    assert_eq!(stats.recorded_completions(), 0);
    for class in &stats.classes {
        assert_eq!(class.count, 0);
        assert_eq!(
            class.mean_wait(),
            Err(StatisticsError::NoSamples { class: class.class })
        );
    }
}

#[test]
fn test_warmup_excludes_early_completions() {
    let config = three_class(5, 2_000.0);
    let stats = run_simulation(&config).unwrap();
    let t_start = config.t_start();

    let after_warmup = stats
        .departure_log
        .iter()
        .filter(|d| d.completion_time > t_start)
        .count() as u64;
    assert_eq!(stats.recorded_completions(), after_warmup);
    assert!(stats.recorded_completions() < stats.departures);
}

#[test]
fn test_utilization_matches_offered_load() {
    let config = three_class(13, 20_000.0);
    let load = config.offered_load().unwrap();
    let stats = run_simulation(&config).unwrap();

    assert!(
        (stats.utilization() - load).abs() < 0.05,
        "utilization {} vs load {load}",
        stats.utilization()
    );
    assert!(stats.busy_time <= stats.horizon);
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(16))]

    #[test]
    fn test_jobs_are_conserved_for_any_seed(seed in any::<u64>()) {
        let stats = run_simulation(&three_class(seed, 300.0)).unwrap();
        prop_assert!(stats.departures <= stats.arrivals);
        prop_assert!(stats.recorded_completions() <= stats.departures);
        prop_assert!(stats.busy_time <= stats.horizon + 1e-9);
    }
}
