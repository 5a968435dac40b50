//! Trace-driven breakdown streams, switchover and setup phases.

use preempt_core::{ArrivalStreamConfig, Distribution, ScenarioBuilder, SetupTrigger, TracePeriod};
use preempt_sim::{PriorityQueueSimulation, ScenarioPresets, run_simulation};

const EPS: f64 = 1e-9;

#[test]
fn test_trace_replays_periods_cyclically() {
    let config = ScenarioBuilder::new("trace")
        .horizon(95.0)
        .warmup_fraction(0.0)
        .departure_log_limit(32)
        .stream(ArrivalStreamConfig::Trace {
            periods: vec![
                TracePeriod { off: 10.0, on: 2.0 },
                TracePeriod { off: 5.0, on: 1.0 },
            ],
            priority: 0,
        })
        .build()
        .unwrap();

    let stats = run_simulation(&config).unwrap();

    let arrivals: Vec<f64> = stats.departure_log.iter().map(|d| d.arrival_time).collect();
    let expected = [10.0, 17.0, 28.0, 35.0, 46.0, 53.0, 64.0, 71.0, 82.0, 89.0];
    assert_eq!(arrivals.len(), expected.len());
    for (actual, expected) in arrivals.iter().zip(expected) {
        assert!((actual - expected).abs() < EPS);
    }

    let services: Vec<f64> = stats
        .departure_log
        .iter()
        .map(|d| d.original_service)
        .collect();
    assert_eq!(services[..4], [2.0, 1.0, 2.0, 1.0]);
    assert!((stats.busy_time - 15.0).abs() < EPS);
}

#[test]
fn test_breakdowns_interrupt_customers_without_waiting() {
    let mut config = ScenarioPresets::by_name("breakdown").unwrap().unwrap();
    config.check_invariants = true;
    config.departure_log_limit = usize::MAX;

    let stats = run_simulation(&config).unwrap();

    let breakdowns = stats.class(0).unwrap();
    assert!(breakdowns.count > 0);
    assert_eq!(breakdowns.total_preemptions, 0);
    for departure in stats.departure_log.iter().filter(|d| d.class == 0) {
        assert!((departure.flow_time() - departure.original_service).abs() < 1e-6);
    }

    let customers = stats.class(1).unwrap();
    assert!(customers.total_preemptions > 0);
    assert!(customers.mean_wait().unwrap() > 1.0);
}

fn switchover_sim() -> PriorityQueueSimulation {
    let config = ScenarioBuilder::new("switchover")
        .classes(2)
        .horizon(100.0)
        .warmup_fraction(0.0)
        .check_invariants(true)
        .departure_log_limit(16)
        .switchover(0, Distribution::Deterministic { value: 2.5 })
        .build()
        .unwrap();
    PriorityQueueSimulation::new(&config).unwrap()
}

#[test]
fn test_switchover_delays_lower_class() {
    let mut sim = switchover_sim();
    sim.inject_job(0.0, 0, 1.0).unwrap();
    sim.inject_job(0.5, 1, 1.0).unwrap();

    let stats = sim.run().unwrap();

    let low = stats.departure_log.iter().find(|d| d.class == 1).unwrap();
    assert!((low.completion_time - 4.5).abs() < EPS);
    assert!((low.time_queued - 3.0).abs() < EPS);
    assert!((stats.switchover_time - 2.5).abs() < EPS);
    assert!((stats.busy_time - 2.0).abs() < EPS);
}

#[test]
fn test_high_class_arrival_interrupts_switchover() {
    let mut sim = switchover_sim();
    sim.inject_job(0.0, 0, 1.0).unwrap();
    sim.inject_job(0.5, 1, 1.0).unwrap();
    sim.inject_job(2.0, 0, 1.0).unwrap();

    sim.advance_to(100.0).unwrap();
    assert_eq!(sim.server().interrupted_switchovers(), 1);
    let stats = sim.finish();

    let low = stats.departure_log.iter().find(|d| d.class == 1).unwrap();
    assert!((low.completion_time - 6.5).abs() < EPS);
    assert!((stats.switchover_time - 3.5).abs() < EPS);
    assert_eq!(stats.preemptions, 0);
}

fn setup_sim(trigger: SetupTrigger, duration: f64) -> PriorityQueueSimulation {
    let config = ScenarioBuilder::new("setup")
        .classes(2)
        .horizon(100.0)
        .warmup_fraction(0.0)
        .check_invariants(true)
        .departure_log_limit(16)
        .setup(0, Distribution::Deterministic { value: duration }, trigger)
        .build()
        .unwrap();
    PriorityQueueSimulation::new(&config).unwrap()
}

#[test]
fn test_setup_precedes_every_service_quantum() {
    let mut sim = setup_sim(SetupTrigger::BeforeEachService, 0.5);
    sim.inject_job(0.0, 1, 2.0).unwrap();
    sim.inject_job(1.0, 0, 1.0).unwrap();

    let stats = sim.run().unwrap();

    // Low: setup to 0.5, served to 1.0, preempted, set up again 2.5-3.0.
    let high = &stats.departure_log[0];
    assert_eq!(high.class, 0);
    assert!((high.completion_time - 2.5).abs() < EPS);
    assert!((high.setup_time - 0.5).abs() < EPS);

    let low = &stats.departure_log[1];
    assert_eq!(low.preemptions, 1);
    assert!((low.completion_time - 4.5).abs() < EPS);
    assert!((low.setup_time - 1.0).abs() < EPS);
    assert!((low.time_queued - 1.5).abs() < EPS);
    assert!((stats.switchover_time - 1.5).abs() < EPS);
    assert!((stats.busy_time - 3.0).abs() < EPS);
}

#[test]
fn test_setup_repeats_after_high_class_interrupts_low_busy_period() {
    let mut sim = setup_sim(SetupTrigger::BusyPeriodStart, 1.0);
    sim.inject_job(0.0, 1, 1.0).unwrap();
    sim.inject_job(0.5, 1, 1.0).unwrap();
    sim.inject_job(1.5, 0, 1.0).unwrap();

    let stats = sim.run().unwrap();

    let done: Vec<(u64, f64, f64, u32)> = stats
        .departure_log
        .iter()
        .map(|d| (d.job_id, d.completion_time, d.setup_time, d.preemptions))
        .collect();
    assert_eq!(done.len(), 3);
    assert_eq!(done[0].0, 2);
    assert!((done[0].2).abs() < EPS);

    // The preempted low job opens a new low busy period and sets up again.
    let (id, completion, setup, preemptions) = done[1];
    assert_eq!((id, preemptions), (0, 1));
    assert!((completion - 4.0).abs() < EPS);
    assert!((setup - 2.0).abs() < EPS);

    let (id, completion, setup, _) = done[2];
    assert_eq!(id, 1);
    assert!((completion - 5.0).abs() < EPS);
    assert!(setup.abs() < EPS);
    assert!((stats.switchover_time - 2.0).abs() < EPS);
}

#[test]
fn test_switchover_preset_keeps_invariants() {
    let mut config = ScenarioPresets::two_class_switchover(0.2, 0.4, 1.0, 2.0).unwrap();
    config.horizon = 3_000.0;
    config.check_invariants = true;

    let stats = run_simulation(&config).unwrap();

    assert!(stats.switchover_time > 0.0);
    assert!(stats.busy_time + stats.switchover_time <= stats.horizon + 1e-6);
    assert!(stats.class(1).unwrap().count > 0);
}
