//! Service order, preemption and tie-breaking with hand-placed jobs.

use preempt_core::{Discipline, ScenarioBuilder, ScenarioConfig};
use preempt_sim::{PriorityQueueSimulation, SimTime};

const EPS: f64 = 1e-9;

fn empty_scenario(classes: usize, capacity: usize) -> ScenarioConfig {
    ScenarioBuilder::new("injected")
        .classes(classes)
        .capacity(capacity)
        .horizon(200.0)
        .warmup_fraction(0.0)
        .check_invariants(true)
        .departure_log_limit(64)
        .build()
        .unwrap()
}

#[test]
fn test_high_priority_job_preempts_low() {
    let mut sim = PriorityQueueSimulation::new(&empty_scenario(2, 1)).unwrap();
    sim.inject_job(0.0, 1, 10.0).unwrap();
    sim.inject_job(0.1, 0, 10.0).unwrap();

    let stats = sim.run().unwrap();

    assert_eq!(stats.departures, 2);
    assert_eq!(stats.preemptions, 1);

    let high = &stats.departure_log[0];
    let low = &stats.departure_log[1];
    assert_eq!(high.class, 0);
    assert_eq!(low.class, 1);

    assert!((high.completion_time - 10.1).abs() < EPS);
    assert!((high.flow_time() - 10.0).abs() < EPS);
    assert_eq!(high.preemptions, 0);

    assert!((low.completion_time - 20.0).abs() < EPS);
    assert_eq!(low.preemptions, 1);
    assert!((low.service_received - 10.0).abs() < EPS);
    assert!((low.time_queued - 10.0).abs() < EPS);

    let class0 = stats.class(0).unwrap();
    let class1 = stats.class(1).unwrap();
    assert_eq!(class1.total_preemptions, 1);
    assert!(class0.mean_wait().unwrap() < class1.mean_wait().unwrap());
}

#[test]
fn test_low_priority_arrival_waits_for_high() {
    let mut sim = PriorityQueueSimulation::new(&empty_scenario(2, 1)).unwrap();
    sim.inject_job(0.0, 0, 10.0).unwrap();
    sim.inject_job(0.1, 1, 4.0).unwrap();

    let stats = sim.run().unwrap();

    assert_eq!(stats.preemptions, 0);
    let high = &stats.departure_log[0];
    let low = &stats.departure_log[1];
    assert_eq!((high.class, low.class), (0, 1));
    assert!((high.completion_time - 10.0).abs() < EPS);
    assert_eq!(low.preemptions, 0);
    assert!((low.completion_time - 14.0).abs() < EPS);
    assert!((low.time_queued - 9.9).abs() < EPS);
}

#[test]
fn test_non_preemptive_high_job_waits_for_service_in_progress() {
    let mut config = empty_scenario(2, 1);
    config.discipline = Discipline::NonPreemptive;
    let mut sim = PriorityQueueSimulation::new(&config).unwrap();
    sim.inject_job(0.0, 1, 10.0).unwrap();
    sim.inject_job(0.1, 0, 1.0).unwrap();
    sim.inject_job(0.2, 1, 1.0).unwrap();

    let stats = sim.run().unwrap();

    assert_eq!(stats.preemptions, 0);
    let order: Vec<(u8, f64)> = stats
        .departure_log
        .iter()
        .map(|d| (d.class, d.completion_time))
        .collect();
    assert_eq!(order.len(), 3);
    // The queued high job still jumps the later low job.
    assert_eq!((order[0].0, order[1].0, order[2].0), (1, 0, 1));
    assert!((order[1].1 - 11.0).abs() < EPS);
    assert!((order[2].1 - 12.0).abs() < EPS);
}

#[test]
fn test_equal_priority_is_served_first_come_first_served() {
    let mut sim = PriorityQueueSimulation::new(&empty_scenario(1, 1)).unwrap();
    sim.inject_job(0.0, 0, 5.0).unwrap();
    sim.inject_job(1.0, 0, 1.0).unwrap();

    let stats = sim.run().unwrap();

    assert_eq!(stats.preemptions, 0);
    let order: Vec<u64> = stats.departure_log.iter().map(|d| d.job_id).collect();
    assert_eq!(order, vec![0, 1]);
    assert!((stats.departure_log[1].completion_time - 6.0).abs() < EPS);
}

#[test]
fn test_completion_before_arrival_at_same_instant() {
    let mut sim = PriorityQueueSimulation::new(&empty_scenario(2, 1)).unwrap();
    sim.inject_job(0.0, 1, 1.0).unwrap();
    sim.inject_job(1.0, 0, 1.0).unwrap();

    let stats = sim.run().unwrap();

    assert_eq!(stats.preemptions, 0);
    assert_eq!(stats.departure_log[0].class, 1);
    assert!((stats.departure_log[1].completion_time - 2.0).abs() < EPS);
}

#[test]
fn test_lowest_ranked_job_is_preempted_on_multiple_servers() {
    let mut sim = PriorityQueueSimulation::new(&empty_scenario(3, 2)).unwrap();
    sim.inject_job(0.0, 1, 10.0).unwrap();
    sim.inject_job(0.0, 2, 10.0).unwrap();
    sim.inject_job(1.0, 0, 2.0).unwrap();

    sim.advance_to(1.5).unwrap();
    let in_service: Vec<u8> = sim.server().in_service().map(|job| job.priority).collect();
    assert!(in_service.contains(&0));
    assert!(in_service.contains(&1));
    assert_eq!(sim.server().queue().len(), 1);
    assert_eq!(sim.server().preemptions(), 1);

    let stats = sim.run().unwrap();
    let class2 = stats.departure_log.iter().find(|d| d.class == 2).unwrap();
    assert_eq!(class2.preemptions, 1);
    assert!((class2.time_queued - 2.0).abs() < EPS);
    assert!((class2.completion_time - 12.0).abs() < EPS);
}

#[test]
fn test_advance_to_stops_at_requested_time() {
    let mut sim = PriorityQueueSimulation::new(&empty_scenario(1, 1)).unwrap();
    sim.inject_job(0.0, 0, 3.0).unwrap();

    sim.advance_to(1.0).unwrap();
    assert_eq!(sim.now(), SimTime::new(1.0));
    assert_eq!(sim.server().jobs_in_system(), 1);
    assert!(sim.departures().is_empty());

    sim.advance_to(5.0).unwrap();
    assert_eq!(sim.server().jobs_in_system(), 0);
    assert_eq!(sim.departures().len(), 1);
}
