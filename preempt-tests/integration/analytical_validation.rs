//! Replicated estimates against Pollaczek-Khinchine and priority formulas.

use preempt_core::{ReplicationConfig, ScenarioConfig};
use preempt_sim::analytics::{
    class_loads, expected_sojourns, non_preemptive_sojourn, pollaczek_khinchine,
    preemptive_resume_sojourn,
};
use preempt_sim::{ReplicationRunner, ScenarioPresets};

fn runner(replications: usize) -> ReplicationRunner {
    ReplicationRunner::new(ReplicationConfig {
        replications,
        alpha: 0.05,
        base_seed: Some(2024),
    })
}

fn assert_relative(actual: f64, expected: f64, tolerance: f64) {
    let error = (actual - expected).abs() / expected;
    assert!(
        error < tolerance,
        "estimate {actual:.4} vs analytical {expected:.4} (relative error {error:.3})"
    );
}

fn class_waits(config: &ScenarioConfig, replications: usize) -> Vec<f64> {
    let summary = runner(replications).run(config).unwrap();
    summary
        .classes
        .iter()
        .map(|class| class.wait.unwrap().mean)
        .collect()
}

#[test]
fn test_md1_moderate_load_matches_pollaczek_khinchine() {
    let config = ScenarioPresets::md1(0.5, 1.0).unwrap();
    let expected = pollaczek_khinchine(0.5, 1.0, 1.0).unwrap();
    assert!((expected - 1.5).abs() < 1e-12);

    let summary = runner(10).run(&config).unwrap();
    let wait = summary.class(0).unwrap().wait.unwrap();
    assert_relative(wait.mean, expected, 0.04);

    let utilization = summary.utilization.unwrap();
    assert!((utilization.mean - 0.5).abs() < 0.02);
}

#[test]
fn test_md1_heavy_load_matches_pollaczek_khinchine() {
    let config = ScenarioPresets::md1(0.9, 1.0).unwrap();
    assert_eq!(config.horizon, 10_000.0);
    assert_eq!(config.warmup_fraction, 0.05);

    let expected = expected_sojourns(&config).unwrap()[0].unwrap();
    assert!((expected - 5.5).abs() < 1e-12);

    let waits = class_waits(&config, 30);
    assert_relative(waits[0], expected, 0.15);
}

#[test]
fn test_priority_split_matches_preemptive_resume_formula() {
    let mut config = ScenarioPresets::by_name("priority-split").unwrap().unwrap();
    config.horizon = 20_000.0;

    let expected = expected_sojourns(&config).unwrap();
    let waits = class_waits(&config, 10);

    for (class, wait) in waits.iter().enumerate() {
        assert_relative(*wait, expected[class].unwrap(), 0.08);
    }
    assert!(waits[0] < waits[1]);
    assert!(waits[1] < waits[2]);
}

#[test]
fn test_split_classes_differ_only_by_preemption_exposure() {
    let config = ScenarioPresets::by_name("priority-split").unwrap().unwrap();
    let summary = runner(6).run(&config).unwrap();

    let incumbent = summary.class(0).unwrap().preemptions.unwrap();
    let high = summary.class(1).unwrap().preemptions.unwrap();
    let low = summary.class(2).unwrap().preemptions.unwrap();

    assert_eq!(incumbent.mean, 0.0);
    assert!(high.mean > 0.0);
    assert!(low.mean > high.mean);
}

#[test]
fn test_non_preemptive_two_class_matches_formula() {
    let mut config = ScenarioPresets::by_name("non-preemptive").unwrap().unwrap();
    config.horizon = 20_000.0;

    let loads = class_loads(&config).unwrap();
    let expected = [
        non_preemptive_sojourn(&loads, 0).unwrap(),
        non_preemptive_sojourn(&loads, 1).unwrap(),
    ];
    assert_eq!(expected_sojourns(&config).unwrap()[0], Some(expected[0]));

    let summary = runner(10).run(&config).unwrap();
    for (class, expected) in expected.iter().enumerate() {
        let wait = summary.classes[class].wait.unwrap().mean;
        assert_relative(wait, *expected, 0.08);
    }

    // Class 0 sits well away from what preemption would give it.
    let preemptive = preemptive_resume_sojourn(&loads, 0).unwrap();
    let high = summary.class(0).unwrap().wait.unwrap().mean;
    assert!((high - expected[0]).abs() < (high - preemptive).abs());
    assert_eq!(summary.class(1).unwrap().preemptions.unwrap().mean, 0.0);
}
