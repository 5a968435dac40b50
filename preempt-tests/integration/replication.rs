//! Reproducibility, phi sweeps and empty-class handling over presets.

use preempt_core::{ConfigError, ReplicationConfig};
use preempt_sim::analytics::expected_sojourns;
use preempt_sim::{EmptyClassPolicy, ReplicationRunner, ScenarioPresets, SimulationError, sweep_phi};

fn small_runner(replications: usize) -> ReplicationRunner {
    ReplicationRunner::new(ReplicationConfig {
        replications,
        ..ReplicationConfig::for_testing()
    })
}

fn short_split() -> preempt_core::ScenarioConfig {
    let mut config = ScenarioPresets::by_name("priority-split").unwrap().unwrap();
    config.horizon = 1_000.0;
    config
}

#[test]
fn test_replicated_runs_are_reproducible() {
    let config = short_split();
    let runner = small_runner(5);

    let first = runner.run(&config).unwrap();
    let second = runner.run(&config).unwrap();

    assert_eq!(first, second);
    assert_eq!(
        serde_json::to_string(&first).unwrap(),
        serde_json::to_string(&second).unwrap()
    );
}

#[test]
fn test_single_replicate_has_zero_half_width() {
    let summary = small_runner(1).run(&short_split()).unwrap();
    let wait = summary.class(0).unwrap().wait.unwrap();
    assert_eq!(wait.samples, 1);
    assert_eq!(wait.half_width, 0.0);
}

#[test]
fn test_sweep_phi_moves_customers_between_classes() {
    let runner = small_runner(2);
    let points = sweep_phi(&runner, &short_split(), &[0.0, 1.0]).unwrap();
    assert_eq!(points.len(), 2);

    let all_low = &points[0].summary;
    assert_eq!(all_low.class(1).unwrap().empty_replicates, 2);
    assert!(all_low.class(1).unwrap().wait.is_none());
    assert!(all_low.class(2).unwrap().wait.is_some());

    let all_high = &points[1].summary;
    assert_eq!(all_high.class(2).unwrap().empty_replicates, 2);
    assert!(all_high.class(1).unwrap().wait.is_some());
}

#[test]
fn test_empty_class_substitutes_analytical_value() {
    let base = short_split();
    let values = expected_sojourns(&base).unwrap();
    let config = base.with_phi(1.0);
    let runner = small_runner(2).with_empty_class_policy(EmptyClassPolicy::Substitute(values));

    let summary = runner.run(&config).unwrap();
    let low = summary.class(2).unwrap();

    assert_eq!(low.empty_replicates, 2);
    assert_eq!(low.substituted, 2);
    assert!(low.wait.unwrap().mean > 0.0);
}

#[test]
fn test_invalid_replication_settings_are_rejected() {
    let runner = ReplicationRunner::new(ReplicationConfig {
        replications: 0,
        ..Default::default()
    });
    assert!(matches!(
        runner.run(&short_split()),
        Err(SimulationError::ConfigRejected(ConfigError::InvalidReplication { .. }))
    ));
}
