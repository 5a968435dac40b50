//! CLI command implementations

use std::path::{Path, PathBuf};

use anyhow::{Context, Result, anyhow, bail};
use clap::{Args, Subcommand};
use preempt_core::{Priority, ReplicationConfig, ScenarioConfig, load_scenario};
use preempt_sim::analytics::{expected_sojourns, pollaczek_khinchine};
use preempt_sim::{
    CostModel, EmptyClassPolicy, ReplicationRunner, ScenarioPresets, ScenarioSummary, sweep_phi,
};
use serde_json::json;
use tracing::info;

/// Replication flags shared by commands that run scenarios
#[derive(Args, Debug, Clone)]
pub struct ReplicationArgs {
    /// Number of independent replicates
    #[arg(short, long, default_value_t = 30)]
    replications: usize,
    /// Significance level of the confidence intervals
    #[arg(short, long, default_value_t = 0.05)]
    alpha: f64,
    /// Seed of the first replicate (defaults to the scenario seed)
    #[arg(long)]
    base_seed: Option<u64>,
    /// Print machine-readable JSON instead of text
    #[arg(long)]
    json: bool,
}

impl ReplicationArgs {
    fn replication(&self) -> ReplicationConfig {
        ReplicationConfig {
            replications: self.replications,
            alpha: self.alpha,
            base_seed: self.base_seed,
        }
    }
}

/// Available CLI commands
#[derive(Subcommand)]
pub enum Commands {
    /// Run a scenario file and report per-class estimates
    Run {
        /// Path to a scenario JSON file
        scenario: PathBuf,
        #[command(flatten)]
        replication: ReplicationArgs,
        /// Replace empty-class waits with analytical values for the scenario's discipline
        #[arg(long)]
        substitute_analytical: bool,
        /// Charge per preemption; enables cost estimates
        #[arg(long)]
        preemption_cost: Option<f64>,
        /// Higher class of the cost gap
        #[arg(long, default_value_t = 1)]
        cost_high: Priority,
        /// Lower class of the cost gap
        #[arg(long, default_value_t = 2)]
        cost_low: Priority,
    },
    /// Re-run a split scenario for several phi values
    Sweep {
        /// Path to a scenario JSON file with a phi-split stream
        scenario: PathBuf,
        /// Comma-separated phi values
        #[arg(long, value_delimiter = ',', required = true)]
        phi: Vec<f64>,
        #[command(flatten)]
        replication: ReplicationArgs,
    },
    /// Print a preset scenario as JSON
    Preset {
        /// One of: md1, priority-split, breakdown, switchover, non-preemptive, setup
        name: String,
    },
    /// Compare an M/D/1 run against the Pollaczek-Khinchine mean sojourn
    ValidateMd1 {
        /// Arrival rate
        #[arg(long)]
        lambda: f64,
        /// Service rate
        #[arg(long)]
        mu: f64,
        /// Simulation horizon
        #[arg(long, default_value_t = 10_000.0)]
        horizon: f64,
        #[command(flatten)]
        replication: ReplicationArgs,
    },
}

/// Handle the CLI command
///
/// # Errors
/// Returns appropriate error based on the command that fails
pub fn handle_command(command: Commands) -> Result<()> {
    match command {
        Commands::Run {
            scenario,
            replication,
            substitute_analytical,
            preemption_cost,
            cost_high,
            cost_low,
        } => {
            let config = read_scenario(&scenario)?;
            let mut runner = ReplicationRunner::new(replication.replication());
            if substitute_analytical {
                let values = expected_sojourns(&config)
                    .ok_or_else(|| anyhow!("Analytical values are undefined for this scenario"))?;
                runner = runner.with_empty_class_policy(EmptyClassPolicy::Substitute(values));
            }
            if let Some(cost) = preemption_cost {
                runner = runner.with_cost_model(CostModel {
                    preemption_cost: cost,
                    high: cost_high,
                    low: cost_low,
                });
            }
            run_scenario(&runner, &config, replication.json)
        }
        Commands::Sweep {
            scenario,
            phi,
            replication,
        } => {
            let config = read_scenario(&scenario)?;
            let runner = ReplicationRunner::new(replication.replication());
            let points = sweep_phi(&runner, &config, &phi)?;

            if replication.json {
                println!("{}", serde_json::to_string_pretty(&points)?);
            } else {
                for point in &points {
                    println!("phi = {:.3}", point.phi);
                    print!("{}", point.summary.summary());
                }
            }
            Ok(())
        }
        Commands::Preset { name } => {
            let config = preset(&name)?;
            println!("{}", serde_json::to_string_pretty(&config)?);
            Ok(())
        }
        Commands::ValidateMd1 {
            lambda,
            mu,
            horizon,
            replication,
        } => validate_md1(lambda, mu, horizon, &replication),
    }
}

fn read_scenario(path: &Path) -> Result<ScenarioConfig> {
    load_scenario(path)
        .map_err(|e| anyhow!(e.user_message()))
        .with_context(|| format!("Failed to load scenario {}", path.display()))
}

fn preset(name: &str) -> Result<ScenarioConfig> {
    match ScenarioPresets::by_name(name) {
        Some(config) => Ok(config?),
        None => bail!(
            "Unknown preset '{name}', expected one of: {}",
            ScenarioPresets::NAMES.join(", ")
        ),
    }
}

fn run_scenario(runner: &ReplicationRunner, config: &ScenarioConfig, json: bool) -> Result<()> {
    let summary = runner.run(config)?;
    print_summary(&summary, json)
}

fn print_summary(summary: &ScenarioSummary, json: bool) -> Result<()> {
    if json {
        println!("{}", serde_json::to_string_pretty(summary)?);
    } else {
        print!("{}", summary.summary());
    }
    Ok(())
}

fn validate_md1(lambda: f64, mu: f64, horizon: f64, args: &ReplicationArgs) -> Result<()> {
    let mut config = ScenarioPresets::md1(lambda, mu)?;
    config.horizon = horizon;

    let service = 1.0 / mu;
    let expected = pollaczek_khinchine(lambda, service, service * service)
        .ok_or_else(|| anyhow!("M/D/1 with lambda={lambda}, mu={mu} is unstable"))?;

    let summary = ReplicationRunner::new(args.replication()).run(&config)?;
    let estimate = summary
        .class(0)
        .and_then(|class| class.wait)
        .ok_or_else(|| anyhow!("No completions recorded after warm-up"))?;
    let within = estimate.contains(expected);
    info!(expected, mean = estimate.mean, within, "M/D/1 validation");

    if args.json {
        let report = json!({
            "expected": expected,
            "estimate": estimate,
            "within_interval": within,
        });
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        println!("Pollaczek-Khinchine mean sojourn: {expected:.4}");
        println!(
            "Simulated mean sojourn:           {:.4} ± {:.4}",
            estimate.mean, estimate.half_width
        );
        println!(
            "{}",
            if within {
                "PASS: analytical value inside the confidence interval"
            } else {
                "OUTSIDE: analytical value not covered by the confidence interval"
            }
        );
    }
    Ok(())
}
