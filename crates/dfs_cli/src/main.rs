//! dfs CLI
//!
//! Runs the optimizer, simulator and correlation builder on JSON request
//! files and writes JSON responses.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use tracing_subscriber::EnvFilter;

use dfs_core::api::{self, CorrelationJsonRequest, OptimizeJsonRequest, SimulateJsonRequest};
use dfs_core::config::EngineConfig;
use dfs_core::slots;

#[derive(Parser)]
#[command(name = "dfs")]
#[command(about = "Daily fantasy lineup optimizer and outcome simulator", long_about = None)]
struct Cli {
    /// Debug-level logging (overridden by RUST_LOG)
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Clone, Copy, Debug, ValueEnum)]
enum Preset {
    Default,
    Cash,
    Tournament,
    Deterministic,
}

#[derive(clap::Args)]
struct RunArgs {
    /// Request JSON file
    #[arg(long)]
    request: PathBuf,

    /// Engine config file (.json, .yaml or .yml)
    #[arg(long)]
    config: Option<PathBuf>,

    /// Built-in config preset, used when --config is absent
    #[arg(long, value_enum, default_value = "default")]
    preset: Preset,

    /// Output file; stdout when absent
    #[arg(long)]
    out: Option<PathBuf>,
}

#[derive(Subcommand)]
enum Commands {
    /// Build top-N lineups from a player pool
    Optimize(RunArgs),

    /// Simulate lineups against correlated outcomes
    Simulate(RunArgs),

    /// Build the pairwise correlation matrix for a pool
    Correlation(RunArgs),

    /// List roster templates
    Templates,

    /// Print a config preset as JSON
    Config {
        #[arg(long, value_enum, default_value = "default")]
        preset: Preset,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    match cli.command {
        Commands::Optimize(args) => {
            let config = load_config(&args)?;
            let request: OptimizeJsonRequest = read_request(&args.request)?;
            let response = api::optimize(request, &config).context("optimize failed")?;
            tracing::info!(
                "Built {}/{} lineups ({} nodes{})",
                response.lineups.len(),
                response.requested,
                response.nodes_explored,
                if response.incomplete { ", incomplete" } else { "" }
            );
            if let Some(reason) = &response.infeasibility {
                tracing::warn!("Infeasible: {:?} {:?}", reason, response.infeasible_slots);
            }
            write_response(args.out.as_deref(), &response)?;
        }

        Commands::Simulate(args) => {
            let config = load_config(&args)?;
            let request: SimulateJsonRequest = read_request(&args.request)?;
            let response = api::simulate(request, &config).context("simulate failed")?;
            for &i in &response.ranking {
                let r = &response.results[i];
                tracing::info!(
                    "#{} mean {:.2} sd {:.2} p90 {:.2} ({} iterations)",
                    i,
                    r.mean,
                    r.std_dev,
                    r.percentiles.p90,
                    r.iterations_completed
                );
            }
            write_response(args.out.as_deref(), &response)?;
        }

        Commands::Correlation(args) => {
            let config = load_config(&args)?;
            let request: CorrelationJsonRequest = read_request(&args.request)?;
            let response = api::build_correlation(request, &config).context("correlation build failed")?;
            tracing::info!("{}x{} matrix, {:?}", response.player_ids.len(), response.player_ids.len(), response.status);
            write_response(args.out.as_deref(), &response)?;
        }

        Commands::Templates => {
            for (sport, platform) in slots::known_templates() {
                let template = slots::resolve(sport, platform)?;
                let names: Vec<&str> = template.slots.iter().map(|s| s.name.as_str()).collect();
                println!("{:?}/{:?}  cap {}  [{}]", sport, platform, template.salary_cap, names.join(", "));
            }
        }

        Commands::Config { preset } => {
            println!("{}", serde_json::to_string_pretty(&preset_config(preset))?);
        }
    }

    Ok(())
}

fn init_tracing(verbose: bool) {
    let default = if verbose { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::fmt().with_env_filter(filter).with_writer(std::io::stderr).init();
}

fn preset_config(preset: Preset) -> EngineConfig {
    match preset {
        Preset::Default => EngineConfig::default(),
        Preset::Cash => EngineConfig::cash_game(),
        Preset::Tournament => EngineConfig::tournament(),
        Preset::Deterministic => EngineConfig::deterministic(),
    }
}

fn load_config(args: &RunArgs) -> Result<EngineConfig> {
    match &args.config {
        Some(path) => {
            EngineConfig::load(path).with_context(|| format!("failed to load config {}", path.display()))
        }
        None => Ok(preset_config(args.preset)),
    }
}

fn read_request<T: serde::de::DeserializeOwned>(path: &Path) -> Result<T> {
    let text = std::fs::read_to_string(path).with_context(|| format!("failed to read {}", path.display()))?;
    serde_json::from_str(&text).with_context(|| format!("invalid request JSON in {}", path.display()))
}

fn write_response<T: serde::Serialize>(out: Option<&Path>, response: &T) -> Result<()> {
    let json = serde_json::to_string_pretty(response)?;
    match out {
        Some(path) => {
            std::fs::write(path, json).with_context(|| format!("failed to write {}", path.display()))?;
            tracing::info!("Response saved to: {}", path.display());
        }
        None => println!("{}", json),
    }
    Ok(())
}
