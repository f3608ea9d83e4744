use std::path::PathBuf;

use anyhow::{Context, Result, bail};
use clap::Parser;
use fleetsim_app::{FisheryConfig, load_config, run_replicates};
use ordered_float::OrderedFloat;
use tracing::info;

#[derive(Parser, Debug)]
#[command(
    name = "fleetsim",
    version,
    about = "Run a seeded toy fishery whose fishers learn gear and destinations"
)]
struct Cli {
    /// JSON config file; missing fields take their defaults.
    #[arg(long, env = "FLEETSIM_CONFIG")]
    config: Option<PathBuf>,
    /// Base RNG seed. Replicates count up from it.
    #[arg(long, env = "FLEETSIM_SEED")]
    seed: Option<u64>,
    #[arg(long)]
    fishers: Option<usize>,
    #[arg(long)]
    periods: Option<usize>,
    /// Independent runs, executed in parallel.
    #[arg(long, default_value_t = 1)]
    replicates: usize,
    /// Print every summary as JSON on stdout.
    #[arg(long)]
    json: bool,
}

fn main() -> Result<()> {
    init_tracing();
    let cli = Cli::parse();

    let mut config = match &cli.config {
        Some(path) => load_config(path)
            .with_context(|| format!("loading fishery config from {}", path.display()))?,
        None => FisheryConfig::default(),
    };
    if cli.seed.is_some() {
        config.rng_seed = cli.seed;
    }
    if let Some(fishers) = cli.fishers {
        config.fishers = fishers;
    }
    if let Some(periods) = cli.periods {
        config.periods = periods;
    }
    if cli.replicates == 0 {
        bail!("--replicates must be at least 1");
    }

    let summaries = run_replicates(&config, cli.replicates).context("running fishery")?;
    for summary in &summaries {
        info!(
            seed = summary.seed,
            final_profit = summary.final_profit_per_hour,
            destinations = summary.distinct_destinations,
            "replicate finished"
        );
    }
    if let Some(best) = summaries
        .iter()
        .max_by_key(|summary| OrderedFloat(summary.overall_profit_per_hour))
    {
        info!(
            seed = best.seed,
            overall_profit = best.overall_profit_per_hour,
            "best replicate"
        );
    }

    if cli.json {
        println!(
            "{}",
            serde_json::to_string_pretty(&summaries).context("serialising summaries")?
        );
    }
    Ok(())
}

fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .try_init();
}
