//! Seeded toy fishery that exercises the fleetsim adaptation engine end to end.
//!
//! Fishers pick a gear from a menu through the explore-imitate-exploit controller and pick a
//! destination through one of three learners: a bandit over coarse map blocks, a heatmap
//! searched by an acquisition function, or explore-imitate over tiles.

use std::collections::BTreeMap;
use std::path::Path;

use fleetsim_adapt::{AdaptationCounters, BeamHillClimbingConfig};
use fleetsim_core::{BanditKind, EstimatorKind, LearningError, ProbabilityConfig};
use fleetsim_index::{AcquisitionFunction, IndexError};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::info;

pub mod fishery;
pub mod heatmap;

pub use fishery::Fishery;
pub use heatmap::Heatmap;

/// Errors raised while configuring or running a fishery.
#[derive(Debug, Error)]
pub enum FisheryError {
    #[error("invalid configuration: {0}")]
    InvalidConfig(&'static str),
    #[error(transparent)]
    Learning(#[from] LearningError),
    #[error(transparent)]
    Index(#[from] IndexError),
    #[error("failed to read config: {0}")]
    Io(#[from] std::io::Error),
    #[error("failed to parse config: {0}")]
    Parse(#[from] serde_json::Error),
}

/// One entry of the gear menu.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Gear {
    pub name: String,
    /// Fraction of local abundance landed per trip.
    pub catchability: f64,
    /// Fixed cost per trip.
    pub cost: f64,
}

impl Gear {
    fn new(name: &str, catchability: f64, cost: f64) -> Self {
        Self {
            name: name.to_owned(),
            catchability,
            cost,
        }
    }
}

/// How fishers choose where to go.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum DestinationConfig {
    /// One bandit arm per `block_size x block_size` block of legal water.
    Bandit {
        block_size: usize,
        estimator: EstimatorKind,
        policy: BanditKind,
        peek_at_friends: bool,
    },
    /// Remember what each cell paid and search that memory.
    Heatmap {
        acquisition: AcquisitionFunction,
        /// Chance of a random step instead of consulting the heatmap.
        exploration_probability: f64,
        step_size: usize,
    },
    /// Explore random nearby tiles, imitate friends' tiles.
    ExploreImitate {
        probability: ProbabilityConfig,
        climbing: BeamHillClimbingConfig,
        step_size: usize,
        attempts: usize,
    },
}

impl Default for DestinationConfig {
    fn default() -> Self {
        Self::ExploreImitate {
            probability: ProbabilityConfig::ExplorationPenalty {
                exploration: 0.2,
                imitation: 1.0,
                penalty: 0.02,
                minimum: 0.01,
            },
            climbing: BeamHillClimbingConfig::default(),
            step_size: 5,
            attempts: 100,
        }
    }
}

/// Top-level knobs for a fishery run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FisheryConfig {
    /// Optional RNG seed for reproducible runs; drawn from entropy when absent.
    pub rng_seed: Option<u64>,
    pub fishers: usize,
    pub periods: usize,
    pub map_width: usize,
    pub map_height: usize,
    /// Leftmost columns are land; the port sits on the first water column.
    pub land_columns: usize,
    /// Topmost rows are closed to fishing.
    pub protected_rows: usize,
    /// Friends per fisher.
    pub friendship_degree: usize,
    pub gears: Vec<Gear>,
    pub gear_probability: ProbabilityConfig,
    pub gear_climbing: BeamHillClimbingConfig,
    pub destination: DestinationConfig,
    /// Standard deviation of multiplicative catch noise.
    pub catch_noise: f64,
    pub price: f64,
    /// Cost per cell travelled from port.
    pub travel_cost: f64,
    /// Periods averaged into the population profit reference.
    pub population_window: usize,
}

impl Default for FisheryConfig {
    fn default() -> Self {
        Self {
            rng_seed: None,
            fishers: 30,
            periods: 150,
            map_width: 30,
            map_height: 20,
            land_columns: 2,
            protected_rows: 2,
            friendship_degree: 3,
            gears: vec![
                Gear::new("gillnet", 0.5, 5.0),
                Gear::new("longline", 0.8, 15.0),
                Gear::new("trawl", 1.2, 40.0),
            ],
            gear_probability: ProbabilityConfig::SocialAnnealing {
                multiplier: 1.0,
                imitation: 0.6,
            },
            gear_climbing: BeamHillClimbingConfig::default(),
            destination: DestinationConfig::default(),
            catch_noise: 0.2,
            price: 1.0,
            travel_cost: 0.5,
            population_window: 10,
        }
    }
}

impl FisheryConfig {
    /// Checks the driver's own parameters. Learner parameters are checked when built.
    pub fn validate(&self) -> Result<(), FisheryError> {
        if self.fishers < 2 {
            return Err(FisheryError::InvalidConfig(
                "a fishery needs at least two fishers",
            ));
        }
        if self.periods == 0 {
            return Err(FisheryError::InvalidConfig("periods must be at least 1"));
        }
        if self.map_width < 2 || self.map_height < 2 {
            return Err(FisheryError::InvalidConfig(
                "map must be at least 2x2 cells",
            ));
        }
        if self.land_columns >= self.map_width {
            return Err(FisheryError::InvalidConfig(
                "land must leave at least one water column",
            ));
        }
        if self.protected_rows >= self.map_height {
            return Err(FisheryError::InvalidConfig(
                "protected rows must leave open water",
            ));
        }
        if self.gears.is_empty() {
            return Err(FisheryError::InvalidConfig("gear menu must not be empty"));
        }
        if self.gears.iter().any(|gear| {
            !(gear.catchability.is_finite() && gear.catchability >= 0.0 && gear.cost.is_finite())
        }) {
            return Err(FisheryError::InvalidConfig(
                "gear catchability must be finite and non-negative, cost finite",
            ));
        }
        if !(self.catch_noise.is_finite() && self.catch_noise >= 0.0) {
            return Err(FisheryError::InvalidConfig(
                "catch noise must be finite and non-negative",
            ));
        }
        if !(self.price.is_finite() && self.travel_cost.is_finite()) {
            return Err(FisheryError::InvalidConfig(
                "price and travel cost must be finite",
            ));
        }
        Ok(())
    }

    /// Seed to use for this run.
    #[must_use]
    pub fn resolved_seed(&self) -> u64 {
        self.rng_seed.unwrap_or_else(rand::random)
    }
}

/// Outcome of one run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunSummary {
    pub seed: u64,
    pub periods: usize,
    pub fishers: usize,
    /// Mean profit per hour over the final period.
    pub final_profit_per_hour: f64,
    /// Mean profit per hour over every trip of the run.
    pub overall_profit_per_hour: f64,
    pub gear_counters: AdaptationCounters,
    /// Only populated by the explore-imitate destination learner.
    pub destination_counters: AdaptationCounters,
    /// Fishers holding each gear at the end of the run.
    pub gear_shares: BTreeMap<String, usize>,
    /// Distinct cells fished in the final period.
    pub distinct_destinations: usize,
}

/// Read a JSON config file.
pub fn load_config(path: &Path) -> Result<FisheryConfig, FisheryError> {
    let text = std::fs::read_to_string(path)?;
    Ok(serde_json::from_str(&text)?)
}

/// Run one fishery to completion.
pub fn run(config: &FisheryConfig) -> Result<RunSummary, FisheryError> {
    let seed = config.resolved_seed();
    let mut fishery = Fishery::new(config, seed)?;
    for _ in 0..config.periods {
        fishery.step()?;
    }
    let summary = fishery.summary();
    info!(
        seed,
        final_profit = summary.final_profit_per_hour,
        overall_profit = summary.overall_profit_per_hour,
        explored = summary.gear_counters.explored,
        imitated = summary.gear_counters.imitated,
        "fishery run complete"
    );
    Ok(summary)
}

/// Run `replicates` independent fisheries in parallel, seeds counting up from the base seed.
pub fn run_replicates(
    config: &FisheryConfig,
    replicates: usize,
) -> Result<Vec<RunSummary>, FisheryError> {
    config.validate()?;
    let base = config.resolved_seed();
    (0..replicates as u64)
        .into_par_iter()
        .map(|offset| {
            let replicate = FisheryConfig {
                rng_seed: Some(base.wrapping_add(offset)),
                ..config.clone()
            };
            run(&replicate)
        })
        .collect()
}
