//! Trips, gear adaptation and destination learning for a toy fleet.

use std::collections::{BTreeMap, HashSet};
use std::sync::Arc;

use fleetsim_adapt::{
    AdaptationCounters, AdaptationHost, BanditAdaptation, BeamHillClimbing,
    ExploreImitateAdaptation, PeerSnapshot, Perturbation, menu_step,
};
use fleetsim_core::{AgentId, BanditSwitch, PeriodReport, SocialNetwork, WindowedAverage};
use fleetsim_index::{CellId, SeaGrid, SpatialGrid, random_tile_step};
use rand::rngs::SmallRng;
use rand::seq::IndexedRandom;
use rand::{Rng, RngCore, SeedableRng};
use rand_distr::{Distribution, Normal};
use slotmap::{SecondaryMap, SlotMap};
use tracing::{debug, info, trace};

use crate::{DestinationConfig, FisheryConfig, FisheryError, Heatmap, RunSummary};

const LAND_ALTITUDE: f64 = 10.0;
const HOTSPOTS: usize = 2;
const HOURS_AT_SEA: f64 = 5.0;
const RANDOM_STEP_ATTEMPTS: usize = 100;

#[derive(Debug, Clone)]
struct Fisher {
    gear: usize,
    destination: CellId,
    /// Cell fished on the latest trip.
    last_fished: Option<CellId>,
    profit_per_hour: f64,
    trips: u64,
}

type GearLearner = ExploreImitateAdaptation<usize, BeamHillClimbing<usize>>;
type TileLearner = ExploreImitateAdaptation<CellId, BeamHillClimbing<CellId>>;

#[derive(Debug)]
enum DestinationLearner {
    Bandit(BanditAdaptation<(usize, usize)>),
    Heatmap(Heatmap),
    Tiles(TileLearner),
}

/// Exposes fishers' gear to the adaptation controller.
struct GearDesk<'a> {
    fishers: &'a mut SlotMap<AgentId, Fisher>,
}

impl AdaptationHost<usize> for GearDesk<'_> {
    fn fitness(&self, agent: AgentId) -> f64 {
        self.fishers
            .get(agent)
            .map_or(f64::NAN, |fisher| fisher.profit_per_hour)
    }

    fn scan(&self, agent: AgentId) -> usize {
        self.fishers.get(agent).map_or(0, |fisher| fisher.gear)
    }

    fn apply(&mut self, agent: AgentId, strategy: usize) {
        if let Some(fisher) = self.fishers.get_mut(agent) {
            fisher.gear = strategy;
        }
    }

    fn is_ready(&self, agent: AgentId) -> bool {
        self.fishers.get(agent).is_some_and(|fisher| fisher.trips > 0)
    }
}

/// Exposes fishers' destinations to the adaptation controller.
struct Chart<'a> {
    fishers: &'a mut SlotMap<AgentId, Fisher>,
}

impl AdaptationHost<CellId> for Chart<'_> {
    fn fitness(&self, agent: AgentId) -> f64 {
        self.fishers
            .get(agent)
            .map_or(f64::NAN, |fisher| fisher.profit_per_hour)
    }

    fn scan(&self, agent: AgentId) -> CellId {
        self.fishers
            .get(agent)
            .map_or(CellId::new(0, 0), |fisher| fisher.destination)
    }

    fn apply(&mut self, agent: AgentId, strategy: CellId) {
        if let Some(fisher) = self.fishers.get_mut(agent) {
            fisher.destination = strategy;
        }
    }

    fn is_ready(&self, agent: AgentId) -> bool {
        self.fishers.get(agent).is_some_and(|fisher| fisher.trips > 0)
    }
}

/// A seeded fleet on a gridded sea.
#[derive(Debug)]
pub struct Fishery {
    config: FisheryConfig,
    seed: u64,
    rng: SmallRng,
    grid: Arc<SeaGrid>,
    port: CellId,
    hotspots: Vec<(CellId, f64)>,
    spread: f64,
    noise: Normal<f64>,
    fishers: SlotMap<AgentId, Fisher>,
    order: Vec<AgentId>,
    network: SocialNetwork,
    gear_learners: SecondaryMap<AgentId, GearLearner>,
    destination_learners: SecondaryMap<AgentId, DestinationLearner>,
    /// Cells of each bandit arm, indexed by arm.
    block_cells: Vec<Vec<CellId>>,
    population: WindowedAverage,
    period: usize,
    last_period_mean: f64,
    total_profit: f64,
    total_trips: u64,
}

impl Fishery {
    pub fn new(config: &FisheryConfig, seed: u64) -> Result<Self, FisheryError> {
        config.validate()?;
        let mut rng = SmallRng::seed_from_u64(seed);
        let (width, height) = (config.map_width, config.map_height);

        let mut grid = SeaGrid::new(width, height)?;
        for y in 0..height {
            for x in 0..config.land_columns {
                grid.set_altitude(CellId::new(x, y), LAND_ALTITUDE)?;
            }
            grid.set_fishable(CellId::new(width - 1, y), false)?;
        }
        for y in 0..config.protected_rows {
            for x in 0..width {
                grid.set_protected(CellId::new(x, y), true)?;
            }
        }
        let open: Vec<CellId> = grid
            .water_cells()
            .into_iter()
            .filter(|&cell| grid.is_fishable(cell) && !grid.is_protected(cell))
            .collect();
        if open.is_empty() {
            return Err(FisheryError::InvalidConfig("map has no open fishing ground"));
        }

        let mut hotspots = Vec::with_capacity(HOTSPOTS);
        for _ in 0..HOTSPOTS {
            let center = open[rng.random_range(0..open.len())];
            hotspots.push((center, rng.random_range(50.0..150.0)));
        }
        let noise = Normal::new(1.0, config.catch_noise).map_err(|_| {
            FisheryError::InvalidConfig("catch noise must be finite and non-negative")
        })?;

        let mut fishers = SlotMap::with_key();
        let mut order = Vec::with_capacity(config.fishers);
        for _ in 0..config.fishers {
            let destination = *open.choose(&mut rng).unwrap_or(&open[0]);
            order.push(fishers.insert(Fisher {
                gear: rng.random_range(0..config.gears.len()),
                destination,
                last_fished: None,
                profit_per_hour: f64::NAN,
                trips: 0,
            }));
        }
        let network = SocialNetwork::equidegree(&order, config.friendship_degree, &mut rng)?;

        let grid = Arc::new(grid);
        let mut gear_learners = SecondaryMap::new();
        let mut destination_learners = SecondaryMap::new();
        let menu: Vec<usize> = (0..config.gears.len()).collect();
        let switch = match config.destination {
            DestinationConfig::Bandit { block_size, .. } => {
                if block_size == 0 {
                    return Err(FisheryError::InvalidConfig("block size must be at least 1"));
                }
                Some(BanditSwitch::new(width * height, |index| {
                    let cell = CellId::new(index % width, index / width);
                    (grid.is_water(cell) && grid.is_fishable(cell) && !grid.is_protected(cell))
                        .then_some((cell.x / block_size, cell.y / block_size))
                })?)
            }
            _ => None,
        };
        let mut block_cells = vec![Vec::new(); switch.as_ref().map_or(0, BanditSwitch::arms)];
        if let Some(switch) = &switch {
            for index in 0..width * height {
                if let Some(arm) = switch.group_arm(index) {
                    block_cells[arm].push(CellId::new(index % width, index / width));
                }
            }
        }

        for &agent in &order {
            let climbing =
                BeamHillClimbing::from_config(config.gear_climbing, menu_step(menu.clone())?)?;
            gear_learners.insert(
                agent,
                ExploreImitateAdaptation::new(climbing, config.gear_probability.build()?),
            );
            let learner = match (config.destination, &switch) {
                (
                    DestinationConfig::Bandit {
                        estimator,
                        policy,
                        peek_at_friends,
                        ..
                    },
                    Some(switch),
                ) => DestinationLearner::Bandit(BanditAdaptation::new(
                    switch.clone(),
                    estimator,
                    policy,
                    peek_at_friends,
                )?),
                (
                    DestinationConfig::Heatmap {
                        acquisition,
                        exploration_probability,
                        step_size,
                    },
                    _,
                ) => {
                    acquisition.validate()?;
                    if !(0.0..=1.0).contains(&exploration_probability) || step_size == 0 {
                        return Err(FisheryError::InvalidConfig(
                            "heatmap needs an exploration probability in [0, 1] and a step size",
                        ));
                    }
                    DestinationLearner::Heatmap(Heatmap::default())
                }
                (
                    DestinationConfig::ExploreImitate {
                        probability,
                        climbing,
                        step_size,
                        attempts,
                    },
                    _,
                ) => {
                    if step_size == 0 || attempts == 0 {
                        return Err(FisheryError::InvalidConfig(
                            "tile steps need a step size and at least one attempt",
                        ));
                    }
                    let sea = Arc::clone(&grid);
                    let perturb: Perturbation<CellId> = Box::new(
                        move |rng: &mut dyn RngCore, _agent: AgentId, current: &CellId| {
                            random_tile_step(&*sea, *current, step_size, attempts, rng)
                        },
                    );
                    DestinationLearner::Tiles(ExploreImitateAdaptation::new(
                        BeamHillClimbing::from_config(climbing, perturb)?,
                        probability.build()?,
                    ))
                }
                (DestinationConfig::Bandit { .. }, None) => {
                    return Err(FisheryError::InvalidConfig("bandit destinations need a switch"));
                }
            };
            destination_learners.insert(agent, learner);
        }

        info!(
            seed,
            fishers = order.len(),
            open_cells = open.len(),
            friendships = network.edge_count(),
            "fishery initialised"
        );
        Ok(Self {
            config: config.clone(),
            seed,
            rng,
            port: CellId::new(config.land_columns, height / 2),
            grid,
            hotspots,
            spread: width.max(height) as f64 / 5.0,
            noise,
            fishers,
            order,
            network,
            gear_learners,
            destination_learners,
            block_cells,
            population: WindowedAverage::new(config.population_window)?,
            period: 0,
            last_period_mean: f64::NAN,
            total_profit: 0.0,
            total_trips: 0,
        })
    }

    #[must_use]
    pub fn grid(&self) -> &SeaGrid {
        &self.grid
    }

    #[must_use]
    pub const fn network(&self) -> &SocialNetwork {
        &self.network
    }

    #[must_use]
    pub const fn period(&self) -> usize {
        self.period
    }

    /// Current destination of every fisher, in stepping order.
    #[must_use]
    pub fn destinations(&self) -> Vec<CellId> {
        self.order
            .iter()
            .filter_map(|&agent| self.fishers.get(agent).map(|fisher| fisher.destination))
            .collect()
    }

    /// Expected abundance in `cell`; zero on land, wastelands and protected cells.
    #[must_use]
    pub fn abundance(&self, cell: CellId) -> f64 {
        if !self.grid.is_water(cell) || !self.grid.is_fishable(cell) || self.grid.is_protected(cell)
        {
            return 0.0;
        }
        self.hotspots
            .iter()
            .map(|(center, peak)| {
                let dx = cell.x as f64 - center.x as f64;
                let dy = cell.y as f64 - center.y as f64;
                peak * (-(dx * dx + dy * dy) / (2.0 * self.spread * self.spread)).exp()
            })
            .sum()
    }

    /// One period: every fisher takes a trip, then adapts gear and destination.
    pub fn step(&mut self) -> Result<(), FisheryError> {
        self.period += 1;
        let order = self.order.clone();
        let total: f64 = order.iter().map(|&agent| self.trip(agent)).sum();
        let mean = total / order.len() as f64;
        self.last_period_mean = mean;
        self.population.observe(mean);
        let population_average = self.population.value();

        self.adapt_gear(&order, population_average);
        self.adapt_destinations(&order, population_average)?;
        debug!(period = self.period, mean, population_average, "period complete");
        Ok(())
    }

    fn trip(&mut self, agent: AgentId) -> f64 {
        let Some((gear, cell)) = self
            .fishers
            .get(agent)
            .map(|fisher| (fisher.gear, fisher.destination))
        else {
            return 0.0;
        };
        let Some(gear) = self.config.gears.get(gear) else {
            return 0.0;
        };
        let factor = self.noise.sample(&mut self.rng).max(0.0);
        let landed = gear.catchability * self.abundance(cell) * factor;
        let distance = self.port.chebyshev(&cell) as f64;
        let profit = landed * self.config.price - gear.cost - distance * self.config.travel_cost;
        let profit_per_hour = profit / (HOURS_AT_SEA + distance);

        if let Some(fisher) = self.fishers.get_mut(agent) {
            fisher.last_fished = Some(cell);
            fisher.profit_per_hour = profit_per_hour;
            fisher.trips += 1;
        }
        if let Some(DestinationLearner::Heatmap(heatmap)) = self.destination_learners.get_mut(agent)
        {
            heatmap.observe(cell, profit_per_hour);
        }
        self.total_profit += profit_per_hour;
        self.total_trips += 1;
        trace!(?agent, ?cell, profit_per_hour, "trip complete");
        profit_per_hour
    }

    fn adapt_gear(&mut self, order: &[AgentId], population_average: f64) {
        let Self {
            fishers,
            gear_learners,
            network,
            rng,
            ..
        } = self;
        for &agent in order {
            let Some(learner) = gear_learners.get_mut(agent) else {
                continue;
            };
            let profit_per_hour = fishers
                .get(agent)
                .map_or(f64::NAN, |fisher| fisher.profit_per_hour);
            learner.probability_mut().on_period_end(&PeriodReport {
                profit_per_hour,
                population_average,
            });
            let mut desk = GearDesk {
                fishers: &mut *fishers,
            };
            learner.adapt(agent, &mut desk, network, rng);
        }
    }

    fn adapt_destinations(
        &mut self,
        order: &[AgentId],
        population_average: f64,
    ) -> Result<(), FisheryError> {
        let Self {
            config,
            grid,
            fishers,
            destination_learners,
            block_cells,
            network,
            rng,
            period,
            ..
        } = self;
        let width = grid.width();
        let index_of = |cell: CellId| cell.y * width + cell.x;

        for &agent in order {
            let Some(learner) = destination_learners.get_mut(agent) else {
                continue;
            };
            let Some((current, fished, profit_per_hour)) = fishers.get(agent).map(|fisher| {
                (
                    fisher.destination,
                    fisher.last_fished,
                    fisher.profit_per_hour,
                )
            }) else {
                continue;
            };

            let next = match learner {
                DestinationLearner::Bandit(bandit) => {
                    let peers: Vec<PeerSnapshot<usize>> = network
                        .friends(agent)
                        .iter()
                        .filter_map(|&peer| {
                            let fisher = fishers.get(peer)?;
                            fisher.last_fished.map(|cell| PeerSnapshot {
                                id: peer,
                                strategy: index_of(cell),
                                fitness: fisher.profit_per_hour,
                            })
                        })
                        .collect();
                    let played = fished.map(index_of);
                    let index = bandit.adapt(played, profit_per_hour, &peers, rng)?;
                    let block: Vec<CellId> = bandit
                        .switch()
                        .group_arm(index)
                        .and_then(|arm| block_cells.get(arm))
                        .map(|cells| {
                            cells
                                .iter()
                                .copied()
                                .filter(|&cell| grid.is_legal(agent, cell))
                                .collect()
                        })
                        .unwrap_or_default();
                    Some(
                        block
                            .choose(rng)
                            .copied()
                            .unwrap_or(CellId::new(index % width, index / width)),
                    )
                }
                DestinationLearner::Heatmap(heatmap) => {
                    let DestinationConfig::Heatmap {
                        acquisition,
                        exploration_probability,
                        step_size,
                    } = config.destination
                    else {
                        continue;
                    };
                    if exploration_probability > 0.0 && rng.random_bool(exploration_probability) {
                        random_tile_step(
                            &**grid,
                            current,
                            step_size,
                            RANDOM_STEP_ATTEMPTS,
                            rng,
                        )
                    } else {
                        acquisition.pick(
                            &**grid,
                            &*heatmap,
                            *period as f64,
                            agent,
                            Some(current),
                            rng,
                        )
                    }
                }
                DestinationLearner::Tiles(learner) => {
                    learner.probability_mut().on_period_end(&PeriodReport {
                        profit_per_hour,
                        population_average,
                    });
                    let mut chart = Chart {
                        fishers: &mut *fishers,
                    };
                    learner.adapt(agent, &mut chart, network, rng);
                    None
                }
            };

            if let Some(cell) = next {
                if let Some(fisher) = fishers.get_mut(agent) {
                    fisher.destination = cell;
                }
            }
        }
        Ok(())
    }

    /// Snapshot of the run so far.
    #[must_use]
    pub fn summary(&self) -> RunSummary {
        let mut gear_shares: BTreeMap<String, usize> = self
            .config
            .gears
            .iter()
            .map(|gear| (gear.name.clone(), 0))
            .collect();
        for fisher in self.fishers.values() {
            if let Some(gear) = self.config.gears.get(fisher.gear) {
                *gear_shares.entry(gear.name.clone()).or_insert(0) += 1;
            }
        }

        let mut gear_counters = AdaptationCounters::default();
        for learner in self.gear_learners.values() {
            gear_counters.merge(learner.counters());
        }
        let mut destination_counters = AdaptationCounters::default();
        for learner in self.destination_learners.values() {
            if let DestinationLearner::Tiles(learner) = learner {
                destination_counters.merge(learner.counters());
            }
        }

        let distinct: HashSet<CellId> = self
            .fishers
            .values()
            .map(|fisher| fisher.destination)
            .collect();
        RunSummary {
            seed: self.seed,
            periods: self.period,
            fishers: self.order.len(),
            final_profit_per_hour: self.last_period_mean,
            overall_profit_per_hour: if self.total_trips == 0 {
                0.0
            } else {
                self.total_profit / self.total_trips as f64
            },
            gear_counters,
            destination_counters,
            gear_shares,
            distinct_destinations: distinct.len(),
        }
    }
}
