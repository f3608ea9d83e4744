//! Acquisition functions: pick the next cell to try from a predicted-value surface.

use std::collections::HashSet;

use fleetsim_core::AgentId;
use rand::seq::{IndexedRandom, SliceRandom};
use rand::{Rng, RngCore};
use serde::{Deserialize, Serialize};
use tracing::{trace, warn};

use crate::{CellId, IndexError, RegressionSurface, SpatialGrid};

/// Strategy for choosing a cell given a regression surface.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum AcquisitionFunction {
    /// Score a random subsample of all eligible cells and keep the best.
    Exhaustive {
        /// Probability that each eligible cell is scored.
        proportion_searched: f64,
        /// Skip cells that can never yield anything.
        ignore_wastelands: bool,
        /// Skip cells the agent may not legally fish.
        ignore_protected_areas: bool,
    },
    /// Climb the surface through Moore neighborhoods of radius `step_size`.
    HillClimbing { step_size: usize },
}

impl Default for AcquisitionFunction {
    fn default() -> Self {
        Self::HillClimbing { step_size: 1 }
    }
}

impl AcquisitionFunction {
    pub fn validate(&self) -> Result<(), IndexError> {
        match *self {
            Self::Exhaustive {
                proportion_searched,
                ..
            } => {
                if proportion_searched > 0.0 && proportion_searched <= 1.0 {
                    Ok(())
                } else {
                    Err(IndexError::InvalidConfig(
                        "proportion searched must lie in (0, 1]",
                    ))
                }
            }
            Self::HillClimbing { step_size } => {
                if step_size == 0 {
                    Err(IndexError::InvalidConfig("step size must be at least 1"))
                } else {
                    Ok(())
                }
            }
        }
    }

    /// Pick a cell for `agent`, starting from `current` when given.
    ///
    /// Non-finite predictions never win. Returns `None` only when no eligible cell with a
    /// finite prediction exists and there is no usable incumbent. Invalid parameters search
    /// nothing and keep `current`.
    pub fn pick<G, S>(
        &self,
        grid: &G,
        surface: &S,
        time: f64,
        agent: AgentId,
        current: Option<CellId>,
        rng: &mut dyn RngCore,
    ) -> Option<CellId>
    where
        G: SpatialGrid + ?Sized,
        S: RegressionSurface + ?Sized,
    {
        if let Err(error) = self.validate() {
            warn!(?agent, acquisition = ?self, %error, "invalid acquisition function");
            return current;
        }
        let picked = match *self {
            Self::Exhaustive {
                proportion_searched,
                ignore_wastelands,
                ignore_protected_areas,
            } => {
                let mut candidates: Vec<CellId> = grid
                    .cells()
                    .into_iter()
                    .filter(|&cell| grid.is_water(cell))
                    .filter(|&cell| !ignore_wastelands || grid.is_fishable(cell))
                    .filter(|&cell| !ignore_protected_areas || grid.is_legal(agent, cell))
                    .collect();
                candidates.shuffle(rng);

                let mut best = current
                    .map(|cell| (cell, surface.predict(cell, time, agent)))
                    .filter(|(_, value)| value.is_finite());
                for cell in candidates {
                    if proportion_searched < 1.0 && !rng.random_bool(proportion_searched) {
                        continue;
                    }
                    let value = surface.predict(cell, time, agent);
                    if value.is_finite() && best.is_none_or(|(_, top)| value > top) {
                        best = Some((cell, value));
                    }
                }
                best.map(|(cell, _)| cell)
            }
            Self::HillClimbing { step_size } => {
                hill_climb(grid, surface, time, agent, current, step_size, rng)
            }
        };
        if picked.is_none() {
            warn!(?agent, acquisition = ?self, "acquisition found no eligible cell");
        }
        picked
    }
}

fn hill_climb<G, S>(
    grid: &G,
    surface: &S,
    time: f64,
    agent: AgentId,
    start: Option<CellId>,
    step_size: usize,
    rng: &mut dyn RngCore,
) -> Option<CellId>
where
    G: SpatialGrid + ?Sized,
    S: RegressionSurface + ?Sized,
{
    let mut location = match start.filter(|&cell| grid.contains(cell)) {
        Some(cell) => cell,
        None => {
            let water: Vec<CellId> = grid
                .cells()
                .into_iter()
                .filter(|&cell| grid.is_water(cell))
                .collect();
            *water.choose(rng)?
        }
    };
    let mut value = surface.predict(location, time, agent);
    if !value.is_finite() {
        value = f64::NEG_INFINITY;
    }

    let mut visited = HashSet::from([location]);
    'climb: loop {
        let mut neighbors = grid.moore_neighbors(location, step_size);
        neighbors.shuffle(rng);
        for neighbor in neighbors {
            if !visited.insert(neighbor) || !grid.is_water(neighbor) {
                continue;
            }
            let candidate = surface.predict(neighbor, time, agent);
            if candidate.is_finite() && candidate > value {
                trace!(from = ?location, to = ?neighbor, value = candidate, "hill climb step");
                location = neighbor;
                value = candidate;
                continue 'climb;
            }
        }
        break;
    }
    Some(location)
}

/// A random water cell within `step_size` of `from`, or `None` after `attempts` misses.
pub fn random_tile_step<G>(
    grid: &G,
    from: CellId,
    step_size: usize,
    attempts: usize,
    rng: &mut dyn RngCore,
) -> Option<CellId>
where
    G: SpatialGrid + ?Sized,
{
    let neighbors = grid.moore_neighbors(from, step_size);
    for _ in 0..attempts {
        let candidate = *neighbors.choose(rng)?;
        if grid.is_water(candidate) {
            return Some(candidate);
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::SeaGrid;
    use rand::SeedableRng;
    use rand::rngs::SmallRng;
    use std::cell::Cell;

    fn peak_surface(peak: CellId) -> impl Fn(CellId, f64, AgentId) -> f64 {
        move |cell, _time, _agent| {
            let dx = cell.x as f64 - peak.x as f64;
            let dy = cell.y as f64 - peak.y as f64;
            -(dx * dx + dy * dy)
        }
    }

    fn exhaustive(proportion_searched: f64) -> AcquisitionFunction {
        AcquisitionFunction::Exhaustive {
            proportion_searched,
            ignore_wastelands: false,
            ignore_protected_areas: false,
        }
    }

    #[test]
    fn exhaustive_finds_the_unique_maximum_for_any_seed() {
        let grid = SeaGrid::new(12, 9).expect("grid");
        let peak = CellId::new(7, 3);
        let surface = peak_surface(peak);
        for seed in 0..25 {
            let mut rng = SmallRng::seed_from_u64(seed);
            let picked = exhaustive(1.0).pick(
                &grid,
                &surface,
                0.0,
                AgentId::default(),
                Some(CellId::new(0, 0)),
                &mut rng,
            );
            assert_eq!(picked, Some(peak));
        }
    }

    #[test]
    fn exhaustive_skips_land_and_non_finite_predictions() {
        let mut grid = SeaGrid::new(4, 1).expect("grid");
        grid.set_altitude(CellId::new(3, 0), 10.0).expect("land");
        let surface = |cell: CellId, _time: f64, _agent: AgentId| match cell.x {
            0 => 1.0,
            1 => f64::NAN,
            2 => f64::INFINITY,
            _ => 100.0,
        };
        let mut rng = SmallRng::seed_from_u64(1);
        let picked = exhaustive(1.0).pick(&grid, &surface, 0.0, AgentId::default(), None, &mut rng);
        assert_eq!(picked, Some(CellId::new(0, 0)));
    }

    #[test]
    fn exhaustive_returns_incumbent_when_nothing_is_finite() {
        let grid = SeaGrid::new(3, 3).expect("grid");
        let incumbent = CellId::new(1, 1);
        let surface = move |cell: CellId, _time: f64, _agent: AgentId| {
            if cell == incumbent { 5.0 } else { f64::NAN }
        };
        let mut rng = SmallRng::seed_from_u64(2);
        let picked = exhaustive(1.0).pick(
            &grid,
            &surface,
            0.0,
            AgentId::default(),
            Some(incumbent),
            &mut rng,
        );
        assert_eq!(picked, Some(incumbent));

        let nothing = |_cell: CellId, _time: f64, _agent: AgentId| f64::NAN;
        let picked = exhaustive(1.0).pick(&grid, &nothing, 0.0, AgentId::default(), None, &mut rng);
        assert_eq!(picked, None);
    }

    #[test]
    fn exhaustive_honours_wastelands_and_protected_areas() {
        let mut grid = SeaGrid::new(3, 1).expect("grid");
        grid.set_fishable(CellId::new(2, 0), false).expect("wasteland");
        grid.set_protected(CellId::new(1, 0), true).expect("protected");
        let surface = |cell: CellId, _time: f64, _agent: AgentId| cell.x as f64;
        let strict = AcquisitionFunction::Exhaustive {
            proportion_searched: 1.0,
            ignore_wastelands: true,
            ignore_protected_areas: true,
        };
        let mut rng = SmallRng::seed_from_u64(3);
        let agent = AgentId::default();
        assert_eq!(
            strict.pick(&grid, &surface, 0.0, agent, None, &mut rng),
            Some(CellId::new(0, 0))
        );
        assert_eq!(
            exhaustive(1.0).pick(&grid, &surface, 0.0, agent, None, &mut rng),
            Some(CellId::new(2, 0))
        );
    }

    #[test]
    fn partial_search_never_does_worse_than_incumbent() {
        let grid = SeaGrid::new(10, 10).expect("grid");
        let peak = CellId::new(9, 9);
        let surface = peak_surface(peak);
        let incumbent = CellId::new(5, 5);
        let incumbent_value = surface(incumbent, 0.0, AgentId::default());
        for seed in 0..20 {
            let mut rng = SmallRng::seed_from_u64(seed);
            let picked = exhaustive(0.1)
                .pick(&grid, &surface, 0.0, AgentId::default(), Some(incumbent), &mut rng)
                .expect("cell");
            assert!(surface(picked, 0.0, AgentId::default()) >= incumbent_value);
        }
    }

    #[test]
    fn hill_climbing_reaches_peak_without_revisiting() {
        let n = 8;
        let grid = SeaGrid::new(n, n).expect("grid");
        let peak = CellId::new(5, 2);
        let inner = peak_surface(peak);
        for seed in 0..10 {
            let calls = Cell::new(0_usize);
            let counted = |cell: CellId, time: f64, agent: AgentId| {
                calls.set(calls.get() + 1);
                inner(cell, time, agent)
            };
            let mut rng = SmallRng::seed_from_u64(seed);
            let start = CellId::new((seed as usize * 3) % n, (seed as usize * 5) % n);
            let picked = AcquisitionFunction::HillClimbing { step_size: 1 }.pick(
                &grid,
                &counted,
                0.0,
                AgentId::default(),
                Some(start),
                &mut rng,
            );
            assert_eq!(picked, Some(peak));
            assert!(calls.get() <= n * n, "evaluated {} cells", calls.get());
        }
    }

    #[test]
    fn hill_climbing_from_nowhere_starts_on_water() {
        let mut grid = SeaGrid::new(5, 5).expect("grid");
        for x in 0..5 {
            grid.set_altitude(CellId::new(x, 0), 1.0).expect("land");
        }
        let flat = |_cell: CellId, _time: f64, _agent: AgentId| 0.0;
        let mut rng = SmallRng::seed_from_u64(4);
        let picked = AcquisitionFunction::HillClimbing { step_size: 2 }
            .pick(&grid, &flat, 0.0, AgentId::default(), None, &mut rng)
            .expect("cell");
        assert!(grid.is_water(picked));
    }

    #[test]
    fn random_tile_step_lands_on_nearby_water() {
        let mut grid = SeaGrid::new(5, 5).expect("grid");
        grid.set_altitude(CellId::new(1, 1), 3.0).expect("land");
        let from = CellId::new(2, 2);
        let mut rng = SmallRng::seed_from_u64(5);
        for _ in 0..50 {
            let step = random_tile_step(&grid, from, 1, 100, &mut rng).expect("step");
            assert!(grid.is_water(step));
            assert_eq!(step.chebyshev(&from), 1);
        }

        let island = SeaGrid::from_altitude(2, 1, vec![1.0, 1.0]).expect("grid");
        assert_eq!(random_tile_step(&island, CellId::new(0, 0), 1, 10, &mut rng), None);
    }

    #[test]
    fn invalid_parameters_keep_the_incumbent() {
        let grid = SeaGrid::new(6, 6).expect("grid");
        let surface = peak_surface(CellId::new(5, 5));
        let incumbent = CellId::new(1, 1);
        let mut rng = SmallRng::seed_from_u64(6);
        for acquisition in [
            exhaustive(-0.5),
            exhaustive(f64::NAN),
            AcquisitionFunction::HillClimbing { step_size: 0 },
        ] {
            let agent = AgentId::default();
            assert_eq!(
                acquisition.pick(&grid, &surface, 0.0, agent, Some(incumbent), &mut rng),
                Some(incumbent)
            );
            assert_eq!(acquisition.pick(&grid, &surface, 0.0, agent, None, &mut rng), None);
        }
    }

    #[test]
    fn invalid_parameters_are_rejected() {
        assert!(exhaustive(0.0).validate().is_err());
        assert!(exhaustive(1.5).validate().is_err());
        assert!(AcquisitionFunction::HillClimbing { step_size: 0 }.validate().is_err());
        let parsed: AcquisitionFunction =
            serde_json::from_str(r#"{"kind":"hill_climbing","step_size":2}"#).expect("parse");
        assert_eq!(parsed, AcquisitionFunction::HillClimbing { step_size: 2 });
    }
}
