//! Spatial search over a gridded sea.
//!
//! A [`SpatialGrid`] answers geometry and eligibility questions, a [`RegressionSurface`]
//! predicts the value of fishing a cell, and an [`AcquisitionFunction`] combines the two to
//! pick the next cell to try.

use fleetsim_core::AgentId;
use serde::{Deserialize, Serialize};
use thiserror::Error;

pub mod acquisition;
pub mod grid;

pub use acquisition::{AcquisitionFunction, random_tile_step};
pub use grid::SeaGrid;

/// Errors emitted by grid construction and edits.
#[derive(Debug, Error, PartialEq)]
pub enum IndexError {
    /// Indicates configuration values that cannot be used (e.g., a zero-width grid).
    #[error("invalid configuration: {0}")]
    InvalidConfig(&'static str),
    #[error("cell ({x}, {y}) lies outside the {width}x{height} grid")]
    OutOfBounds {
        x: usize,
        y: usize,
        width: usize,
        height: usize,
    },
    #[error("expected {expected} raster values, got {actual}")]
    DimensionMismatch { expected: usize, actual: usize },
}

/// Integer coordinates of a grid cell.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct CellId {
    pub x: usize,
    pub y: usize,
}

impl CellId {
    #[must_use]
    pub const fn new(x: usize, y: usize) -> Self {
        Self { x, y }
    }

    /// Chebyshev (king-move) distance.
    #[must_use]
    pub const fn chebyshev(&self, other: &Self) -> usize {
        let dx = self.x.abs_diff(other.x);
        let dy = self.y.abs_diff(other.y);
        if dx > dy { dx } else { dy }
    }
}

/// Geometry and per-agent eligibility of a rectangular grid.
pub trait SpatialGrid {
    fn width(&self) -> usize;

    fn height(&self) -> usize;

    fn is_water(&self, cell: CellId) -> bool;

    /// `false` for wastelands that can never yield anything.
    fn is_fishable(&self, cell: CellId) -> bool;

    /// Whether `agent` is allowed to fish `cell`.
    fn is_legal(&self, agent: AgentId, cell: CellId) -> bool;

    fn contains(&self, cell: CellId) -> bool {
        cell.x < self.width() && cell.y < self.height()
    }

    /// Every cell in row-major order.
    fn cells(&self) -> Vec<CellId> {
        let (width, height) = (self.width(), self.height());
        (0..height)
            .flat_map(|y| (0..width).map(move |x| CellId::new(x, y)))
            .collect()
    }

    /// Cells within Chebyshev distance `radius` of `cell`, excluding `cell`, clipped at the
    /// borders.
    fn moore_neighbors(&self, cell: CellId, radius: usize) -> Vec<CellId> {
        if !self.contains(cell) {
            return Vec::new();
        }
        let x_range = cell.x.saturating_sub(radius)..=(cell.x + radius).min(self.width() - 1);
        let y_range = cell.y.saturating_sub(radius)..=(cell.y + radius).min(self.height() - 1);
        let mut neighbors = Vec::new();
        for y in y_range {
            for x in x_range.clone() {
                let candidate = CellId::new(x, y);
                if candidate != cell {
                    neighbors.push(candidate);
                }
            }
        }
        neighbors
    }
}

/// Predicted value of fishing `cell` at `time` for `agent`. May be non-finite.
pub trait RegressionSurface {
    fn predict(&self, cell: CellId, time: f64, agent: AgentId) -> f64;
}

impl<F> RegressionSurface for F
where
    F: Fn(CellId, f64, AgentId) -> f64,
{
    fn predict(&self, cell: CellId, time: f64, agent: AgentId) -> f64 {
        self(cell, time, agent)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn chebyshev_is_king_move_distance() {
        let origin = CellId::new(2, 2);
        assert_eq!(origin.chebyshev(&CellId::new(4, 3)), 2);
        assert_eq!(origin.chebyshev(&CellId::new(0, 0)), 2);
        assert_eq!(origin.chebyshev(&origin), 0);
    }

    #[test]
    fn closures_are_surfaces() {
        let surface = |cell: CellId, time: f64, _agent: AgentId| cell.x as f64 + time;
        assert_eq!(surface.predict(CellId::new(3, 0), 0.5, AgentId::default()), 3.5);
    }
}
