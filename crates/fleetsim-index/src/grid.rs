//! Raster sea grid.

use std::collections::HashSet;

use fleetsim_core::AgentId;
use serde::{Deserialize, Serialize};

use crate::{CellId, IndexError, SpatialGrid};

/// Altitude used for cells created by [`SeaGrid::new`].
pub const DEFAULT_DEPTH: f64 = -100.0;

/// Row-major raster of cells. A cell is water iff its altitude is negative.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SeaGrid {
    width: usize,
    height: usize,
    altitude: Vec<f64>,
    fishable: Vec<bool>,
    protected: Vec<bool>,
    #[serde(skip)]
    access: HashSet<AgentId>,
}

impl SeaGrid {
    /// All-water grid, fishable everywhere, nothing protected.
    pub fn new(width: usize, height: usize) -> Result<Self, IndexError> {
        if width == 0 || height == 0 {
            return Err(IndexError::InvalidConfig("grid dimensions must be non-zero"));
        }
        let cells = width * height;
        Ok(Self {
            width,
            height,
            altitude: vec![DEFAULT_DEPTH; cells],
            fishable: vec![true; cells],
            protected: vec![false; cells],
            access: HashSet::new(),
        })
    }

    /// Grid from a row-major altitude raster.
    pub fn from_altitude(
        width: usize,
        height: usize,
        altitude: Vec<f64>,
    ) -> Result<Self, IndexError> {
        let mut grid = Self::new(width, height)?;
        if altitude.len() != grid.altitude.len() {
            return Err(IndexError::DimensionMismatch {
                expected: grid.altitude.len(),
                actual: altitude.len(),
            });
        }
        grid.altitude = altitude;
        Ok(grid)
    }

    fn offset(&self, cell: CellId) -> Result<usize, IndexError> {
        if self.contains(cell) {
            Ok(cell.y * self.width + cell.x)
        } else {
            Err(IndexError::OutOfBounds {
                x: cell.x,
                y: cell.y,
                width: self.width,
                height: self.height,
            })
        }
    }

    #[must_use]
    pub fn altitude(&self, cell: CellId) -> Option<f64> {
        self.offset(cell).ok().map(|idx| self.altitude[idx])
    }

    pub fn set_altitude(&mut self, cell: CellId, altitude: f64) -> Result<(), IndexError> {
        let idx = self.offset(cell)?;
        self.altitude[idx] = altitude;
        Ok(())
    }

    pub fn set_fishable(&mut self, cell: CellId, fishable: bool) -> Result<(), IndexError> {
        let idx = self.offset(cell)?;
        self.fishable[idx] = fishable;
        Ok(())
    }

    /// Protected cells are only legal for agents granted access.
    pub fn set_protected(&mut self, cell: CellId, protected: bool) -> Result<(), IndexError> {
        let idx = self.offset(cell)?;
        self.protected[idx] = protected;
        Ok(())
    }

    #[must_use]
    pub fn is_protected(&self, cell: CellId) -> bool {
        self.offset(cell).is_ok_and(|idx| self.protected[idx])
    }

    pub fn grant_access(&mut self, agent: AgentId) {
        self.access.insert(agent);
    }

    pub fn revoke_access(&mut self, agent: AgentId) {
        self.access.remove(&agent);
    }

    /// Water cells in row-major order.
    #[must_use]
    pub fn water_cells(&self) -> Vec<CellId> {
        self.cells()
            .into_iter()
            .filter(|&cell| self.is_water(cell))
            .collect()
    }
}

impl SpatialGrid for SeaGrid {
    fn width(&self) -> usize {
        self.width
    }

    fn height(&self) -> usize {
        self.height
    }

    fn is_water(&self, cell: CellId) -> bool {
        self.altitude(cell).is_some_and(|altitude| altitude < 0.0)
    }

    fn is_fishable(&self, cell: CellId) -> bool {
        self.offset(cell).is_ok_and(|idx| self.fishable[idx])
    }

    fn is_legal(&self, agent: AgentId, cell: CellId) -> bool {
        self.contains(cell) && (!self.is_protected(cell) || self.access.contains(&agent))
    }
}
