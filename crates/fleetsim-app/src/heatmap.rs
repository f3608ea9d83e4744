//! A fisher's memory of what each visited cell paid.

use std::collections::HashMap;

use fleetsim_core::{AgentId, IterativeAverage};
use fleetsim_index::{CellId, RegressionSurface};

/// Running mean of observed profit per cell. Unvisited cells predict `NaN`.
#[derive(Debug, Clone, Default)]
pub struct Heatmap {
    cells: HashMap<CellId, IterativeAverage>,
}

impl Heatmap {
    pub fn observe(&mut self, cell: CellId, profit: f64) {
        if profit.is_finite() {
            self.cells.entry(cell).or_default().observe(profit);
        }
    }

    #[must_use]
    pub fn visited(&self) -> usize {
        self.cells.len()
    }
}

impl RegressionSurface for Heatmap {
    fn predict(&self, cell: CellId, _time: f64, _agent: AgentId) -> f64 {
        self.cells.get(&cell).map_or(f64::NAN, IterativeAverage::value)
    }
}
