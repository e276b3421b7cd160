//! Per-run simulation context.
//!
//! Everything that is constant or unique for a run (grid geometry, force
//! constants, the cell id counter, the Gaussian sampler) lives here and is
//! passed explicitly to the components that need it.

use crate::config::SimulationParameters;
use crate::error::Result;
use crate::rng::GaussianSource;
use crate::spatial::UniformGrid;
use crate::state::CellId;

pub struct SimulationContext {
    pub params: SimulationParameters,
    pub grid: UniformGrid,
    pub rng: GaussianSource,
    next_cell_id: u32,
}

impl SimulationContext {
    pub fn new(params: SimulationParameters) -> Result<Self> {
        let grid = UniformGrid::from_params(&params.grid)?;
        let rng = GaussianSource::from_params(&params.rng)?;
        log::info!(
            "Simulation context: {:?} voxels of {} μm, toroidal={}, boundary_force={}",
            grid.points().to_array(),
            grid.step(),
            grid.is_toroidal(),
            params.grid.boundary_force
        );
        Ok(Self {
            params,
            grid,
            rng,
            next_cell_id: 0,
        })
    }

    /// Next unused cell id.
    pub fn next_cell_id(&mut self) -> CellId {
        let id = CellId(self.next_cell_id);
        self.next_cell_id += 1;
        id
    }

    /// Pairwise and wall repulsion constant.
    pub fn phi1(&self) -> f64 {
        self.params.forces.phi1
    }

    /// Wall forces apply only to a bounded, non-toroidal domain.
    pub fn boundary_forces_enabled(&self) -> bool {
        self.params.grid.boundary_force && !self.grid.is_toroidal()
    }
}
