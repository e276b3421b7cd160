//! Simulation state.
//!
//! Cells, their batches and the explicit per-run context (grid, constants,
//! id counter, sampler).

mod cell;
mod context;
mod population;

pub use cell::{Cell, CellId};
pub use context::SimulationContext;
pub use population::CellPopulation;
