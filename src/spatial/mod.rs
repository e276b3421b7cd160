//! Spatial indexing: the voxel grid and the interacting-pair map.

mod grid;
mod pairs;

pub use grid::{UniformGrid, NEIGHBOR_OFFSETS};
pub use pairs::{CellPair, PairChurn, PairKey, PairTracker};
