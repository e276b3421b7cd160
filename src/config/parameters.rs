//! Simulation-wide parameter structures.
//!
//! Grid geometry, force constants and sampler settings are fixed for the
//! lifetime of a run and handed to `SimulationContext` at construction.

use serde::{Deserialize, Serialize};
use std::path::Path;

/// Top-level parameters container
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SimulationParameters {
    /// Uniform grid and domain boundary
    pub grid: GridParameters,
    /// Mechanical force constants
    pub forces: ForceParameters,
    /// Gaussian sampler settings
    pub rng: RngParameters,
}

impl SimulationParameters {
    /// Load parameters from `data/parameters/simulation.json`, or defaults
    pub fn load_or_default() -> Self {
        Self::load_path_or_default("data/parameters/simulation.json")
    }

    /// Load parameters from `simulation.json` inside a directory
    pub fn load_from_dir<P: AsRef<Path>>(dir: P) -> Self {
        Self::load_path_or_default(dir.as_ref().join("simulation.json"))
    }

    /// Load from a JSON file or return defaults
    pub fn load_path_or_default<P: AsRef<Path>>(path: P) -> Self {
        match std::fs::read_to_string(path.as_ref()) {
            Ok(contents) => match serde_json::from_str(&contents) {
                Ok(params) => {
                    log::info!("Loaded simulation parameters from {:?}", path.as_ref());
                    params
                }
                Err(e) => {
                    log::warn!("Failed to parse simulation parameters: {}, using defaults", e);
                    Self::default()
                }
            },
            Err(_) => {
                log::info!("Simulation parameters file not found, using defaults");
                Self::default()
            }
        }
    }
}

/// Uniform grid covering the extracellular domain `[0, extent)^3`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GridParameters {
    /// Domain size per axis (μm)
    pub extent_um: [f64; 3],
    /// Voxel edge length (μm); should be at least one cell diameter
    pub step_um: f64,
    /// Wrap positions and separations around the domain
    pub toroidal: bool,
    /// Repel cells from the domain walls (only honoured when not toroidal)
    pub boundary_force: bool,
}

impl Default for GridParameters {
    fn default() -> Self {
        Self {
            extent_um: [100.0, 100.0, 100.0],
            // Two 5 μm cell radii per voxel
            step_um: 10.0,
            toroidal: false,
            boundary_force: true,
        }
    }
}

/// Mechanical force constants
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ForceParameters {
    /// Pairwise and wall repulsion constant Phi1
    pub phi1: f64,
}

impl Default for ForceParameters {
    fn default() -> Self {
        Self { phi1: 100.0 }
    }
}

/// Gaussian sampler settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RngParameters {
    pub seed: u64,
    pub mean: f64,
    pub variance: f64,
    /// Deviates per pre-filled buffer
    pub buffer_len: usize,
}

impl Default for RngParameters {
    fn default() -> Self {
        Self {
            seed: 0x5eed,
            mean: 0.0,
            variance: 1.0,
            buffer_len: 4096,
        }
    }
}
