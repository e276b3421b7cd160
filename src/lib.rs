//! Cell Agent Sim - agent-based cell simulation kernel
//!
//! Spherical cells move through a 3D domain, push each other apart through
//! grid-tracked contact pairs, and carry molecular species in cytosol and
//! membrane compartments that react and diffuse alongside an extracellular
//! medium. All per-cell state lives in flattened batched buffers.

pub mod batch;
pub mod biochemistry;
pub mod config;
pub mod error;
pub mod manifold;
pub mod physics;
pub mod rng;
pub mod simulation;
pub mod spatial;
pub mod state;

pub use batch::{BatchedVector, Handle, Record};
pub use biochemistry::{Compartment, MolecularPopulation, Reaction, ReactionKind};
pub use config::SimulationParameters;
pub use error::{Result, SimError};
pub use manifold::{Manifold, ManifoldKind};
pub use physics::{CellBatch, CellFlags, CellSpec, Coefficient, ForceIntegrator, MotilityParameters};
pub use rng::GaussianSource;
pub use simulation::{Simulation, TickReport};
pub use spatial::{PairTracker, UniformGrid};
pub use state::{CellId, CellPopulation, SimulationContext};
