//! Molecular species in cell compartments.
//!
//! This module implements:
//! - Compartments as batches of identical instances (cytosol, membrane,
//!   extracellular medium), each backed by a manifold kind
//! - Molecular populations with moment-expanded concentration fields and
//!   boundary exchange buffers
//! - Mass-action reactions over closed reaction kinds, merged per kind
//!   and rate
//! - Reaction and diffusion steppers over the flattened buffers
//!
//! Reactions and diffusion only touch concentrations; the cell mechanics
//! share nothing with them but the instance order of each cell batch.

pub mod compartment;
pub mod diffusion;
pub mod gene;
pub mod kinetics;
pub mod population;
pub mod reaction;

pub use compartment::Compartment;
pub use diffusion::DiffusionStepper;
pub use gene::Gene;
pub use kinetics::ReactionStepper;
pub use population::{BoundaryExchange, BoundaryLayout, MolecularPopulation};
pub use reaction::{BoundaryTerms, Reaction, ReactionKind, Species, Stoichiometry};

/// Index of a compartment in the simulation.
pub type CompartmentId = usize;
/// Index of a population inside its compartment.
pub type PopulationId = usize;
/// Index of a gene inside its compartment.
pub type GeneId = usize;
