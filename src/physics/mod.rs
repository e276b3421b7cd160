//! Cell mechanics.
//!
//! This module implements:
//! - Homogeneous cell batches with flattened position/velocity/force buffers
//! - Wall, chemotactic and stochastic forces
//! - Semi-implicit Euler integration with toroidal or exiting boundaries
//!
//! Pairwise contact forces come from `spatial::PairTracker`, which adds
//! into the same force buffers before the integrator runs.

pub mod cells;
pub mod integrator;

pub use cells::{CellBatch, CellFlags, CellSpec, Coefficient, DetachedCell, MotilityParameters, VoxelIndex};
pub use integrator::{ForceIntegrator, IntegratorState};
