//! Error taxonomy for the simulation kernel.
//!
//! Invariant violations (unknown ids, stale handles, mismatched buffer
//! lengths, incompatible reaction merges) fail the current call. Geometric
//! edge cases are not errors: they are handled as numeric branches by the
//! kernels themselves.

use thiserror::Error;

use crate::state::CellId;

/// Errors raised by `BatchedVector` and `Record`.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum BatchError {
    #[error("handle {index}:{generation} does not address a live component")]
    StaleHandle { index: u32, generation: u32 },
    #[error("cannot remove a component from an empty collection")]
    Empty,
    #[error("record width mismatch: collection holds {expected}-wide records, got {found}")]
    WidthMismatch { expected: usize, found: usize },
}

/// Errors raised by the Gaussian sample source.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum RngError {
    #[error("invalid normal distribution (mean {mean}, variance {variance})")]
    InvalidDistribution { mean: f64, variance: f64 },
    #[error("background sample producer has stopped")]
    ProducerStopped,
    #[error("failed to spawn sample producer: {0}")]
    Spawn(String),
}

/// Top-level kernel error.
#[derive(Debug, Error)]
pub enum SimError {
    #[error("batch storage: {0}")]
    Batch(#[from] BatchError),
    #[error("random sampler: {0}")]
    Rng(#[from] RngError),
    #[error("unknown cell {0}")]
    UnknownCell(CellId),
    #[error("no pair tracked for cells {a} and {b}")]
    PairNotFound { a: CellId, b: CellId },
    #[error("unknown cell batch {0}")]
    UnknownBatch(usize),
    #[error("unknown compartment {0}")]
    UnknownCompartment(usize),
    #[error("unknown molecular population {0}")]
    UnknownPopulation(String),
    #[error("{context}: buffer length mismatch (expected {expected}, found {found})")]
    DimensionMismatch {
        context: &'static str,
        expected: usize,
        found: usize,
    },
    #[error("cannot merge {incoming} into {existing}")]
    IncompatibleReaction {
        existing: &'static str,
        incoming: &'static str,
    },
    #[error("invalid parameter {name}: {reason}")]
    InvalidParameter { name: &'static str, reason: String },
}

pub type Result<T> = std::result::Result<T, SimError>;
