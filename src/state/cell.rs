//! Cell identity and per-cell state.
//!
//! Kinematics live in the owning `CellBatch`; a `Cell` keeps its identity,
//! immutable radius, behaviour flags and the handle anchoring its slot.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::batch::Handle;
use crate::physics::CellFlags;

/// Unique, monotonically assigned cell identifier. Never reused.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct CellId(pub u32);

impl fmt::Display for CellId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// A spherical agent
#[derive(Debug, Clone)]
pub struct Cell {
    id: CellId,
    /// Radius (μm), fixed at construction
    radius: f64,
    /// Batch holding this cell's kinematics
    batch: usize,
    /// Anchor of the cell's slot inside its batch
    pub(crate) slot: Handle,
    pub alive: bool,
    pub flags: CellFlags,
}

impl Cell {
    pub(crate) fn new(id: CellId, radius: f64, batch: usize, slot: Handle, flags: CellFlags) -> Self {
        Self {
            id,
            radius,
            batch,
            slot,
            alive: true,
            flags,
        }
    }

    pub fn id(&self) -> CellId {
        self.id
    }

    pub fn radius(&self) -> f64 {
        self.radius
    }

    pub fn batch(&self) -> usize {
        self.batch
    }
}
