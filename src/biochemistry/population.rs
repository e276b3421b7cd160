//! Molecular populations and their boundary exchange buffers.

use serde::{Deserialize, Serialize};

use crate::batch::{BatchedVector, Handle, Record, MOMENT_WIDTH};
use crate::biochemistry::CompartmentId;
use crate::error::{Result, SimError};
use crate::manifold::{Manifold, ManifoldKind};

/// How a bulk compartment meets a boundary compartment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum BoundaryLayout {
    /// Each bulk instance is wrapped by its own boundary instance (cytosol
    /// inside its membrane), instance `i` to instance `i`.
    Enclosed,
    /// One well-mixed bulk instance touches every boundary instance
    /// (extracellular medium around all membranes).
    Embedded,
}

/// Bulk concentration seen by one boundary compartment, plus the flux the
/// boundary reactions drive through it. One record per boundary instance.
#[derive(Debug, Clone)]
pub struct BoundaryExchange {
    pub boundary: CompartmentId,
    pub layout: BoundaryLayout,
    /// Mirror of the bulk field on each boundary instance
    pub concentration: BatchedVector,
    /// Outward flux per boundary instance, as a rate
    pub flux: BatchedVector,
}

impl BoundaryExchange {
    pub fn new(boundary: CompartmentId, layout: BoundaryLayout) -> Self {
        Self {
            boundary,
            layout,
            concentration: BatchedVector::new(MOMENT_WIDTH),
            flux: BatchedVector::new(MOMENT_WIDTH),
        }
    }

    pub fn len(&self) -> usize {
        self.concentration.len()
    }

    pub fn is_empty(&self) -> bool {
        self.concentration.is_empty()
    }

    fn add_instance(&mut self, mirror: &[f64]) -> Result<()> {
        self.concentration.add_values(mirror)?;
        self.flux.add_values(&[0.0; MOMENT_WIDTH])?;
        Ok(())
    }

    fn remove_instance(&mut self, slot: usize) -> Result<()> {
        for buffer in [&mut self.concentration, &mut self.flux] {
            let handle = buffer.handle_at(slot).ok_or(SimError::DimensionMismatch {
                context: "boundary exchange",
                expected: slot + 1,
                found: buffer.len(),
            })?;
            buffer.remove(handle)?;
        }
        Ok(())
    }
}

/// A named species with moment-expanded concentration per compartment
/// instance.
#[derive(Debug, Clone)]
pub struct MolecularPopulation {
    pub name: String,
    /// Diffusion coefficient (μm²/s)
    pub diffusion: f64,
    /// Concentration given to new instances
    pub initial: [f64; MOMENT_WIDTH],
    pub concentration: BatchedVector,
    pub boundaries: Vec<BoundaryExchange>,
}

impl MolecularPopulation {
    pub fn new(name: impl Into<String>, diffusion: f64, initial: [f64; MOMENT_WIDTH]) -> Self {
        Self {
            name: name.into(),
            diffusion,
            initial,
            concentration: BatchedVector::new(MOMENT_WIDTH),
            boundaries: Vec::new(),
        }
    }

    pub fn len(&self) -> usize {
        self.concentration.len()
    }

    pub fn is_empty(&self) -> bool {
        self.concentration.is_empty()
    }

    /// Concentration record of instance `slot`.
    pub fn record(&self, slot: usize) -> &[f64] {
        self.concentration.record(slot)
    }

    pub fn boundary(&self, boundary: CompartmentId) -> Option<&BoundaryExchange> {
        self.boundaries.iter().find(|b| b.boundary == boundary)
    }

    pub fn boundary_mut(&mut self, boundary: CompartmentId) -> Option<&mut BoundaryExchange> {
        self.boundaries.iter_mut().find(|b| b.boundary == boundary)
    }

    /// Append an instance at the initial concentration. Enclosed boundaries
    /// grow with it.
    pub(crate) fn add_instance(&mut self, manifold: &ManifoldKind) -> Result<Handle> {
        let handle = self.concentration.add(Record::from_values(&self.initial))?;
        let mut mirror = [0.0; MOMENT_WIDTH];
        manifold.dirichlet_bc(&self.initial, &mut mirror);
        for exchange in &mut self.boundaries {
            if exchange.layout == BoundaryLayout::Enclosed {
                exchange.add_instance(&mirror)?;
            }
        }
        Ok(handle)
    }

    pub(crate) fn remove_instance(&mut self, slot: usize) -> Result<Record> {
        let handle = self
            .concentration
            .handle_at(slot)
            .ok_or(SimError::DimensionMismatch {
                context: "molecular population",
                expected: slot + 1,
                found: self.concentration.len(),
            })?;
        let record = self.concentration.remove(handle)?;
        for exchange in &mut self.boundaries {
            if exchange.layout == BoundaryLayout::Enclosed {
                exchange.remove_instance(slot)?;
            }
        }
        Ok(record)
    }

    /// Grow an embedded boundary by one boundary instance. Enclosed
    /// boundaries are left alone.
    pub(crate) fn add_boundary_instance(&mut self, boundary: CompartmentId, manifold: &ManifoldKind) -> Result<()> {
        let source = if self.concentration.is_empty() {
            self.initial
        } else {
            let mut r = [0.0; MOMENT_WIDTH];
            r.copy_from_slice(self.concentration.record(0));
            r
        };
        let mut mirror = [0.0; MOMENT_WIDTH];
        manifold.dirichlet_bc(&source, &mut mirror);
        if let Some(exchange) = self.embedded_mut(boundary) {
            exchange.add_instance(&mirror)?;
        }
        Ok(())
    }

    pub(crate) fn remove_boundary_instance(&mut self, boundary: CompartmentId, slot: usize) -> Result<()> {
        if let Some(exchange) = self.embedded_mut(boundary) {
            exchange.remove_instance(slot)?;
        }
        Ok(())
    }

    pub(crate) fn truncate_boundary_instances(&mut self, boundary: CompartmentId, len: usize) {
        if let Some(exchange) = self.embedded_mut(boundary) {
            while exchange.len() > len {
                if exchange.remove_instance(exchange.len() - 1).is_err() {
                    break;
                }
            }
        }
    }

    /// Enclosed exchanges follow this population's own instances instead.
    fn embedded_mut(&mut self, boundary: CompartmentId) -> Option<&mut BoundaryExchange> {
        self.boundary_mut(boundary)
            .filter(|exchange| exchange.layout == BoundaryLayout::Embedded)
    }

    /// Total amount over all instances, given each instance radius.
    pub fn total(&self, manifold: &ManifoldKind, radii: &[f64]) -> f64 {
        (0..self.len())
            .map(|slot| manifold.integrate(self.record(slot), radii.get(slot).copied().unwrap_or(0.0)))
            .sum()
    }
}
