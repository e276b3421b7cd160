//! All cells of a run, grouped into homogeneous batches.

use std::collections::HashMap;

use glam::DVec3;

use crate::error::{Result, SimError};
use crate::physics::{CellBatch, CellFlags, CellSpec, DetachedCell, MotilityParameters, VoxelIndex};
use crate::spatial::UniformGrid;
use crate::state::{Cell, CellId};

#[derive(Default)]
pub struct CellPopulation {
    cells: HashMap<CellId, Cell>,
    batches: Vec<CellBatch>,
}

impl CellPopulation {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create an empty batch and return its index.
    pub fn add_batch(&mut self, flags: CellFlags, motility: MotilityParameters) -> usize {
        let id = self.batches.len();
        self.batches.push(CellBatch::new(id, flags, motility));
        log::info!("Cell batch {} created ({:?})", id, flags);
        id
    }

    /// Place a new cell with a fresh id into `batch`.
    pub fn add_cell(
        &mut self,
        id: CellId,
        batch: usize,
        spec: &CellSpec,
        grid: &UniformGrid,
    ) -> Result<()> {
        if !(spec.radius > 0.0) {
            return Err(SimError::InvalidParameter {
                name: "cell radius",
                reason: format!("must be positive, got {}", spec.radius),
            });
        }
        if 2.0 * spec.radius > grid.step() {
            log::warn!(
                "Cell {} diameter {} exceeds grid step {}; neighbour scans may miss contacts",
                id,
                2.0 * spec.radius,
                grid.step()
            );
        }
        let target = self.batches.get_mut(batch).ok_or(SimError::UnknownBatch(batch))?;
        let slot = target.add(id, spec, grid)?;
        self.cells
            .insert(id, Cell::new(id, spec.radius, batch, slot, target.flags));
        Ok(())
    }

    /// Remove a cell, returning it with a private copy of its kinematics.
    pub fn remove_cell(&mut self, id: CellId) -> Result<(Cell, DetachedCell)> {
        let mut cell = self.cells.remove(&id).ok_or(SimError::UnknownCell(id))?;
        let batch = self
            .batches
            .get_mut(cell.batch())
            .ok_or(SimError::UnknownBatch(cell.batch()))?;
        let detached = batch.remove(cell.slot)?;
        cell.alive = false;
        Ok((cell, detached))
    }

    pub fn get(&self, id: CellId) -> Option<&Cell> {
        self.cells.get(&id)
    }

    pub fn contains(&self, id: CellId) -> bool {
        self.cells.contains_key(&id)
    }

    pub fn len(&self) -> usize {
        self.cells.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cells.is_empty()
    }

    pub fn ids(&self) -> impl Iterator<Item = CellId> + '_ {
        self.cells.keys().copied()
    }

    pub fn batches(&self) -> &[CellBatch] {
        &self.batches
    }

    pub fn batches_mut(&mut self) -> &mut [CellBatch] {
        &mut self.batches
    }

    pub fn batch(&self, index: usize) -> Result<&CellBatch> {
        self.batches.get(index).ok_or(SimError::UnknownBatch(index))
    }

    pub fn batch_mut(&mut self, index: usize) -> Result<&mut CellBatch> {
        self.batches.get_mut(index).ok_or(SimError::UnknownBatch(index))
    }

    /// Batch index and slot of a cell.
    pub fn locate(&self, id: CellId) -> Result<(usize, usize)> {
        let cell = self.cells.get(&id).ok_or(SimError::UnknownCell(id))?;
        let slot = self.batches[cell.batch()].slot_of(cell.slot)?;
        Ok((cell.batch(), slot))
    }

    pub fn position(&self, id: CellId) -> Result<DVec3> {
        let (batch, slot) = self.locate(id)?;
        Ok(self.batches[batch].position(slot))
    }

    pub fn velocity(&self, id: CellId) -> Result<DVec3> {
        let (batch, slot) = self.locate(id)?;
        Ok(self.batches[batch].velocity(slot))
    }

    pub fn force(&self, id: CellId) -> Result<DVec3> {
        let (batch, slot) = self.locate(id)?;
        Ok(self.batches[batch].force(slot))
    }

    pub fn radius(&self, id: CellId) -> Result<f64> {
        self.cells
            .get(&id)
            .map(Cell::radius)
            .ok_or(SimError::UnknownCell(id))
    }

    pub fn voxel(&self, id: CellId) -> Result<VoxelIndex> {
        let (batch, slot) = self.locate(id)?;
        Ok(self.batches[batch].voxel(slot))
    }

    pub fn is_exiting(&self, id: CellId) -> Result<bool> {
        let (batch, slot) = self.locate(id)?;
        Ok(self.batches[batch].is_exiting(slot))
    }

    /// Move a cell and refresh its voxel index.
    pub fn set_position(&mut self, id: CellId, position: DVec3, grid: &UniformGrid) -> Result<()> {
        let (batch, slot) = self.locate(id)?;
        let batch = &mut self.batches[batch];
        batch.set_position(slot, position);
        batch.reindex(grid);
        Ok(())
    }

    pub fn set_velocity(&mut self, id: CellId, velocity: DVec3) -> Result<()> {
        let (batch, slot) = self.locate(id)?;
        self.batches[batch].set_velocity(slot, velocity);
        Ok(())
    }

    pub fn add_force(&mut self, id: CellId, force: DVec3) -> Result<()> {
        let (batch, slot) = self.locate(id)?;
        self.batches[batch].add_force(slot, force);
        Ok(())
    }

    pub fn clear_forces(&mut self) {
        for batch in &mut self.batches {
            batch.clear_forces();
        }
    }

    /// Cells flagged as having left a non-toroidal domain.
    pub fn exiting(&self) -> Vec<CellId> {
        self.batches
            .iter()
            .flat_map(|b| {
                b.ids()
                    .iter()
                    .zip(&b.exiting)
                    .filter(|(_, exiting)| **exiting)
                    .map(|(id, _)| *id)
            })
            .collect()
    }

    pub fn kinetic_energy(&self) -> f64 {
        self.batches.iter().map(CellBatch::kinetic_energy).sum()
    }
}
