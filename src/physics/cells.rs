//! Homogeneous cell batches.
//!
//! All cells of a batch share motility flags and constants, and their
//! kinematics live in flattened `[x, y, z, _]` records so the integrator
//! can sweep the batch with whole-array passes. Every per-cell buffer is
//! swap-removed in lockstep, so slot `i` means the same cell everywhere.

use glam::{DVec3, IVec3};
use serde::{Deserialize, Serialize};

use crate::batch::{BatchedVector, Handle, Record, VEC3_WIDTH};
use crate::error::{Result, SimError};
use crate::spatial::UniformGrid;
use crate::state::CellId;

/// Motility constant shared by a batch or carried per cell.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum Coefficient {
    Uniform(f64),
    /// Taken from each `CellSpec` as cells join the batch
    PerCell,
}

impl Coefficient {
    fn per_cell_buffer(&self) -> Option<BatchedVector> {
        match self {
            Coefficient::Uniform(_) => None,
            Coefficient::PerCell => Some(BatchedVector::new(1)),
        }
    }
}

/// Motility constants of a batch
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MotilityParameters {
    /// Velocity damping per unit time
    pub drag: Coefficient,
    /// Chemotactic force per unit driver gradient
    pub transduction: Coefficient,
    /// Stochastic force amplitude
    pub sigma: Coefficient,
}

impl Default for MotilityParameters {
    fn default() -> Self {
        Self {
            drag: Coefficient::Uniform(1.0),
            transduction: Coefficient::Uniform(0.0),
            sigma: Coefficient::Uniform(0.0),
        }
    }
}

/// Behaviour switches shared by every cell of a batch
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CellFlags {
    pub motile: bool,
    pub chemotactic: bool,
    pub stochastic: bool,
}

impl Default for CellFlags {
    fn default() -> Self {
        Self {
            motile: true,
            chemotactic: false,
            stochastic: false,
        }
    }
}

/// Initial state of a cell joining a batch
#[derive(Debug, Clone)]
pub struct CellSpec {
    pub radius: f64,
    pub position: DVec3,
    pub velocity: DVec3,
    /// Used when the batch drag is `PerCell`
    pub drag: f64,
    /// Used when the batch transduction constant is `PerCell`
    pub transduction: f64,
    /// Used when the batch sigma is `PerCell`
    pub sigma: f64,
}

impl CellSpec {
    pub fn at(position: DVec3, radius: f64) -> Self {
        Self {
            radius,
            position,
            velocity: DVec3::ZERO,
            drag: 0.0,
            transduction: 0.0,
            sigma: 0.0,
        }
    }

    pub fn with_velocity(mut self, velocity: DVec3) -> Self {
        self.velocity = velocity;
        self
    }
}

/// Voxel bookkeeping for one cell.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VoxelIndex {
    /// Voxel of the current position; may lie outside the grid
    pub current: IVec3,
    /// Voxel before the last change, `None` for a new cell
    pub previous: Option<IVec3>,
    /// Set when `current` changed since the last pair maintenance
    pub changed: bool,
}

/// Values of a cell leaving its batch
#[derive(Debug, Clone)]
pub struct DetachedCell {
    pub position: Record,
    pub velocity: Record,
    pub force: Record,
}

impl DetachedCell {
    pub fn position(&self) -> DVec3 {
        vec3(self.position.values(), 0)
    }
}

#[inline]
pub(crate) fn vec3(flat: &[f64], slot: usize) -> DVec3 {
    let i = slot * VEC3_WIDTH;
    DVec3::new(flat[i], flat[i + 1], flat[i + 2])
}

#[inline]
pub(crate) fn add_vec3(flat: &mut [f64], slot: usize, v: DVec3) {
    let i = slot * VEC3_WIDTH;
    flat[i] += v.x;
    flat[i + 1] += v.y;
    flat[i + 2] += v.z;
}

fn padded(v: DVec3) -> [f64; VEC3_WIDTH] {
    [v.x, v.y, v.z, 0.0]
}

pub struct CellBatch {
    id: usize,
    pub flags: CellFlags,
    pub motility: MotilityParameters,
    pub(crate) positions: BatchedVector,
    pub(crate) velocities: BatchedVector,
    pub(crate) forces: BatchedVector,
    pub(crate) radii: BatchedVector,
    pub(crate) drag: Option<BatchedVector>,
    pub(crate) transduction: Option<BatchedVector>,
    pub(crate) sigma: Option<BatchedVector>,
    pub(crate) ids: Vec<CellId>,
    pub(crate) voxels: Vec<VoxelIndex>,
    pub(crate) exiting: Vec<bool>,
    /// Raised when any voxel index changed since the last maintenance
    pub(crate) grid_dirty: bool,
}

impl CellBatch {
    pub fn new(id: usize, flags: CellFlags, motility: MotilityParameters) -> Self {
        Self {
            id,
            flags,
            drag: motility.drag.per_cell_buffer(),
            transduction: motility.transduction.per_cell_buffer(),
            sigma: motility.sigma.per_cell_buffer(),
            motility,
            positions: BatchedVector::new(VEC3_WIDTH),
            velocities: BatchedVector::new(VEC3_WIDTH),
            forces: BatchedVector::new(VEC3_WIDTH),
            radii: BatchedVector::new(1),
            ids: Vec::new(),
            voxels: Vec::new(),
            exiting: Vec::new(),
            grid_dirty: false,
        }
    }

    pub fn id(&self) -> usize {
        self.id
    }

    pub fn len(&self) -> usize {
        self.ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }

    /// Append a cell; the returned handle addresses its position record and
    /// anchors the cell's slot in every other buffer.
    pub fn add(&mut self, id: CellId, spec: &CellSpec, grid: &UniformGrid) -> Result<Handle> {
        let handle = self.positions.add_values(&padded(spec.position))?;
        self.velocities.add_values(&padded(spec.velocity))?;
        self.forces.add_values(&[0.0; VEC3_WIDTH])?;
        self.radii.add_values(&[spec.radius])?;
        if let Some(drag) = self.drag.as_mut() {
            drag.add_values(&[spec.drag])?;
        }
        if let Some(transduction) = self.transduction.as_mut() {
            transduction.add_values(&[spec.transduction])?;
        }
        if let Some(sigma) = self.sigma.as_mut() {
            sigma.add_values(&[spec.sigma])?;
        }

        self.ids.push(id);
        self.voxels.push(VoxelIndex {
            current: grid.raw_index(spec.position),
            previous: None,
            changed: true,
        });
        self.exiting.push(false);
        self.grid_dirty = true;

        Ok(handle)
    }

    /// Detach the cell anchored at `handle`, returning its kinematics.
    pub fn remove(&mut self, handle: Handle) -> Result<DetachedCell> {
        let slot = self.positions.slot_of(handle)?;
        let position = self.positions.remove(handle)?;
        let velocity = remove_slot(&mut self.velocities, slot)?;
        let force = remove_slot(&mut self.forces, slot)?;
        remove_slot(&mut self.radii, slot)?;
        for buffer in [&mut self.drag, &mut self.transduction, &mut self.sigma]
            .into_iter()
            .flatten()
        {
            remove_slot(buffer, slot)?;
        }

        self.ids.swap_remove(slot);
        self.voxels.swap_remove(slot);
        self.exiting.swap_remove(slot);

        Ok(DetachedCell {
            position,
            velocity,
            force,
        })
    }

    pub fn slot_of(&self, handle: Handle) -> Result<usize> {
        Ok(self.positions.slot_of(handle)?)
    }

    pub fn ids(&self) -> &[CellId] {
        &self.ids
    }

    pub fn position(&self, slot: usize) -> DVec3 {
        vec3(self.positions.as_slice(), slot)
    }

    pub fn velocity(&self, slot: usize) -> DVec3 {
        vec3(self.velocities.as_slice(), slot)
    }

    pub fn force(&self, slot: usize) -> DVec3 {
        vec3(self.forces.as_slice(), slot)
    }

    pub fn radius(&self, slot: usize) -> f64 {
        self.radii.as_slice()[slot]
    }

    pub fn voxel(&self, slot: usize) -> VoxelIndex {
        self.voxels[slot]
    }

    pub fn is_exiting(&self, slot: usize) -> bool {
        self.exiting[slot]
    }

    pub fn is_grid_dirty(&self) -> bool {
        self.grid_dirty
    }

    pub fn set_position(&mut self, slot: usize, position: DVec3) {
        self.positions.record_mut(slot).copy_from_slice(&padded(position));
    }

    pub fn set_velocity(&mut self, slot: usize, velocity: DVec3) {
        self.velocities.record_mut(slot).copy_from_slice(&padded(velocity));
    }

    pub fn add_force(&mut self, slot: usize, force: DVec3) {
        add_vec3(self.forces.as_mut_slice(), slot, force);
    }

    /// Zero every force accumulator of the batch.
    pub fn clear_forces(&mut self) {
        self.forces.fill_zero();
    }

    /// Flat `[x, y, z, _]` arrays, `4 * len()` long.
    pub fn positions(&self) -> &[f64] {
        self.positions.as_slice()
    }

    pub fn velocities(&self) -> &[f64] {
        self.velocities.as_slice()
    }

    pub fn forces(&self) -> &[f64] {
        self.forces.as_slice()
    }

    /// Recompute every voxel index from the current positions, flagging
    /// changes. Returns whether any index changed.
    pub fn reindex(&mut self, grid: &UniformGrid) -> bool {
        let mut dirty = false;
        for (slot, voxel) in self.voxels.iter_mut().enumerate() {
            let index = grid.raw_index(vec3(self.positions.as_slice(), slot));
            if index != voxel.current {
                voxel.previous = Some(voxel.current);
                voxel.current = index;
                voxel.changed = true;
                dirty = true;
            }
        }
        self.grid_dirty |= dirty;
        dirty
    }

    /// Kinetic energy with unit mass per cell.
    pub fn kinetic_energy(&self) -> f64 {
        (0..self.len())
            .map(|slot| 0.5 * self.velocity(slot).length_squared())
            .sum()
    }
}

fn remove_slot(buffer: &mut BatchedVector, slot: usize) -> Result<Record> {
    let handle = buffer.handle_at(slot).ok_or(SimError::DimensionMismatch {
        context: "cell batch",
        expected: slot + 1,
        found: buffer.len(),
    })?;
    Ok(buffer.remove(handle)?)
}
