//! Force application and semi-implicit Euler integration of cell batches.
//!
//! Each batch is advanced with whole-array passes over its flattened
//! `[x, y, z, _]` buffers:
//! 1. wall repulsion (bounded, non-toroidal domains only)
//! 2. chemotactic force from a driver concentration gradient
//! 3. stochastic force from the Gaussian source
//! 4. `X += dt V`, `V *= 1 - dt drag`, `V += dt F`
//! 5. wrap (toroidal) or flag exiting cells
//! 6. voxel re-index for the next pair maintenance
//!
//! Force accumulators are not cleared here; the simulation zeroes them at
//! the start of every tick before pair interactions add to them.

use glam::DVec3;

use crate::batch::kernels::{axpy, decay_per_record, scal};
use crate::batch::{BatchedVector, MOMENT_WIDTH, VEC3_WIDTH};
use crate::error::{Result, SimError};
use crate::physics::cells::{add_vec3, vec3};
use crate::physics::{CellBatch, Coefficient};
use crate::state::{CellPopulation, SimulationContext};

/// State tracking for the integrator
#[derive(Debug, Clone, Default)]
pub struct IntegratorState {
    /// Accumulated simulated time
    pub time: f64,
    pub step_count: u64,
    /// Largest cell speed after the last tick (stability monitoring)
    pub max_speed: f64,
    /// Cells flagged as exiting so far
    pub exiting: usize,
}

#[derive(Default)]
pub struct ForceIntegrator {
    pub state: IntegratorState,
}

impl ForceIntegrator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Advance every batch by `dt`. `drivers[b]` is the chemotaxis driver of
    /// batch `b`: a moment record per cell, `[value, gx, gy, gz]`.
    pub fn step(
        &mut self,
        population: &mut CellPopulation,
        ctx: &mut SimulationContext,
        dt: f64,
        drivers: &[Option<&[f64]>],
    ) -> Result<()> {
        let mut max_speed: f64 = 0.0;
        for batch in population.batches_mut() {
            let driver = drivers.get(batch.id()).copied().flatten();
            self.step_batch(batch, ctx, dt, driver)?;
            max_speed = max_speed.max(max_speed_of(batch));
        }
        self.state.max_speed = max_speed;
        self.state.step_count += 1;
        self.state.time += dt;
        Ok(())
    }

    /// Apply forces to one batch and move it. Returns how many cells were
    /// newly flagged as exiting.
    pub fn step_batch(
        &mut self,
        batch: &mut CellBatch,
        ctx: &mut SimulationContext,
        dt: f64,
        driver: Option<&[f64]>,
    ) -> Result<usize> {
        if !(dt > 0.0) {
            return Err(SimError::InvalidParameter {
                name: "dt",
                reason: format!("time step must be positive, got {dt}"),
            });
        }
        if batch.is_empty() {
            return Ok(0);
        }

        if ctx.boundary_forces_enabled() {
            apply_wall_forces(batch, ctx.grid.extent(), ctx.phi1());
        }
        if batch.flags.chemotactic {
            let driver = driver.ok_or_else(|| SimError::InvalidParameter {
                name: "chemotaxis driver",
                reason: format!("batch {} is chemotactic but has no driver population", batch.id()),
            })?;
            apply_chemotaxis(batch, driver)?;
        }
        if batch.flags.stochastic {
            apply_noise(batch, ctx, dt)?;
        }

        if batch.flags.motile {
            integrate(batch, dt);
        }

        let exiting = apply_boundary(batch, ctx.grid.extent(), ctx.grid.is_toroidal());
        self.state.exiting += exiting;
        batch.reindex(&ctx.grid);
        Ok(exiting)
    }
}

/// Per-cell value of a batch constant.
#[inline]
fn coefficient(kind: &Coefficient, per_cell: Option<&BatchedVector>, slot: usize) -> f64 {
    match (kind, per_cell) {
        (Coefficient::Uniform(c), _) => *c,
        (Coefficient::PerCell, Some(values)) => values.as_slice()[slot],
        (Coefficient::PerCell, None) => 0.0,
    }
}

/// `phi1 (1/d - 1/r)` away from every wall closer than the cell radius.
fn apply_wall_forces(batch: &mut CellBatch, extent: DVec3, phi1: f64) {
    for slot in 0..batch.len() {
        let r = batch.radius(slot);
        let x = batch.position(slot);
        let mut force = DVec3::ZERO;
        for axis in 0..3 {
            let near = x[axis];
            if near > 0.0 && near < r {
                force[axis] += phi1 * (1.0 / near - 1.0 / r);
            }
            let far = extent[axis] - x[axis];
            if far > 0.0 && far < r {
                force[axis] -= phi1 * (1.0 / far - 1.0 / r);
            }
        }
        if force != DVec3::ZERO {
            batch.add_force(slot, force);
        }
    }
}

fn apply_chemotaxis(batch: &mut CellBatch, driver: &[f64]) -> Result<()> {
    let n = batch.len();
    if driver.len() != n * MOMENT_WIDTH {
        return Err(SimError::DimensionMismatch {
            context: "chemotaxis driver",
            expected: n * MOMENT_WIDTH,
            found: driver.len(),
        });
    }
    for slot in 0..n {
        let tc = coefficient(&batch.motility.transduction, batch.transduction.as_ref(), slot);
        if tc == 0.0 {
            continue;
        }
        let g = &driver[slot * MOMENT_WIDTH + 1..slot * MOMENT_WIDTH + 4];
        add_vec3(
            batch.forces.as_mut_slice(),
            slot,
            DVec3::new(g[0], g[1], g[2]) * tc,
        );
    }
    Ok(())
}

/// Gaussian force scaled by `sigma / sqrt(dt)`.
fn apply_noise(batch: &mut CellBatch, ctx: &mut SimulationContext, dt: f64) -> Result<()> {
    let n = batch.len();
    let samples = ctx.rng.sample(3 * n)?;
    let inv_sqrt_dt = 1.0 / dt.sqrt();
    for slot in 0..n {
        let sigma = coefficient(&batch.motility.sigma, batch.sigma.as_ref(), slot);
        let s = &samples[3 * slot..3 * slot + 3];
        add_vec3(
            batch.forces.as_mut_slice(),
            slot,
            DVec3::new(s[0], s[1], s[2]) * (sigma * inv_sqrt_dt),
        );
    }
    Ok(())
}

/// Semi-implicit Euler on the flat buffers; positions advance with the
/// pre-update velocities.
fn integrate(batch: &mut CellBatch, dt: f64) {
    axpy(dt, batch.velocities.as_slice(), batch.positions.as_mut_slice());
    match (&batch.motility.drag, batch.drag.as_ref()) {
        (Coefficient::Uniform(drag), _) => scal(1.0 - dt * drag, batch.velocities.as_mut_slice()),
        (Coefficient::PerCell, Some(drag)) => decay_per_record(
            dt,
            drag.as_slice(),
            batch.velocities.as_mut_slice(),
            VEC3_WIDTH,
        ),
        (Coefficient::PerCell, None) => {}
    }
    axpy(dt, batch.forces.as_slice(), batch.velocities.as_mut_slice());
}

/// Wrap positions into `[0, extent)` on a torus; otherwise flag cells that
/// left `[0, extent]` and leave them where they are.
fn apply_boundary(batch: &mut CellBatch, extent: DVec3, toroidal: bool) -> usize {
    let mut newly_exiting = 0;
    for slot in 0..batch.len() {
        let x = vec3(batch.positions.as_slice(), slot);
        if toroidal {
            let mut wrapped = x;
            for axis in 0..3 {
                if x[axis] < 0.0 || x[axis] >= extent[axis] {
                    wrapped[axis] = wrap(x[axis], extent[axis]);
                }
            }
            if wrapped != x {
                batch.set_position(slot, wrapped);
            }
        } else {
            let outside = x.cmplt(DVec3::ZERO).any() || x.cmpgt(extent).any();
            if outside && !batch.exiting[slot] {
                batch.exiting[slot] = true;
                newly_exiting += 1;
                log::warn!(
                    "Cell {} left the domain at ({:.3}, {:.3}, {:.3})",
                    batch.ids[slot],
                    x.x,
                    x.y,
                    x.z
                );
            }
        }
    }
    newly_exiting
}

/// `x mod extent` in `[0, extent)`. `rem_euclid` rounds tiny negative
/// values up to `extent` itself.
fn wrap(x: f64, extent: f64) -> f64 {
    let wrapped = x.rem_euclid(extent);
    if wrapped >= extent {
        0.0
    } else {
        wrapped
    }
}

fn max_speed_of(batch: &CellBatch) -> f64 {
    (0..batch.len())
        .map(|slot| batch.velocity(slot).length())
        .fold(0.0, f64::max)
}
