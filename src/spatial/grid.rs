//! Uniform voxel grid over the simulation domain.
//!
//! Maps positions in `[0, extent)^3` to integer voxel indices, enumerates
//! 3×3×3 neighbourhoods and measures voxel separations, optionally with
//! toroidal wraparound.

use glam::{DVec3, IVec3};

use crate::config::GridParameters;
use crate::error::{Result, SimError};

/// Offsets of the 3×3×3 neighbourhood, self included.
pub const NEIGHBOR_OFFSETS: [IVec3; 27] = {
    let mut offsets = [IVec3::ZERO; 27];
    let mut n = 0;
    let mut dx = -1;
    while dx <= 1 {
        let mut dy = -1;
        while dy <= 1 {
            let mut dz = -1;
            while dz <= 1 {
                offsets[n] = IVec3::new(dx, dy, dz);
                n += 1;
                dz += 1;
            }
            dy += 1;
        }
        dx += 1;
    }
    offsets
};

#[derive(Debug, Clone)]
pub struct UniformGrid {
    extent: DVec3,
    step: f64,
    inv_step: f64,
    /// Voxels per axis, `ceil(extent / step)`
    points: IVec3,
    toroidal: bool,
}

impl UniformGrid {
    pub fn new(extent: [f64; 3], step: f64, toroidal: bool) -> Result<Self> {
        if !(step > 0.0) || !step.is_finite() {
            return Err(SimError::InvalidParameter {
                name: "grid.step_um",
                reason: format!("must be positive and finite, got {step}"),
            });
        }
        if extent.iter().any(|e| !(*e > 0.0) || !e.is_finite()) {
            return Err(SimError::InvalidParameter {
                name: "grid.extent_um",
                reason: format!("every axis must be positive and finite, got {extent:?}"),
            });
        }

        let extent = DVec3::from_array(extent);
        let points = (extent / step).ceil().as_ivec3();

        Ok(Self {
            extent,
            step,
            inv_step: 1.0 / step,
            points,
            toroidal,
        })
    }

    pub fn from_params(params: &GridParameters) -> Result<Self> {
        Self::new(params.extent_um, params.step_um, params.toroidal)
    }

    pub fn extent(&self) -> DVec3 {
        self.extent
    }

    pub fn step(&self) -> f64 {
        self.step
    }

    pub fn points(&self) -> IVec3 {
        self.points
    }

    pub fn is_toroidal(&self) -> bool {
        self.toroidal
    }

    pub fn voxel_count(&self) -> usize {
        (self.points.x as usize) * (self.points.y as usize) * (self.points.z as usize)
    }

    /// Voxel coordinates without a bounds check.
    ///
    /// Floors rather than truncates so that positions just below zero land
    /// in voxel -1 (outside) instead of voxel 0.
    #[inline]
    pub fn raw_index(&self, position: DVec3) -> IVec3 {
        (position * self.inv_step).floor().as_ivec3()
    }

    /// Voxel containing `position`, or `None` when it lies outside the grid.
    #[inline]
    pub fn index_of(&self, position: DVec3) -> Option<IVec3> {
        let index = self.raw_index(position);
        self.is_legal(index).then_some(index)
    }

    /// `0 <= index < points` on every axis, via unsigned comparison.
    #[inline]
    pub fn is_legal(&self, index: IVec3) -> bool {
        (index.x as u32) < (self.points.x as u32)
            && (index.y as u32) < (self.points.y as u32)
            && (index.z as u32) < (self.points.z as u32)
    }

    /// `index + offset`, wrapped when toroidal, `None` when illegal.
    #[inline]
    pub fn offset(&self, index: IVec3, offset: IVec3) -> Option<IVec3> {
        let shifted = index + offset;
        if self.is_legal(shifted) {
            Some(shifted)
        } else if self.toroidal {
            Some(IVec3::new(
                shifted.x.rem_euclid(self.points.x),
                shifted.y.rem_euclid(self.points.y),
                shifted.z.rem_euclid(self.points.z),
            ))
        } else {
            None
        }
    }

    /// Legal voxels of the 3×3×3 neighbourhood of `index`, each once.
    ///
    /// Deduplication matters on toroidal axes with fewer than three voxels,
    /// where different offsets wrap onto the same voxel.
    pub fn neighborhood(&self, index: IVec3) -> Vec<IVec3> {
        let mut voxels = Vec::with_capacity(NEIGHBOR_OFFSETS.len());
        for offset in NEIGHBOR_OFFSETS {
            if let Some(voxel) = self.offset(index, offset) {
                if !voxels.contains(&voxel) {
                    voxels.push(voxel);
                }
            }
        }
        voxels
    }

    /// Row-major storage index of a legal voxel.
    #[inline]
    pub fn linear(&self, index: IVec3) -> usize {
        debug_assert!(self.is_legal(index));
        ((index.x as usize) * (self.points.y as usize) + index.y as usize)
            * (self.points.z as usize)
            + index.z as usize
    }

    pub fn voxel_center(&self, index: IVec3) -> DVec3 {
        (index.as_dvec3() + DVec3::splat(0.5)) * self.step
    }

    /// Per-axis absolute voxel separation, taking the shorter way round when
    /// toroidal.
    pub fn separation(&self, a: IVec3, b: IVec3) -> IVec3 {
        let direct = (a - b).abs();
        if self.toroidal {
            direct.min(self.points - direct).max(IVec3::ZERO)
        } else {
            direct
        }
    }

    /// `ceil((r_a + r_b) / step)`: the voxel separation beyond which two
    /// spheres cannot touch.
    #[inline]
    pub fn max_separation(&self, radius_sum: f64) -> i32 {
        (radius_sum * self.inv_step).ceil() as i32
    }

    /// True when, on any axis, the voxel separation exceeds `max_sep`.
    #[inline]
    pub fn is_clearly_separated(&self, a: IVec3, b: IVec3, max_sep: i32) -> bool {
        let sep = self.separation(a, b);
        sep.x > max_sep || sep.y > max_sep || sep.z > max_sep
    }

    /// Shortest displacement equivalent to `delta` under toroidal wrap.
    pub fn minimum_image(&self, delta: DVec3) -> DVec3 {
        if !self.toroidal {
            return delta;
        }
        let half = self.extent * 0.5;
        let mut d = delta;
        for axis in 0..3 {
            if d[axis] > half[axis] {
                d[axis] -= self.extent[axis];
            } else if d[axis] < -half[axis] {
                d[axis] += self.extent[axis];
            }
        }
        d
    }
}
