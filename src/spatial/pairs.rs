//! Interacting-pair bookkeeping.
//!
//! Cells are bucketed by voxel. A pair enters the map when its two cells
//! first occupy neighbouring voxels and leaves it once the cells are
//! clearly separated on the grid, unless the pair is still bonded.
//!
//! ```text
//! absent ──adjacent──▶ unbonded ──d ≤ r_a + r_b──▶ bonded
//!   ▲                     │  ▲                        │
//!   └──clearly separated──┘  └──────d > r_a + r_b─────┘
//! ```

use std::collections::{BTreeMap, HashMap, HashSet};

use glam::{DVec3, IVec3};

use crate::error::{Result, SimError};
use crate::spatial::UniformGrid;
use crate::state::{CellId, CellPopulation};

/// Commutative key of an unordered id pair: `(max << 32) | min`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct PairKey(u64);

impl PairKey {
    pub fn new(a: CellId, b: CellId) -> Self {
        let (lo, hi) = if a <= b { (a, b) } else { (b, a) };
        Self(((hi.0 as u64) << 32) | lo.0 as u64)
    }

    /// `(min, max)` ids.
    pub fn ids(self) -> (CellId, CellId) {
        (CellId(self.0 as u32), CellId((self.0 >> 32) as u32))
    }

    pub fn raw(self) -> u64 {
        self.0
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct CellPair {
    /// Smaller id
    pub a: CellId,
    /// Larger id
    pub b: CellId,
    /// Centre distance at the last maintenance or interaction
    pub distance: f64,
    pub radius_sum: f64,
    /// `ceil(radius_sum / step)`
    pub max_sep: i32,
    pub bonded: bool,
}

impl CellPair {
    pub fn key(&self) -> PairKey {
        PairKey::new(self.a, self.b)
    }

    /// Repulsive magnitude `phi1 * (1/d - 1/(r_a + r_b))`, zero when unbonded
    /// or at the singular points `d = 0` and `d = r_a + r_b`.
    pub fn force_magnitude(&self, phi1: f64) -> f64 {
        if !self.bonded || self.distance <= 0.0 || self.distance == self.radius_sum {
            return 0.0;
        }
        phi1 * (1.0 / self.distance - 1.0 / self.radius_sum)
    }
}

/// Counts from one maintenance pass
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PairChurn {
    /// Cells whose voxel changed since the previous pass
    pub critical: usize,
    pub created: usize,
    pub removed: usize,
}

/// A cell whose voxel changed since the previous pass.
struct Critical {
    id: CellId,
    old: Option<IVec3>,
    new: IVec3,
}

pub struct PairTracker {
    /// Ordered by key so contact forces sum in the same order every run
    pairs: BTreeMap<PairKey, CellPair>,
    /// Occupants of every legal voxel, by `UniformGrid::linear`
    voxels: Vec<HashSet<CellId>>,
    /// Bucket each cell currently sits in
    placed: HashMap<CellId, IVec3>,
}

impl PairTracker {
    pub fn new(grid: &UniformGrid) -> Self {
        Self {
            pairs: BTreeMap::new(),
            voxels: vec![HashSet::new(); grid.voxel_count()],
            placed: HashMap::new(),
        }
    }

    pub fn len(&self) -> usize {
        self.pairs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pairs.is_empty()
    }

    pub fn bonded_count(&self) -> usize {
        self.pairs.values().filter(|p| p.bonded).count()
    }

    pub fn iter(&self) -> impl Iterator<Item = &CellPair> {
        self.pairs.values()
    }

    pub fn contains(&self, a: CellId, b: CellId) -> bool {
        self.pairs.contains_key(&PairKey::new(a, b))
    }

    pub fn pair(&self, a: CellId, b: CellId) -> Result<&CellPair> {
        self.pairs
            .get(&PairKey::new(a, b))
            .ok_or(SimError::PairNotFound { a, b })
    }

    /// Cells bucketed in a legal voxel.
    pub fn occupants(&self, grid: &UniformGrid, index: IVec3) -> impl Iterator<Item = CellId> + '_ {
        let bucket = grid.is_legal(index).then(|| &self.voxels[grid.linear(index)]);
        bucket.into_iter().flatten().copied()
    }

    /// Forget a cell: empty its bucket entry and drop every pair it is in.
    pub fn remove_cell(&mut self, grid: &UniformGrid, id: CellId) -> usize {
        if let Some(index) = self.placed.remove(&id) {
            self.voxels[grid.linear(index)].remove(&id);
        }
        let before = self.pairs.len();
        self.pairs.retain(|_, p| p.a != id && p.b != id);
        before - self.pairs.len()
    }

    /// Bring buckets and pairs up to date with the current cell voxels.
    pub fn maintain(&mut self, population: &mut CellPopulation, grid: &UniformGrid) -> Result<PairChurn> {
        let mut churn = PairChurn::default();

        // Move changed cells between buckets
        let mut critical = Vec::new();
        for batch in population.batches_mut() {
            if !batch.grid_dirty {
                continue;
            }
            for (id, voxel) in batch.ids.iter().zip(batch.voxels.iter_mut()) {
                if !voxel.changed {
                    continue;
                }
                voxel.changed = false;
                let old = self.placed.remove(id);
                if let Some(old) = old {
                    self.voxels[grid.linear(old)].remove(id);
                }
                if grid.is_legal(voxel.current) {
                    self.voxels[grid.linear(voxel.current)].insert(*id);
                    self.placed.insert(*id, voxel.current);
                }
                critical.push(Critical {
                    id: *id,
                    old,
                    new: voxel.current,
                });
            }
            batch.grid_dirty = false;
        }
        churn.critical = critical.len();

        // Drop pairs the move separated
        for cell in &critical {
            let Some(old) = cell.old else { continue };
            for voxel in grid.neighborhood(old) {
                for other in &self.voxels[grid.linear(voxel)] {
                    if *other == cell.id {
                        continue;
                    }
                    let key = PairKey::new(cell.id, *other);
                    let Some(pair) = self.pairs.get(&key) else { continue };
                    let other_index = population.voxel(*other)?.current;
                    if !pair.bonded && grid.is_clearly_separated(cell.new, other_index, pair.max_sep) {
                        self.pairs.remove(&key);
                        churn.removed += 1;
                    }
                }
            }
        }

        // Create pairs with the new neighbours
        for cell in &critical {
            if !grid.is_legal(cell.new) {
                continue;
            }
            for voxel in grid.neighborhood(cell.new) {
                for other in &self.voxels[grid.linear(voxel)] {
                    if *other == cell.id {
                        continue;
                    }
                    let key = PairKey::new(cell.id, *other);
                    if self.pairs.contains_key(&key) {
                        continue;
                    }
                    let (a, b) = key.ids();
                    let radius_sum = population.radius(a)? + population.radius(b)?;
                    let delta = grid.minimum_image(population.position(a)? - population.position(b)?);
                    self.pairs.insert(
                        key,
                        CellPair {
                            a,
                            b,
                            distance: delta.length(),
                            radius_sum,
                            max_sep: grid.max_separation(radius_sum),
                            bonded: false,
                        },
                    );
                    churn.created += 1;
                }
            }
        }

        // Refresh distances; sweep anything left clearly separated
        let mut failure = None;
        self.pairs.retain(|_, pair| {
            let state = population
                .voxel(pair.a)
                .and_then(|va| Ok((va.current, population.voxel(pair.b)?.current)));
            let (ia, ib) = match state {
                Ok(indices) => indices,
                Err(e) => {
                    failure.get_or_insert(e);
                    return true;
                }
            };
            if !pair.bonded && grid.is_clearly_separated(ia, ib, pair.max_sep) {
                churn.removed += 1;
                return false;
            }
            match separation(population, grid, pair.a, pair.b) {
                Ok(delta) => pair.distance = delta.length(),
                Err(e) => {
                    failure.get_or_insert(e);
                }
            }
            true
        });
        if let Some(e) = failure {
            return Err(e);
        }

        if churn.critical > 0 {
            log::debug!(
                "Pair maintenance: {} critical cells, +{} / -{} pairs, {} tracked",
                churn.critical,
                churn.created,
                churn.removed,
                self.pairs.len()
            );
        }
        Ok(churn)
    }

    /// Update bond flags and add pairwise repulsion to both cells' force
    /// accumulators. Returns the number of bonded pairs.
    pub fn interact(&mut self, population: &mut CellPopulation, grid: &UniformGrid, phi1: f64) -> Result<usize> {
        let mut bonded = 0;
        for pair in self.pairs.values_mut() {
            let delta = separation(population, grid, pair.a, pair.b)?;
            pair.distance = delta.length();
            pair.bonded = pair.distance <= pair.radius_sum;
            if !pair.bonded {
                continue;
            }
            bonded += 1;

            let magnitude = pair.force_magnitude(phi1);
            if magnitude == 0.0 {
                continue;
            }
            let force = delta * (magnitude / pair.distance);
            population.add_force(pair.a, force)?;
            population.add_force(pair.b, -force)?;
        }
        Ok(bonded)
    }
}

/// `position(a) - position(b)` under the minimum-image convention.
fn separation(population: &CellPopulation, grid: &UniformGrid, a: CellId, b: CellId) -> Result<DVec3> {
    Ok(grid.minimum_image(population.position(a)? - population.position(b)?))
}
