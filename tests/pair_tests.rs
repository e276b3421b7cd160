//! Pair tracking tests: closure of the pair map over touching cells, force
//! symmetry and bookkeeping under cell removal.

use cell_agent_sim::config::SimulationParameters;
use cell_agent_sim::physics::{CellFlags, CellSpec, MotilityParameters};
use cell_agent_sim::spatial::{PairTracker, UniformGrid};
use cell_agent_sim::state::{CellId, CellPopulation};
use cell_agent_sim::Simulation;
use glam::DVec3;
use proptest::prelude::*;

const EXTENT: f64 = 20.0;
const STEP: f64 = 2.5;

fn grid() -> UniformGrid {
    UniformGrid::new([EXTENT; 3], STEP, false).unwrap()
}

fn populate(grid: &UniformGrid, cells: &[(DVec3, f64)]) -> (CellPopulation, Vec<CellId>) {
    let mut population = CellPopulation::new();
    let batch = population.add_batch(CellFlags::default(), MotilityParameters::default());
    let mut ids = Vec::new();
    for (i, (position, radius)) in cells.iter().enumerate() {
        let id = CellId(i as u32);
        population
            .add_cell(id, batch, &CellSpec::at(*position, *radius), grid)
            .unwrap();
        ids.push(id);
    }
    (population, ids)
}

/// Every touching pair is tracked and no unbonded tracked pair is clearly
/// separated on the grid.
fn check_closure(population: &CellPopulation, pairs: &PairTracker, grid: &UniformGrid, ids: &[CellId]) {
    for (i, a) in ids.iter().enumerate() {
        for b in &ids[i + 1..] {
            let d = population.position(*a).unwrap().distance(population.position(*b).unwrap());
            let sum = population.radius(*a).unwrap() + population.radius(*b).unwrap();
            if d <= sum {
                assert!(pairs.contains(*a, *b), "touching cells {a} and {b} are not paired");
            }
        }
    }
    for pair in pairs.iter() {
        let ia = population.voxel(pair.a).unwrap().current;
        let ib = population.voxel(pair.b).unwrap().current;
        assert!(pair.bonded || !grid.is_clearly_separated(ia, ib, pair.max_sep));
        assert!(pair.a < pair.b);
    }
}

fn cell() -> impl Strategy<Value = (DVec3, f64)> {
    (0.5..EXTENT - 0.5, 0.5..EXTENT - 0.5, 0.5..EXTENT - 0.5, 0.4..1.2f64)
        .prop_map(|(x, y, z, r)| (DVec3::new(x, y, z), r))
}

// ============================================================================
// Closure
// ============================================================================

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    #[test]
    fn prop_pairs_cover_touching_cells(
        cells in prop::collection::vec(cell(), 2..60),
        moves in prop::collection::vec((0..60usize, cell()), 0..30),
    ) {
        let grid = grid();
        let (mut population, ids) = populate(&grid, &cells);
        let mut pairs = PairTracker::new(&grid);

        pairs.maintain(&mut population, &grid).unwrap();
        check_closure(&population, &pairs, &grid, &ids);

        for (which, (position, _)) in moves {
            let id = ids[which % ids.len()];
            population.set_position(id, position, &grid).unwrap();
        }
        pairs.maintain(&mut population, &grid).unwrap();
        check_closure(&population, &pairs, &grid, &ids);
    }
}

#[test]
fn test_idle_maintenance_changes_nothing() {
    let grid = grid();
    let (mut population, _) = populate(
        &grid,
        &[(DVec3::splat(5.0), 1.0), (DVec3::new(6.5, 5.0, 5.0), 1.0)],
    );
    let mut pairs = PairTracker::new(&grid);
    let first = pairs.maintain(&mut population, &grid).unwrap();
    assert_eq!(first.critical, 2);
    assert_eq!(first.created, 1);

    let second = pairs.maintain(&mut population, &grid).unwrap();
    assert_eq!(second.critical, 0);
    assert_eq!(second.created, 0);
    assert_eq!(second.removed, 0);
    assert_eq!(pairs.len(), 1);
}

// ============================================================================
// Forces
// ============================================================================

#[test]
fn test_contact_forces_are_equal_and_opposite() {
    let grid = grid();
    let (mut population, ids) = populate(
        &grid,
        &[(DVec3::splat(5.0), 1.0), (DVec3::new(6.0, 5.0, 5.0), 1.0)],
    );
    let mut pairs = PairTracker::new(&grid);
    pairs.maintain(&mut population, &grid).unwrap();

    let bonded = pairs.interact(&mut population, &grid, 10.0).unwrap();
    assert_eq!(bonded, 1);

    // phi1 (1/d - 1/(r_a + r_b)) = 10 (1 - 0.5)
    let fa = population.force(ids[0]).unwrap();
    let fb = population.force(ids[1]).unwrap();
    assert!((fa - DVec3::new(-5.0, 0.0, 0.0)).length() < 1e-12);
    assert!((fa + fb).length() < 1e-12);
}

#[test]
fn test_contact_forces_sum_in_key_order() {
    let grid = grid();
    let mut cells = Vec::new();
    for i in 0..4 {
        for j in 0..4 {
            for k in 0..3 {
                let offset = DVec3::new(0.7 * i as f64, 0.9 * j as f64, 0.8 * k as f64);
                cells.push((DVec3::splat(5.0) + offset, 0.6));
            }
        }
    }

    let run = || {
        let (mut population, ids) = populate(&grid, &cells);
        let mut pairs = PairTracker::new(&grid);
        pairs.maintain(&mut population, &grid).unwrap();
        pairs.interact(&mut population, &grid, 10.0).unwrap();
        let keys: Vec<_> = pairs.iter().map(|p| p.key()).collect();
        assert!(keys.windows(2).all(|w| w[0] < w[1]));
        ids.iter()
            .map(|id| population.force(*id).unwrap())
            .collect::<Vec<_>>()
    };
    // Bitwise equal, not just close
    assert_eq!(run(), run());
}

#[test]
fn test_unbonded_neighbours_exert_no_force() {
    let grid = grid();
    let (mut population, ids) = populate(
        &grid,
        &[(DVec3::splat(5.0), 0.5), (DVec3::new(7.0, 5.0, 5.0), 0.5)],
    );
    let mut pairs = PairTracker::new(&grid);
    pairs.maintain(&mut population, &grid).unwrap();
    assert!(pairs.contains(ids[0], ids[1]));

    assert_eq!(pairs.interact(&mut population, &grid, 10.0).unwrap(), 0);
    assert_eq!(population.force(ids[0]).unwrap(), DVec3::ZERO);
    assert_eq!(population.force(ids[1]).unwrap(), DVec3::ZERO);
}

#[test]
fn test_bonded_pair_outlives_separation_until_unbonded() {
    let grid = grid();
    let (mut population, ids) = populate(
        &grid,
        &[(DVec3::splat(5.0), 1.0), (DVec3::new(6.0, 5.0, 5.0), 1.0)],
    );
    let mut pairs = PairTracker::new(&grid);
    pairs.maintain(&mut population, &grid).unwrap();
    pairs.interact(&mut population, &grid, 10.0).unwrap();
    assert!(pairs.pair(ids[0], ids[1]).unwrap().bonded);

    population
        .set_position(ids[1], DVec3::new(15.0, 5.0, 5.0), &grid)
        .unwrap();
    pairs.maintain(&mut population, &grid).unwrap();
    let pair = pairs.pair(ids[0], ids[1]).unwrap();
    assert!(pair.bonded);
    assert!((pair.distance - 10.0).abs() < 1e-12);

    assert_eq!(pairs.interact(&mut population, &grid, 10.0).unwrap(), 0);
    let churn = pairs.maintain(&mut population, &grid).unwrap();
    assert_eq!(churn.removed, 1);
    assert!(pairs.is_empty());
}

// ============================================================================
// Removal
// ============================================================================

#[test]
fn test_removed_cell_takes_its_pairs() {
    let mut params = SimulationParameters::default();
    params.grid.extent_um = [EXTENT; 3];
    params.grid.step_um = 4.0;
    params.grid.boundary_force = false;
    let mut sim = Simulation::new(params).unwrap();
    let batch = sim.add_cell_batch(CellFlags::default(), MotilityParameters::default());

    let a = sim.add_cell(batch, &CellSpec::at(DVec3::splat(5.0), 1.0)).unwrap();
    let b = sim.add_cell(batch, &CellSpec::at(DVec3::new(6.0, 5.0, 5.0), 1.0)).unwrap();
    let c = sim.add_cell(batch, &CellSpec::at(DVec3::new(5.0, 6.0, 5.0), 1.0)).unwrap();
    let report = sim.step(0.01).unwrap();
    assert_eq!(report.pairs, 3);
    assert_eq!(report.bonded, 3);

    sim.remove_cell(a).unwrap();
    assert_eq!(sim.pairs().len(), 1);
    assert!(sim.pairs().contains(b, c));
    assert!(sim.pairs().pair(a, b).is_err());

    let report = sim.step(0.01).unwrap();
    assert_eq!(report.pairs, 1);
}
