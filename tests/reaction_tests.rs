//! Reaction stepping: mass-action kinetics in a single compartment and
//! exchange across membranes, checked against closed forms and mass
//! balance.

use cell_agent_sim::{
    biochemistry::{BoundaryTerms, Compartment, Gene, Reaction, ReactionKind, ReactionStepper},
    config::SimulationParameters,
    manifold::ManifoldKind,
    physics::{CellFlags, CellSpec, MotilityParameters},
    Simulation, SimError,
};
use glam::DVec3;

fn well_mixed() -> Compartment {
    Compartment::new(0, "medium", ManifoldKind::Point { volume: 2.0 })
}

fn still_cells() -> (Simulation, usize) {
    let mut params = SimulationParameters::default();
    params.grid.extent_um = [30.0; 3];
    params.grid.step_um = 5.0;
    params.grid.boundary_force = false;
    let mut sim = Simulation::new(params).unwrap();
    let batch = sim.add_cell_batch(
        CellFlags {
            motile: false,
            ..Default::default()
        },
        MotilityParameters::default(),
    );
    (sim, batch)
}

// ============================================================================
// Bulk kinetics
// ============================================================================

#[test]
fn test_transformation_matches_explicit_euler() {
    let mut c = well_mixed();
    let a = c.add_population("A", 0.0, [10.0, 0.0, 0.0, 0.0]).unwrap();
    let b = c.add_population("B", 0.0, [0.0; 4]).unwrap();
    c.add_instance(0.0).unwrap();
    c.add_reaction(Reaction::new(1.0, ReactionKind::Transformation(vec![[a, b]])))
        .unwrap();

    let mut compartments = vec![c];
    let mut stepper = ReactionStepper::new();
    for _ in 0..10 {
        stepper.step(&mut compartments, 0, 0.1).unwrap();
        let c = &compartments[0];
        let total = c.total(a).unwrap() + c.total(b).unwrap();
        assert!((total - 20.0).abs() < 1e-10, "mass drifted to {total}");
    }

    let expected = 10.0 * 0.9f64.powi(10);
    let found = compartments[0].population(a).unwrap().record(0)[0];
    assert!((found - expected).abs() < 1e-10);
}

#[test]
fn test_dimerization_consumes_two_per_event() {
    let mut c = well_mixed();
    let a = c.add_population("A", 0.0, [2.0, 0.0, 0.0, 0.0]).unwrap();
    let d = c.add_population("A2", 0.0, [0.0; 4]).unwrap();
    c.add_instance(0.0).unwrap();
    c.add_reaction(Reaction::new(0.5, ReactionKind::Dimerization(vec![[a, d]])))
        .unwrap();

    let mut compartments = vec![c];
    ReactionStepper::new().step(&mut compartments, 0, 0.1).unwrap();

    // intensity = 0.5 * 0.1 * 2 * 2
    let c = &compartments[0];
    assert!((c.population(a).unwrap().record(0)[0] - 1.6).abs() < 1e-12);
    assert!((c.population(d).unwrap().record(0)[0] - 0.2).abs() < 1e-12);
}

#[test]
fn test_gene_drive_is_per_instance() {
    let mut c = Compartment::new(0, "cytosol", ManifoldKind::Ball);
    let p = c.add_population("P", 0.0, [0.0; 4]).unwrap();
    let g = c.add_gene(Gene::new("g", 1.0, 1.0).unwrap()).unwrap();
    c.add_instance(1.0).unwrap();
    c.add_instance(2.0).unwrap();
    c.gene_mut(g).unwrap().set_activation(1, 0.0);
    c.add_reaction(Reaction::new(2.0, ReactionKind::Transcription(vec![(g, p)])))
        .unwrap();

    let mut compartments = vec![c];
    ReactionStepper::new().step(&mut compartments, 0, 0.5).unwrap();
    let population = compartments[0].population(p).unwrap();
    assert!((population.record(0)[0] - 1.0).abs() < 1e-12);
    assert_eq!(population.record(1)[0], 0.0);
}

#[test]
fn test_gradient_moments_react_linearly() {
    let mut c = Compartment::new(0, "cytosol", ManifoldKind::Ball);
    let a = c.add_population("A", 0.0, [1.0, 0.5, 0.0, 0.0]).unwrap();
    let b = c.add_population("B", 0.0, [0.0; 4]).unwrap();
    c.add_instance(1.0).unwrap();
    c.add_reaction(Reaction::new(1.0, ReactionKind::Annihilation(vec![[a]])))
        .unwrap();
    c.add_reaction(Reaction::new(2.0, ReactionKind::Transformation(vec![[a, b]])))
        .unwrap();

    let mut compartments = vec![c];
    ReactionStepper::new().step(&mut compartments, 0, 0.1).unwrap();
    let record = compartments[0].population(a).unwrap().record(0).to_vec();
    assert!((record[0] - 0.9 * 0.8).abs() < 1e-12);
    assert!((record[1] - 0.5 * 0.9 * 0.8).abs() < 1e-12);
}

// ============================================================================
// Merging
// ============================================================================

#[test]
fn test_same_kind_and_rate_share_one_reaction() {
    let mut c = well_mixed();
    let a = c.add_population("A", 0.0, [1.0, 0.0, 0.0, 0.0]).unwrap();
    let b = c.add_population("B", 0.0, [1.0, 0.0, 0.0, 0.0]).unwrap();
    c.add_reaction(Reaction::new(1.0, ReactionKind::Transformation(vec![[a, b]])))
        .unwrap();
    c.add_reaction(Reaction::new(1.0, ReactionKind::Transformation(vec![[b, a]])))
        .unwrap();
    c.add_reaction(Reaction::new(3.0, ReactionKind::Transformation(vec![[b, a]])))
        .unwrap();
    c.add_reaction(Reaction::new(1.0, ReactionKind::Annihilation(vec![[a]])))
        .unwrap();

    assert_eq!(c.reactions().len(), 3);
    assert_eq!(c.reactions()[0].term_count(), 2);

    let mut first = Reaction::new(1.0, ReactionKind::Annihilation(vec![[a]]));
    let other = Reaction::new(1.0, ReactionKind::Transformation(vec![[a, b]]));
    assert!(!first.is_mergeable_with(&other));
    assert!(matches!(
        first.merge(other),
        Err(SimError::IncompatibleReaction { .. })
    ));
}

#[test]
fn test_unknown_population_rejected() {
    let mut c = well_mixed();
    let a = c.add_population("A", 0.0, [1.0, 0.0, 0.0, 0.0]).unwrap();
    assert!(c
        .add_reaction(Reaction::new(1.0, ReactionKind::Transformation(vec![[a, 7]])))
        .is_err());
    assert!(c.reactions().is_empty());
}

// ============================================================================
// Boundary exchange
// ============================================================================

#[test]
fn test_uptake_from_medium_conserves_mass() {
    let (mut sim, batch) = still_cells();
    let cytosol = sim.add_compartment("cytosol", ManifoldKind::Ball);
    let membrane = sim.add_compartment("membrane", ManifoldKind::Sphere);
    let medium = sim.add_extracellular("medium", 27000.0).unwrap();
    sim.attach_compartments(batch, cytosol, membrane).unwrap();

    let ligand = sim
        .compartment_mut(medium)
        .unwrap()
        .add_population("L", 0.0, [2.0, 0.0, 0.0, 0.0])
        .unwrap();
    let bound = sim
        .compartment_mut(membrane)
        .unwrap()
        .add_population("L*", 0.0, [0.0; 4])
        .unwrap();
    sim.connect_boundary(medium, ligand, membrane).unwrap();
    sim.compartment_mut(medium)
        .unwrap()
        .add_reaction(Reaction::new(
            0.3,
            ReactionKind::BoundaryTransportTo(vec![BoundaryTerms {
                boundary: membrane,
                bulk: [ligand],
                surface: [bound],
            }]),
        ))
        .unwrap();

    sim.add_cell(batch, &CellSpec::at(DVec3::splat(5.0), 1.0)).unwrap();
    sim.add_cell(batch, &CellSpec::at(DVec3::splat(20.0), 2.0)).unwrap();

    let total = |sim: &Simulation| {
        sim.compartment(medium).unwrap().total(ligand).unwrap()
            + sim.compartment(membrane).unwrap().total(bound).unwrap()
    };
    let initial = total(&sim);
    for _ in 0..20 {
        sim.step(0.05).unwrap();
    }

    let medium_level = sim.compartment(medium).unwrap().population(ligand).unwrap().record(0)[0];
    assert!(medium_level < 2.0);
    // Both membranes see the same medium, so surface densities agree
    let surface = sim.compartment(membrane).unwrap().population(bound).unwrap();
    assert!(surface.record(0)[0] > 0.0);
    assert!((surface.record(0)[0] - surface.record(1)[0]).abs() < 1e-12);
    assert!((total(&sim) - initial).abs() < 1e-9 * initial);
}

#[test]
fn test_export_from_cytosol_conserves_mass_per_cell() {
    let (mut sim, batch) = still_cells();
    let cytosol = sim.add_compartment("cytosol", ManifoldKind::Ball);
    let membrane = sim.add_compartment("membrane", ManifoldKind::Sphere);
    sim.attach_compartments(batch, cytosol, membrane).unwrap();

    let inner = sim
        .compartment_mut(cytosol)
        .unwrap()
        .add_population("A", 0.0, [1.0, 0.0, 0.0, 0.0])
        .unwrap();
    let outer = sim
        .compartment_mut(membrane)
        .unwrap()
        .add_population("A_m", 0.0, [0.0; 4])
        .unwrap();
    sim.add_cell(batch, &CellSpec::at(DVec3::splat(5.0), 1.0)).unwrap();
    sim.add_cell(batch, &CellSpec::at(DVec3::splat(20.0), 2.0)).unwrap();
    sim.connect_boundary(cytosol, inner, membrane).unwrap();
    sim.compartment_mut(cytosol)
        .unwrap()
        .add_reaction(Reaction::new(
            0.5,
            ReactionKind::BoundaryTransportTo(vec![BoundaryTerms {
                boundary: membrane,
                bulk: [inner],
                surface: [outer],
            }]),
        ))
        .unwrap();

    let cell_total = |sim: &Simulation, slot: usize| {
        let c = sim.compartment(cytosol).unwrap();
        let m = sim.compartment(membrane).unwrap();
        let r = c.radius(slot);
        c.population(inner).unwrap().record(slot)[0] * 4.0 / 3.0 * std::f64::consts::PI * r.powi(3)
            + m.population(outer).unwrap().record(slot)[0] * 4.0 * std::f64::consts::PI * r * r
    };
    let before = [cell_total(&sim, 0), cell_total(&sim, 1)];
    for _ in 0..10 {
        sim.step(0.01).unwrap();
    }

    let c = sim.compartment(cytosol).unwrap();
    // Loss rate 3 k / r: the smaller cell empties faster
    let small = c.population(inner).unwrap().record(0)[0];
    let large = c.population(inner).unwrap().record(1)[0];
    assert!(small < large && large < 1.0);
    for slot in 0..2 {
        assert!((cell_total(&sim, slot) - before[slot]).abs() < 1e-9 * before[slot]);
    }
}

#[test]
fn test_cells_joining_a_connected_cytosol_keep_exchange_aligned() {
    let (mut sim, batch) = still_cells();
    let cytosol = sim.add_compartment("cytosol", ManifoldKind::Ball);
    let membrane = sim.add_compartment("membrane", ManifoldKind::Sphere);
    sim.attach_compartments(batch, cytosol, membrane).unwrap();

    let inner = sim
        .compartment_mut(cytosol)
        .unwrap()
        .add_population("A", 0.0, [1.0, 0.0, 0.0, 0.0])
        .unwrap();
    let outer = sim
        .compartment_mut(membrane)
        .unwrap()
        .add_population("A_m", 0.0, [0.0; 4])
        .unwrap();
    // Boundary first, cells afterwards
    sim.connect_boundary(cytosol, inner, membrane).unwrap();
    sim.compartment_mut(cytosol)
        .unwrap()
        .add_reaction(Reaction::new(
            0.5,
            ReactionKind::BoundaryTransportTo(vec![BoundaryTerms {
                boundary: membrane,
                bulk: [inner],
                surface: [outer],
            }]),
        ))
        .unwrap();
    let small = sim.add_cell(batch, &CellSpec::at(DVec3::splat(5.0), 1.0)).unwrap();
    sim.add_cell(batch, &CellSpec::at(DVec3::splat(20.0), 2.0)).unwrap();

    let exchange_len = |sim: &Simulation| {
        sim.compartment(cytosol)
            .unwrap()
            .population(inner)
            .unwrap()
            .boundary(membrane)
            .unwrap()
            .len()
    };
    let cell_total = |sim: &Simulation, slot: usize| {
        let c = sim.compartment(cytosol).unwrap();
        let m = sim.compartment(membrane).unwrap();
        let r = c.radius(slot);
        c.population(inner).unwrap().record(slot)[0] * 4.0 / 3.0 * std::f64::consts::PI * r.powi(3)
            + m.population(outer).unwrap().record(slot)[0] * 4.0 * std::f64::consts::PI * r * r
    };
    assert_eq!(exchange_len(&sim), 2);

    let large_total = cell_total(&sim, 1);
    for _ in 0..10 {
        sim.step(0.01).unwrap();
    }
    assert_eq!(exchange_len(&sim), sim.compartment(cytosol).unwrap().len());
    assert!(sim.compartment(cytosol).unwrap().population(inner).unwrap().record(1)[0] < 1.0);
    assert!((cell_total(&sim, 1) - large_total).abs() < 1e-9 * large_total);

    // The large cell moves into slot 0
    sim.remove_cell(small).unwrap();
    assert_eq!(sim.compartment(cytosol).unwrap().len(), 1);
    assert_eq!(exchange_len(&sim), 1);
    for _ in 0..10 {
        sim.step(0.01).unwrap();
    }
    assert_eq!(sim.compartment(cytosol).unwrap().radius(0), 2.0);
    assert!((cell_total(&sim, 0) - large_total).abs() < 1e-9 * large_total);
}
