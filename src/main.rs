//! Cell Agent Sim - Entry point
//!
//! Headless diagnostics run: scatters a random population of cells with a
//! small reaction network, advances it and reports pair, kinetic and
//! species statistics.
//!
//! CLI Usage:
//!   cargo run                               # Defaults
//!   cargo run -- -n 500 -c 200 --seed 7     # Custom steps, cells and seed
//!   cargo run -- --params data/parameters/simulation.json

use std::time::Instant;

use anyhow::{Context, Result};
use cell_agent_sim::{
    biochemistry::{BoundaryTerms, Reaction, ReactionKind},
    config::SimulationParameters,
    manifold::ManifoldKind,
    physics::{CellFlags, CellSpec, Coefficient, MotilityParameters},
    Simulation,
};
use glam::DVec3;
use rand::prelude::*;

struct Options {
    steps: usize,
    cells: usize,
    seed: u64,
    dt: f64,
    params: Option<String>,
}

/// Parse CLI arguments
fn parse_args() -> Options {
    let args: Vec<String> = std::env::args().collect();
    let mut options = Options {
        steps: 1000,
        cells: 100,
        seed: 1,
        dt: 0.01,
        params: None,
    };

    let mut i = 1;
    while i < args.len() {
        match args[i].as_str() {
            "-n" | "--steps" => {
                i += 1;
                if i < args.len() {
                    options.steps = args[i].parse().unwrap_or(1000);
                }
            }
            "-c" | "--cells" => {
                i += 1;
                if i < args.len() {
                    options.cells = args[i].parse().unwrap_or(100);
                }
            }
            "-s" | "--seed" => {
                i += 1;
                if i < args.len() {
                    options.seed = args[i].parse().unwrap_or(1);
                }
            }
            "--dt" => {
                i += 1;
                if i < args.len() {
                    options.dt = args[i].parse().unwrap_or(0.01);
                }
            }
            "-p" | "--params" => {
                i += 1;
                if i < args.len() {
                    options.params = Some(args[i].clone());
                }
            }
            "--help" | "-h" => {
                println!("Cell Agent Sim");
                println!();
                println!("Usage: cell-agent-sim [OPTIONS]");
                println!();
                println!("Options:");
                println!("  -n, --steps N      Number of ticks (default: 1000)");
                println!("  -c, --cells M      Number of cells (default: 100)");
                println!("  -s, --seed S       Placement and sampler seed (default: 1)");
                println!("      --dt T         Time step (default: 0.01)");
                println!("  -p, --params FILE  Simulation parameters JSON");
                println!("  --help, -h         Show this help");
                std::process::exit(0);
            }
            _ => {}
        }
        i += 1;
    }

    options
}

fn main() -> Result<()> {
    env_logger::init();
    let options = parse_args();

    println!("=== Cell Agent Sim - Diagnostics ===\n");

    let mut params = match &options.params {
        Some(path) => SimulationParameters::load_path_or_default(path),
        None => SimulationParameters::load_or_default(),
    };
    params.rng.seed = options.seed;
    let extent = DVec3::from_array(params.grid.extent_um);
    println!(
        "Domain: {:?} μm, step {} μm, toroidal={}",
        params.grid.extent_um, params.grid.step_um, params.grid.toroidal
    );

    let mut sim = Simulation::new(params).context("building simulation")?;

    // One stochastic, chemotactic batch with cytosol and membrane
    let batch = sim.add_cell_batch(
        CellFlags {
            motile: true,
            chemotactic: true,
            stochastic: true,
        },
        MotilityParameters {
            drag: Coefficient::Uniform(1.0),
            transduction: Coefficient::Uniform(0.5),
            sigma: Coefficient::Uniform(0.2),
        },
    );
    let cytosol = sim.add_compartment("cytosol", ManifoldKind::Ball);
    let membrane = sim.add_compartment("membrane", ManifoldKind::Sphere);
    let medium = sim.add_extracellular("medium", extent.x * extent.y * extent.z)?;
    sim.attach_compartments(batch, cytosol, membrane)?;

    // Ligand binds a receptor on the membrane; the complex activates a
    // cytosolic signal that decays
    let ligand = sim
        .compartment_mut(medium)?
        .add_population("ligand", 0.0, [1.0, 0.0, 0.0, 0.0])?;
    let (receptor, complex) = {
        let m = sim.compartment_mut(membrane)?;
        (
            m.add_population("receptor", 0.01, [1.0, 0.0, 0.0, 0.0])?,
            m.add_population("complex", 0.01, [0.0, 0.0, 0.0, 0.0])?,
        )
    };
    let (inactive, active) = {
        let c = sim.compartment_mut(cytosol)?;
        (
            c.add_population("signal", 1.0, [1.0, 0.0, 0.0, 0.0])?,
            c.add_population("signal*", 1.0, [0.0, 0.0, 0.0, 0.0])?,
        )
    };
    sim.connect_boundary(medium, ligand, membrane)?;
    sim.connect_boundary(cytosol, inactive, membrane)?;
    sim.connect_boundary(cytosol, active, membrane)?;
    sim.compartment_mut(medium)?.add_reaction(Reaction::new(
        0.1,
        ReactionKind::BoundaryAssociation(vec![BoundaryTerms {
            boundary: membrane,
            bulk: [ligand],
            surface: [receptor, complex],
        }]),
    ))?;
    sim.compartment_mut(cytosol)?.add_reaction(Reaction::new(
        1.0,
        ReactionKind::CatalyzedBoundaryActivation(vec![BoundaryTerms {
            boundary: membrane,
            bulk: [inactive, active],
            surface: [complex],
        }]),
    ))?;
    sim.compartment_mut(cytosol)?
        .add_reaction(Reaction::new(0.5, ReactionKind::Transformation(vec![[active, inactive]])))?;
    sim.set_chemotaxis_driver(batch, membrane, complex)?;

    let mut rng = StdRng::seed_from_u64(options.seed);
    for _ in 0..options.cells {
        let radius = rng.gen_range(0.8..1.2);
        let position = DVec3::new(
            rng.gen_range(radius..extent.x - radius),
            rng.gen_range(radius..extent.y - radius),
            rng.gen_range(radius..extent.z - radius),
        );
        sim.add_cell(batch, &CellSpec::at(position, radius))?;
    }
    println!("Cells: {}", sim.population().len());
    println!("\n--- Running {} ticks (dt = {}) ---\n", options.steps, options.dt);

    let start_time = Instant::now();
    let mut created = 0;
    let mut removed = 0;
    for step in 0..options.steps {
        let report = sim.step(options.dt)?;
        created += report.churn.created;
        removed += report.churn.removed;

        if options.steps >= 10 && step % (options.steps / 10) == 0 {
            let progress = (step as f64 / options.steps as f64) * 100.0;
            println!(
                "  {:3.0}%: step={}, pairs={}, bonded={}, KE={:.4}",
                progress,
                step,
                report.pairs,
                report.bonded,
                sim.population().kinetic_energy()
            );
        }
    }
    let elapsed = start_time.elapsed();

    let state = sim.integrator_state();
    println!("\n=== Results ===");
    println!("Elapsed time: {:.2?}", elapsed);
    println!("Ticks per second: {:.0}", options.steps as f64 / elapsed.as_secs_f64());
    println!("Simulation time: {:.3}", state.time);
    println!();
    println!("Pairs tracked: {} ({} created, {} removed)", sim.pairs().len(), created, removed);
    println!("Bonded pairs: {}", sim.pairs().bonded_count());
    println!("Max speed: {:.4} μm/s", state.max_speed);
    println!("Kinetic energy: {:.4}", sim.population().kinetic_energy());
    println!("Cells exiting: {}", sim.cells_exiting().len());
    println!();
    for compartment in sim.compartments() {
        for (id, population) in compartment.populations().iter().enumerate() {
            println!(
                "  {:>9} / {:<9} total = {:.4}",
                compartment.name,
                population.name,
                compartment.total(id)?
            );
        }
    }

    Ok(())
}
