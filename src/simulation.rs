//! Simulation driver.
//!
//! Owns the cells, the pair tracker, the compartments and the steppers, and
//! runs one tick in a fixed order:
//! 1. pair maintenance (buckets, pair creation and removal)
//! 2. force accumulators zeroed
//! 3. pairwise contact forces
//! 4. wall/chemotactic/stochastic forces and integration, per batch
//! 5. reactions in every compartment, then diffusion in every compartment
//!
//! Cells of a batch with attached compartments own one cytosol and one
//! membrane instance each, in the batch's slot order.

use crate::biochemistry::{
    BoundaryLayout, Compartment, CompartmentId, DiffusionStepper, PopulationId, ReactionStepper,
};
use crate::config::SimulationParameters;
use crate::error::{Result, SimError};
use crate::manifold::ManifoldKind;
use crate::physics::{CellFlags, CellSpec, DetachedCell, ForceIntegrator, IntegratorState, MotilityParameters};
use crate::spatial::{PairChurn, PairTracker};
use crate::state::{CellId, CellPopulation, SimulationContext};

/// Compartments carried by every cell of a batch.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CellCompartments {
    pub cytosol: CompartmentId,
    pub membrane: CompartmentId,
    /// Population whose gradient steers chemotaxis
    pub driver: Option<(CompartmentId, PopulationId)>,
}

/// What happened during one tick
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct TickReport {
    pub churn: PairChurn,
    pub pairs: usize,
    pub bonded: usize,
    pub exiting: usize,
}

pub struct Simulation {
    pub ctx: SimulationContext,
    population: CellPopulation,
    pairs: PairTracker,
    integrator: ForceIntegrator,
    compartments: Vec<Compartment>,
    reactions: ReactionStepper,
    diffusion: DiffusionStepper,
    /// Indexed by batch
    cell_compartments: Vec<Option<CellCompartments>>,
}

impl Simulation {
    pub fn new(params: SimulationParameters) -> Result<Self> {
        let ctx = SimulationContext::new(params)?;
        let pairs = PairTracker::new(&ctx.grid);
        Ok(Self {
            ctx,
            population: CellPopulation::new(),
            pairs,
            integrator: ForceIntegrator::new(),
            compartments: Vec::new(),
            reactions: ReactionStepper::new(),
            diffusion: DiffusionStepper::new(),
            cell_compartments: Vec::new(),
        })
    }

    pub fn add_cell_batch(&mut self, flags: CellFlags, motility: MotilityParameters) -> usize {
        self.cell_compartments.push(None);
        self.population.add_batch(flags, motility)
    }

    pub fn add_compartment(&mut self, name: &str, manifold: ManifoldKind) -> CompartmentId {
        let id = self.compartments.len();
        self.compartments.push(Compartment::new(id, name, manifold));
        log::info!("Compartment {} '{}' ({})", id, name, manifold.name());
        id
    }

    /// A single well-mixed instance of the given volume.
    pub fn add_extracellular(&mut self, name: &str, volume: f64) -> Result<CompartmentId> {
        if !(volume > 0.0) {
            return Err(SimError::InvalidParameter {
                name: "extracellular volume",
                reason: format!("must be positive, got {volume}"),
            });
        }
        let id = self.add_compartment(name, ManifoldKind::Point { volume });
        self.compartments[id].add_instance(0.0)?;
        Ok(id)
    }

    /// Give every cell of `batch` a cytosol (ball) and membrane (sphere)
    /// instance. The batch and both compartments must still be empty, and
    /// neither compartment may already belong to a batch.
    pub fn attach_compartments(
        &mut self,
        batch: usize,
        cytosol: CompartmentId,
        membrane: CompartmentId,
    ) -> Result<()> {
        if !self.population.batch(batch)?.is_empty() {
            return Err(SimError::InvalidParameter {
                name: "cell compartments",
                reason: format!("batch {batch} already holds cells"),
            });
        }
        let expect = |id: CompartmentId, wanted: ManifoldKind| -> Result<()> {
            let found = self.compartment(id)?.manifold;
            if std::mem::discriminant(&found) != std::mem::discriminant(&wanted) {
                return Err(SimError::InvalidParameter {
                    name: "cell compartments",
                    reason: format!("compartment {id} is a {}, expected a {}", found.name(), wanted.name()),
                });
            }
            Ok(())
        };
        expect(cytosol, ManifoldKind::Ball)?;
        expect(membrane, ManifoldKind::Sphere)?;
        for id in [cytosol, membrane] {
            if let Some(owner) = self.owning_batch(id) {
                return Err(SimError::InvalidParameter {
                    name: "cell compartments",
                    reason: format!("compartment {id} already belongs to batch {owner}"),
                });
            }
            let instances = self.compartment(id)?.len();
            if instances > 0 {
                return Err(SimError::InvalidParameter {
                    name: "cell compartments",
                    reason: format!("compartment {id} already holds {instances} instances"),
                });
            }
        }

        self.cell_compartments[batch] = Some(CellCompartments {
            cytosol,
            membrane,
            driver: None,
        });
        Ok(())
    }

    /// Steer chemotaxis of `batch` by the gradient of a population in one of
    /// the batch's own compartments.
    pub fn set_chemotaxis_driver(
        &mut self,
        batch: usize,
        compartment: CompartmentId,
        population: PopulationId,
    ) -> Result<()> {
        self.compartment(compartment)?.population(population)?;
        let attached = self
            .cell_compartments
            .get_mut(batch)
            .ok_or(SimError::UnknownBatch(batch))?
            .as_mut()
            .ok_or_else(|| SimError::InvalidParameter {
                name: "chemotaxis driver",
                reason: format!("batch {batch} has no compartments"),
            })?;
        if compartment != attached.cytosol && compartment != attached.membrane {
            return Err(SimError::InvalidParameter {
                name: "chemotaxis driver",
                reason: format!("compartment {compartment} does not belong to batch {batch}"),
            });
        }
        attached.driver = Some((compartment, population));
        Ok(())
    }

    /// Expose a bulk population to a boundary compartment. Balls get an
    /// enclosed boundary, well-mixed compartments an embedded one.
    pub fn connect_boundary(
        &mut self,
        bulk: CompartmentId,
        population: PopulationId,
        boundary: CompartmentId,
    ) -> Result<()> {
        let boundary_instances = self.compartment(boundary)?.len();
        let owner = self.compartment_mut(bulk)?;
        let layout = match owner.manifold {
            ManifoldKind::Point { .. } => BoundaryLayout::Embedded,
            _ => BoundaryLayout::Enclosed,
        };
        owner.add_boundary(population, boundary, boundary_instances, layout)
    }

    /// Batch whose cells carry compartment `id`, if any.
    fn owning_batch(&self, id: CompartmentId) -> Option<usize> {
        self.cell_compartments.iter().position(|attached| {
            attached.is_some_and(|a| a.cytosol == id || a.membrane == id)
        })
    }

    /// Place a new cell; returns its id. On failure the population and the
    /// compartments are left as they were.
    pub fn add_cell(&mut self, batch: usize, spec: &CellSpec) -> Result<CellId> {
        let attached = *self
            .cell_compartments
            .get(batch)
            .ok_or(SimError::UnknownBatch(batch))?;
        let cells = self.population.batch(batch)?.len();
        if let Some(attached) = attached {
            for compartment in [attached.cytosol, attached.membrane] {
                let found = self.compartment(compartment)?.len();
                if found != cells {
                    return Err(SimError::DimensionMismatch {
                        context: "cell compartments",
                        expected: cells,
                        found,
                    });
                }
            }
        }

        let id = self.ctx.next_cell_id();
        self.population.add_cell(id, batch, spec, &self.ctx.grid)?;
        if let Some(attached) = attached {
            if let Err(err) = self.grow_compartments(attached, spec.radius) {
                self.population.remove_cell(id)?;
                self.trim_compartments(attached, cells);
                return Err(err);
            }
        }
        Ok(id)
    }

    fn grow_compartments(&mut self, attached: CellCompartments, radius: f64) -> Result<()> {
        self.compartment_mut(attached.cytosol)?.add_instance(radius)?;
        self.compartment_mut(attached.membrane)?.add_instance(radius)?;
        for compartment in &mut self.compartments {
            compartment.add_boundary_instance(attached.membrane)?;
        }
        Ok(())
    }

    /// Drop instances past `cells` left behind by a failed `grow_compartments`.
    fn trim_compartments(&mut self, attached: CellCompartments, cells: usize) {
        for id in [attached.cytosol, attached.membrane] {
            let compartment = &mut self.compartments[id];
            while compartment.len() > cells {
                if let Err(err) = compartment.remove_instance(compartment.len() - 1) {
                    log::warn!("Compartment {}: rollback failed: {}", compartment.name, err);
                    break;
                }
            }
        }
        for compartment in &mut self.compartments {
            compartment.truncate_boundary_instances(attached.membrane, cells);
        }
    }

    /// Remove a cell and its compartment instances.
    pub fn remove_cell(&mut self, id: CellId) -> Result<DetachedCell> {
        let (batch, slot) = self.population.locate(id)?;
        let dropped = self.pairs.remove_cell(&self.ctx.grid, id);
        let (_, detached) = self.population.remove_cell(id)?;
        if let Some(attached) = self.cell_compartments[batch] {
            self.compartment_mut(attached.cytosol)?.remove_instance(slot)?;
            self.compartment_mut(attached.membrane)?.remove_instance(slot)?;
            for compartment in &mut self.compartments {
                compartment.remove_boundary_instance(attached.membrane, slot)?;
            }
        }
        log::debug!("Cell {} removed with {} pairs", id, dropped);
        Ok(detached)
    }

    /// Advance the whole simulation by `dt`.
    pub fn step(&mut self, dt: f64) -> Result<TickReport> {
        let churn = self.pairs.maintain(&mut self.population, &self.ctx.grid)?;
        self.population.clear_forces();
        let bonded = self
            .pairs
            .interact(&mut self.population, &self.ctx.grid, self.ctx.phi1())?;

        let exiting_before = self.integrator.state.exiting;
        let mut drivers = Vec::with_capacity(self.cell_compartments.len());
        for attached in &self.cell_compartments {
            let driver = match attached.and_then(|a| a.driver) {
                Some((compartment, population)) => Some(
                    self.compartments[compartment]
                        .population(population)?
                        .concentration
                        .as_slice(),
                ),
                None => None,
            };
            drivers.push(driver);
        }
        self.integrator
            .step(&mut self.population, &mut self.ctx, dt, &drivers)?;

        for id in 0..self.compartments.len() {
            self.reactions.step(&mut self.compartments, id, dt)?;
        }
        for id in 0..self.compartments.len() {
            self.diffusion.step(&mut self.compartments, id, dt)?;
        }

        let report = TickReport {
            churn,
            pairs: self.pairs.len(),
            bonded,
            exiting: self.integrator.state.exiting - exiting_before,
        };
        log::debug!(
            "Tick {}: {} pairs ({} bonded), {} newly exiting",
            self.integrator.state.step_count,
            report.pairs,
            report.bonded,
            report.exiting
        );
        Ok(report)
    }

    pub fn population(&self) -> &CellPopulation {
        &self.population
    }

    pub fn pairs(&self) -> &PairTracker {
        &self.pairs
    }

    pub fn integrator_state(&self) -> &IntegratorState {
        &self.integrator.state
    }

    pub fn compartments(&self) -> &[Compartment] {
        &self.compartments
    }

    pub fn compartment(&self, id: CompartmentId) -> Result<&Compartment> {
        self.compartments.get(id).ok_or(SimError::UnknownCompartment(id))
    }

    pub fn compartment_mut(&mut self, id: CompartmentId) -> Result<&mut Compartment> {
        self.compartments
            .get_mut(id)
            .ok_or(SimError::UnknownCompartment(id))
    }

    pub fn cell_compartments(&self, batch: usize) -> Option<CellCompartments> {
        self.cell_compartments.get(batch).copied().flatten()
    }

    /// Cells flagged as having left a non-toroidal domain.
    pub fn cells_exiting(&self) -> Vec<CellId> {
        self.population.exiting()
    }
}
