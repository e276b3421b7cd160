//! Batches of identical compartment instances.
//!
//! A compartment holds one instance per cell of a batch (cytosol, membrane)
//! or a single well-mixed instance (extracellular medium). Every population
//! and gene keeps one record per instance, in the same slot order as the
//! instance radii, so a reaction term sweeps all instances in one pass.

use crate::batch::{BatchedVector, MOMENT_WIDTH};
use crate::biochemistry::{
    BoundaryExchange, BoundaryLayout, CompartmentId, Gene, GeneId, MolecularPopulation, PopulationId,
    Reaction, Species,
};
use crate::error::{Result, SimError};
use crate::manifold::{Manifold, ManifoldKind};

#[derive(Debug, Clone)]
pub struct Compartment {
    id: CompartmentId,
    pub name: String,
    pub manifold: ManifoldKind,
    radii: BatchedVector,
    pub(crate) populations: Vec<MolecularPopulation>,
    pub(crate) genes: Vec<Gene>,
    pub(crate) reactions: Vec<Reaction>,
}

impl Compartment {
    pub fn new(id: CompartmentId, name: impl Into<String>, manifold: ManifoldKind) -> Self {
        Self {
            id,
            name: name.into(),
            manifold,
            radii: BatchedVector::new(1),
            populations: Vec::new(),
            genes: Vec::new(),
            reactions: Vec::new(),
        }
    }

    pub fn id(&self) -> CompartmentId {
        self.id
    }

    /// Number of instances.
    pub fn len(&self) -> usize {
        self.radii.len()
    }

    pub fn is_empty(&self) -> bool {
        self.radii.is_empty()
    }

    pub fn radii(&self) -> &[f64] {
        self.radii.as_slice()
    }

    pub fn radius(&self, slot: usize) -> f64 {
        self.radii.as_slice()[slot]
    }

    /// Append an instance; every population and gene starts at its initial
    /// value. Returns the new slot.
    pub fn add_instance(&mut self, radius: f64) -> Result<usize> {
        self.radii.add_values(&[radius])?;
        for population in &mut self.populations {
            population.add_instance(&self.manifold)?;
        }
        for gene in &mut self.genes {
            gene.add_instance()?;
        }
        Ok(self.len() - 1)
    }

    /// Swap-remove instance `slot` from every buffer.
    pub fn remove_instance(&mut self, slot: usize) -> Result<()> {
        let handle = self.radii.handle_at(slot).ok_or(SimError::DimensionMismatch {
            context: "compartment instances",
            expected: slot + 1,
            found: self.radii.len(),
        })?;
        self.radii.remove(handle)?;
        for population in &mut self.populations {
            population.remove_instance(slot)?;
        }
        for gene in &mut self.genes {
            gene.remove_instance(slot)?;
        }
        Ok(())
    }

    /// Add a population, or return the existing one of the same name when
    /// its diffusion coefficient agrees.
    pub fn add_population(
        &mut self,
        name: &str,
        diffusion: f64,
        initial: [f64; MOMENT_WIDTH],
    ) -> Result<PopulationId> {
        if let Some(id) = self.populations.iter().position(|p| p.name == name) {
            let existing = self.populations[id].diffusion;
            if existing != diffusion {
                return Err(SimError::InvalidParameter {
                    name: "diffusion coefficient",
                    reason: format!(
                        "population {name} in {} already has D = {existing}, got {diffusion}",
                        self.name
                    ),
                });
            }
            return Ok(id);
        }

        let mut population = MolecularPopulation::new(name, diffusion, initial);
        for _ in 0..self.len() {
            population.add_instance(&self.manifold)?;
        }
        self.populations.push(population);
        log::debug!("Compartment {}: population {} (D = {})", self.name, name, diffusion);
        Ok(self.populations.len() - 1)
    }

    pub fn population_id(&self, name: &str) -> Result<PopulationId> {
        self.populations
            .iter()
            .position(|p| p.name == name)
            .ok_or_else(|| SimError::UnknownPopulation(format!("{} in {}", name, self.name)))
    }

    pub fn population(&self, id: PopulationId) -> Result<&MolecularPopulation> {
        self.populations
            .get(id)
            .ok_or_else(|| SimError::UnknownPopulation(format!("#{} in {}", id, self.name)))
    }

    pub fn population_mut(&mut self, id: PopulationId) -> Result<&mut MolecularPopulation> {
        let name = &self.name;
        self.populations
            .get_mut(id)
            .ok_or_else(|| SimError::UnknownPopulation(format!("#{id} in {name}")))
    }

    pub fn populations(&self) -> &[MolecularPopulation] {
        &self.populations
    }

    /// Instance radii alongside mutable populations.
    pub(crate) fn split_mut(&mut self) -> (&[f64], &mut [MolecularPopulation]) {
        (self.radii.as_slice(), &mut self.populations)
    }

    /// Total amount of a population over all instances.
    pub fn total(&self, id: PopulationId) -> Result<f64> {
        Ok(self.population(id)?.total(&self.manifold, self.radii()))
    }

    pub fn add_gene(&mut self, mut gene: Gene) -> Result<GeneId> {
        if let Some(id) = self.genes.iter().position(|g| g.name == gene.name) {
            return Ok(id);
        }
        for _ in 0..self.len() {
            gene.add_instance()?;
        }
        self.genes.push(gene);
        Ok(self.genes.len() - 1)
    }

    pub fn gene(&self, id: GeneId) -> Option<&Gene> {
        self.genes.get(id)
    }

    pub fn gene_mut(&mut self, id: GeneId) -> Option<&mut Gene> {
        self.genes.get_mut(id)
    }

    /// Expose `population` to a boundary compartment with
    /// `boundary_instances` instances.
    ///
    /// Enclosed boundaries wrap a ball instance-for-instance; embedded ones
    /// surround a single well-mixed instance.
    pub fn add_boundary(
        &mut self,
        population: PopulationId,
        boundary: CompartmentId,
        boundary_instances: usize,
        layout: BoundaryLayout,
    ) -> Result<()> {
        match (layout, &self.manifold) {
            (BoundaryLayout::Enclosed, ManifoldKind::Ball) | (BoundaryLayout::Embedded, ManifoldKind::Point { .. }) => {}
            (layout, manifold) => {
                return Err(SimError::InvalidParameter {
                    name: "boundary layout",
                    reason: format!("{layout:?} boundary on a {} compartment", manifold.name()),
                })
            }
        }
        if layout == BoundaryLayout::Enclosed && boundary_instances != self.len() {
            return Err(SimError::DimensionMismatch {
                context: "enclosed boundary",
                expected: self.len(),
                found: boundary_instances,
            });
        }

        let manifold = self.manifold;
        let name = self.name.clone();
        let target = self.population_mut(population)?;
        if target.boundary(boundary).is_some() {
            return Ok(());
        }
        let mut exchange = BoundaryExchange::new(boundary, layout);
        let mut mirror = [0.0; MOMENT_WIDTH];
        for slot in 0..boundary_instances {
            let source = match layout {
                BoundaryLayout::Enclosed => slot,
                BoundaryLayout::Embedded => 0,
            };
            let record = if target.is_empty() {
                &target.initial[..]
            } else {
                target.record(source)
            };
            manifold.dirichlet_bc(record, &mut mirror);
            exchange.concentration.add_values(&mirror)?;
            exchange.flux.add_values(&[0.0; MOMENT_WIDTH])?;
        }
        log::debug!(
            "Compartment {}: {} exposed to compartment {} ({:?})",
            name,
            target.name,
            boundary,
            layout
        );
        target.boundaries.push(exchange);
        Ok(())
    }

    /// A boundary instance joined an embedded boundary.
    pub fn add_boundary_instance(&mut self, boundary: CompartmentId) -> Result<()> {
        let manifold = self.manifold;
        for population in &mut self.populations {
            population.add_boundary_instance(boundary, &manifold)?;
        }
        Ok(())
    }

    pub fn remove_boundary_instance(&mut self, boundary: CompartmentId, slot: usize) -> Result<()> {
        for population in &mut self.populations {
            population.remove_boundary_instance(boundary, slot)?;
        }
        Ok(())
    }

    pub(crate) fn truncate_boundary_instances(&mut self, boundary: CompartmentId, len: usize) {
        for population in &mut self.populations {
            population.truncate_boundary_instances(boundary, len);
        }
    }

    pub fn reactions(&self) -> &[Reaction] {
        &self.reactions
    }

    /// Add a reaction, merging it into an existing one of the same kind and
    /// rate.
    pub fn add_reaction(&mut self, reaction: Reaction) -> Result<()> {
        for law in reaction.stoichiometry() {
            for species in law.reactants.iter().chain(law.changes.iter().map(|(s, _)| s)) {
                self.check_species(species)?;
            }
        }
        if let Some(existing) = self.reactions.iter_mut().find(|r| r.is_mergeable_with(&reaction)) {
            existing.merge(reaction)?;
            log::debug!(
                "Compartment {}: merged into {} (k = {}, {} terms)",
                self.name,
                existing.name(),
                existing.rate,
                existing.term_count()
            );
        } else {
            log::debug!("Compartment {}: new {} (k = {})", self.name, reaction.name(), reaction.rate);
            self.reactions.push(reaction);
        }
        Ok(())
    }

    fn check_species(&self, species: &Species) -> Result<()> {
        match *species {
            Species::Bulk(p) => self.population(p).map(|_| ()),
            Species::AtBoundary { population, boundary } => {
                self.population(population)?
                    .boundary(boundary)
                    .map(|_| ())
                    .ok_or_else(|| SimError::InvalidParameter {
                        name: "boundary reaction",
                        reason: format!(
                            "population #{population} in {} has no boundary with compartment {boundary}",
                            self.name
                        ),
                    })
            }
            // Resolved against the boundary compartment when stepping
            Species::Surface { .. } => Ok(()),
            Species::Gene(g) => self
                .gene(g)
                .map(|_| ())
                .ok_or_else(|| SimError::UnknownPopulation(format!("gene #{g} in {}", self.name))),
        }
    }
}
