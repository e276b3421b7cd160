//! Batched mass-action stepping.
//!
//! For each term the stepper forms the intensity field
//! `k dt Π reactants` over every instance, then applies each change as a
//! scaled add. Bulk changes land on concentrations; changes to a bulk
//! population seen at a boundary land on its boundary flux as a rate, to
//! be folded in by the diffusion step.

use crate::batch::kernels::{axpy, axpy_per_record, moment_product, scal};
use crate::batch::MOMENT_WIDTH;
use crate::biochemistry::{Compartment, CompartmentId, Reaction, Species};
use crate::error::{Result, SimError};

/// A reactant field: moment records, or one scalar per instance with a
/// scale (gene drive).
enum Field<'a> {
    Moments(&'a [f64]),
    Scalar(&'a [f64], f64),
}

impl Field<'_> {
    fn records(&self) -> usize {
        match self {
            Field::Moments(values) => values.len() / MOMENT_WIDTH,
            Field::Scalar(values, _) => values.len(),
        }
    }
}

#[derive(Default)]
pub struct ReactionStepper {
    intensity: Vec<f64>,
    scratch: Vec<f64>,
}

impl ReactionStepper {
    pub fn new() -> Self {
        Self::default()
    }

    /// Apply every reaction of compartment `home` for one step.
    pub fn step(&mut self, compartments: &mut [Compartment], home: CompartmentId, dt: f64) -> Result<()> {
        let reactions = std::mem::take(
            &mut compartments
                .get_mut(home)
                .ok_or(SimError::UnknownCompartment(home))?
                .reactions,
        );
        let result = reactions
            .iter()
            .try_for_each(|reaction| self.apply(compartments, home, reaction, dt));
        compartments[home].reactions = reactions;
        result
    }

    fn apply(&mut self, compartments: &mut [Compartment], home: CompartmentId, reaction: &Reaction, dt: f64) -> Result<()> {
        let k_dt = reaction.rate * dt;
        for law in reaction.stoichiometry() {
            self.intensity_of(compartments, home, reaction.name(), &law.reactants)?;
            scal(k_dt, &mut self.intensity);
            for &(species, coefficient) in &law.changes {
                let (target, scale) = target_mut(compartments, home, species, dt)?;
                if target.len() != self.intensity.len() {
                    return Err(SimError::DimensionMismatch {
                        context: reaction.name(),
                        expected: self.intensity.len(),
                        found: target.len(),
                    });
                }
                axpy(coefficient * scale, &self.intensity, target);
            }
        }
        Ok(())
    }

    /// Product of the reactant fields into `self.intensity`.
    fn intensity_of(
        &mut self,
        compartments: &[Compartment],
        home: CompartmentId,
        context: &'static str,
        reactants: &[Species],
    ) -> Result<()> {
        let mut fields = reactants
            .iter()
            .map(|s| field(compartments, home, *s))
            .collect::<Result<Vec<_>>>()?
            .into_iter();
        let Some(first) = fields.next() else {
            self.intensity.clear();
            return Ok(());
        };
        let records = first.records();

        self.intensity.clear();
        self.intensity.resize(records * MOMENT_WIDTH, 0.0);
        match first {
            Field::Moments(values) => self.intensity.copy_from_slice(values),
            Field::Scalar(values, scale) => {
                for (record, v) in self.intensity.chunks_exact_mut(MOMENT_WIDTH).zip(values) {
                    record[0] = scale * v;
                }
            }
        }

        for next in fields {
            if next.records() != records {
                return Err(SimError::DimensionMismatch {
                    context,
                    expected: records,
                    found: next.records(),
                });
            }
            self.scratch.clear();
            self.scratch.resize(self.intensity.len(), 0.0);
            match next {
                Field::Moments(values) => moment_product(&self.intensity, values, &mut self.scratch),
                Field::Scalar(values, scale) => {
                    axpy_per_record(scale, values, &self.intensity, &mut self.scratch, MOMENT_WIDTH)
                }
            }
            std::mem::swap(&mut self.intensity, &mut self.scratch);
        }
        Ok(())
    }
}

fn compartment(compartments: &[Compartment], id: CompartmentId) -> Result<&Compartment> {
    compartments.get(id).ok_or(SimError::UnknownCompartment(id))
}

fn no_boundary(home: CompartmentId, population: usize, boundary: CompartmentId) -> SimError {
    SimError::UnknownPopulation(format!(
        "boundary of population #{population} in compartment {home} with compartment {boundary}"
    ))
}

fn field(compartments: &[Compartment], home: CompartmentId, species: Species) -> Result<Field<'_>> {
    let owner = compartment(compartments, home)?;
    Ok(match species {
        Species::Bulk(p) => Field::Moments(owner.population(p)?.concentration.as_slice()),
        Species::AtBoundary { population, boundary } => Field::Moments(
            owner
                .population(population)?
                .boundary(boundary)
                .ok_or_else(|| no_boundary(home, population, boundary))?
                .concentration
                .as_slice(),
        ),
        Species::Surface { boundary, population } => Field::Moments(
            compartment(compartments, boundary)?
                .population(population)?
                .concentration
                .as_slice(),
        ),
        Species::Gene(g) => {
            let gene = owner
                .gene(g)
                .ok_or_else(|| SimError::UnknownPopulation(format!("gene #{g} in compartment {home}")))?;
            Field::Scalar(gene.activation.as_slice(), gene.copy_number)
        }
    })
}

/// Buffer a change writes to, with the factor applied on top of the
/// stoichiometric coefficient.
fn target_mut(
    compartments: &mut [Compartment],
    home: CompartmentId,
    species: Species,
    dt: f64,
) -> Result<(&mut [f64], f64)> {
    match species {
        Species::Bulk(p) => {
            let owner = compartments.get_mut(home).ok_or(SimError::UnknownCompartment(home))?;
            Ok((owner.population_mut(p)?.concentration.as_mut_slice(), 1.0))
        }
        // Produced into the bulk means negative outward flux
        Species::AtBoundary { population, boundary } => {
            let owner = compartments.get_mut(home).ok_or(SimError::UnknownCompartment(home))?;
            let exchange = owner
                .population_mut(population)?
                .boundary_mut(boundary)
                .ok_or_else(|| no_boundary(home, population, boundary))?;
            Ok((exchange.flux.as_mut_slice(), -1.0 / dt))
        }
        Species::Surface { boundary, population } => {
            let other = compartments
                .get_mut(boundary)
                .ok_or(SimError::UnknownCompartment(boundary))?;
            Ok((other.population_mut(population)?.concentration.as_mut_slice(), 1.0))
        }
        Species::Gene(g) => Err(SimError::InvalidParameter {
            name: "reaction product",
            reason: format!("gene #{g} cannot be produced or consumed"),
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::biochemistry::{Gene, ReactionKind};
    use crate::manifold::ManifoldKind;

    #[test]
    fn test_association_intensity() {
        let mut c = Compartment::new(0, "medium", ManifoldKind::Point { volume: 1.0 });
        let a = c.add_population("A", 0.0, [2.0, 0.0, 0.0, 0.0]).unwrap();
        let b = c.add_population("B", 0.0, [3.0, 0.0, 0.0, 0.0]).unwrap();
        let ab = c.add_population("AB", 0.0, [0.0; 4]).unwrap();
        c.add_instance(0.0).unwrap();
        c.add_reaction(Reaction::new(0.5, ReactionKind::Association(vec![[a, b, ab]])))
            .unwrap();

        let mut compartments = vec![c];
        ReactionStepper::new().step(&mut compartments, 0, 0.1).unwrap();

        // intensity = 2 * 3 * 0.5 * 0.1
        let c = &compartments[0];
        assert!((c.population(a).unwrap().record(0)[0] - 1.7).abs() < 1e-12);
        assert!((c.population(b).unwrap().record(0)[0] - 2.7).abs() < 1e-12);
        assert!((c.population(ab).unwrap().record(0)[0] - 0.3).abs() < 1e-12);
    }

    #[test]
    fn test_transcription_scales_with_activation() {
        let mut c = Compartment::new(0, "cytosol", ManifoldKind::Ball);
        let p = c.add_population("P", 0.0, [0.0; 4]).unwrap();
        let g = c.add_gene(Gene::new("g", 2.0, 0.5).unwrap()).unwrap();
        c.add_instance(1.0).unwrap();
        c.add_reaction(Reaction::new(1.0, ReactionKind::Transcription(vec![(g, p)])))
            .unwrap();

        let mut compartments = vec![c];
        ReactionStepper::new().step(&mut compartments, 0, 0.1).unwrap();
        assert!((compartments[0].population(p).unwrap().record(0)[0] - 0.1).abs() < 1e-12);
    }
}
