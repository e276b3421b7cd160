//! Diffusion and boundary-flux folding on moment-expanded fields.
//!
//! Per population of a compartment, one step:
//! 1. decays gradient moments by the closed-form Laplacian,
//!    `-k / r² · D · dt` (k = 5 ball, k = 2 sphere shell, none for a point)
//! 2. folds the boundary flux written by reactions into the bulk field
//! 3. refreshes the boundary concentration mirrors
//! 4. zeroes the flux

use crate::batch::kernels::axpy;
use crate::batch::MOMENT_WIDTH;
use crate::biochemistry::{BoundaryLayout, Compartment, CompartmentId, MolecularPopulation};
use crate::error::{Result, SimError};
use crate::manifold::{sphere_area, Manifold, ManifoldKind};

#[derive(Default)]
pub struct DiffusionStepper {
    rate: [f64; MOMENT_WIDTH],
}

impl DiffusionStepper {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn step(&mut self, compartments: &mut [Compartment], home: CompartmentId, dt: f64) -> Result<()> {
        // Boundary instance areas for embedded exchanges, read before the
        // home compartment is borrowed mutably
        let owner = compartments.get(home).ok_or(SimError::UnknownCompartment(home))?;
        let mut areas: Vec<(CompartmentId, Vec<f64>)> = Vec::new();
        for exchange in owner.populations().iter().flat_map(|p| &p.boundaries) {
            if exchange.layout == BoundaryLayout::Embedded && !areas.iter().any(|(id, _)| *id == exchange.boundary) {
                let boundary = compartments
                    .get(exchange.boundary)
                    .ok_or(SimError::UnknownCompartment(exchange.boundary))?;
                areas.push((
                    exchange.boundary,
                    boundary.radii().iter().map(|r| sphere_area(*r)).collect(),
                ));
            }
        }

        let owner = &mut compartments[home];
        let manifold = owner.manifold;
        let (radii, populations) = owner.split_mut();
        for population in populations {
            self.diffuse(&manifold, radii, population, dt);
            self.fold_flux(&manifold, radii, population, &areas, dt)?;
            refresh_boundaries(&manifold, population);
        }
        Ok(())
    }

    fn diffuse(&mut self, manifold: &ManifoldKind, radii: &[f64], population: &mut MolecularPopulation, dt: f64) {
        let d_dt = population.diffusion * dt;
        if d_dt == 0.0 || manifold.laplacian_factor().is_none() {
            return;
        }
        for (slot, r) in radii.iter().enumerate() {
            let record = population.concentration.record_mut(slot);
            manifold.laplacian(record, *r, &mut self.rate);
            axpy(d_dt, &self.rate, record);
        }
    }

    fn fold_flux(
        &mut self,
        manifold: &ManifoldKind,
        radii: &[f64],
        population: &mut MolecularPopulation,
        areas: &[(CompartmentId, Vec<f64>)],
        dt: f64,
    ) -> Result<()> {
        let MolecularPopulation {
            concentration,
            boundaries,
            ..
        } = population;
        for exchange in boundaries.iter() {
            match exchange.layout {
                BoundaryLayout::Enclosed => {
                    if exchange.len() != concentration.len() {
                        return Err(SimError::DimensionMismatch {
                            context: "enclosed boundary flux",
                            expected: concentration.len(),
                            found: exchange.len(),
                        });
                    }
                    for (slot, r) in radii.iter().enumerate() {
                        manifold.diffusion_flux(exchange.flux.record(slot), *r, &mut self.rate);
                        axpy(dt, &self.rate, concentration.record_mut(slot));
                    }
                }
                BoundaryLayout::Embedded => {
                    let ManifoldKind::Point { volume } = *manifold else { continue };
                    if concentration.is_empty() {
                        continue;
                    }
                    let area = areas
                        .iter()
                        .find(|(id, _)| *id == exchange.boundary)
                        .map(|(_, a)| a.as_slice())
                        .unwrap_or(&[]);
                    if area.len() != exchange.len() {
                        return Err(SimError::DimensionMismatch {
                            context: "embedded boundary flux",
                            expected: area.len(),
                            found: exchange.len(),
                        });
                    }
                    let outflow: f64 = (0..exchange.len())
                        .map(|j| exchange.flux.record(j)[0] * area[j])
                        .sum();
                    concentration.record_mut(0)[0] -= dt * outflow / volume;
                }
            }
        }
        Ok(())
    }
}

/// Mirror the bulk field onto every boundary instance and clear the flux.
fn refresh_boundaries(manifold: &ManifoldKind, population: &mut MolecularPopulation) {
    let MolecularPopulation {
        concentration,
        boundaries,
        ..
    } = population;
    for exchange in boundaries.iter_mut() {
        for slot in 0..exchange.len() {
            let source = match exchange.layout {
                BoundaryLayout::Enclosed => slot,
                BoundaryLayout::Embedded => 0,
            };
            if source < concentration.len() {
                manifold.dirichlet_bc(concentration.record(source), exchange.concentration.record_mut(slot));
            }
        }
        exchange.flux.fill_zero();
    }
}
