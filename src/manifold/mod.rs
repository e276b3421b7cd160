//! Geometry services for concentration fields.
//!
//! Concentrations on cell-scale compartments are stored as first-order
//! moment expansions `[value, grad_x, grad_y, grad_z]` about the centre.
//! The `Manifold` trait is the numerical seam the reaction and diffusion
//! steppers consume: interpolation, gradient, Laplacian, integration,
//! boundary-flux folding and the Dirichlet mirror onto a boundary.
//!
//! Closed forms for the l = 1 (linear) mode:
//! - ball (volume, Neumann):  ∇²g ≈ -5/r² g
//! - sphere shell (surface):  ∇²g = -l(l+1)/r² g = -2/r² g
//! - point (well mixed):      no spatial structure
//!
//! Flux folding on a ball conserves mass: surface/volume = 3/r for the
//! value moment; the gradient moments take 5/r.

use glam::DVec3;
use serde::{Deserialize, Serialize};
use std::f64::consts::PI;

use crate::batch::MOMENT_WIDTH;

/// Laplacian eigen-factor of the linear mode on a ball.
pub const BALL_LAPLACIAN_FACTOR: f64 = 5.0;
/// Laplacian eigen-factor of the linear mode on a sphere surface.
pub const SPHERE_LAPLACIAN_FACTOR: f64 = 2.0;
/// Surface-to-volume factor applied to the value moment of boundary flux.
pub const BALL_FLUX_VALUE_FACTOR: f64 = 3.0;
/// Factor applied to gradient moments of boundary flux.
pub const BALL_FLUX_GRADIENT_FACTOR: f64 = 5.0;

/// Shape of a compartment instance.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum ManifoldKind {
    /// Solid sphere (cytosol); instance radius from the compartment.
    Ball,
    /// Spherical surface (membrane); instance radius from the compartment.
    Sphere,
    /// Well-mixed volume (extracellular medium) of fixed size.
    Point { volume: f64 },
}

/// Numerical services over one moment record of a compartment instance.
pub trait Manifold {
    /// Value at `offset` from the instance centre.
    fn interpolate(&self, record: &[f64], offset: DVec3) -> f64;

    /// Spatial gradient anywhere in the instance.
    fn gradient(&self, record: &[f64]) -> DVec3;

    /// Laplacian of the field, written into `out`.
    fn laplacian(&self, record: &[f64], radius: f64, out: &mut [f64]);

    /// Total amount in the instance.
    fn integrate(&self, record: &[f64], radius: f64) -> f64;

    /// Rate of change of the field caused by an outward boundary flux.
    fn diffusion_flux(&self, flux: &[f64], radius: f64, out: &mut [f64]);

    /// Mirror the field onto its boundary as the boundary concentration.
    fn dirichlet_bc(&self, record: &[f64], boundary: &mut [f64]);
}

impl ManifoldKind {
    pub fn name(&self) -> &'static str {
        match self {
            ManifoldKind::Ball => "ball",
            ManifoldKind::Sphere => "sphere",
            ManifoldKind::Point { .. } => "point",
        }
    }

    /// Laplacian eigen-factor k of the linear mode, if the manifold diffuses.
    pub fn laplacian_factor(&self) -> Option<f64> {
        match self {
            ManifoldKind::Ball => Some(BALL_LAPLACIAN_FACTOR),
            ManifoldKind::Sphere => Some(SPHERE_LAPLACIAN_FACTOR),
            ManifoldKind::Point { .. } => None,
        }
    }
}

impl Manifold for ManifoldKind {
    fn interpolate(&self, record: &[f64], offset: DVec3) -> f64 {
        match self {
            ManifoldKind::Point { .. } => record[0],
            ManifoldKind::Ball | ManifoldKind::Sphere => {
                record[0] + self.gradient(record).dot(offset)
            }
        }
    }

    fn gradient(&self, record: &[f64]) -> DVec3 {
        match self {
            ManifoldKind::Point { .. } => DVec3::ZERO,
            ManifoldKind::Ball | ManifoldKind::Sphere => {
                DVec3::new(record[1], record[2], record[3])
            }
        }
    }

    fn laplacian(&self, record: &[f64], radius: f64, out: &mut [f64]) {
        out[..MOMENT_WIDTH].fill(0.0);
        if let Some(k) = self.laplacian_factor() {
            let factor = -k / (radius * radius);
            for i in 1..MOMENT_WIDTH {
                out[i] = factor * record[i];
            }
        }
    }

    fn integrate(&self, record: &[f64], radius: f64) -> f64 {
        match self {
            ManifoldKind::Ball => record[0] * 4.0 / 3.0 * PI * radius.powi(3),
            ManifoldKind::Sphere => record[0] * 4.0 * PI * radius * radius,
            ManifoldKind::Point { volume } => record[0] * volume,
        }
    }

    fn diffusion_flux(&self, flux: &[f64], radius: f64, out: &mut [f64]) {
        out[..MOMENT_WIDTH].fill(0.0);
        if let ManifoldKind::Ball = self {
            out[0] = -BALL_FLUX_VALUE_FACTOR / radius * flux[0];
            for i in 1..MOMENT_WIDTH {
                out[i] = -BALL_FLUX_GRADIENT_FACTOR / radius * flux[i];
            }
        }
    }

    fn dirichlet_bc(&self, record: &[f64], boundary: &mut [f64]) {
        match self {
            ManifoldKind::Point { .. } => {
                boundary[0] = record[0];
                boundary[1..MOMENT_WIDTH].fill(0.0);
            }
            ManifoldKind::Ball | ManifoldKind::Sphere => {
                boundary[..MOMENT_WIDTH].copy_from_slice(&record[..MOMENT_WIDTH]);
            }
        }
    }
}

/// Surface area of a sphere of the given radius.
pub fn sphere_area(radius: f64) -> f64 {
    4.0 * PI * radius * radius
}
