//! Flat-array kernels over batched records.
//!
//! These are the BLAS-style passes (`axpy`, `scal`) the force and reaction
//! steppers are written in, plus the moment-expansion product used by
//! bimolecular kinetics. Every kernel reads whole input slices before the
//! caller writes results back, so no update observes a partially-updated
//! batch.

/// Doubles per moment record: `[value, grad_x, grad_y, grad_z]`.
pub const MOMENT_WIDTH: usize = 4;

/// Doubles per padded 3-vector record: `[x, y, z, unused]`.
pub const VEC3_WIDTH: usize = 4;

/// y += alpha * x
#[inline]
pub fn axpy(alpha: f64, x: &[f64], y: &mut [f64]) {
    debug_assert_eq!(x.len(), y.len());
    for (yi, xi) in y.iter_mut().zip(x) {
        *yi += alpha * xi;
    }
}

/// x *= alpha
#[inline]
pub fn scal(alpha: f64, x: &mut [f64]) {
    for xi in x.iter_mut() {
        *xi *= alpha;
    }
}

/// y[r] += alpha * coeff[r] * x[r] for every `width`-wide record r.
pub fn axpy_per_record(alpha: f64, coeff: &[f64], x: &[f64], y: &mut [f64], width: usize) {
    debug_assert_eq!(x.len(), y.len());
    debug_assert_eq!(coeff.len() * width, x.len());
    for ((yr, xr), c) in y.chunks_exact_mut(width).zip(x.chunks_exact(width)).zip(coeff) {
        let a = alpha * c;
        for (yi, xi) in yr.iter_mut().zip(xr) {
            *yi += a * xi;
        }
    }
}

/// x[r] *= 1 - alpha * coeff[r] for every record r.
pub fn decay_per_record(alpha: f64, coeff: &[f64], x: &mut [f64], width: usize) {
    debug_assert_eq!(coeff.len() * width, x.len());
    for (xr, c) in x.chunks_exact_mut(width).zip(coeff) {
        let factor = 1.0 - alpha * c;
        for xi in xr.iter_mut() {
            *xi *= factor;
        }
    }
}

/// Product of two first-order moment expansions, truncated at first order:
/// `(a0 + a.g)(b0 + b.g) ~ a0*b0 + (a0*b_g + b0*a_g)`.
pub fn moment_product(a: &[f64], b: &[f64], out: &mut [f64]) {
    debug_assert_eq!(a.len(), b.len());
    debug_assert_eq!(a.len(), out.len());
    for ((o, ar), br) in out
        .chunks_exact_mut(MOMENT_WIDTH)
        .zip(a.chunks_exact(MOMENT_WIDTH))
        .zip(b.chunks_exact(MOMENT_WIDTH))
    {
        o[0] = ar[0] * br[0];
        for k in 1..MOMENT_WIDTH {
            o[k] = ar[0] * br[k] + br[0] * ar[k];
        }
    }
}

/// Sum of the value moments, i.e. the well-mixed totals of a batch.
pub fn sum_values(x: &[f64]) -> f64 {
    x.chunks_exact(MOMENT_WIDTH).map(|r| r[0]).sum()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_axpy_and_scal() {
        let x = [1.0, 2.0, 3.0];
        let mut y = [1.0, 1.0, 1.0];
        axpy(2.0, &x, &mut y);
        assert_eq!(y, [3.0, 5.0, 7.0]);
        scal(0.5, &mut y);
        assert_eq!(y, [1.5, 2.5, 3.5]);
    }

    #[test]
    fn test_per_record_coefficients() {
        let coeff = [1.0, 2.0];
        let x = [1.0, 1.0, 1.0, 1.0];
        let mut y = [0.0; 4];
        axpy_per_record(0.5, &coeff, &x, &mut y, 2);
        assert_eq!(y, [0.5, 0.5, 1.0, 1.0]);

        decay_per_record(0.25, &coeff, &mut y, 2);
        assert_eq!(y, [0.375, 0.375, 0.5, 0.5]);
    }

    #[test]
    fn test_moment_product_first_order() {
        let a = [2.0, 1.0, 0.0, 0.0];
        let b = [3.0, 0.0, 1.0, 0.0];
        let mut out = [0.0; 4];
        moment_product(&a, &b, &mut out);
        assert_eq!(out, [6.0, 3.0, 2.0, 0.0]);
    }
}
