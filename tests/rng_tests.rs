//! Gaussian source tests: reproducibility across the background producer
//! and rough distribution checks.

use cell_agent_sim::config::RngParameters;
use cell_agent_sim::rng::GaussianSource;

fn drain(source: &mut GaussianSource, sizes: &[usize]) -> Vec<f64> {
    let mut out = Vec::new();
    for n in sizes {
        out.extend_from_slice(source.sample(*n).unwrap());
    }
    out
}

#[test]
fn test_same_seed_same_stream() {
    let sizes = [3, 7, 1, 16, 5, 5, 12, 2, 9, 64, 4];
    let mut a = GaussianSource::initialize(99, 0.0, 1.0, 16).unwrap();
    let mut b = GaussianSource::initialize(99, 0.0, 1.0, 16).unwrap();
    assert_eq!(drain(&mut a, &sizes), drain(&mut b, &sizes));

    let mut c = GaussianSource::initialize(100, 0.0, 1.0, 16).unwrap();
    assert_ne!(drain(&mut a, &sizes), drain(&mut c, &sizes));
}

#[test]
fn test_from_params_uses_seed() {
    let params = RngParameters {
        seed: 5,
        buffer_len: 32,
        ..Default::default()
    };
    let mut a = GaussianSource::from_params(&params).unwrap();
    let mut b = GaussianSource::initialize(5, 0.0, 1.0, 32).unwrap();
    assert_eq!(a.buffer_len(), 32);
    assert_eq!(drain(&mut a, &[10, 10, 10]), drain(&mut b, &[10, 10, 10]));
}

#[test]
fn test_moments_are_roughly_right() {
    let mut source = GaussianSource::initialize(2024, 3.0, 4.0, 1000).unwrap();
    let samples = drain(&mut source, &[1000; 20]);
    let n = samples.len() as f64;
    let mean = samples.iter().sum::<f64>() / n;
    let variance = samples.iter().map(|x| (x - mean).powi(2)).sum::<f64>() / (n - 1.0);
    assert!((mean - 3.0).abs() < 0.1, "mean {mean}");
    assert!((variance - 4.0).abs() < 0.3, "variance {variance}");
}

#[test]
fn test_zero_variance_is_constant() {
    let mut source = GaussianSource::initialize(1, 2.5, 0.0, 8).unwrap();
    assert!(drain(&mut source, &[4, 4, 4]).iter().all(|x| *x == 2.5));
}

#[test]
fn test_direct_sampling_fills_requested_prefix() {
    let mut source = GaussianSource::initialize(3, 0.0, 1.0, 8).unwrap();
    let mut out = [f64::NAN; 6];
    source.direct_sample(4, &mut out);
    assert!(out[..4].iter().all(|x| x.is_finite()));
    assert!(out[4..].iter().all(|x| x.is_nan()));
}
