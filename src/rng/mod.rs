//! Gaussian deviate source for stochastic forces.
//!
//! A background thread keeps two buffers of normal deviates filled. The
//! integrator drains one buffer at a time; when it runs out it hands the
//! spent buffer back for refilling and takes the next filled one, blocking
//! only when no filled buffer is ready yet.
//!
//! ```text
//!   producer ──filled──▶ consumer
//!      ▲                    │
//!      └──────drained───────┘
//! ```
//!
//! The deviate stream depends only on the seed and on the sequence of
//! request sizes, never on thread timing.

use std::sync::mpsc::{sync_channel, Receiver, SyncSender};
use std::thread::JoinHandle;

use rand::prelude::*;
use rand_distr::Normal;

use crate::config::RngParameters;
use crate::error::RngError;

/// Buffers circulating between producer and consumer.
const BUFFERS_IN_FLIGHT: usize = 2;

/// Seed offset for the synchronous fallback stream.
const DIRECT_STREAM_SALT: u64 = 0x9e37_79b9_7f4a_7c15;

pub struct GaussianSource {
    filled: Option<Receiver<Vec<f64>>>,
    drained: Option<SyncSender<Vec<f64>>>,
    worker: Option<JoinHandle<()>>,
    current: Vec<f64>,
    cursor: usize,
    buffer_len: usize,
    direct: StdRng,
    scratch: Vec<f64>,
    normal: Normal<f64>,
}

impl GaussianSource {
    /// Start the producer for N(mean, variance) deviates.
    pub fn initialize(
        seed: u64,
        mean: f64,
        variance: f64,
        buffer_len: usize,
    ) -> Result<Self, RngError> {
        let invalid = RngError::InvalidDistribution { mean, variance };
        if !mean.is_finite() || !variance.is_finite() || variance < 0.0 {
            return Err(invalid);
        }
        let normal = Normal::new(mean, variance.sqrt()).map_err(|_| invalid)?;
        let buffer_len = buffer_len.max(1);

        let (filled_tx, filled_rx) = sync_channel::<Vec<f64>>(BUFFERS_IN_FLIGHT);
        let (drained_tx, drained_rx) = sync_channel::<Vec<f64>>(BUFFERS_IN_FLIGHT + 1);
        for _ in 0..BUFFERS_IN_FLIGHT {
            drained_tx
                .send(vec![0.0; buffer_len])
                .map_err(|_| RngError::ProducerStopped)?;
        }

        let worker = std::thread::Builder::new()
            .name("gaussian-producer".into())
            .spawn(move || {
                let mut rng = StdRng::seed_from_u64(seed);
                for mut buffer in drained_rx {
                    for value in buffer.iter_mut() {
                        *value = normal.sample(&mut rng);
                    }
                    if filled_tx.send(buffer).is_err() {
                        break;
                    }
                }
            })
            .map_err(|e| RngError::Spawn(e.to_string()))?;

        log::info!(
            "Gaussian source started (seed {}, mean {}, variance {}, {} deviates per buffer)",
            seed,
            mean,
            variance,
            buffer_len
        );

        Ok(Self {
            filled: Some(filled_rx),
            drained: Some(drained_tx),
            worker: Some(worker),
            current: Vec::new(),
            cursor: 0,
            buffer_len,
            direct: StdRng::seed_from_u64(seed ^ DIRECT_STREAM_SALT),
            scratch: Vec::new(),
            normal,
        })
    }

    pub fn from_params(params: &RngParameters) -> Result<Self, RngError> {
        Self::initialize(params.seed, params.mean, params.variance, params.buffer_len)
    }

    pub fn buffer_len(&self) -> usize {
        self.buffer_len
    }

    /// Next `n` consecutive deviates.
    ///
    /// Requests larger than one buffer are served synchronously.
    pub fn sample(&mut self, n: usize) -> Result<&[f64], RngError> {
        if n > self.buffer_len {
            let mut scratch = std::mem::take(&mut self.scratch);
            scratch.resize(n, 0.0);
            self.direct_sample(n, &mut scratch);
            self.scratch = scratch;
            return Ok(&self.scratch[..n]);
        }

        if self.cursor + n > self.current.len() {
            let next = self
                .filled
                .as_ref()
                .ok_or(RngError::ProducerStopped)?
                .recv()
                .map_err(|_| RngError::ProducerStopped)?;
            let spent = std::mem::replace(&mut self.current, next);
            self.cursor = 0;
            if !spent.is_empty() {
                if let Some(drained) = &self.drained {
                    // A stopped producer surfaces on the next recv
                    let _ = drained.try_send(spent);
                }
            }
        }

        let start = self.cursor;
        self.cursor += n;
        Ok(&self.current[start..start + n])
    }

    /// Fill `out[..n]` on the calling thread.
    pub fn direct_sample(&mut self, n: usize, out: &mut [f64]) {
        for value in out.iter_mut().take(n) {
            *value = self.normal.sample(&mut self.direct);
        }
    }
}

impl Drop for GaussianSource {
    fn drop(&mut self) {
        // Closing both channels unblocks the producer wherever it waits
        self.filled.take();
        self.drained.take();
        if let Some(worker) = self.worker.take() {
            let _ = worker.join();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rejects_negative_variance() {
        assert!(matches!(
            GaussianSource::initialize(1, 0.0, -1.0, 16),
            Err(RngError::InvalidDistribution { .. })
        ));
    }

    #[test]
    fn test_sample_across_buffer_swap() {
        let mut source = GaussianSource::initialize(7, 0.0, 1.0, 8).unwrap();
        let mut collected = Vec::new();
        for _ in 0..10 {
            collected.extend_from_slice(source.sample(3).unwrap());
        }
        assert_eq!(collected.len(), 30);
        assert!(collected.iter().all(|v| v.is_finite()));
    }

    #[test]
    fn test_oversized_request_falls_back() {
        let mut source = GaussianSource::initialize(7, 0.0, 1.0, 4).unwrap();
        assert_eq!(source.sample(100).unwrap().len(), 100);
    }
}
