//! Genes as transcription inputs.

use crate::batch::{BatchedVector, Handle};
use crate::error::{Result, SimError};

/// A gene with a fixed copy number and a per-instance activation level in
/// `[0, 1]`.
#[derive(Debug, Clone)]
pub struct Gene {
    pub name: String,
    pub copy_number: f64,
    /// Activation given to new instances
    pub initial_activation: f64,
    pub activation: BatchedVector,
}

impl Gene {
    pub fn new(name: impl Into<String>, copy_number: f64, activation: f64) -> Result<Self> {
        if !(0.0..=1.0).contains(&activation) {
            return Err(SimError::InvalidParameter {
                name: "gene activation",
                reason: format!("must lie in [0, 1], got {activation}"),
            });
        }
        Ok(Self {
            name: name.into(),
            copy_number,
            initial_activation: activation,
            activation: BatchedVector::new(1),
        })
    }

    pub fn len(&self) -> usize {
        self.activation.len()
    }

    pub fn is_empty(&self) -> bool {
        self.activation.is_empty()
    }

    /// Transcription drive of instance `slot`: copy number times activation.
    pub fn drive(&self, slot: usize) -> f64 {
        self.copy_number * self.activation.as_slice()[slot]
    }

    pub fn set_activation(&mut self, slot: usize, activation: f64) {
        self.activation.as_mut_slice()[slot] = activation.clamp(0.0, 1.0);
    }

    pub(crate) fn add_instance(&mut self) -> Result<Handle> {
        Ok(self.activation.add_values(&[self.initial_activation])?)
    }

    pub(crate) fn remove_instance(&mut self, slot: usize) -> Result<()> {
        let handle = self
            .activation
            .handle_at(slot)
            .ok_or(SimError::DimensionMismatch {
                context: "gene activation",
                expected: slot + 1,
                found: self.activation.len(),
            })?;
        self.activation.remove(handle)?;
        Ok(())
    }
}
