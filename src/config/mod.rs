//! Configuration module for loading simulation parameters.
//!
//! Parameters load from JSON and fall back to defaults when absent.

mod parameters;

pub use parameters::{ForceParameters, GridParameters, RngParameters, SimulationParameters};
