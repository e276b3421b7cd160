//! Batched component storage.
//!
//! Cells, molecular populations and reactions of the same kind share
//! flattened structure-of-arrays buffers so one kernel call updates the
//! whole batch:
//! - `BatchedVector`: handle-addressed, swap-removing record arena
//! - `Record`: standalone owner of detached values
//! - `kernels`: `axpy`/`scal`-style passes over flat arrays

pub mod kernels;
pub mod vector;

pub use kernels::{MOMENT_WIDTH, VEC3_WIDTH};
pub use vector::{grown_capacity, BatchedVector, Handle, Record};
