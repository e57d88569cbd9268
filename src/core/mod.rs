//! Scalar trait and column kernels shared by every numerical routine.

pub mod traits;
pub mod wrappers;

pub use traits::{Scalar, as_bytes, as_bytes_mut};
