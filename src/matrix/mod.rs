//! Matrix module: dense column-major storage and helpers over `faer::Mat`.

pub mod dense;
pub use dense::{ColMajor, adjoint, fro_norm, identity, matmul};
