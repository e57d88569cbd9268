//! hylinal: distributed dense linear algebra for quantum-chemistry workloads
//!
//! Matrices are dense, column-major and replicated on every rank. Each routine
//! is collective over a process group ([`parallel::Comm`]): the work is split
//! between hosts, between the ranks of a host and between the threads of a
//! rank, and the pieces are reassembled through host-local shared memory and
//! broadcasts so that every rank returns the full result.
//!
//! Besides the kernels in [`linalg`], the crate provides the generalized
//! rotation scheme in [`grs`] and its weighted-orthogonalization client.

pub mod parallel;

pub mod config;
pub mod core;
pub mod error;
pub mod grs;
pub mod linalg;
pub mod matrix;
pub mod utils;

// Re-exports for convenience
pub use config::{ActuatorOptions, GramSchmidtOptions, Sidedness, WeightedOrthoOptions};
pub use core::Scalar;
pub use error::{HlError, Result};
pub use grs::{
    Actuator, GrsResult, Outcome, RotationSpec, weight_orthogonalized, weight_orthogonalized_with,
};
pub use linalg::{
    CholeskyDecomposition, QrDecomposition, back_substitute, duo_product, forward_substitute,
    iterated_gram_schmidt, product, solve_linear_system, trio_product,
};
pub use parallel::{Comm, HostBasedComms, HostTopology, LocalComm, SharedMatrix, SharedMemory};
pub use utils::{FrobeniusConvergence, RoundRobin, group_range};
