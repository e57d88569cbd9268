//! Partitioning, scheduling and convergence helpers.

pub mod combinatorics;
pub mod convergence;
pub mod partition;

pub use combinatorics::RoundRobin;
pub use convergence::FrobeniusConvergence;
pub use partition::{group_boundaries, group_consecutive, group_range, group_sizes};
