//! Distributed dense kernels: products, triangular solves, Cholesky and QR.

pub mod cholesky;
pub mod equation_system;
pub mod gram_schmidt;
pub mod product;
pub mod triangular;

pub use cholesky::CholeskyDecomposition;
pub use equation_system::solve_linear_system;
pub use gram_schmidt::{QrDecomposition, iterated_gram_schmidt};
pub use product::{duo_product, product, trio_product};
pub use triangular::{back_substitute, forward_substitute};
