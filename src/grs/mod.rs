//! Generalized rotation scheme and its weighted-orthogonalization client.

pub mod actuator;
pub mod rotation;
pub mod weighted;

pub use actuator::{Actuator, GrsResult, Outcome, one_sided_relaxation, two_sided_relaxation};
pub use rotation::{Dimension, IndexedVectorPair, MatrixIndexPair, RotationSpec, givens_matrix};
pub use weighted::{weight_orthogonalized, weight_orthogonalized_with, weighted_rotation};
