pub mod options;

pub use options::{ActuatorOptions, GramSchmidtOptions, Sidedness, WeightedOrthoOptions};
