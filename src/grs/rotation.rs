//! Plane rotations and the index pairs they act on.

use faer::Mat;

use crate::core::traits::Scalar;
use crate::error::{HlError, Result};
use crate::matrix::dense::identity;

/// Cosine and sine of a plane rotation angle.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct RotationSpec {
    pub cosine: f64,
    pub sine: f64,
}

impl RotationSpec {
    pub fn identity() -> Self {
        Self {
            cosine: 1.0,
            sine: 0.0,
        }
    }

    pub fn from_angle(angle: f64) -> Self {
        let (sine, cosine) = angle.sin_cos();
        Self { cosine, sine }
    }

    pub fn angle(&self) -> f64 {
        self.sine.atan2(self.cosine)
    }

    /// The same rotation with its angle scaled by `1 − relax`.
    pub fn relaxed(&self, relax: f64) -> Self {
        Self::from_angle((1.0 - relax) * self.angle())
    }
}

impl Default for RotationSpec {
    fn default() -> Self {
        Self::identity()
    }
}

/// Givens rotation of order `size` acting on indices `i` and `j`: the
/// identity with `c` at both diagonal positions, `−s` above the diagonal and
/// `s` below it.
pub fn givens_matrix<T: Scalar>(spec: RotationSpec, size: usize, i: usize, j: usize) -> Result<Mat<T>> {
    if size < 2 {
        return Err(HlError::Shape(format!(
            "a Givens rotation needs order 2 or more, got {size}"
        )));
    }
    if i == j {
        return Err(HlError::Domain(format!("rotation indices are both {i}")));
    }
    let (lo, hi) = (i.min(j), i.max(j));
    if hi >= size {
        return Err(HlError::Domain(format!(
            "rotation index {hi} out of range for order {size}"
        )));
    }
    let mut g = identity::<T>(size);
    g[(lo, lo)] = T::from_real(spec.cosine);
    g[(hi, hi)] = T::from_real(spec.cosine);
    g[(lo, hi)] = T::from_real(-spec.sine);
    g[(hi, lo)] = T::from_real(spec.sine);
    Ok(g)
}

/// Whether a pair indexes rows or columns.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Dimension {
    Rows,
    Columns,
}

/// Two row or column indices of a matrix.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct MatrixIndexPair {
    pub dimension: Dimension,
    pub first: usize,
    pub second: usize,
}

impl MatrixIndexPair {
    pub fn columns(first: usize, second: usize) -> Self {
        Self {
            dimension: Dimension::Columns,
            first,
            second,
        }
    }

    pub fn rows(first: usize, second: usize) -> Self {
        Self {
            dimension: Dimension::Rows,
            first,
            second,
        }
    }
}

/// Two vectors of a matrix together with their indices.
#[derive(Clone, Copy, Debug)]
pub struct IndexedVectorPair<'a, T> {
    pub indices: MatrixIndexPair,
    pub first: &'a [T],
    pub second: &'a [T],
}
