//! Convergence predicates for iterative refinement.

use faer::MatRef;

use crate::core::traits::Scalar;

/// Stops once successive iterates differ by less than `tol` in Frobenius norm.
#[derive(Clone, Copy, Debug)]
pub struct FrobeniusConvergence {
    pub tol: f64,
}

impl FrobeniusConvergence {
    pub fn new(tol: f64) -> Self {
        Self { tol }
    }

    /// Returns true when `‖curr − prev‖_F < tol`.
    pub fn check<T: Scalar>(&self, prev: MatRef<'_, T>, curr: MatRef<'_, T>) -> bool {
        frobenius_distance(prev, curr) < self.tol
    }
}

/// `‖a − b‖_F` for two matrices of the same shape.
pub fn frobenius_distance<T: Scalar>(a: MatRef<'_, T>, b: MatRef<'_, T>) -> f64 {
    assert_eq!(a.nrows(), b.nrows(), "Row counts differ");
    assert_eq!(a.ncols(), b.ncols(), "Column counts differ");
    let mut sum = 0.0;
    for j in 0..a.ncols() {
        for i in 0..a.nrows() {
            sum += (a[(i, j)] - b[(i, j)]).abs_sqr();
        }
    }
    sum.sqrt()
}
