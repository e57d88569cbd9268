//! Distributed Cholesky decomposition `A = L·Lᴴ`.
//!
//! Columns are computed strictly in order. For column `j` every rank computes
//! the pivot, the rows below the diagonal are split between ranks, and the
//! pieces are broadcast so that every rank holds the finished column before
//! moving on.

use std::cell::OnceCell;

use faer::{Mat, MatRef};
use tracing::trace;

use crate::core::traits::Scalar;
use crate::error::{HlError, Result};
use crate::matrix::dense::{ColMajor, adjoint};
use crate::parallel::Comm;
use crate::utils::partition::group_range;

/// Lazily factored Hermitian positive-definite matrix.
///
/// The first call to [`l`](Self::l) or [`lt`](Self::lt) performs the
/// factorization and is collective over the process group.
pub struct CholeskyDecomposition<'c, C, T> {
    comm: &'c C,
    matrix: ColMajor<T>,
    lower: OnceCell<Mat<T>>,
    upper: OnceCell<Mat<T>>,
}

impl<'c, C: Comm, T: Scalar> CholeskyDecomposition<'c, C, T> {
    pub fn new(comm: &'c C, matrix: MatRef<'_, T>) -> Result<Self> {
        if matrix.nrows() != matrix.ncols() {
            return Err(HlError::Shape(format!(
                "cannot factor a {}x{} matrix",
                matrix.nrows(),
                matrix.ncols()
            )));
        }
        Ok(Self {
            comm,
            matrix: ColMajor::from_mat(matrix),
            lower: OnceCell::new(),
            upper: OnceCell::new(),
        })
    }

    /// Lower-triangular factor `L`.
    pub fn l(&self) -> Result<&Mat<T>> {
        match self.lower.get() {
            Some(l) => Ok(l),
            None => {
                let l = self.factor()?.to_mat();
                Ok(self.lower.get_or_init(|| l))
            }
        }
    }

    /// `Lᴴ`.
    pub fn lt(&self) -> Result<&Mat<T>> {
        match self.upper.get() {
            Some(u) => Ok(u),
            None => {
                let u = adjoint(self.l()?.as_ref());
                Ok(self.upper.get_or_init(|| u))
            }
        }
    }

    fn factor(&self) -> Result<ColMajor<T>> {
        let a = &self.matrix;
        let n = a.nrows();
        let (rank, size) = (self.comm.rank(), self.comm.size());

        let mut l = ColMajor::zeros(n, n);
        for j in 0..n {
            for i in j..n {
                l[(i, j)] = a[(i, j)];
            }
        }

        for j in 0..n {
            let pivot = a[(j, j)].re() - (0..j).map(|k| l[(j, k)].abs_sqr()).sum::<f64>();
            if !(pivot > 0.0) {
                return Err(HlError::NotPositiveDefinite { column: j });
            }
            let diag = pivot.sqrt();
            l[(j, j)] = T::from_real(diag);

            for i in group_range(j + 1, n, size, rank) {
                let mut s = a[(i, j)];
                for k in 0..j {
                    s -= l[(i, k)] * l[(j, k)].conj();
                }
                l[(i, j)] = s.scale(1.0 / diag);
            }
            for root in 0..size {
                let rows = group_range(j + 1, n, size, root);
                if rows.is_empty() {
                    break;
                }
                self.comm.broadcast(&mut l.col_mut(j)[rows], root);
            }
            trace!(column = j, pivot = diag, "factored Cholesky column");
        }
        Ok(l)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::matrix::dense::matmul;
    use crate::parallel::LocalComm;
    use approx::assert_abs_diff_eq;

    #[test]
    fn factors_small_spd_matrix() {
        let comm = LocalComm::solo();
        let a = Mat::from_fn(3, 3, |i, j| match (i, j) {
            (0, 0) => 4.0,
            (1, 1) => 5.0,
            (2, 2) => 6.0,
            _ => 1.0,
        });
        let chol = CholeskyDecomposition::new(&comm, a.as_ref()).unwrap();
        let l = chol.l().unwrap();
        assert_abs_diff_eq!(l[(0, 0)], 2.0, epsilon = 1e-15);
        assert_eq!(l[(0, 2)], 0.0);
        let llt = matmul(l.as_ref(), chol.lt().unwrap().as_ref());
        for i in 0..3 {
            for j in 0..3 {
                assert_abs_diff_eq!(llt[(i, j)], a[(i, j)], epsilon = 1e-12);
            }
        }
    }

    #[test]
    fn indefinite_matrix_is_reported() {
        let comm = LocalComm::solo();
        let a = Mat::from_fn(2, 2, |i, j| if i == j { 1.0 } else { 2.0 });
        let chol = CholeskyDecomposition::new(&comm, a.as_ref()).unwrap();
        assert!(matches!(chol.l(), Err(HlError::NotPositiveDefinite { column: 1 })));
    }
}
