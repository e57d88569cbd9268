//! Dense column-major working storage on top of Faer.
//!
//! Public entry points take and return `faer::Mat<T>`. Internally the kernels
//! work on [`ColMajor`], whose columns are contiguous slices that can be split
//! between threads, broadcast as bytes, or copied into shared memory.

use faer::{Mat, MatRef};
use std::ops::{Index, IndexMut, Range};

use crate::core::traits::Scalar;
use crate::core::wrappers;

/// Owned column-major matrix.
#[derive(Clone, Debug, PartialEq)]
pub struct ColMajor<T> {
    nrows: usize,
    ncols: usize,
    data: Vec<T>,
}

impl<T: Scalar> ColMajor<T> {
    pub fn zeros(nrows: usize, ncols: usize) -> Self {
        Self {
            nrows,
            ncols,
            data: vec![T::zero(); nrows * ncols],
        }
    }

    pub fn identity(n: usize) -> Self {
        let mut m = Self::zeros(n, n);
        for i in 0..n {
            m[(i, i)] = T::one();
        }
        m
    }

    /// Construct from raw column-major storage.
    pub fn from_raw(nrows: usize, ncols: usize, data: Vec<T>) -> Self {
        assert_eq!(data.len(), nrows * ncols, "Storage does not match the shape");
        Self { nrows, ncols, data }
    }

    pub fn from_mat(m: MatRef<'_, T>) -> Self {
        let (nrows, ncols) = (m.nrows(), m.ncols());
        let mut data = Vec::with_capacity(nrows * ncols);
        for j in 0..ncols {
            data.extend((0..nrows).map(|i| m[(i, j)]));
        }
        Self { nrows, ncols, data }
    }

    pub fn to_mat(&self) -> Mat<T> {
        Mat::from_fn(self.nrows, self.ncols, |i, j| self[(i, j)])
    }

    pub fn as_mat_ref(&self) -> MatRef<'_, T> {
        MatRef::from_column_major_slice(&self.data, self.nrows, self.ncols)
    }

    pub fn nrows(&self) -> usize {
        self.nrows
    }

    pub fn ncols(&self) -> usize {
        self.ncols
    }

    pub fn as_slice(&self) -> &[T] {
        &self.data
    }

    pub fn as_mut_slice(&mut self) -> &mut [T] {
        &mut self.data
    }

    pub fn col(&self, j: usize) -> &[T] {
        &self.data[j * self.nrows..(j + 1) * self.nrows]
    }

    pub fn col_mut(&mut self, j: usize) -> &mut [T] {
        &mut self.data[j * self.nrows..(j + 1) * self.nrows]
    }

    /// Contiguous storage of the columns in `cols`.
    pub fn cols(&self, cols: Range<usize>) -> &[T] {
        &self.data[cols.start * self.nrows..cols.end * self.nrows]
    }

    pub fn cols_mut(&mut self, cols: Range<usize>) -> &mut [T] {
        &mut self.data[cols.start * self.nrows..cols.end * self.nrows]
    }

    /// Keeps the first `ncols` columns.
    pub fn truncate_cols(&mut self, ncols: usize) {
        assert!(ncols <= self.ncols);
        self.data.truncate(ncols * self.nrows);
        self.ncols = ncols;
    }

    /// Keeps the columns whose index satisfies `keep`, in order.
    pub fn retain_cols(&mut self, mut keep: impl FnMut(usize) -> bool) {
        let nrows = self.nrows;
        let mut kept = 0;
        for j in 0..self.ncols {
            if keep(j) {
                if kept != j {
                    self.data.copy_within(j * nrows..(j + 1) * nrows, kept * nrows);
                }
                kept += 1;
            }
        }
        self.truncate_cols(kept);
    }

    /// Conjugate transpose.
    pub fn adjoint(&self) -> Self {
        let mut out = Self::zeros(self.ncols, self.nrows);
        for j in 0..self.ncols {
            for i in 0..self.nrows {
                out[(j, i)] = self[(i, j)].conj();
            }
        }
        out
    }

    /// Writes columns `cols` of `self · rhs` into `out`, column-major.
    pub fn matmul_cols_into(&self, rhs: &Self, cols: Range<usize>, out: &mut [T]) {
        assert_eq!(self.ncols, rhs.nrows, "Inner dimensions do not agree");
        assert_eq!(out.len(), cols.len() * self.nrows, "Output block has the wrong size");
        if self.nrows == 0 {
            return;
        }
        for (dst, j) in out.chunks_exact_mut(self.nrows).zip(cols) {
            dst.fill(T::zero());
            for (k, &b) in rhs.col(j).iter().enumerate() {
                if b != T::zero() {
                    wrappers::sub_scaled(dst, -b, self.col(k));
                }
            }
        }
    }

    /// Serial product `self · rhs`.
    pub fn matmul(&self, rhs: &Self) -> Self {
        let mut out = Self::zeros(self.nrows, rhs.ncols);
        self.matmul_cols_into(rhs, 0..rhs.ncols, &mut out.data);
        out
    }
}

impl<T> Index<(usize, usize)> for ColMajor<T> {
    type Output = T;

    fn index(&self, (i, j): (usize, usize)) -> &T {
        debug_assert!(i < self.nrows && j < self.ncols);
        &self.data[j * self.nrows + i]
    }
}

impl<T> IndexMut<(usize, usize)> for ColMajor<T> {
    fn index_mut(&mut self, (i, j): (usize, usize)) -> &mut T {
        debug_assert!(i < self.nrows && j < self.ncols);
        &mut self.data[j * self.nrows + i]
    }
}

/// Dense product of two Faer matrices, computed serially.
pub fn matmul<T: Scalar>(a: MatRef<'_, T>, b: MatRef<'_, T>) -> Mat<T> {
    ColMajor::from_mat(a)
        .matmul(&ColMajor::from_mat(b))
        .to_mat()
}

/// Conjugate transpose of a Faer matrix.
pub fn adjoint<T: Scalar>(a: MatRef<'_, T>) -> Mat<T> {
    Mat::from_fn(a.ncols(), a.nrows(), |i, j| a[(j, i)].conj())
}

/// Identity matrix of order `n`.
pub fn identity<T: Scalar>(n: usize) -> Mat<T> {
    Mat::from_fn(n, n, |i, j| if i == j { T::one() } else { T::zero() })
}

/// Frobenius norm of a Faer matrix.
pub fn fro_norm<T: Scalar>(a: MatRef<'_, T>) -> f64 {
    let mut sum = 0.0;
    for j in 0..a.ncols() {
        for i in 0..a.nrows() {
            sum += a[(i, j)].abs_sqr();
        }
    }
    sum.sqrt()
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;
    use num_complex::Complex64;

    #[test]
    fn from_raw_is_column_major() {
        let m = ColMajor::from_raw(2, 3, vec![1.0, 2.0, 3.0, 4.0, 5.0, 6.0]);
        assert_eq!(m[(1, 0)], 2.0);
        assert_eq!(m[(0, 2)], 5.0);
        assert_eq!(m.col(1), &[3.0, 4.0]);
        let back = ColMajor::from_mat(m.to_mat().as_ref());
        assert_eq!(back, m);
    }

    #[test]
    fn small_product() {
        let a = ColMajor::from_raw(2, 2, vec![1.0, 3.0, 2.0, 4.0]);
        let b = ColMajor::from_raw(2, 1, vec![5.0, 6.0]);
        let c = a.matmul(&b);
        assert_eq!(c.as_slice(), &[17.0, 39.0]);
    }

    #[test]
    fn adjoint_conjugates() {
        let m = Mat::from_fn(2, 1, |i, _| Complex64::new(i as f64, 1.0));
        let h = adjoint(m.as_ref());
        assert_eq!(h.nrows(), 1);
        assert_eq!(h[(0, 1)], Complex64::new(1.0, -1.0));
    }

    #[test]
    fn retain_and_truncate_columns() {
        let mut m = ColMajor::from_raw(1, 4, vec![0.0, 1.0, 2.0, 3.0]);
        m.retain_cols(|j| j != 1);
        assert_eq!(m.as_slice(), &[0.0, 2.0, 3.0]);
        m.truncate_cols(2);
        assert_eq!(m.ncols(), 2);
        assert_abs_diff_eq!(fro_norm(m.as_mat_ref()), 2.0, epsilon = 1e-15);
    }
}
