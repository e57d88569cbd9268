//! Distributed dense matrix products.
//!
//! The columns of the right factor are split between ranks. Each rank
//! computes its column block of the product with the thread pool and the
//! blocks are then broadcast rank by rank, so every rank ends up with the
//! whole result. Longer chains are folded left to right.

use faer::{Mat, MatRef};

use crate::core::traits::Scalar;
use crate::error::{HlError, Result};
use crate::matrix::dense::{ColMajor, adjoint};
use crate::parallel::Comm;
use crate::parallel::thread_pool::{in_parallel_region, parallel_chunks};
use crate::utils::partition::group_range;

/// `factors[0] · factors[1] · …`, collective over `comm`.
pub fn product<C: Comm, T: Scalar>(comm: &C, factors: &[MatRef<'_, T>]) -> Result<Mat<T>> {
    assert!(
        !in_parallel_region(),
        "product must not be called from inside a parallel region"
    );
    let (first, rest) = factors
        .split_first()
        .ok_or_else(|| HlError::Shape("product of an empty list of factors".into()))?;
    let mut acc = ColMajor::from_mat(*first);
    for factor in rest {
        acc = product_pair(comm, &acc, &ColMajor::from_mat(*factor))?;
    }
    Ok(acc.to_mat())
}

pub(crate) fn product_pair<C: Comm, T: Scalar>(
    comm: &C,
    a: &ColMajor<T>,
    b: &ColMajor<T>,
) -> Result<ColMajor<T>> {
    if a.ncols() != b.nrows() {
        return Err(HlError::Shape(format!(
            "cannot multiply {}x{} by {}x{}",
            a.nrows(),
            a.ncols(),
            b.nrows(),
            b.ncols()
        )));
    }
    let (m, n) = (a.nrows(), b.ncols());
    let mut out = ColMajor::zeros(m, n);
    if m == 0 || n == 0 {
        return Ok(out);
    }

    let mine = group_range(0, n, comm.size(), comm.rank());
    let offset = mine.start;
    parallel_chunks(out.cols_mut(mine), m, |cols, chunk| {
        a.matmul_cols_into(b, cols.start + offset..cols.end + offset, chunk);
    });
    for root in 0..comm.size() {
        let block = group_range(0, n, comm.size(), root);
        comm.broadcast(out.cols_mut(block), root);
    }
    Ok(out)
}

/// `a · diag(weights)`: column `j` of `a` scaled by the `j`-th weight.
pub fn duo_product<T, I>(a: MatRef<'_, T>, weights: I) -> Result<Mat<T>>
where
    T: Scalar,
    I: IntoIterator<Item = T>,
{
    let weights: Vec<T> = weights.into_iter().collect();
    if weights.len() != a.ncols() {
        return Err(HlError::Shape(format!(
            "{} diagonal entries for {} columns",
            weights.len(),
            a.ncols()
        )));
    }
    let mut out = ColMajor::from_mat(a);
    let m = out.nrows();
    if m > 0 {
        parallel_chunks(out.as_mut_slice(), m, |cols, chunk| {
            for (col, &w) in chunk.chunks_exact_mut(m).zip(&weights[cols]) {
                col.iter_mut().for_each(|x| *x *= w);
            }
        });
    }
    Ok(out.to_mat())
}

/// `a · diag(weights) · aᴴ`, collective over `comm`.
pub fn trio_product<C, T, I>(comm: &C, a: MatRef<'_, T>, weights: I) -> Result<Mat<T>>
where
    C: Comm,
    T: Scalar,
    I: IntoIterator<Item = T>,
{
    let scaled = duo_product(a, weights)?;
    let a_h = adjoint(a);
    product(comm, &[scaled.as_ref(), a_h.as_ref()])
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::matrix::dense::matmul;
    use crate::parallel::LocalComm;
    use approx::assert_abs_diff_eq;

    #[test]
    fn solo_product_matches_serial() {
        let comm = LocalComm::solo();
        let a = Mat::from_fn(3, 4, |i, j| (i * 4 + j) as f64);
        let b = Mat::from_fn(4, 2, |i, j| (i as f64) - (j as f64));
        let c = product(&comm, &[a.as_ref(), b.as_ref()]).unwrap();
        let expected = matmul(a.as_ref(), b.as_ref());
        for i in 0..3 {
            for j in 0..2 {
                assert_abs_diff_eq!(c[(i, j)], expected[(i, j)], epsilon = 1e-12);
            }
        }
    }

    #[test]
    fn mismatched_shapes_and_empty_list() {
        let comm = LocalComm::solo();
        let a = Mat::from_fn(2, 3, |_, _| 1.0);
        assert!(matches!(
            product(&comm, &[a.as_ref(), a.as_ref()]),
            Err(HlError::Shape(_))
        ));
        assert!(product::<_, f64>(&comm, &[]).is_err());
    }

    #[test]
    fn diagonal_scaling() {
        let a = Mat::from_fn(2, 3, |i, j| (i + j) as f64);
        let d = duo_product(a.as_ref(), [1.0, 2.0, -1.0]).unwrap();
        assert_eq!(d[(1, 1)], 4.0);
        assert_eq!(d[(1, 2)], -3.0);
        assert!(duo_product(a.as_ref(), [1.0]).is_err());

        let comm = LocalComm::solo();
        let t = trio_product(&comm, a.as_ref(), [1.0, 1.0, 1.0]).unwrap();
        assert_eq!(t[(0, 1)], t[(1, 0)]);
        assert_abs_diff_eq!(t[(0, 0)], 5.0, epsilon = 1e-12);
    }
}
