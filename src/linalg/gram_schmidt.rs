//! QR decomposition by block-sequential iterated Gram-Schmidt.
//!
//! The working matrix is split into column blocks, one per rank, processed in
//! rank order. The owner orthonormalizes its block with classical
//! Gram-Schmidt, repeating a projection whenever it cancelled too much of the
//! column, and broadcasts it; ranks whose blocks come later project it out of
//! their own block right away. A rectangular input is completed to a square
//! `Q` by appending the identity and dropping the appended columns that end
//! up spent.

use faer::{Mat, MatRef};
use tracing::trace;

use crate::config::GramSchmidtOptions;
use crate::core::traits::Scalar;
use crate::core::wrappers::{div_real, dot, norm, sub_scaled};
use crate::error::{HlError, Result};
use crate::linalg::product::product;
use crate::matrix::dense::{ColMajor, adjoint};
use crate::parallel::Comm;
use crate::parallel::thread_pool::parallel_chunks;
use crate::utils::partition::group_range;

/// `A = Q·R` with square unitary `Q` and upper-triangular `R`.
#[derive(Clone, Debug)]
pub struct QrDecomposition<T> {
    pub q: Mat<T>,
    pub r: Mat<T>,
}

/// Collective over `comm`. `a` must have at least as many rows as columns.
pub fn iterated_gram_schmidt<C: Comm, T: Scalar>(
    comm: &C,
    a: MatRef<'_, T>,
    options: &GramSchmidtOptions,
) -> Result<QrDecomposition<T>> {
    options.validate()?;
    let (m, n) = (a.nrows(), a.ncols());
    if m == 0 || n == 0 || m < n {
        return Err(HlError::Shape(format!(
            "QR needs a non-empty matrix with rows >= columns, got {m}x{n}"
        )));
    }

    let mut q = ColMajor::from_mat(a);
    let width = if m == n {
        n
    } else {
        let mut data = q.as_slice().to_vec();
        data.extend_from_slice(ColMajor::<T>::identity(m).as_slice());
        q = ColMajor::from_raw(m, n + m, data);
        n + m
    };
    let (rank, size) = (comm.rank(), comm.size());
    let mine = group_range(0, width, size, rank);

    for owner in 0..size {
        let block = group_range(0, width, size, owner);
        if block.is_empty() {
            break;
        }
        if owner == rank {
            orthonormalize_block(&mut q, block.clone(), n, options);
        }
        comm.broadcast(q.cols_mut(block.clone()), owner);
        if rank > owner && !mine.is_empty() {
            let (done, pending) = q.as_mut_slice().split_at_mut(mine.start * m);
            let basis = &done[block.start * m..block.end * m];
            let own = &mut pending[..mine.len() * m];
            parallel_chunks(own, m, |_, chunk| {
                for x in chunk.chunks_exact_mut(m) {
                    for o in basis.chunks_exact(m) {
                        let c = dot(o, x);
                        sub_scaled(x, c, o);
                    }
                }
            });
        }
        trace!(rank, owner, columns = ?block, "orthonormalized Gram-Schmidt block");
    }

    if width > n {
        let thresh = options.zero_norm_abs_thresh;
        let norms: Vec<f64> = (0..width).map(|j| norm(q.col(j))).collect();
        q.retain_cols(|j| j < n || norms[j] >= thresh);
        if q.ncols() < m {
            return Err(HlError::Domain(format!(
                "only {} of {m} columns survived orthonormalization",
                q.ncols()
            )));
        }
        q.truncate_cols(m);
    }

    let q = q.to_mat();
    let q_h = adjoint(q.as_ref());
    let mut r = product(comm, &[q_h.as_ref(), a])?;
    for j in 0..n {
        for i in n..m {
            r[(i, j)] = T::zero();
        }
    }
    Ok(QrDecomposition { q, r })
}

/// Orthonormalizes the columns `block` of `q` in place. Columns before the
/// block are already orthonormal and projected out of it. Columns at or past
/// `first_appended` that collapse below the zero threshold are zeroed.
fn orthonormalize_block<T: Scalar>(
    q: &mut ColMajor<T>,
    block: std::ops::Range<usize>,
    first_appended: usize,
    options: &GramSchmidtOptions,
) {
    let m = q.nrows();
    let start = block.start;
    for k in block {
        let (done, rest) = q.as_mut_slice().split_at_mut(k * m);
        let basis = &done[start * m..];
        let x = &mut rest[..m];

        let mut passes = 0;
        loop {
            let before = norm(x);
            for o in basis.chunks_exact(m) {
                let c = dot(o, x);
                sub_scaled(x, c, o);
            }
            passes += 1;
            let after = norm(x);
            if after > before * options.reortho_thresh_factor || passes > options.max_reorthos {
                break;
            }
        }

        let len = norm(x);
        if len < options.zero_norm_abs_thresh && k >= first_appended {
            x.fill(T::zero());
        } else {
            div_real(x, len);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::matrix::dense::matmul;
    use crate::parallel::LocalComm;
    use approx::assert_abs_diff_eq;

    #[test]
    fn square_qr_round_trip() {
        let comm = LocalComm::solo();
        let a = Mat::from_fn(3, 3, |i, j| if i == j { 2.0 } else { (i + j) as f64 * 0.5 });
        let qr = iterated_gram_schmidt(&comm, a.as_ref(), &GramSchmidtOptions::default()).unwrap();
        let back = matmul(qr.q.as_ref(), qr.r.as_ref());
        for i in 0..3 {
            for j in 0..3 {
                assert_abs_diff_eq!(back[(i, j)], a[(i, j)], epsilon = 1e-10);
            }
            for j in 0..i {
                assert_abs_diff_eq!(qr.r[(i, j)], 0.0, epsilon = 1e-10);
            }
        }
    }

    #[test]
    fn tall_input_gets_square_q() {
        let comm = LocalComm::solo();
        let a = Mat::from_fn(4, 2, |i, j| (1 + i * 2 + j) as f64);
        let qr = iterated_gram_schmidt(&comm, a.as_ref(), &GramSchmidtOptions::default()).unwrap();
        assert_eq!((qr.q.nrows(), qr.q.ncols()), (4, 4));
        assert_eq!((qr.r.nrows(), qr.r.ncols()), (4, 2));
        let qhq = matmul(adjoint(qr.q.as_ref()).as_ref(), qr.q.as_ref());
        for i in 0..4 {
            for j in 0..4 {
                assert_abs_diff_eq!(qhq[(i, j)], if i == j { 1.0 } else { 0.0 }, epsilon = 1e-10);
            }
        }
        assert_eq!(qr.r[(3, 1)], 0.0);
    }

    #[test]
    fn wide_input_rejected() {
        let comm = LocalComm::solo();
        let a = Mat::from_fn(2, 3, |_, _| 1.0);
        assert!(matches!(
            iterated_gram_schmidt(&comm, a.as_ref(), &GramSchmidtOptions::default()),
            Err(HlError::Shape(_))
        ));
    }
}
