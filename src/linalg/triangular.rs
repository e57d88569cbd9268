//! Distributed forward and back substitution.
//!
//! Solution columns are independent, so they are split three ways: between
//! hosts, between the ranks of a host, and between threads. Every host
//! assembles its share in a shared-memory matrix, then the first rank of each
//! host broadcasts the host's block to the other hosts.
//!
//! The triangle opposite the one used is taken to be zero and never checked.

use faer::{Mat, MatRef};

use crate::core::traits::Scalar;
use crate::core::wrappers::sub_scaled;
use crate::error::{HlError, Result};
use crate::matrix::dense::ColMajor;
use crate::parallel::thread_pool::parallel_chunks;
use crate::parallel::{Comm, SharedMatrix};
use crate::utils::partition::group_range;

#[derive(Clone, Copy, PartialEq, Eq)]
enum Triangle {
    Lower,
    Upper,
}

/// Solves `L·X = B` for lower-triangular `L`. Collective over `comm`.
pub fn forward_substitute<C: Comm, T: Scalar>(
    comm: &C,
    coeffs: MatRef<'_, T>,
    constants: MatRef<'_, T>,
) -> Result<Mat<T>> {
    substitute(comm, coeffs, constants, Triangle::Lower)
}

/// Solves `U·X = B` for upper-triangular `U`. Collective over `comm`.
pub fn back_substitute<C: Comm, T: Scalar>(
    comm: &C,
    coeffs: MatRef<'_, T>,
    constants: MatRef<'_, T>,
) -> Result<Mat<T>> {
    substitute(comm, coeffs, constants, Triangle::Upper)
}

fn solve_column<T: Scalar>(coeffs: &ColMajor<T>, x: &mut [T], triangle: Triangle) {
    let n = x.len();
    let mut step = |i: usize| {
        let s = x[i] / coeffs[(i, i)];
        sub_scaled(x, s, coeffs.col(i));
        x[i] = s;
    };
    match triangle {
        Triangle::Lower => (0..n).for_each(&mut step),
        Triangle::Upper => (0..n).rev().for_each(&mut step),
    }
}

fn substitute<C: Comm, T: Scalar>(
    comm: &C,
    coeffs: MatRef<'_, T>,
    constants: MatRef<'_, T>,
    triangle: Triangle,
) -> Result<Mat<T>> {
    let n = coeffs.nrows();
    if coeffs.ncols() != n {
        return Err(HlError::Shape(format!(
            "triangular matrix is {}x{}, not square",
            n,
            coeffs.ncols()
        )));
    }
    if constants.nrows() != n {
        return Err(HlError::Shape(format!(
            "{} constant rows for a {n}x{n} system",
            constants.nrows()
        )));
    }
    let k = constants.ncols();
    if n == 0 || k == 0 {
        return Ok(Mat::from_fn(n, k, |_, _| T::zero()));
    }

    let coeffs = ColMajor::from_mat(coeffs);
    let constants = ColMajor::from_mat(constants);
    let solution = SharedMatrix::<C, T>::new(comm, "triangular-substitution", n, k)?;
    let comms = solution.comms();
    let (intra, inter) = (comms.intrahost(), comms.interhost());
    let num_hosts = comms.num_hosts();

    let host_cols = group_range(0, k, num_hosts, comms.intrahost_color());
    let my_cols = group_range(host_cols.start, host_cols.end, intra.size(), intra.rank());
    {
        // SAFETY: the ranks of a host own disjoint column ranges.
        let block = unsafe { solution.raw().cols_mut(my_cols.clone()) };
        block.copy_from_slice(constants.cols(my_cols));
        parallel_chunks(block, n, |_, chunk| {
            for x in chunk.chunks_exact_mut(n) {
                solve_column(&coeffs, x, triangle);
            }
        });
    }
    intra.barrier();

    if intra.rank() == 0 {
        for host in 0..num_hosts {
            let cols = group_range(0, k, num_hosts, host);
            // SAFETY: only the first rank of each host touches the segment
            // between the two barriers.
            let block = unsafe { solution.raw().cols_mut(cols) };
            inter.broadcast(block, host);
        }
    }
    intra.barrier();
    Ok(solution.to_mat())
}
