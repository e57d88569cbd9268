//! Dense linear systems through QR.

use faer::{Mat, MatRef};

use crate::config::GramSchmidtOptions;
use crate::core::traits::Scalar;
use crate::error::{HlError, Result};
use crate::linalg::gram_schmidt::iterated_gram_schmidt;
use crate::linalg::product::product;
use crate::linalg::triangular::back_substitute;
use crate::matrix::dense::adjoint;
use crate::parallel::Comm;

/// Solves `coeffs · X = constants` for square `coeffs` as `R⁻¹·Qᴴ·constants`.
/// Collective over `comm`.
pub fn solve_linear_system<C: Comm, T: Scalar>(
    comm: &C,
    coeffs: MatRef<'_, T>,
    constants: MatRef<'_, T>,
) -> Result<Mat<T>> {
    if coeffs.nrows() != coeffs.ncols() {
        return Err(HlError::Shape(format!(
            "coefficient matrix is {}x{}, not square",
            coeffs.nrows(),
            coeffs.ncols()
        )));
    }
    if constants.nrows() != coeffs.nrows() {
        return Err(HlError::Shape(format!(
            "{} constant rows for {} equations",
            constants.nrows(),
            coeffs.nrows()
        )));
    }
    let qr = iterated_gram_schmidt(comm, coeffs, &GramSchmidtOptions::default())?;
    let q_h = adjoint(qr.q.as_ref());
    let rhs = product(comm, &[q_h.as_ref(), constants])?;
    back_substitute(comm, qr.r.as_ref(), rhs.as_ref())
}
