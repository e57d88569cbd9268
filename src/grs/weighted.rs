//! Weighted orthogonalization.
//!
//! Refines an orthonormal matrix so that its columns stay close to the
//! columns of a reference matrix, each column pulled by its own weight.
//! Pairs of columns are rotated by the angle that maximizes the weighted
//! overlap, and the rotations are driven by the [`Actuator`].

use faer::MatRef;
use num_complex::Complex64;

use crate::config::{ActuatorOptions, Sidedness, WeightedOrthoOptions};
use crate::core::traits::Scalar;
use crate::core::wrappers::dot;
use crate::error::{HlError, Result};
use crate::grs::actuator::{Actuator, GrsResult, one_sided_relaxation};
use crate::grs::rotation::{IndexedVectorPair, RotationSpec};
use crate::matrix::dense::ColMajor;
use crate::parallel::Comm;
use crate::utils::convergence::FrobeniusConvergence;

/// Rotation of the orthonormal columns `ortho1`, `ortho2` towards the
/// reference columns `ref1`, `ref2` with weights `w1`, `w2`.
///
/// With `B = w1⟨ref1, ortho1⟩ + w2⟨ref2, ortho2⟩`,
/// `C = w2⟨ref2, ortho1⟩ − w1⟨ref1, ortho2⟩` and `A = √(B² + C²)`, the rotation
/// is `(Re(B/A), Re(C/A))`. It is the identity when both weights or `|A|` fall
/// below `zero_abs_thresh`.
pub fn weighted_rotation<T: Scalar>(
    ref1: &[T],
    ortho1: &[T],
    w1: f64,
    ref2: &[T],
    ortho2: &[T],
    w2: f64,
    zero_abs_thresh: f64,
) -> RotationSpec {
    debug_assert!(w1 >= 0.0 && w2 >= 0.0);
    if w1 < zero_abs_thresh && w2 < zero_abs_thresh {
        return RotationSpec::identity();
    }
    let b: Complex64 = dot(ref1, ortho1).to_complex() * w1 + dot(ref2, ortho2).to_complex() * w2;
    let c: Complex64 = dot(ref2, ortho1).to_complex() * w2 - dot(ref1, ortho2).to_complex() * w1;
    let a = (b * b + c * c).sqrt();
    if a.norm() < zero_abs_thresh {
        return RotationSpec::identity();
    }
    RotationSpec {
        cosine: (b / a).re,
        sine: (c / a).re,
    }
}

fn check_inputs<T: Scalar>(reference: MatRef<'_, T>, prelim: MatRef<'_, T>, weights: &[f64]) -> Result<()> {
    if reference.nrows() == 0 || reference.ncols() == 0 {
        return Err(HlError::Shape("reference matrix is empty".into()));
    }
    if (reference.nrows(), reference.ncols()) != (prelim.nrows(), prelim.ncols()) {
        return Err(HlError::Shape(format!(
            "reference is {}x{} but the orthonormal matrix is {}x{}",
            reference.nrows(),
            reference.ncols(),
            prelim.nrows(),
            prelim.ncols()
        )));
    }
    if weights.len() != reference.ncols() {
        return Err(HlError::Shape(format!(
            "{} weights for {} columns",
            weights.len(),
            reference.ncols()
        )));
    }
    if let Some(w) = weights.iter().find(|w| !(**w >= 0.0)) {
        return Err(HlError::Domain(format!("weight {w} is negative")));
    }
    Ok(())
}

/// Weighted orthogonalization of `prelim` against `reference` with a
/// caller-configured actuator. Collective over the actuator's process group.
pub fn weight_orthogonalized_with<C: Comm, T: Scalar>(
    actuator: &Actuator<'_, C, T>,
    reference: MatRef<'_, T>,
    prelim: MatRef<'_, T>,
    weights: &[f64],
    zero_abs_thresh: f64,
) -> Result<GrsResult<T>> {
    check_inputs(reference, prelim, weights)?;
    if !(zero_abs_thresh > 0.0) {
        return Err(HlError::Domain("zero threshold must be positive".into()));
    }
    let reference = ColMajor::from_mat(reference);
    actuator.actuate(prelim, |v: &IndexedVectorPair<'_, T>| {
        let (i, j) = (v.indices.first, v.indices.second);
        weighted_rotation(
            reference.col(i),
            v.first,
            weights[i],
            reference.col(j),
            v.second,
            weights[j],
            zero_abs_thresh,
        )
    })
}

/// Weighted orthogonalization with the default schedule: one rotation group
/// per rank, the relaxation halved after every group, and convergence once
/// successive iterates differ by less than the zero threshold. Collective
/// over `comm`.
pub fn weight_orthogonalized<C: Comm, T: Scalar>(
    comm: &C,
    reference: MatRef<'_, T>,
    prelim: MatRef<'_, T>,
    weights: &[f64],
    options: &WeightedOrthoOptions,
) -> Result<GrsResult<T>> {
    options.validate()?;
    check_inputs(reference, prelim, weights)?;
    let convergence = FrobeniusConvergence::new(options.zero_abs_thresh);
    let actuator_options = ActuatorOptions::default()
        .with_sidedness(Sidedness::OneSidedRight)
        .with_init_relax(one_sided_relaxation(prelim.ncols()))
        .with_num_groups(comm.size())
        .with_max_iterations(options.max_sweeps);
    let actuator = Actuator::new(
        comm,
        actuator_options,
        |_, relax, _| relax * 0.5,
        move |prev, curr| convergence.check(prev, curr),
    )?;
    weight_orthogonalized_with(&actuator, reference, prelim, weights, options.zero_abs_thresh)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parallel::LocalComm;
    use approx::assert_abs_diff_eq;
    use faer::Mat;

    #[test]
    fn negligible_weights_give_identity() {
        let x = [1.0, 0.0];
        let y = [0.0, 1.0];
        let spec = weighted_rotation(&x, &y, 0.0, &y, &x, 1e-9, 1e-5);
        assert_eq!(spec, RotationSpec::identity());
    }

    #[test]
    fn aligned_columns_need_no_rotation() {
        let x = [1.0, 0.0];
        let y = [0.0, 1.0];
        let spec = weighted_rotation(&x, &x, 1.0, &y, &y, 1.0, 1e-5);
        assert_abs_diff_eq!(spec.cosine, 1.0, epsilon = 1e-12);
        assert_abs_diff_eq!(spec.sine, 0.0, epsilon = 1e-12);
    }

    #[test]
    fn input_validation() {
        let comm = LocalComm::solo();
        let m = Mat::from_fn(2, 2, |i, j| if i == j { 1.0 } else { 0.0 });
        let opts = WeightedOrthoOptions::default();
        assert!(matches!(
            weight_orthogonalized(&comm, m.as_ref(), m.as_ref(), &[1.0], &opts),
            Err(HlError::Shape(_))
        ));
        assert!(matches!(
            weight_orthogonalized(&comm, m.as_ref(), m.as_ref(), &[1.0, -1.0], &opts),
            Err(HlError::Domain(_))
        ));
    }

    #[test]
    fn swapped_basis_is_rotated_back() {
        let comm = LocalComm::solo();
        let reference = Mat::from_fn(2, 2, |i, j| if i == j { 1.0 } else { 0.0 });
        let s = std::f64::consts::FRAC_1_SQRT_2;
        let prelim = Mat::from_fn(2, 2, |i, j| match (i, j) {
            (1, 0) => -s,
            _ => s,
        });
        let res = weight_orthogonalized(
            &comm,
            reference.as_ref(),
            prelim.as_ref(),
            &[1.0, 1.0],
            &WeightedOrthoOptions::default(),
        )
        .unwrap();
        assert!(res.has_converged);
        for i in 0..2 {
            for j in 0..2 {
                assert_abs_diff_eq!(res.transform[(i, j)], reference[(i, j)], epsilon = 1e-4);
            }
        }
    }
}
