//! Column kernels over contiguous scalar slices.
//!
//! These are the inner loops shared by the distributed kernels: inner
//! products, norms, and column updates on column-major data. Columns of a
//! column-major buffer are contiguous, so every kernel here works on plain
//! slices and stays free of any matrix type.

use crate::core::traits::Scalar;

/// Conjugated inner product `xᴴ y`.
pub fn dot<T: Scalar>(x: &[T], y: &[T]) -> T {
    assert_eq!(x.len(), y.len(), "Vectors must have the same length");
    x.iter()
        .zip(y)
        .fold(T::zero(), |acc, (&xi, &yi)| acc + xi.conj() * yi)
}

/// Euclidean norm `‖x‖₂`.
pub fn norm<T: Scalar>(x: &[T]) -> f64 {
    x.iter().map(|xi| xi.abs_sqr()).sum::<f64>().sqrt()
}

/// `y ← y − alpha · x`.
pub fn sub_scaled<T: Scalar>(y: &mut [T], alpha: T, x: &[T]) {
    assert_eq!(x.len(), y.len(), "Vectors must have the same length");
    for (yi, &xi) in y.iter_mut().zip(x) {
        *yi -= alpha * xi;
    }
}

/// `x ← x / s` for a real `s`.
pub fn div_real<T: Scalar>(x: &mut [T], s: f64) {
    let inv = 1.0 / s;
    for xi in x.iter_mut() {
        *xi = xi.scale(inv);
    }
}

/// Rotates two vectors in place: `x ← c·x − s·y`, `y ← s·x + c·y`.
pub fn rotate_pair<T: Scalar>(x: &mut [T], y: &mut [T], cosine: f64, sine: f64) {
    assert_eq!(x.len(), y.len(), "Vectors must have the same length");
    for (xi, yi) in x.iter_mut().zip(y.iter_mut()) {
        let (a, b) = (*xi, *yi);
        *xi = a.scale(cosine) - b.scale(sine);
        *yi = a.scale(sine) + b.scale(cosine);
    }
}
