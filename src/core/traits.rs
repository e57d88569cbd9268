//! Core scalar trait for hylinal.
//!
//! Every kernel is generic over [`Scalar`], which is implemented for `f64` and
//! `Complex64` only. Both are plain old data without padding, which is what
//! lets buffers of scalars travel through byte-oriented broadcasts and live in
//! shared-memory segments.

use num_complex::Complex64;
use num_traits::Num;
use std::fmt::Debug;
use std::ops::{AddAssign, DivAssign, MulAssign, Neg, SubAssign};

mod sealed {
    pub trait Sealed {}
    impl Sealed for f64 {}
    impl Sealed for num_complex::Complex64 {}
}

/// Real or complex matrix element.
pub trait Scalar:
    sealed::Sealed
    + Num
    + Copy
    + Debug
    + PartialEq
    + Neg<Output = Self>
    + AddAssign
    + SubAssign
    + MulAssign
    + DivAssign
    + Send
    + Sync
    + 'static
{
    /// Complex conjugate (identity for reals).
    fn conj(self) -> Self;
    /// Real part.
    fn re(self) -> f64;
    /// Squared modulus.
    fn abs_sqr(self) -> f64;
    /// Embed a real number.
    fn from_real(x: f64) -> Self;
    /// Multiply by a real number.
    fn scale(self, s: f64) -> Self;
    /// Widen to a complex number.
    fn to_complex(self) -> Complex64;
}

impl Scalar for f64 {
    fn conj(self) -> Self {
        self
    }
    fn re(self) -> f64 {
        self
    }
    fn abs_sqr(self) -> f64 {
        self * self
    }
    fn from_real(x: f64) -> Self {
        x
    }
    fn scale(self, s: f64) -> Self {
        self * s
    }
    fn to_complex(self) -> Complex64 {
        Complex64::new(self, 0.0)
    }
}

impl Scalar for Complex64 {
    fn conj(self) -> Self {
        Complex64::conj(&self)
    }
    fn re(self) -> f64 {
        self.re
    }
    fn abs_sqr(self) -> f64 {
        self.norm_sqr()
    }
    fn from_real(x: f64) -> Self {
        Complex64::new(x, 0.0)
    }
    fn scale(self, s: f64) -> Self {
        Complex64::new(self.re * s, self.im * s)
    }
    fn to_complex(self) -> Complex64 {
        self
    }
}

/// Byte view of a scalar slice.
pub fn as_bytes<T: Scalar>(values: &[T]) -> &[u8] {
    // SAFETY: `Scalar` is sealed to `f64` and `Complex64`, both padding-free.
    unsafe { std::slice::from_raw_parts(values.as_ptr().cast::<u8>(), std::mem::size_of_val(values)) }
}

/// Mutable byte view of a scalar slice.
pub fn as_bytes_mut<T: Scalar>(values: &mut [T]) -> &mut [u8] {
    let len = std::mem::size_of_val(values);
    // SAFETY: as above; every bit pattern is a valid `f64`/`Complex64`.
    unsafe { std::slice::from_raw_parts_mut(values.as_mut_ptr().cast::<u8>(), len) }
}
