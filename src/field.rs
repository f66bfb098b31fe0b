use core::fmt::Debug;
use std::ops::{Add, Mul, Sub};

/// The arithmetic a finite field must provide for Lagrange interpolation.
///
/// Implementors are small `Copy` values; the interpolation routines are monomorphized over the
/// concrete field rather than dispatching at runtime.
pub trait Field:
    Copy + Eq + Debug + Add<Output = Self> + Sub<Output = Self> + Mul<Output = Self>
{
    /// The additive identity.
    const ZERO: Self;

    /// The multiplicative identity.
    const ONE: Self;

    /// Returns the multiplicative inverse, or `None` for zero.
    fn invert(self) -> Option<Self>;

    /// Returns `self / rhs`, or `None` when `rhs` is zero.
    fn checked_div(self, rhs: Self) -> Option<Self> {
        rhs.invert().map(|inv| self * inv)
    }
}
