use std::fmt;

use serde::{Deserialize, Serialize};

/// Integer types the vendor protocol stores rational values in.
///
/// The protocol only ever transfers 32-bit words, so the trait is sealed over
/// [`i32`] and [`u32`].
pub trait RationalInt:
    Copy + PartialEq + Default + Into<f64> + fmt::Debug + fmt::Display + private::Sealed
{
}

impl RationalInt for i32 {}
impl RationalInt for u32 {}

mod private {
    pub trait Sealed {}
    impl Sealed for i32 {}
    impl Sealed for u32 {}
}

/// A ratio as found natively in the vendor protocol (shutter time, aperture,
/// exposure compensation).
///
/// The all-zero pair is the protocol's "no value" sentinel; construct it with
/// [`Rational::invalid`] and test for it with [`Rational::is_invalid`].
/// Equality follows the vendor semantics rather than mathematical ones:
///
/// - two invalid values are equal,
/// - any other value with a zero denominator has a NaN quotient and compares
///   unequal to everything, itself included,
/// - otherwise values are equal when their quotients are equal, so `2/4` and
///   `1/2` are the same value.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct Rational<T: RationalInt> {
    /// Numerator, in the vendor's spelling.
    pub nom: T,
    /// Denominator; zero makes the quotient NaN.
    pub den: T,
}

/// Unsigned rational, used for shutter time, aperture and focal length.
pub type URational = Rational<u32>;

/// Signed rational, used for exposure compensation values.
pub type SRational = Rational<i32>;

impl<T: RationalInt> Rational<T> {
    /// Creates a rational from numerator and denominator.
    pub const fn new(nom: T, den: T) -> Self {
        Self { nom, den }
    }

    /// The protocol's "no value" sentinel, `0/0`.
    pub fn invalid() -> Self {
        Self { nom: T::default(), den: T::default() }
    }

    /// Whether this is the `0/0` sentinel.
    pub fn is_invalid(&self) -> bool {
        self.nom == T::default() && self.den == T::default()
    }

    /// The quotient as a double; NaN when the denominator is zero.
    pub fn to_f64(&self) -> f64 {
        let den: f64 = self.den.into();
        if den != 0.0 {
            self.nom.into() / den
        } else {
            f64::NAN
        }
    }
}

impl<T: RationalInt> PartialEq for Rational<T> {
    fn eq(&self, other: &Self) -> bool {
        if self.is_invalid() && other.is_invalid() {
            // The sentinel test passes; every other zero-denominator value
            // fails the quotient comparison below through NaN.
            true
        } else {
            self.to_f64() == other.to_f64()
        }
    }
}

impl<T: RationalInt> fmt::Display for Rational<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_invalid() {
            write!(f, "(invalid)")
        } else {
            write!(f, "{}/{}", self.nom, self.den)
        }
    }
}

#[cfg(test)]
mod tests;
