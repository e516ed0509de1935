use rug::{Float, Integer};
use std::fmt::Display;

/// The numeric type abstraction used by the counting engine.
///
/// Counting only needs addition, multiplication, an exact comparison to zero
/// and the injection of literal weights. The two standard instances are
/// [`rug::Integer`] for unweighted counting and [`rug::Float`] for weighted
/// counting; the `precision` argument is only meaningful for the latter.
pub trait Num: Clone + Display {
    /// Returns the zero of the numeric type.
    fn zero(precision: u32) -> Self;

    /// Returns the one of the numeric type.
    fn one(precision: u32) -> Self;

    /// Injects a literal weight into the numeric type.
    fn from_weight(weight: f64, precision: u32) -> Self;

    /// Adds another value to this one.
    fn add_assign(&mut self, rhs: &Self);

    /// Multiplies this value by another one.
    fn mul_assign(&mut self, rhs: &Self);

    /// Returns `true` if the value is exactly zero.
    fn is_zero(&self) -> bool;
}

impl Num for Integer {
    fn zero(_precision: u32) -> Self {
        Integer::new()
    }

    fn one(_precision: u32) -> Self {
        Integer::from(1)
    }

    fn from_weight(weight: f64, _precision: u32) -> Self {
        Integer::from_f64(weight).expect("integer mode requires finite integer weights")
    }

    fn add_assign(&mut self, rhs: &Self) {
        *self += rhs;
    }

    fn mul_assign(&mut self, rhs: &Self) {
        *self *= rhs;
    }

    fn is_zero(&self) -> bool {
        self.cmp0() == std::cmp::Ordering::Equal
    }
}

impl Num for Float {
    fn zero(precision: u32) -> Self {
        Float::with_val(precision, 0.)
    }

    fn one(precision: u32) -> Self {
        Float::with_val(precision, 1.)
    }

    fn from_weight(weight: f64, precision: u32) -> Self {
        Float::with_val(precision, weight)
    }

    fn add_assign(&mut self, rhs: &Self) {
        *self += rhs;
    }

    fn mul_assign(&mut self, rhs: &Self) {
        *self *= rhs;
    }

    fn is_zero(&self) -> bool {
        Float::is_zero(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_integer_ops() {
        let mut n = Integer::one(0);
        n.mul_assign(&Integer::from_weight(3., 0));
        n.add_assign(&Integer::one(0));
        assert_eq!(Integer::from(4), n);
        assert!(Integer::zero(0).is_zero());
        assert!(!n.is_zero());
    }

    #[test]
    fn test_float_ops() {
        let mut n = Float::one(64);
        n.mul_assign(&Float::from_weight(0.25, 64));
        n.add_assign(&Float::from_weight(0.25, 64));
        assert_eq!(0.5, n.to_f64());
        assert!(Float::zero(64).is_zero());
    }
}
