// SPDX-License-Identifier: AGPL-3.0-or-later
// © 2025 Ryo ∴ SpiralArchitect (kishkavsesvit@icloud.com)
// Part of SpiralMech — Licensed under AGPL-3.0-or-later.
// Unauthorized derivative works or closed redistribution prohibited under AGPL §13.

//! Scalar precision seam for the aggregator and solvers.
//!
//! The momentum solution subtracts rapidly decaying and growing exponential
//! terms; at realistic hyperparameters the cancellation eats most of an
//! `f64` mantissa, so that solver runs on double-double arithmetic
//! ([`twofloat::TwoFloat`], ~106 mantissa bits).  Everything that has to be
//! precision-polymorphic takes `F: Real` explicitly instead of flipping a
//! global setting.

use std::ops::{Add, Div, Mul, Neg, Sub};

use twofloat::TwoFloat;

/// Floating-point scalar the synapse reductions and envelope formulas are
/// generic over.
pub trait Real:
    Copy
    + PartialEq
    + PartialOrd
    + Add<Output = Self>
    + Sub<Output = Self>
    + Mul<Output = Self>
    + Div<Output = Self>
    + Neg<Output = Self>
{
    fn from_f64(value: f64) -> Self;
    fn to_f64(self) -> f64;
    fn zero() -> Self;
    fn one() -> Self;
    fn exp(self) -> Self;
    fn sin(self) -> Self;
    fn cos(self) -> Self;
    fn sqrt(self) -> Self;
    fn is_finite(self) -> bool;
}

impl Real for f64 {
    fn from_f64(value: f64) -> f64 {
        value
    }

    fn to_f64(self) -> f64 {
        self
    }

    fn zero() -> f64 {
        0.0
    }

    fn one() -> f64 {
        1.0
    }

    fn exp(self) -> f64 {
        f64::exp(self)
    }

    fn sin(self) -> f64 {
        f64::sin(self)
    }

    fn cos(self) -> f64 {
        f64::cos(self)
    }

    fn sqrt(self) -> f64 {
        f64::sqrt(self)
    }

    fn is_finite(self) -> bool {
        f64::is_finite(self)
    }
}

impl Real for TwoFloat {
    fn from_f64(value: f64) -> TwoFloat {
        TwoFloat::from(value)
    }

    fn to_f64(self) -> f64 {
        f64::from(self)
    }

    fn zero() -> TwoFloat {
        TwoFloat::from(0.0)
    }

    fn one() -> TwoFloat {
        TwoFloat::from(1.0)
    }

    // Method-call syntax below resolves to TwoFloat's inherent math
    // functions, which take precedence over this trait's.
    fn exp(self) -> TwoFloat {
        self.exp()
    }

    fn sin(self) -> TwoFloat {
        self.sin()
    }

    fn cos(self) -> TwoFloat {
        self.cos()
    }

    fn sqrt(self) -> TwoFloat {
        self.sqrt()
    }

    fn is_finite(self) -> bool {
        self.is_valid()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn f64_and_twofloat_agree_on_envelope_arithmetic() {
        let t = 0.37;
        let coarse = (-2.0 * t).exp() * (t.cos() + 0.5 * t.sin());
        let g = TwoFloat::from(t);
        let fine = Real::exp(TwoFloat::from(-2.0) * g)
            * (Real::cos(g) + TwoFloat::from(0.5) * Real::sin(g));
        assert_relative_eq!(coarse, fine.to_f64(), max_relative = 1e-14);
    }

    #[test]
    fn twofloat_detects_invalid_values() {
        let bad = Real::sqrt(TwoFloat::from(-1.0));
        assert!(!Real::is_finite(bad));
        assert!(Real::is_finite(TwoFloat::from(1.0)));
    }

    #[test]
    fn conversion_roundtrip_is_exact_for_representable_values() {
        for v in [0.0, 1.0, -2.5, 1e-8, 123456.789] {
            assert_eq!(TwoFloat::from(v).to_f64(), v);
        }
    }
}
