// SPDX-License-Identifier: AGPL-3.0-or-later
// © 2025 Ryo ∴ SpiralArchitect (kishkavsesvit@icloud.com)
// Part of SpiralMech — Licensed under AGPL-3.0-or-later.
// Unauthorized derivative works or closed redistribution prohibited under AGPL §13.

//! Optimizer hyperparameters the closed forms are keyed on.
//!
//! These must be the exact values the training run used; the solvers have
//! no way to detect a mismatch, they just predict the wrong trajectory.

use std::cmp::Ordering;

use serde::{Deserialize, Serialize};

use crate::error::{MechError, Result};
use crate::real::Real;

/// Plain SGD with weight decay.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct SgdHyper {
    pub lr: f64,
    pub wd: f64,
}

impl SgdHyper {
    pub fn new(lr: f64, wd: f64) -> SgdHyper {
        SgdHyper { lr, wd }
    }

    pub fn validate(&self) -> Result<()> {
        if !self.lr.is_finite() || self.lr <= 0.0 {
            return Err(MechError::InvalidHyper(format!(
                "learning rate must be finite and positive, got {}",
                self.lr
            )));
        }
        if !self.wd.is_finite() || self.wd < 0.0 {
            return Err(MechError::InvalidHyper(format!(
                "weight decay must be finite and non-negative, got {}",
                self.wd
            )));
        }
        Ok(())
    }

    /// Continuous time corresponding to a discrete step.
    pub fn tau(&self, step: u64) -> f64 {
        self.lr * step as f64
    }
}

/// SGD with constant momentum and dampening on top of weight decay.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct MomentumHyper {
    pub lr: f64,
    pub wd: f64,
    pub momentum: f64,
    pub dampening: f64,
}

/// Damping constant and natural frequency of the second-order dynamics.
#[derive(Clone, Copy, Debug)]
pub struct Damping<F> {
    pub gamma: F,
    pub omega: F,
}

/// Classification of the oscillator the momentum recurrence induces.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Regime {
    UnderDamped,
    CriticallyDamped,
    OverDamped,
}

impl Regime {
    /// Classifies by comparing `gamma` against `omega`.
    ///
    /// The critical boundary is an *exact* floating-point equality, as in
    /// the derivation this implements; near-critical hyperparameters land
    /// in whichever side rounding puts them on.  Known fragility, kept
    /// deliberately.
    pub fn classify<F: Real>(damping: &Damping<F>) -> Result<Regime> {
        match damping.gamma.partial_cmp(&damping.omega) {
            Some(Ordering::Less) => Ok(Regime::UnderDamped),
            Some(Ordering::Equal) => Ok(Regime::CriticallyDamped),
            Some(Ordering::Greater) => Ok(Regime::OverDamped),
            None => Err(MechError::InvalidHyper(
                "damping constants are not comparable (NaN)".to_string(),
            )),
        }
    }
}

impl MomentumHyper {
    pub fn new(lr: f64, wd: f64, momentum: f64, dampening: f64) -> MomentumHyper {
        MomentumHyper {
            lr,
            wd,
            momentum,
            dampening,
        }
    }

    pub fn validate(&self) -> Result<()> {
        SgdHyper::new(self.lr, self.wd).validate()?;
        if !self.momentum.is_finite() || !(0.0..1.0).contains(&self.momentum) {
            return Err(MechError::InvalidHyper(format!(
                "momentum must lie in [0, 1), got {}",
                self.momentum
            )));
        }
        if !self.dampening.is_finite() || !(0.0..1.0).contains(&self.dampening) {
            return Err(MechError::InvalidHyper(format!(
                "dampening must lie in [0, 1), got {}",
                self.dampening
            )));
        }
        Ok(())
    }

    /// `gamma = (1-m) / (lr·(1-d)·(1+m))`, `omega = sqrt(4·wd / (lr·(1-d)·(1+m)))`,
    /// computed entirely in `F`.
    pub fn damping<F: Real>(&self) -> Damping<F> {
        let one = F::one();
        let lr = F::from_f64(self.lr);
        let wd = F::from_f64(self.wd);
        let momentum = F::from_f64(self.momentum);
        let dampening = F::from_f64(self.dampening);
        let denom = lr * (one - dampening) * (one + momentum);
        Damping {
            gamma: (one - momentum) / denom,
            omega: (F::from_f64(4.0) * wd / denom).sqrt(),
        }
    }

    /// Effective continuous time `lr·(1-dampening)·step`.
    pub fn tau<F: Real>(&self, step: u64) -> F {
        F::from_f64(self.lr) * (F::one() - F::from_f64(self.dampening)) * F::from_f64(step as f64)
    }

    /// Gain `2·lr·(1-dampening)` applied to the inhomogeneous corrections.
    pub fn forcing_gain<F: Real>(&self) -> F {
        F::from_f64(2.0) * F::from_f64(self.lr) * (F::one() - F::from_f64(self.dampening))
    }
}
