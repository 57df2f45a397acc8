// SPDX-License-Identifier: AGPL-3.0-or-later
// © 2025 Ryo ∴ SpiralArchitect (kishkavsesvit@icloud.com)
// Part of SpiralMech — Licensed under AGPL-3.0-or-later.
// Unauthorized derivative works or closed redistribution prohibited under AGPL §13.

//! Second-order solver: SGD with momentum and dampening.
//!
//! Momentum turns the per-parameter recurrence into a damped harmonic
//! oscillator with damping constant `gamma` and natural frequency `omega`
//! (see [`MomentumHyper::damping`]).  The homogeneous envelope `scale(t)`
//! multiplies the un-decayed squared initial condition; for steps past the
//! first, two inhomogeneous terms convolve the regime-specific impulse
//! responses with the optimizer's two logged integral buffers, scaled by
//! `2·lr·(1-dampening)`.
//!
//! Over-damped runs at extreme hyperparameters can push a buffer through
//! the growing exponential into overflow; a correction whose tensors are
//! not all finite is dropped from the sum (and logged) instead of poisoning
//! the whole trajectory.  All scalar math runs on [`TwoFloat`]: the
//! homogeneous and inhomogeneous terms cancel almost exactly at late times,
//! which an `f64` mantissa cannot absorb.

use ndarray::ArrayD;
use sm_store::{FeatureStore, BUFFERS_GROUP};
use twofloat::TwoFloat;

use crate::error::{MechError, Result};
use crate::features::LayerFeatures;
use crate::hyper::{Damping, MomentumHyper, Regime};
use crate::real::Real;
use crate::registry::LayerDescriptor;
use crate::synapse::projection_gap;
use crate::theory::InitialConditions;
use crate::trajectory::LayerSeries;

/// Homogeneous decay envelope applied to the initial condition.
pub fn homogeneous_envelope<F: Real>(damping: &Damping<F>, t: F) -> Result<F> {
    let gamma = damping.gamma;
    let omega = damping.omega;
    Ok(match Regime::classify(damping)? {
        Regime::UnderDamped => {
            let w = (omega * omega - gamma * gamma).sqrt();
            (-gamma * t).exp() * ((w * t).cos() + gamma / w * (w * t).sin())
        }
        Regime::CriticallyDamped => (-gamma * t).exp() * (F::one() + gamma * t),
        Regime::OverDamped => {
            let root = (gamma * gamma - omega * omega).sqrt();
            let alpha_p = -gamma + root;
            let alpha_m = -gamma - root;
            (alpha_p * (alpha_m * t).exp() - alpha_m * (alpha_p * t).exp()) / (alpha_p - alpha_m)
        }
    })
}

/// Impulse-response pair convolved with the two integral buffers.
pub fn impulse_pair<F: Real>(damping: &Damping<F>, t: F) -> Result<(F, F)> {
    let gamma = damping.gamma;
    let omega = damping.omega;
    Ok(match Regime::classify(damping)? {
        Regime::UnderDamped => {
            let w = (omega * omega - gamma * gamma).sqrt();
            (
                (-gamma * t).exp() * (w * t).sin() / w,
                -((-gamma * t).exp()) * (w * t).cos() / w,
            )
        }
        Regime::CriticallyDamped => ((-gamma * t).exp() * t, -((-gamma * t).exp())),
        Regime::OverDamped => {
            let root = (gamma * gamma - omega * omega).sqrt();
            let alpha_p = -gamma + root;
            let alpha_m = -gamma - root;
            (
                (alpha_p * t).exp() / (alpha_p - alpha_m),
                -((alpha_m * t).exp()) / (alpha_p - alpha_m),
            )
        }
    })
}

/// One layer's worth of the two logged buffer tensors.
struct BufferPair {
    w1: ArrayD<f64>,
    b1: ArrayD<f64>,
    w2: ArrayD<f64>,
    b2: ArrayD<f64>,
}

struct MomentumBuffers {
    w1: LayerFeatures,
    b1: LayerFeatures,
    w2: LayerFeatures,
    b2: LayerFeatures,
}

impl MomentumBuffers {
    fn load(store: &FeatureStore, chain: &[LayerDescriptor], step: u64) -> Result<MomentumBuffers> {
        Ok(MomentumBuffers {
            w1: LayerFeatures::load(store, &[step], chain, "weight.integral_buffer_1", BUFFERS_GROUP)?,
            b1: LayerFeatures::load(store, &[step], chain, "bias.integral_buffer_1", BUFFERS_GROUP)?,
            w2: LayerFeatures::load(store, &[step], chain, "weight.integral_buffer_2", BUFFERS_GROUP)?,
            b2: LayerFeatures::load(store, &[step], chain, "bias.integral_buffer_2", BUFFERS_GROUP)?,
        })
    }

    fn pair(&self, label: &str, step: u64) -> Result<BufferPair> {
        Ok(BufferPair {
            w1: self.w1.tensor(label, step)?.clone(),
            b1: self.b1.tensor(label, step)?.clone(),
            w2: self.w2.tensor(label, step)?.clone(),
            b2: self.b2.tensor(label, step)?.clone(),
        })
    }
}

/// Squared initial condition plus the previous layer's buffer pair,
/// threaded along the chain within one step.
struct MomentumCarry {
    w_sq: ArrayD<f64>,
    b_sq: ArrayD<f64>,
    buffers: Option<BufferPair>,
}

fn all_finite(tensor: &ArrayD<f64>) -> bool {
    tensor.iter().all(|v| v.is_finite())
}

fn axpy(value: &mut [TwoFloat], coeff: TwoFloat, gap: &[TwoFloat]) -> Result<()> {
    if value.len() != gap.len() {
        return Err(MechError::ChannelMismatch {
            out: gap.len(),
            inp: value.len(),
        });
    }
    for (acc, &g) in value.iter_mut().zip(gap) {
        *acc = *acc + coeff * g;
    }
    Ok(())
}

/// Evaluates the damped-oscillator closed form at one step.
pub fn momentum_step(
    store: &FeatureStore,
    chain: &[LayerDescriptor],
    step: u64,
    index: usize,
    init: &InitialConditions,
    hyper: &MomentumHyper,
    series: &mut LayerSeries,
) -> Result<()> {
    let damping: Damping<TwoFloat> = hyper.damping();
    let t: TwoFloat = hyper.tau(step);
    let envelope = homogeneous_envelope(&damping, t)?;

    let buffers = if index > 0 {
        Some(MomentumBuffers::load(store, chain, step)?)
    } else {
        None
    };

    let first = &chain[0].pretty;
    let mut carry = MomentumCarry {
        w_sq: init.weight(first)?.clone(),
        b_sq: init.bias(first)?.clone(),
        buffers: match &buffers {
            Some(loaded) => Some(loaded.pair(first, step)?),
            None => None,
        },
    };

    for layer in &chain[1..] {
        let w_sq = init.weight(&layer.pretty)?.clone();
        let b_sq = init.bias(&layer.pretty)?.clone();

        let mut value: Vec<TwoFloat> =
            projection_gap::<TwoFloat>(&w_sq, &carry.w_sq, Some(&carry.b_sq))?
                .into_iter()
                .map(|g| envelope * g)
                .collect();

        let mut next_buffers = None;
        if let (Some(loaded), Some(incoming)) = (&buffers, &carry.buffers) {
            let outgoing = loaded.pair(&layer.pretty, step)?;
            let (scale_1, scale_2) = impulse_pair(&damping, t)?;
            let gain: TwoFloat = hyper.forcing_gain();

            if all_finite(&outgoing.w1) && all_finite(&incoming.w1) && all_finite(&incoming.b1) {
                let gap =
                    projection_gap::<TwoFloat>(&outgoing.w1, &incoming.w1, Some(&incoming.b1))?;
                axpy(&mut value, gain * scale_1, &gap)?;
            } else {
                tracing::warn!(
                    layer = %layer.pretty,
                    step,
                    buffer = 1,
                    "non-finite integral buffer; dropping correction term"
                );
            }
            if all_finite(&outgoing.w2) && all_finite(&incoming.w2) && all_finite(&incoming.b2) {
                let gap =
                    projection_gap::<TwoFloat>(&outgoing.w2, &incoming.w2, Some(&incoming.b2))?;
                axpy(&mut value, gain * scale_2, &gap)?;
            } else {
                tracing::warn!(
                    layer = %layer.pretty,
                    step,
                    buffer = 2,
                    "non-finite integral buffer; dropping correction term"
                );
            }
            next_buffers = Some(outgoing);
        }

        series
            .entry(layer.pretty.clone())
            .or_default()
            .insert(step, value.into_iter().map(Real::to_f64).collect());

        carry = MomentumCarry {
            w_sq,
            b_sq,
            buffers: next_buffers,
        };
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn damping(gamma: f64, omega: f64) -> Damping<f64> {
        Damping { gamma, omega }
    }

    #[test]
    fn envelope_is_one_at_time_zero_in_every_regime() {
        for (gamma, omega) in [(1.0, 2.0), (2.0, 2.0), (3.0, 2.0)] {
            let scale = homogeneous_envelope(&damping(gamma, omega), 0.0).unwrap();
            assert_relative_eq!(scale, 1.0, max_relative = 1e-15);
        }
    }

    #[test]
    fn under_and_critical_agree_in_the_gamma_to_omega_limit() {
        let omega = 2.0;
        let t = 0.75;
        let critical = homogeneous_envelope(&damping(omega, omega), t).unwrap();
        let near = homogeneous_envelope(&damping(omega * (1.0 - 1e-9), omega), t).unwrap();
        assert_relative_eq!(critical, near, max_relative = 1e-6);
    }

    #[test]
    fn over_and_critical_agree_in_the_gamma_to_omega_limit() {
        let omega = 2.0;
        let t = 0.75;
        let critical = homogeneous_envelope(&damping(omega, omega), t).unwrap();
        let near = homogeneous_envelope(&damping(omega * (1.0 + 1e-9), omega), t).unwrap();
        assert_relative_eq!(critical, near, max_relative = 1e-6);
    }

    #[test]
    fn impulse_pair_limits_at_time_zero() {
        // Under-damped: (0, -1/w)
        let w = (4.0f64 - 1.0).sqrt();
        let (s1, s2) = impulse_pair(&damping(1.0, 2.0), 0.0).unwrap();
        assert_relative_eq!(s1, 0.0, epsilon = 1e-15);
        assert_relative_eq!(s2, -1.0 / w, max_relative = 1e-15);
        // Critically damped: (0, -1)
        let (s1, s2) = impulse_pair(&damping(2.0, 2.0), 0.0).unwrap();
        assert_relative_eq!(s1, 0.0, epsilon = 1e-15);
        assert_relative_eq!(s2, -1.0, max_relative = 1e-15);
        // Over-damped: the pair cancels, s1 = -s2 = 1/(α₊ − α₋)
        let root = (9.0f64 - 4.0).sqrt();
        let (s1, s2) = impulse_pair(&damping(3.0, 2.0), 0.0).unwrap();
        assert_relative_eq!(s1, 1.0 / (2.0 * root), max_relative = 1e-15);
        assert_relative_eq!(s1 + s2, 0.0, epsilon = 1e-15);
    }

    #[test]
    fn zero_weight_decay_envelope_is_unity_for_all_time() {
        // omega = 0 puts the oscillator over-damped with roots 0 and -2γ;
        // the envelope collapses to the constant 1.
        let d = damping(5.0, 0.0);
        for t in [0.0, 0.1, 1.0, 10.0] {
            assert_relative_eq!(
                homogeneous_envelope(&d, t).unwrap(),
                1.0,
                max_relative = 1e-12
            );
        }
    }

    #[test]
    fn twofloat_envelope_matches_f64_envelope() {
        let coarse = homogeneous_envelope(&damping(1.0, 2.0), 0.5).unwrap();
        let fine = homogeneous_envelope(
            &Damping {
                gamma: TwoFloat::from(1.0),
                omega: TwoFloat::from(2.0),
            },
            TwoFloat::from(0.5),
        )
        .unwrap();
        assert_relative_eq!(coarse, fine.to_f64(), max_relative = 1e-13);
    }
}
