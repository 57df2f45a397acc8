// SPDX-License-Identifier: AGPL-3.0-or-later
// © 2025 Ryo ∴ SpiralArchitect (kishkavsesvit@icloud.com)
// Part of SpiralMech — Licensed under AGPL-3.0-or-later.
// Unauthorized derivative works or closed redistribution prohibited under AGPL §13.

//! First-order solver: SGD with weight decay, no momentum.
//!
//! With `t = lr·step` the squared-parameter statistic evolves as
//!
//! ```text
//! Q(t) = e^{-2·wd·t} · Q(0)  +  s(lr) · e^{-2·wd·t} · G(t)
//! ```
//!
//! where `G(t)` is the optimizer-logged running sum of squared stochastic
//! gradient contributions.  `G` is path-dependent; only the training
//! process can observe the per-step gradients, so it is read from the
//! integral buffer rather than reconstructed.  At the first recorded step
//! no buffer exists yet and the bare decayed initial condition is used.

use ndarray::ArrayD;
use sm_store::{FeatureStore, BUFFERS_GROUP};

use crate::error::Result;
use crate::features::LayerFeatures;
use crate::hyper::SgdHyper;
use crate::registry::LayerDescriptor;
use crate::synapse::projection_gap;
use crate::theory::InitialConditions;
use crate::trajectory::LayerSeries;

/// Scaling `s(lr)` of the noise-integral correction.
///
/// The two statistics this solver serves disagree: the rescale variant uses
/// `lr²`, the inversion variant uses plain `lr`.  Both are kept literally
/// until the original authors confirm which is intended.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum NoiseScaling {
    Quadratic,
    Linear,
}

impl NoiseScaling {
    fn factor(self, lr: f64) -> f64 {
        match self {
            NoiseScaling::Quadratic => lr * lr,
            NoiseScaling::Linear => lr,
        }
    }
}

struct DecayedPair {
    w: ArrayD<f64>,
    b: ArrayD<f64>,
}

fn decayed(
    init: &InitialConditions,
    buffers: Option<&(LayerFeatures, LayerFeatures)>,
    label: &str,
    step: u64,
    decay: f64,
    noise: f64,
) -> Result<DecayedPair> {
    let mut w = init.weight(label)? * decay;
    let mut b = init.bias(label)? * decay;
    if let Some((weight_buffers, bias_buffers)) = buffers {
        w += &(weight_buffers.tensor(label, step)? * noise);
        b += &(bias_buffers.tensor(label, step)? * noise);
    }
    Ok(DecayedPair { w, b })
}

/// Evaluates the closed form at one step and appends the per-layer gaps to
/// `series`.  `index` is the position of `step` in the run's step list; the
/// integral buffers are only loaded (and only exist) for `index > 0`.
#[allow(clippy::too_many_arguments)]
pub fn theoretical_step(
    store: &FeatureStore,
    chain: &[LayerDescriptor],
    step: u64,
    index: usize,
    init: &InitialConditions,
    hyper: &SgdHyper,
    scaling: NoiseScaling,
    series: &mut LayerSeries,
) -> Result<()> {
    let t = hyper.tau(step);
    let decay = (-2.0 * hyper.wd * t).exp();
    let noise = scaling.factor(hyper.lr) * decay;

    let buffers = if index > 0 {
        Some((
            LayerFeatures::load(store, &[step], chain, "weight.integral_buffer", BUFFERS_GROUP)?,
            LayerFeatures::load(store, &[step], chain, "bias.integral_buffer", BUFFERS_GROUP)?,
        ))
    } else {
        None
    };

    let mut carry = decayed(init, buffers.as_ref(), &chain[0].pretty, step, decay, noise)?;
    for layer in &chain[1..] {
        let outgoing = decayed(init, buffers.as_ref(), &layer.pretty, step, decay, noise)?;
        let gap = projection_gap::<f64>(&outgoing.w, &carry.w, Some(&carry.b))?;
        series
            .entry(layer.pretty.clone())
            .or_default()
            .insert(step, gap);
        carry = outgoing;
    }
    Ok(())
}
