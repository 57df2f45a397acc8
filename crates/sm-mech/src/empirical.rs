// SPDX-License-Identifier: AGPL-3.0-or-later
// © 2025 Ryo ∴ SpiralArchitect (kishkavsesvit@icloud.com)
// Part of SpiralMech — Licensed under AGPL-3.0-or-later.
// Unauthorized derivative works or closed redistribution prohibited under AGPL §13.

//! Empirical trajectory: the measured layer-pair statistic.
//!
//! For each recorded step, every chain layer's weight and bias are squared
//! and the per-channel gap `out(W²_{k+1}) − in(W²_k, b²_k)` is taken for
//! each adjacent pair.  The drift of this quantity over training is what
//! the theoretical solvers predict in closed form.

use ndarray::ArrayD;
use sm_store::{FeatureStore, PARAMS_GROUP};

use crate::error::Result;
use crate::features::{squared, LayerFeatures};
use crate::registry::LayerDescriptor;
use crate::synapse::projection_gap;
use crate::trajectory::LayerSeries;

/// Squared weight/bias of the layer feeding the current pair; threaded
/// through the ordered walk over the chain.
pub(crate) struct SquaredPair {
    pub w: ArrayD<f64>,
    pub b: ArrayD<f64>,
}

/// Computes the measured statistic for one step and appends it to `series`
/// under every non-first chain layer.
pub fn empirical_step(
    store: &FeatureStore,
    chain: &[LayerDescriptor],
    step: u64,
    series: &mut LayerSeries,
) -> Result<()> {
    let weights = LayerFeatures::load(store, &[step], chain, "weight", PARAMS_GROUP)?;
    let biases = LayerFeatures::load(store, &[step], chain, "bias", PARAMS_GROUP)?;

    let first = &chain[0];
    let mut carry = SquaredPair {
        w: squared(weights.tensor(&first.pretty, step)?),
        b: squared(biases.tensor(&first.pretty, step)?),
    };
    for layer in &chain[1..] {
        let w_out = squared(weights.tensor(&layer.pretty, step)?);
        let b_out = squared(biases.tensor(&layer.pretty, step)?);
        let gap = projection_gap::<f64>(&w_out, &carry.w, Some(&carry.b))?;
        series
            .entry(layer.pretty.clone())
            .or_default()
            .insert(step, gap);
        carry = SquaredPair { w: w_out, b: b_out };
    }
    Ok(())
}
