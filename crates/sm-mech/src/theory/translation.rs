// SPDX-License-Identifier: AGPL-3.0-or-later
// © 2025 Ryo ∴ SpiralArchitect (kishkavsesvit@icloud.com)
// Part of SpiralMech — Licensed under AGPL-3.0-or-later.
// Unauthorized derivative works or closed redistribution prohibited under AGPL §13.

//! Translation projection of the final layer.
//!
//! Translation symmetry of the softmax ties the classifier's parameters
//! along the all-ones direction.  The tracked statistic stacks the final
//! linear layer's weight matrix with its bias as an extra column and sums
//! over the output axis.  The discrete update admits the exact envelope
//!
//! ```text
//! scale(t) = (α₊·e^{α₋·t} − α₋·e^{α₊·t}) / (α₊ − α₋),
//! α_± = (−1 ± sqrt(1 − 2·lr·wd)) / lr,   t = lr·step
//! ```
//!
//! applied to the step-zero projection.

use ndarray::ArrayD;
use sm_store::{FeatureStore, PARAMS_GROUP};

use crate::error::{MechError, Result};
use crate::features::LayerFeatures;
use crate::hyper::SgdHyper;
use crate::registry::LayerDescriptor;
use crate::synapse::out_synapses;
use crate::trajectory::TranslationSeries;

/// Column sums of `[W | b]`: the weight's per-input-feature sums with the
/// bias total appended.
fn stacked_projection(w: &ArrayD<f64>, b: &ArrayD<f64>) -> Result<Vec<f64>> {
    if w.ndim() != 2 {
        return Err(MechError::UnsupportedRank(w.ndim()));
    }
    let mut projection = out_synapses::<f64>(w)?;
    projection.push(b.iter().sum());
    Ok(projection)
}

fn envelope(hyper: &SgdHyper, step: u64) -> Result<f64> {
    let discriminant = 1.0 - 2.0 * hyper.lr * hyper.wd;
    if discriminant <= 0.0 {
        return Err(MechError::InvalidHyper(format!(
            "translation envelope needs 1 - 2·lr·wd > 0, got {discriminant}"
        )));
    }
    let root = discriminant.sqrt();
    let alpha_p = (-1.0 + root) / hyper.lr;
    let alpha_m = (-1.0 - root) / hyper.lr;
    let t = hyper.tau(step);
    Ok((alpha_p * (alpha_m * t).exp() - alpha_m * (alpha_p * t).exp()) / (alpha_p - alpha_m))
}

/// Computes the translation series for the architecture's final layer.
pub fn translation_series(
    store: &FeatureStore,
    last: &LayerDescriptor,
    steps: &[u64],
    hyper: &SgdHyper,
    normalize: bool,
) -> Result<TranslationSeries> {
    let chain = std::slice::from_ref(last);
    let step_zero = steps[0];
    let weights_0 = LayerFeatures::load(store, &[step_zero], chain, "weight", PARAMS_GROUP)?;
    let biases_0 = LayerFeatures::load(store, &[step_zero], chain, "bias", PARAMS_GROUP)?;
    let base = stacked_projection(
        weights_0.tensor(&last.pretty, step_zero)?,
        biases_0.tensor(&last.pretty, step_zero)?,
    )?;

    let mut series = TranslationSeries {
        steps: steps.to_vec(),
        empirical: Vec::with_capacity(steps.len()),
        theoretical: Vec::with_capacity(steps.len()),
    };

    for &step in steps {
        let scale = envelope(hyper, step)?;
        let theoretical = if normalize {
            vec![scale; base.len()]
        } else {
            base.iter().map(|v| scale * v).collect()
        };
        series.theoretical.push(theoretical);

        let weights = LayerFeatures::load(store, &[step], chain, "weight", PARAMS_GROUP)?;
        let biases = LayerFeatures::load(store, &[step], chain, "bias", PARAMS_GROUP)?;
        let projection = stacked_projection(
            weights.tensor(&last.pretty, step)?,
            biases.tensor(&last.pretty, step)?,
        )?;
        let empirical = if normalize {
            projection
                .iter()
                .zip(&base)
                .map(|(now, then)| now / then)
                .collect()
        } else {
            projection
        };
        series.empirical.push(empirical);
    }
    Ok(series)
}
