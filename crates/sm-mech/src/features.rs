// SPDX-License-Identifier: AGPL-3.0-or-later
// © 2025 Ryo ∴ SpiralArchitect (kishkavsesvit@icloud.com)
// Part of SpiralMech — Licensed under AGPL-3.0-or-later.
// Unauthorized derivative works or closed redistribution prohibited under AGPL §13.

//! Thin layer-aware wrappers around the feature store read path.

use ndarray::ArrayD;
use sm_store::{FeatureKey, FeatureMap, FeatureStore};

use crate::error::{MechError, Result};
use crate::registry::LayerDescriptor;

/// Builds store keys for one tensor suffix across a layer chain, keyed back
/// by pretty label (`features.0` + `weight` → `features.0.weight` / `conv1`).
pub(crate) fn feature_keys(chain: &[LayerDescriptor], suffix: &str) -> Vec<FeatureKey> {
    chain
        .iter()
        .map(|layer| FeatureKey::new(format!("{}.{}", layer.raw, suffix), layer.pretty.clone()))
        .collect()
}

/// Feature map with checked access; the loaders guarantee presence, so a
/// miss here means an internal bookkeeping bug, not bad input.
pub(crate) struct LayerFeatures(FeatureMap);

impl LayerFeatures {
    pub(crate) fn load(
        store: &FeatureStore,
        steps: &[u64],
        chain: &[LayerDescriptor],
        suffix: &str,
        group: &str,
    ) -> Result<LayerFeatures> {
        let keys = feature_keys(chain, suffix);
        Ok(LayerFeatures(store.load_features(steps, &keys, group)?))
    }

    pub(crate) fn tensor(&self, label: &str, step: u64) -> Result<&ArrayD<f64>> {
        self.0
            .get(label)
            .and_then(|series| series.get(&step))
            .ok_or_else(|| {
                MechError::Other(format!("feature `{label}` not loaded for step {step}"))
            })
    }
}

/// Elementwise square, the second-moment statistic all chain projections
/// are computed over.
pub(crate) fn squared(tensor: &ArrayD<f64>) -> ArrayD<f64> {
    tensor.mapv(|v| v * v)
}
