// SPDX-License-Identifier: AGPL-3.0-or-later
// © 2025 Ryo ∴ SpiralArchitect (kishkavsesvit@icloud.com)
// Part of SpiralMech — Licensed under AGPL-3.0-or-later.
// Unauthorized derivative works or closed redistribution prohibited under AGPL §13.

//! Result containers handed to downstream plotting / caching.
//!
//! Ordered maps keep the output deterministic: two runs over identical
//! snapshots produce bit-identical reports.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// step → per-channel projection value.
pub type StepSeries = BTreeMap<u64, Vec<f64>>;

/// pretty layer label → time series.
pub type LayerSeries = BTreeMap<String, StepSeries>;

/// Measured and predicted trajectories for every non-first chain layer.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct TrajectoryReport {
    pub empirical: LayerSeries,
    pub theoretical: LayerSeries,
}

/// Last-layer translation projection across time.
///
/// `empirical[i]` / `theoretical[i]` correspond to `steps[i]`; rows have
/// one entry per input feature of the final layer plus one for the bias
/// column.  When normalized, empirical rows are ratios against step 0 and
/// theoretical rows are the scalar envelope broadcast across channels.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct TranslationSeries {
    pub steps: Vec<u64>,
    pub empirical: Vec<Vec<f64>>,
    pub theoretical: Vec<Vec<f64>>,
}
