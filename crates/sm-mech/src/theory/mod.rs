// SPDX-License-Identifier: AGPL-3.0-or-later
// © 2025 Ryo ∴ SpiralArchitect (kishkavsesvit@icloud.com)
// Part of SpiralMech — Licensed under AGPL-3.0-or-later.
// Unauthorized derivative works or closed redistribution prohibited under AGPL §13.

//! Closed-form trajectory solvers.
//!
//! Under constant learning rate `lr` and weight decay `wd`, the continuous
//! limit of each parameter's second moment obeys a linear ODE whose exact
//! solution splits into a homogeneous part (the decayed initial condition)
//! and an inhomogeneous part driven by the stochastic gradient noise the
//! optimizer logged into its integral buffers.  [`plain`] solves the
//! first-order case, [`momentum`] the damped-oscillator second-order case,
//! [`translation`] the last-layer translation projection.

pub mod momentum;
pub mod plain;
pub mod translation;

use std::collections::BTreeMap;

use ndarray::ArrayD;
use sm_store::{FeatureStore, PARAMS_GROUP};

use crate::error::{MechError, Result};
use crate::features::{squared, LayerFeatures};
use crate::registry::LayerDescriptor;

/// Squared step-zero weights and biases per pretty label.  Loaded once per
/// run; every solver step decays these rather than re-reading the store.
pub(crate) struct InitialConditions {
    w_sq: BTreeMap<String, ArrayD<f64>>,
    b_sq: BTreeMap<String, ArrayD<f64>>,
}

impl InitialConditions {
    pub(crate) fn load(
        store: &FeatureStore,
        chain: &[LayerDescriptor],
        step_zero: u64,
    ) -> Result<InitialConditions> {
        let weights = LayerFeatures::load(store, &[step_zero], chain, "weight", PARAMS_GROUP)?;
        let biases = LayerFeatures::load(store, &[step_zero], chain, "bias", PARAMS_GROUP)?;
        let mut w_sq = BTreeMap::new();
        let mut b_sq = BTreeMap::new();
        for layer in chain {
            w_sq.insert(
                layer.pretty.clone(),
                squared(weights.tensor(&layer.pretty, step_zero)?),
            );
            b_sq.insert(
                layer.pretty.clone(),
                squared(biases.tensor(&layer.pretty, step_zero)?),
            );
        }
        Ok(InitialConditions { w_sq, b_sq })
    }

    pub(crate) fn weight(&self, label: &str) -> Result<&ArrayD<f64>> {
        self.w_sq
            .get(label)
            .ok_or_else(|| MechError::Other(format!("no initial weight for layer `{label}`")))
    }

    pub(crate) fn bias(&self, label: &str) -> Result<&ArrayD<f64>> {
        self.b_sq
            .get(label)
            .ok_or_else(|| MechError::Other(format!("no initial bias for layer `{label}`")))
    }
}
