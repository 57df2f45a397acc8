// SPDX-License-Identifier: AGPL-3.0-or-later
// © 2025 Ryo ∴ SpiralArchitect (kishkavsesvit@icloud.com)
// Part of SpiralMech — Licensed under AGPL-3.0-or-later.
// Unauthorized derivative works or closed redistribution prohibited under AGPL §13.

//! Drives the empirical and theoretical computations over a step list.
//!
//! Steps must arrive strictly ascending: the solvers thread a carry
//! (`W_in`/`b_in`, and for momentum the two buffer pairs) along the layer
//! chain within each step, and the initial conditions are anchored at the
//! first step of the list.  For each step the theoretical pass runs first
//! (loading the buffers group only past the first index), then the
//! empirical pass over the params group.

use std::sync::Arc;

use sm_store::FeatureStore;

use crate::empirical::empirical_step;
use crate::error::{MechError, Result};
use crate::hyper::{MomentumHyper, SgdHyper};
use crate::registry::{self, Architecture, LayerDescriptor, LayerKind};
use crate::theory::momentum::momentum_step;
use crate::theory::plain::{theoretical_step, NoiseScaling};
use crate::theory::translation::translation_series;
use crate::theory::InitialConditions;
use crate::trajectory::{TrajectoryReport, TranslationSeries};

#[derive(Debug)]
pub struct Orchestrator {
    store: FeatureStore,
    architecture: Arc<Architecture>,
}

impl Orchestrator {
    /// Binds a snapshot directory to a registered architecture.
    pub fn new(store_root: impl Into<std::path::PathBuf>, model: &str) -> Result<Orchestrator> {
        let architecture = registry::lookup(model)
            .ok_or_else(|| MechError::UnknownArchitecture(model.to_string()))?;
        Ok(Orchestrator {
            store: FeatureStore::new(store_root),
            architecture,
        })
    }

    pub fn store(&self) -> &FeatureStore {
        &self.store
    }

    pub fn architecture(&self) -> &Architecture {
        &self.architecture
    }

    fn conv_chain(&self) -> Result<Vec<LayerDescriptor>> {
        let chain = self.architecture.chain(LayerKind::Conv);
        if chain.len() < 2 {
            return Err(MechError::ChainTooShort {
                arch: self.architecture.name().to_string(),
                kind: LayerKind::Conv,
                len: chain.len(),
            });
        }
        Ok(chain)
    }

    fn check_steps(steps: &[u64]) -> Result<()> {
        if steps.is_empty() || steps.windows(2).any(|pair| pair[0] >= pair[1]) {
            return Err(MechError::BadSteps);
        }
        Ok(())
    }

    /// Rescale statistic: quadratic (`lr²`) noise-integral scaling.
    pub fn rescale(&self, steps: &[u64], hyper: &SgdHyper) -> Result<TrajectoryReport> {
        self.run_plain(steps, hyper, NoiseScaling::Quadratic)
    }

    /// Inversion statistic: identical chain statistic with linear (`lr`)
    /// noise-integral scaling.
    pub fn inversion(&self, steps: &[u64], hyper: &SgdHyper) -> Result<TrajectoryReport> {
        self.run_plain(steps, hyper, NoiseScaling::Linear)
    }

    fn run_plain(
        &self,
        steps: &[u64],
        hyper: &SgdHyper,
        scaling: NoiseScaling,
    ) -> Result<TrajectoryReport> {
        hyper.validate()?;
        Self::check_steps(steps)?;
        let chain = self.conv_chain()?;
        tracing::info!(
            model = self.architecture.name(),
            steps = steps.len(),
            layers = chain.len(),
            ?scaling,
            "computing weight-decay trajectories"
        );

        let init = InitialConditions::load(&self.store, &chain, steps[0])?;
        let mut report = TrajectoryReport::default();
        for (index, &step) in steps.iter().enumerate() {
            theoretical_step(
                &self.store,
                &chain,
                step,
                index,
                &init,
                hyper,
                scaling,
                &mut report.theoretical,
            )?;
            empirical_step(&self.store, &chain, step, &mut report.empirical)?;
            tracing::debug!(step, "step processed");
        }
        Ok(report)
    }

    /// Rescale statistic under momentum + dampening.
    pub fn rescale_momentum(
        &self,
        steps: &[u64],
        hyper: &MomentumHyper,
    ) -> Result<TrajectoryReport> {
        hyper.validate()?;
        Self::check_steps(steps)?;
        let chain = self.conv_chain()?;
        tracing::info!(
            model = self.architecture.name(),
            steps = steps.len(),
            layers = chain.len(),
            "computing momentum trajectories"
        );

        let init = InitialConditions::load(&self.store, &chain, steps[0])?;
        let mut report = TrajectoryReport::default();
        for (index, &step) in steps.iter().enumerate() {
            momentum_step(
                &self.store,
                &chain,
                step,
                index,
                &init,
                hyper,
                &mut report.theoretical,
            )?;
            empirical_step(&self.store, &chain, step, &mut report.empirical)?;
            tracing::debug!(step, "step processed");
        }
        Ok(report)
    }

    /// Translation projection of the architecture's final layer.
    pub fn translation(
        &self,
        steps: &[u64],
        hyper: &SgdHyper,
        normalize: bool,
    ) -> Result<TranslationSeries> {
        hyper.validate()?;
        Self::check_steps(steps)?;
        let last = self.architecture.layers().last().ok_or_else(|| {
            MechError::Other(format!(
                "architecture `{}` has no layers",
                self.architecture.name()
            ))
        })?;
        tracing::info!(
            model = self.architecture.name(),
            layer = %last.pretty,
            steps = steps.len(),
            normalize,
            "computing translation projection"
        );
        translation_series(&self.store, last, steps, hyper, normalize)
    }
}
