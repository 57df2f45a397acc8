// SPDX-License-Identifier: AGPL-3.0-or-later
// © 2025 Ryo ∴ SpiralArchitect (kishkavsesvit@icloud.com)
// Part of SpiralMech — Licensed under AGPL-3.0-or-later.
// Unauthorized derivative works or closed redistribution prohibited under AGPL §13.

//! Closed-form mechanics of SGD training trajectories.
//!
//! Given per-step snapshots logged by a training run (weights, biases, and
//! the optimizer's noise-integral buffers), this crate compares the
//! *measured* drift of per-layer synapse projections against the *exact*
//! solution of the continuous-time dynamics induced by SGD with weight
//! decay, with or without momentum.
//!
//! - [`synapse`]: the per-channel in/out reductions and their gap.
//! - [`empirical`]: the measured statistic over a layer chain.
//! - [`theory`]: closed-form solvers (first-order, damped-oscillator,
//!   translation).
//! - [`orchestrate`]: per-step driver producing [`TrajectoryReport`]s.
//! - [`registry`]: curated architecture layer tables.
//! - [`real`]: the opt-in extended-precision scalar seam.

pub mod empirical;
pub mod error;
mod features;
pub mod hyper;
pub mod orchestrate;
pub mod real;
pub mod registry;
pub mod synapse;
pub mod telemetry;
pub mod theory;
pub mod trajectory;

pub use error::{MechError, Result};
pub use hyper::{Damping, MomentumHyper, Regime, SgdHyper};
pub use orchestrate::Orchestrator;
pub use real::Real;
pub use registry::{register_architecture, Architecture, LayerDescriptor, LayerKind};
pub use synapse::{in_synapses, out_synapses, projection_gap};
pub use theory::plain::NoiseScaling;
pub use trajectory::{LayerSeries, StepSeries, TrajectoryReport, TranslationSeries};
