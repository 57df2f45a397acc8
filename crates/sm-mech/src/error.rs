// SPDX-License-Identifier: AGPL-3.0-or-later
// © 2025 Ryo ∴ SpiralArchitect (kishkavsesvit@icloud.com)
// Part of SpiralMech — Licensed under AGPL-3.0-or-later.
// Unauthorized derivative works or closed redistribution prohibited under AGPL §13.

use thiserror::Error;

use crate::registry::LayerKind;

pub type Result<T> = std::result::Result<T, MechError>;

#[derive(Debug, Error)]
pub enum MechError {
    #[error(transparent)]
    Store(#[from] sm_store::StoreError),
    #[error("unknown model architecture `{0}`")]
    UnknownArchitecture(String),
    /// The projection subtracts consecutive layers, so a chain shorter than
    /// two layers carries no statistic.
    #[error("architecture `{arch}` exposes {len} {kind:?} layer(s); the chain statistic needs at least 2")]
    ChainTooShort {
        arch: String,
        kind: LayerKind,
        len: usize,
    },
    #[error("expected a rank-2 or rank-4 weight tensor, got rank {0}")]
    UnsupportedRank(usize),
    #[error("bias of length {bias} does not match {channels} output channels")]
    BiasMismatch { bias: usize, channels: usize },
    #[error("outgoing projection has {out} channels but incoming has {inp}")]
    ChannelMismatch { out: usize, inp: usize },
    #[error("invalid hyperparameters: {0}")]
    InvalidHyper(String),
    #[error("steps must be non-empty and strictly ascending")]
    BadSteps,
    #[error("{0}")]
    Other(String),
}
