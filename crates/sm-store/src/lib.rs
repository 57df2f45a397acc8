// SPDX-License-Identifier: AGPL-3.0-or-later
// © 2025 Ryo ∴ SpiralArchitect (kishkavsesvit@icloud.com)
// Part of SpiralMech — Licensed under AGPL-3.0-or-later.
// Unauthorized derivative works or closed redistribution prohibited under AGPL §13.

//! Snapshot container and feature store for SpiralMech.
//!
//! The training process writes one [`Snapshot`] per logged step; analysis
//! code reads them back through [`FeatureStore`], addressing tensors by
//! group (`"params"` / `"buffers"`) and raw per-layer name.

pub mod error;
pub mod reader;
pub mod snapshot;

pub use error::{Result, StoreError};
pub use reader::{FeatureKey, FeatureMap, FeatureStore};
pub use snapshot::{Snapshot, StoredTensor, BUFFERS_GROUP, PARAMS_GROUP};
