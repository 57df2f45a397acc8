// SPDX-License-Identifier: AGPL-3.0-or-later
// © 2025 Ryo ∴ SpiralArchitect (kishkavsesvit@icloud.com)
// Part of SpiralMech — Licensed under AGPL-3.0-or-later.
// Unauthorized derivative works or closed redistribution prohibited under AGPL §13.

//! Read path over a directory of per-step snapshots.
//!
//! The store is rooted at a directory of `step{N}.bin` files, one per logged
//! training step.  Every [`FeatureStore::load_features`] call opens the
//! snapshot, pulls the requested tensors and closes the file again; nothing
//! is cached between calls, so callers on a hot path batch what they need
//! per step.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use ndarray::ArrayD;

use crate::error::{Result, StoreError};
use crate::snapshot::Snapshot;

/// Raw tensor name inside a snapshot group, paired with the label the
/// caller wants the result keyed by (e.g. `features.0.weight` → `conv1`).
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct FeatureKey {
    pub name: String,
    pub label: String,
}

impl FeatureKey {
    pub fn new(name: impl Into<String>, label: impl Into<String>) -> FeatureKey {
        FeatureKey {
            name: name.into(),
            label: label.into(),
        }
    }
}

/// label → step → tensor, as returned by [`FeatureStore::load_features`].
pub type FeatureMap = BTreeMap<String, BTreeMap<u64, ArrayD<f64>>>;

/// Read-only view over a snapshot directory.
#[derive(Clone, Debug)]
pub struct FeatureStore {
    root: PathBuf,
}

impl FeatureStore {
    pub fn new(root: impl Into<PathBuf>) -> FeatureStore {
        FeatureStore { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn snapshot_path(&self, step: u64) -> PathBuf {
        self.root.join(format!("step{step}.bin"))
    }

    pub fn has_snapshot(&self, step: u64) -> bool {
        self.snapshot_path(step).is_file()
    }

    /// Loads `keys` from `group` for every requested step.
    ///
    /// Fails with [`StoreError::MissingSnapshot`] when a step has no file on
    /// disk and with [`StoreError::MissingTensor`] when a name is absent
    /// from the group; both indicate a mismatch between the architecture
    /// mapping and what the training process actually logged.
    pub fn load_features(
        &self,
        steps: &[u64],
        keys: &[FeatureKey],
        group: &str,
    ) -> Result<FeatureMap> {
        let mut out: FeatureMap = keys
            .iter()
            .map(|key| (key.label.clone(), BTreeMap::new()))
            .collect();
        for &step in steps {
            let path = self.snapshot_path(step);
            let snapshot = self.open_snapshot(step)?;
            let tensors = snapshot
                .group(group)
                .ok_or_else(|| StoreError::MissingGroup {
                    group: group.to_string(),
                    path: path.clone(),
                })?;
            for key in keys {
                let stored = tensors
                    .get(&key.name)
                    .ok_or_else(|| StoreError::MissingTensor {
                        group: group.to_string(),
                        name: key.name.clone(),
                        path: path.clone(),
                    })?;
                let array = stored.to_array(&key.name)?;
                if let Some(series) = out.get_mut(&key.label) {
                    series.insert(step, array);
                }
            }
            tracing::debug!(step, group, tensors = keys.len(), "loaded feature group");
        }
        Ok(out)
    }

    fn open_snapshot(&self, step: u64) -> Result<Snapshot> {
        let path = self.snapshot_path(step);
        if !path.is_file() {
            return Err(StoreError::MissingSnapshot { path });
        }
        Snapshot::load_bincode(&path)
    }
}
