// SPDX-License-Identifier: AGPL-3.0-or-later
// © 2025 Ryo ∴ SpiralArchitect (kishkavsesvit@icloud.com)
// Part of SpiralMech — Licensed under AGPL-3.0-or-later.
// Unauthorized derivative works or closed redistribution prohibited under AGPL §13.

use std::path::PathBuf;

use thiserror::Error;

pub type Result<T> = std::result::Result<T, StoreError>;

/// Errors surfaced by the snapshot container and the feature store.
#[derive(Debug, Error)]
pub enum StoreError {
    /// No snapshot file exists for the requested training step.
    #[error("snapshot not found at {path}")]
    MissingSnapshot { path: PathBuf },
    /// The snapshot exists but does not contain the requested group.
    #[error("group `{group}` missing from snapshot {path}")]
    MissingGroup { group: String, path: PathBuf },
    /// The group exists but does not contain the requested tensor.
    #[error("tensor `{name}` missing from group `{group}` in snapshot {path}")]
    MissingTensor {
        group: String,
        name: String,
        path: PathBuf,
    },
    /// A stored tensor's payload does not match its recorded shape.
    #[error("tensor `{name}` is malformed: {message}")]
    Shape { name: String, message: String },
    #[error("io error on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    /// Snapshot bytes could not be encoded or decoded.
    #[error("codec error on {path}: {message}")]
    Codec { path: PathBuf, message: String },
}
