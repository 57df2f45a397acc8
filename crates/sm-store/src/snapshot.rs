// SPDX-License-Identifier: AGPL-3.0-or-later
// © 2025 Ryo ∴ SpiralArchitect (kishkavsesvit@icloud.com)
// Part of SpiralMech — Licensed under AGPL-3.0-or-later.
// Unauthorized derivative works or closed redistribution prohibited under AGPL §13.

//! Hierarchical per-step snapshot container.
//!
//! A [`Snapshot`] holds named tensor groups exactly the way the training
//! process logs them: the `"params"` group carries per-layer weights and
//! biases, the `"buffers"` group carries the optimizer's accumulated
//! integral buffers.  Tensors travel on disk as an explicit
//! [`StoredTensor`] shape/data pair so the wire format stays independent of
//! the in-memory layout.

use std::collections::BTreeMap;
use std::fs::File;
use std::io::{BufReader, BufWriter};
use std::path::Path;

use ndarray::{ArrayD, IxDyn};
use serde::{Deserialize, Serialize};

use crate::error::{Result, StoreError};

/// Group name for per-layer weight and bias tensors.
pub const PARAMS_GROUP: &str = "params";
/// Group name for optimizer integral-buffer tensors.
pub const BUFFERS_GROUP: &str = "buffers";

/// Row-major tensor payload as serialized into a snapshot.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct StoredTensor {
    shape: Vec<usize>,
    data: Vec<f64>,
}

impl StoredTensor {
    pub fn from_array(array: &ArrayD<f64>) -> StoredTensor {
        StoredTensor {
            shape: array.shape().to_vec(),
            data: array.iter().copied().collect(),
        }
    }

    pub fn to_array(&self, name: &str) -> Result<ArrayD<f64>> {
        let expected: usize = self.shape.iter().product();
        if expected != self.data.len() {
            return Err(StoreError::Shape {
                name: name.to_string(),
                message: format!(
                    "shape {:?} wants {} elements, payload has {}",
                    self.shape,
                    expected,
                    self.data.len()
                ),
            });
        }
        ArrayD::from_shape_vec(IxDyn(&self.shape), self.data.clone()).map_err(|err| {
            StoreError::Shape {
                name: name.to_string(),
                message: err.to_string(),
            }
        })
    }

    pub fn shape(&self) -> &[usize] {
        &self.shape
    }
}

/// One training step's worth of logged tensors, keyed group → raw name.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Snapshot {
    groups: BTreeMap<String, BTreeMap<String, StoredTensor>>,
}

impl Snapshot {
    pub fn new() -> Snapshot {
        Snapshot::default()
    }

    pub fn insert(&mut self, group: &str, name: &str, tensor: &ArrayD<f64>) {
        self.groups
            .entry(group.to_string())
            .or_default()
            .insert(name.to_string(), StoredTensor::from_array(tensor));
    }

    pub fn group(&self, group: &str) -> Option<&BTreeMap<String, StoredTensor>> {
        self.groups.get(group)
    }

    pub fn group_names(&self) -> impl Iterator<Item = &str> {
        self.groups.keys().map(String::as_str)
    }

    /// Writes the snapshot with the compact binary codec.  The file handle
    /// lives only for the duration of the call.
    pub fn save_bincode<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let path = path.as_ref();
        let file = File::create(path).map_err(|source| StoreError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let writer = BufWriter::new(file);
        bincode::serialize_into(writer, self).map_err(|err| StoreError::Codec {
            path: path.to_path_buf(),
            message: err.to_string(),
        })
    }

    pub fn load_bincode<P: AsRef<Path>>(path: P) -> Result<Snapshot> {
        let path = path.as_ref();
        let file = File::open(path).map_err(|source| StoreError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let reader = BufReader::new(file);
        bincode::deserialize_from(reader).map_err(|err| StoreError::Codec {
            path: path.to_path_buf(),
            message: err.to_string(),
        })
    }

    /// JSON twin of [`Snapshot::save_bincode`] for interchange and manual
    /// inspection of logged checkpoints.
    pub fn save_json<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let path = path.as_ref();
        let file = File::create(path).map_err(|source| StoreError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let writer = BufWriter::new(file);
        serde_json::to_writer(writer, self).map_err(|err| StoreError::Codec {
            path: path.to_path_buf(),
            message: err.to_string(),
        })
    }

    pub fn load_json<P: AsRef<Path>>(path: P) -> Result<Snapshot> {
        let path = path.as_ref();
        let file = File::open(path).map_err(|source| StoreError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let reader = BufReader::new(file);
        serde_json::from_reader(reader).map_err(|err| StoreError::Codec {
            path: path.to_path_buf(),
            message: err.to_string(),
        })
    }
}
