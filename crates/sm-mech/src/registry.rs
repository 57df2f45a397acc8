// SPDX-License-Identifier: AGPL-3.0-or-later
// © 2025 Ryo ∴ SpiralArchitect (kishkavsesvit@icloud.com)
// Part of SpiralMech — Licensed under AGPL-3.0-or-later.
// Unauthorized derivative works or closed redistribution prohibited under AGPL §13.

//! Architecture registry.
//!
//! Maps a model architecture name to its ordered list of layer descriptors:
//! the raw name the training process logs tensors under, the pretty label
//! analysis output is keyed by, and the layer kind used to select which
//! layers participate in a projection chain.  The table is curated by hand
//! per architecture (checkpoint layer numbering is not derivable from the
//! architecture name alone); built-ins are registered on first use and
//! callers may add their own.

use std::collections::HashMap;
use std::sync::{Arc, OnceLock, RwLock};

use serde::{Deserialize, Serialize};

/// Coarse classification of a checkpoint layer.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum LayerKind {
    Conv,
    Linear,
    Norm,
}

/// One layer of an architecture as it appears in logged snapshots.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct LayerDescriptor {
    /// Raw name prefix tensors are logged under (e.g. `features.0`).
    pub raw: String,
    /// Human-facing sequential label (e.g. `conv1`).
    pub pretty: String,
    pub kind: LayerKind,
}

impl LayerDescriptor {
    pub fn new(raw: &str, pretty: &str, kind: LayerKind) -> LayerDescriptor {
        LayerDescriptor {
            raw: raw.to_string(),
            pretty: pretty.to_string(),
            kind,
        }
    }
}

/// Ordered layer table for one model architecture.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Architecture {
    name: String,
    layers: Vec<LayerDescriptor>,
}

impl Architecture {
    pub fn new(name: &str, layers: Vec<LayerDescriptor>) -> Architecture {
        Architecture {
            name: name.to_string(),
            layers,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn layers(&self) -> &[LayerDescriptor] {
        &self.layers
    }

    /// Ordered subset of layers with the given kind.
    pub fn chain(&self, kind: LayerKind) -> Vec<LayerDescriptor> {
        self.layers
            .iter()
            .filter(|layer| layer.kind == kind)
            .cloned()
            .collect()
    }
}

type RegistryMap = HashMap<String, Arc<Architecture>>;

static REGISTRY: OnceLock<RwLock<RegistryMap>> = OnceLock::new();
static BUILTINS: OnceLock<()> = OnceLock::new();

fn registry() -> &'static RwLock<RegistryMap> {
    REGISTRY.get_or_init(|| RwLock::new(HashMap::new()))
}

/// Registers (or replaces) an architecture.
pub fn register_architecture(architecture: Architecture) {
    let mut map = registry().write().unwrap_or_else(|err| err.into_inner());
    map.insert(architecture.name.clone(), Arc::new(architecture));
}

/// Looks up an architecture by name, registering the built-in table first.
pub fn lookup(name: &str) -> Option<Arc<Architecture>> {
    BUILTINS.get_or_init(register_builtins);
    let map = registry().read().unwrap_or_else(|err| err.into_inner());
    map.get(name).cloned()
}

/// Drops every registered architecture and restores the built-ins.  Tests
/// share one process-wide registry.
pub fn clear_for_tests() {
    {
        let mut map = registry().write().unwrap_or_else(|err| err.into_inner());
        map.clear();
    }
    register_builtins();
}

fn linear_stack(table: &[(&str, &str)]) -> Vec<LayerDescriptor> {
    table.iter()
        .map(|(raw, pretty)| {
            let kind = if pretty.starts_with("bn") {
                LayerKind::Norm
            } else {
                LayerKind::Linear
            };
            LayerDescriptor::new(raw, pretty, kind)
        })
        .collect()
}

fn vgg_stack(table: &[(&str, &str)]) -> Vec<LayerDescriptor> {
    table.iter()
        .map(|(raw, pretty)| {
            let kind = if pretty.starts_with("conv") {
                LayerKind::Conv
            } else if pretty.starts_with("bn") {
                LayerKind::Norm
            } else {
                LayerKind::Linear
            };
            LayerDescriptor::new(raw, pretty, kind)
        })
        .collect()
}

fn register_builtins() {
    register_architecture(Architecture::new(
        "logistic",
        linear_stack(&[("1", "classifier")]),
    ));
    register_architecture(Architecture::new(
        "fc",
        linear_stack(&[
            ("1", "fc1"),
            ("3", "fc2"),
            ("5", "fc3"),
            ("7", "fc4"),
            ("9", "fc5"),
            ("11", "classifier"),
        ]),
    ));
    register_architecture(Architecture::new(
        "fc-bn",
        linear_stack(&[
            ("1", "fc1"),
            ("2", "bn1"),
            ("4", "fc2"),
            ("5", "bn2"),
            ("7", "fc3"),
            ("8", "bn3"),
            ("10", "fc4"),
            ("11", "bn4"),
            ("13", "fc5"),
            ("14", "bn5"),
            ("16", "classifier"),
        ]),
    ));
    register_architecture(Architecture::new(
        "vgg16",
        vgg_stack(&[
            ("features.0", "conv1"),
            ("features.2", "conv2"),
            ("features.5", "conv3"),
            ("features.7", "conv4"),
            ("features.10", "conv5"),
            ("features.12", "conv6"),
            ("features.14", "conv7"),
            ("features.17", "conv8"),
            ("features.19", "conv9"),
            ("features.21", "conv10"),
            ("features.24", "conv11"),
            ("features.26", "conv12"),
            ("features.28", "conv13"),
            ("classifier.0", "fc1"),
            ("classifier.3", "fc2"),
            ("classifier.6", "classifier"),
        ]),
    ));
    register_architecture(Architecture::new(
        "vgg16-bn",
        vgg_stack(&[
            ("features.0", "conv1"),
            ("features.1", "bn1"),
            ("features.3", "conv2"),
            ("features.4", "bn2"),
            ("features.7", "conv3"),
            ("features.8", "bn3"),
            ("features.10", "conv4"),
            ("features.11", "bn4"),
            ("features.14", "conv5"),
            ("features.15", "bn5"),
            ("features.17", "conv6"),
            ("features.18", "bn6"),
            ("features.20", "conv7"),
            ("features.21", "bn7"),
            ("features.24", "conv8"),
            ("features.25", "bn8"),
            ("features.27", "conv9"),
            ("features.28", "bn9"),
            ("features.30", "conv10"),
            ("features.31", "bn10"),
            ("features.34", "conv11"),
            ("features.35", "bn11"),
            ("features.37", "conv12"),
            ("features.38", "bn12"),
            ("features.40", "conv13"),
            ("features.41", "bn13"),
            ("classifier.0", "fc1"),
            ("classifier.3", "fc2"),
            ("classifier.6", "classifier"),
        ]),
    ));
}
