//! Architecture configuration structures
//!
//! This module provides configuration structures for defining network
//! architectures via JSON files, so that layer graphs can be changed without
//! touching code.
//!
//! Layers are listed in declaration order. Without `edges` they are chained;
//! with `edges` every connection is explicit and refers to layers by name.
//! Unnamed layers can be referred to by their generated name, the kind tag
//! followed by the declaration index (`relu-1`, `concatenate-3`).
//!
//! # Example
//!
//! ```json
//! {
//!   "layers": [
//!     { "kind": "input", "width": 2, "name": "features" },
//!     { "kind": "dense", "width": 8, "activation": "relu", "name": "left" },
//!     { "kind": "dense", "width": 8, "activation": "tanh", "name": "right" },
//!     { "kind": "concatenate", "name": "merge" },
//!     { "kind": "softmax", "width": 2, "input_width": 16, "name": "output" }
//!   ],
//!   "edges": [
//!     { "from": "features", "to": "left" },
//!     { "from": "features", "to": "right" },
//!     { "from": "left", "to": "merge" },
//!     { "from": "right", "to": "merge" },
//!     { "from": "merge", "to": "output" }
//!   ]
//! }
//! ```

use std::collections::HashMap;
use std::fs;
use std::path::Path;

use serde::Deserialize;

use crate::error::{NetworkError, Result};
use crate::graph::{Graph, GraphBuilder, NodeId};
use crate::layers::{Initializer, LayerKind, LayerSpec};
use crate::utils::{Activation, RandomSource};

/// Configuration for a single layer.
///
/// - **input**: requires `width`
/// - **dense**: requires `width`, optional `activation` (default `linear`)
/// - **softmax**: requires `width` (at least 2)
/// - **concatenate**: `width` is inferred; a declared one must match
///
/// `input_width` is optional everywhere and checked against shape inference.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct LayerDescriptor {
    /// Layer kind: "input", "dense", "softmax" or "concatenate"
    pub kind: String,
    pub width: Option<usize>,
    /// Activation of a dense layer: "linear", "relu", "sigmoid", "tanh" or "softmax"
    pub activation: Option<String>,
    pub name: Option<String>,
    pub input_width: Option<usize>,
    pub initializer: Option<Initializer>,
}

/// A directed connection between two named layers.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct EdgeDescriptor {
    pub from: String,
    pub to: String,
}

/// Configuration for a whole layer graph.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ArchitectureConfig {
    pub layers: Vec<LayerDescriptor>,
    #[serde(default)]
    pub edges: Vec<EdgeDescriptor>,
}

impl LayerDescriptor {
    /// Convert into a [`LayerSpec`], resolving the kind and activation tags.
    pub fn to_spec(&self) -> Result<LayerSpec> {
        let activation = match &self.activation {
            Some(tag) => Some(tag.parse::<Activation>()?),
            None => None,
        };

        let kind = match self.kind.as_str() {
            "input" => LayerKind::Input,
            "dense" => LayerKind::Dense(activation.unwrap_or_default()),
            "softmax" => LayerKind::Softmax,
            "concatenate" => LayerKind::Concatenate,
            other => {
                return Err(NetworkError::configuration(
                    "kind",
                    other,
                    "one of input, dense, softmax, concatenate",
                ))
            }
        };
        if activation.is_some() && !matches!(kind, LayerKind::Dense(_)) {
            return Err(NetworkError::configuration(
                "activation",
                self.activation.as_deref().unwrap_or_default(),
                "no activation on non-dense layers",
            ));
        }

        let mut spec = LayerSpec::new(kind, self.width);
        if let Some(name) = &self.name {
            spec = spec.with_name(name.clone());
        }
        if let Some(width) = self.input_width {
            spec = spec.with_input_width(width);
        }
        if let Some(initializer) = self.initializer {
            spec = spec.with_initializer(initializer);
        }
        Ok(spec)
    }
}

impl ArchitectureConfig {
    /// Parse a JSON architecture.
    pub fn from_json(json: &str) -> Result<Self> {
        let config: ArchitectureConfig = serde_json::from_str(json)?;
        Ok(config)
    }

    /// Turn the descriptors into a [`GraphBuilder`].
    ///
    /// Edges refer to layers by name: the declared `name`, or the generated
    /// `"<kind>-<index>"` (e.g. `relu-1`) of an unnamed layer.
    pub fn into_builder(self) -> Result<GraphBuilder> {
        let mut builder = GraphBuilder::new();
        let mut ids: HashMap<String, NodeId> = HashMap::new();

        for (i, descriptor) in self.layers.iter().enumerate() {
            let spec = descriptor.to_spec()?;
            let name = spec.resolved_name(i);
            ids.insert(name, builder.add(spec));
        }

        for edge in &self.edges {
            let lookup = |name: &str| {
                ids.get(name).copied().ok_or_else(|| {
                    NetworkError::graph(name, "edge refers to an undeclared layer name")
                })
            };
            builder.connect(lookup(&edge.from)?, lookup(&edge.to)?);
        }

        Ok(builder)
    }

    /// Build the graph described by this configuration.
    pub fn build(self, rng: &mut RandomSource) -> Result<Graph> {
        self.into_builder()?.build(rng)
    }
}

/// Loads an architecture configuration from a JSON file.
///
/// # Examples
///
/// ```no_run
/// use momentum_nets::architecture::load_architecture;
///
/// let arch = load_architecture("config/architectures/two_class_mlp.json").unwrap();
/// assert!(!arch.layers.is_empty());
/// ```
pub fn load_architecture(path: impl AsRef<Path>) -> Result<ArchitectureConfig> {
    let contents = fs::read_to_string(path)?;
    ArchitectureConfig::from_json(&contents)
}
