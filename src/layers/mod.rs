//! Layer abstractions for neural networks
//!
//! The supported layer set is closed: [`LayerKind`] enumerates what users can
//! declare and [`Layer`] is its compiled, shape-resolved counterpart. Dispatch
//! is a plain `match` over the variants.

pub mod concatenate;
pub mod dense;
mod parameter;
mod spec;

pub use concatenate::Concatenate;
pub use dense::{DenseGradients, DenseLayer};
pub use parameter::{ParamId, Parameter};
pub use spec::{Initializer, LayerKind, LayerSpec};

/// A layer whose input and output widths are known.
#[derive(Debug, Clone, PartialEq)]
pub enum Layer {
    Input { width: usize },
    Dense(DenseLayer),
    Concatenate(Concatenate),
}

impl Layer {
    /// Get the input width of the layer.
    pub fn input_width(&self) -> usize {
        match self {
            Layer::Input { width } => *width,
            Layer::Dense(layer) => layer.input_width(),
            Layer::Concatenate(layer) => layer.output_width(),
        }
    }

    /// Get the output width of the layer.
    pub fn output_width(&self) -> usize {
        match self {
            Layer::Input { width } => *width,
            Layer::Dense(layer) => layer.output_width(),
            Layer::Concatenate(layer) => layer.output_width(),
        }
    }

    /// Get the number of trainable scalars in the layer.
    pub fn parameter_count(&self) -> usize {
        match self {
            Layer::Dense(layer) => layer.parameter_count(),
            Layer::Input { .. } | Layer::Concatenate(_) => 0,
        }
    }

    /// Parameters owned by this layer, in allocation order.
    pub fn parameter_ids(&self) -> Vec<ParamId> {
        match self {
            Layer::Dense(layer) => vec![layer.weight(), layer.bias()],
            Layer::Input { .. } | Layer::Concatenate(_) => Vec::new(),
        }
    }
}
