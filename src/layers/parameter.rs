//! Learnable tensors.

use ndarray::Array2;

/// Index of a parameter in a graph's stable parameter list.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ParamId(pub(crate) usize);

impl ParamId {
    pub fn index(self) -> usize {
        self.0
    }
}

/// A named tensor owned by the layer that declares it.
///
/// Weights are `(fan_in, fan_out)` matrices, biases are `(1, fan_out)` rows, so
/// every parameter (and every gradient and velocity) is an `Array2<f32>`.
#[derive(Debug, Clone, PartialEq)]
pub struct Parameter {
    name: String,
    layer: String,
    value: Array2<f32>,
}

impl Parameter {
    pub fn new(layer: &str, suffix: &str, value: Array2<f32>) -> Self {
        Self {
            name: format!("{layer}/{suffix}"),
            layer: layer.to_string(),
            value,
        }
    }

    /// Fully qualified name, e.g. `relu-1/weight`.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Name of the owning layer.
    pub fn layer(&self) -> &str {
        &self.layer
    }

    pub fn value(&self) -> &Array2<f32> {
        &self.value
    }

    pub fn value_mut(&mut self) -> &mut Array2<f32> {
        &mut self.value
    }

    pub fn shape(&self) -> (usize, usize) {
        self.value.dim()
    }

    pub fn len(&self) -> usize {
        self.value.len()
    }

    pub fn is_empty(&self) -> bool {
        self.value.is_empty()
    }
}
