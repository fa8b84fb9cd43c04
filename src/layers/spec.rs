//! Declarative layer specifications
//!
//! A [`LayerSpec`] is what users write when declaring a network: a kind, a
//! width and a few optional settings. The graph builder turns specs into
//! shape-checked [`Layer`](super::Layer)s and allocates their parameters.

use std::fmt;

use ndarray::Array2;
use serde::{Deserialize, Serialize};

use crate::error::{NetworkError, Result};
use crate::utils::{Activation, RandomSource};

/// Closed set of layer kinds understood by the graph builder.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LayerKind {
    /// Entry point declaring the feature dimensionality.
    Input,
    /// Fully connected layer followed by an activation.
    Dense(Activation),
    /// Fully connected layer with a softmax output.
    Softmax,
    /// Joins the outputs of two or more layers side by side.
    Concatenate,
}

impl LayerKind {
    /// Short lowercase tag, used for generated layer names.
    pub fn tag(&self) -> &'static str {
        match self {
            LayerKind::Input => "input",
            LayerKind::Dense(Activation::Linear) => "linear",
            LayerKind::Dense(Activation::Relu) => "relu",
            LayerKind::Dense(Activation::Sigmoid) => "sigmoid",
            LayerKind::Dense(Activation::Tanh) => "tanh",
            LayerKind::Dense(Activation::Softmax) | LayerKind::Softmax => "softmax",
            LayerKind::Concatenate => "concatenate",
        }
    }

    /// Activation applied after the dense transformation, if the kind has one.
    pub fn activation(&self) -> Option<Activation> {
        match self {
            LayerKind::Dense(activation) => Some(*activation),
            LayerKind::Softmax => Some(Activation::Softmax),
            LayerKind::Input | LayerKind::Concatenate => None,
        }
    }

    /// Whether the kind owns a weight matrix and a bias row.
    pub fn has_parameters(&self) -> bool {
        self.activation().is_some()
    }
}

impl fmt::Display for LayerKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LayerKind::Input => write!(f, "Input"),
            LayerKind::Dense(activation) => write!(f, "Dense({activation})"),
            LayerKind::Softmax => write!(f, "Softmax"),
            LayerKind::Concatenate => write!(f, "Concatenate"),
        }
    }
}

/// Rule used to fill a freshly allocated parameter.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "type")]
pub enum Initializer {
    Zeros,
    Constant { value: f32 },
    Normal { std: f32 },
    /// Uniform in `[-limit, limit]` with `limit = sqrt(6 / (fan_in + fan_out))`.
    XavierUniform,
    /// Normal with `std = sqrt(2 / (fan_in + fan_out))`.
    XavierNormal,
    /// Normal with `std = sqrt(2 / fan_in)`.
    HeNormal,
}

impl Initializer {
    /// Check the rule's own parameters, without drawing anything.
    pub fn validate(&self) -> Result<()> {
        match *self {
            Initializer::Constant { value } if !value.is_finite() => Err(
                NetworkError::configuration("initializer value", value, "a finite value"),
            ),
            Initializer::Normal { std } if !(std.is_finite() && std >= 0.0) => Err(
                NetworkError::configuration("initializer std", std, "a finite value >= 0"),
            ),
            _ => Ok(()),
        }
    }

    /// Allocate a `rows x cols` matrix following this rule.
    ///
    /// `fan_in`/`fan_out` are the number of input and output units of the
    /// owning layer.
    pub fn initialize(
        &self,
        rows: usize,
        cols: usize,
        fan_in: usize,
        fan_out: usize,
        rng: &mut RandomSource,
    ) -> Result<Array2<f32>> {
        let mut buffer = vec![0.0f32; rows * cols];

        match *self {
            Initializer::Zeros => {}
            Initializer::Constant { value } => buffer.fill(value),
            Initializer::Normal { std } => rng.fill_normal(&mut buffer, 0.0, std)?,
            Initializer::XavierUniform => {
                let limit = (6.0f32 / (fan_in + fan_out).max(1) as f32).sqrt();
                rng.fill_uniform(&mut buffer, -limit, limit)?;
            }
            Initializer::XavierNormal => {
                let std = (2.0f32 / (fan_in + fan_out).max(1) as f32).sqrt();
                rng.fill_normal(&mut buffer, 0.0, std)?;
            }
            Initializer::HeNormal => {
                let std = (2.0f32 / fan_in.max(1) as f32).sqrt();
                rng.fill_normal(&mut buffer, 0.0, std)?;
            }
        }

        Array2::from_shape_vec((rows, cols), buffer)
            .map_err(|e| NetworkError::graph("initializer", e.to_string()))
    }
}

/// Declaration of one layer of a network.
///
/// # Example
///
/// ```
/// use momentum_nets::layers::LayerSpec;
///
/// let specs = vec![
///     LayerSpec::input(784),
///     LayerSpec::relu(500),
///     LayerSpec::relu(300),
///     LayerSpec::softmax(10),
/// ];
/// assert_eq!(specs[3].width(), Some(10));
/// ```
#[derive(Debug, Clone, PartialEq)]
pub struct LayerSpec {
    name: Option<String>,
    kind: LayerKind,
    width: Option<usize>,
    input_width: Option<usize>,
    initializer: Option<Initializer>,
}

impl LayerSpec {
    pub fn new(kind: LayerKind, width: Option<usize>) -> Self {
        Self {
            name: None,
            kind,
            width,
            input_width: None,
            initializer: None,
        }
    }

    pub fn input(width: usize) -> Self {
        Self::new(LayerKind::Input, Some(width))
    }

    pub fn dense(width: usize, activation: Activation) -> Self {
        Self::new(LayerKind::Dense(activation), Some(width))
    }

    pub fn linear(width: usize) -> Self {
        Self::dense(width, Activation::Linear)
    }

    pub fn relu(width: usize) -> Self {
        Self::dense(width, Activation::Relu)
    }

    pub fn sigmoid(width: usize) -> Self {
        Self::dense(width, Activation::Sigmoid)
    }

    pub fn tanh(width: usize) -> Self {
        Self::dense(width, Activation::Tanh)
    }

    pub fn softmax(width: usize) -> Self {
        Self::new(LayerKind::Softmax, Some(width))
    }

    /// A merge node; its width is the sum of its inputs' widths.
    pub fn concatenate() -> Self {
        Self::new(LayerKind::Concatenate, None)
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    /// Declare the width this layer expects to receive. The graph builder
    /// rejects the graph when the inferred width differs.
    pub fn with_input_width(mut self, width: usize) -> Self {
        self.input_width = Some(width);
        self
    }

    pub fn with_initializer(mut self, initializer: Initializer) -> Self {
        self.initializer = Some(initializer);
        self
    }

    pub fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    /// The declared name, or `"<kind>-<index>"` for a layer declared at
    /// position `index`.
    pub fn resolved_name(&self, index: usize) -> String {
        match &self.name {
            Some(name) => name.clone(),
            None => format!("{}-{index}", self.kind.tag()),
        }
    }

    pub fn kind(&self) -> LayerKind {
        self.kind
    }

    pub fn width(&self) -> Option<usize> {
        self.width
    }

    pub fn input_width(&self) -> Option<usize> {
        self.input_width
    }

    /// Initializer for the weight matrix: the declared one, or He for ReLU
    /// layers and Xavier for everything else.
    pub fn weight_initializer(&self) -> Initializer {
        self.initializer.unwrap_or(match self.kind.activation() {
            Some(Activation::Relu) => Initializer::HeNormal,
            _ => Initializer::XavierUniform,
        })
    }
}
