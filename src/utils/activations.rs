//! Activation functions for neural networks
//!
//! Activations operate row-wise on `(batch, width)` matrices:
//! - Linear (identity)
//! - ReLU
//! - Sigmoid
//! - Tanh
//! - Softmax (output layers)

use std::fmt;
use std::str::FromStr;

use ndarray::{Array2, ArrayView2, Axis, Zip};
use serde::{Deserialize, Serialize};

use crate::error::NetworkError;

/// Nonlinearity applied after a dense transformation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum Activation {
    #[default]
    Linear,
    Relu,
    Sigmoid,
    Tanh,
    Softmax,
}

impl Activation {
    /// Apply the activation to pre-activations `z`, returning a new matrix.
    pub fn forward(self, z: &ArrayView2<f32>) -> Array2<f32> {
        match self {
            Activation::Linear => z.to_owned(),
            Activation::Relu => z.mapv(|v| v.max(0.0)),
            Activation::Sigmoid => z.mapv(sigmoid),
            Activation::Tanh => z.mapv(f32::tanh),
            Activation::Softmax => {
                let mut out = z.to_owned();
                softmax_rows(&mut out);
                out
            }
        }
    }

    /// Backpropagate `grad_output` through the activation.
    ///
    /// `output` is the activated value produced by [`Activation::forward`].
    /// Softmax uses the full per-row Jacobian: `dz = a * (da - sum(da * a))`.
    pub fn backward(self, output: &ArrayView2<f32>, grad_output: &ArrayView2<f32>) -> Array2<f32> {
        match self {
            Activation::Linear => grad_output.to_owned(),
            Activation::Relu => {
                let mut grad = grad_output.to_owned();
                Zip::from(&mut grad).and(output).for_each(|g, &a| {
                    if a <= 0.0 {
                        *g = 0.0;
                    }
                });
                grad
            }
            Activation::Sigmoid => {
                let mut grad = grad_output.to_owned();
                Zip::from(&mut grad)
                    .and(output)
                    .for_each(|g, &a| *g *= sigmoid_derivative(a));
                grad
            }
            Activation::Tanh => {
                let mut grad = grad_output.to_owned();
                Zip::from(&mut grad)
                    .and(output)
                    .for_each(|g, &a| *g *= 1.0 - a * a);
                grad
            }
            Activation::Softmax => {
                let mut grad = grad_output.to_owned();
                for (mut g_row, a_row) in grad.axis_iter_mut(Axis(0)).zip(output.axis_iter(Axis(0)))
                {
                    let dot: f32 = g_row.iter().zip(a_row.iter()).map(|(g, a)| g * a).sum();
                    Zip::from(&mut g_row)
                        .and(&a_row)
                        .for_each(|g, &a| *g = a * (*g - dot));
                }
                grad
            }
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Activation::Linear => "linear",
            Activation::Relu => "relu",
            Activation::Sigmoid => "sigmoid",
            Activation::Tanh => "tanh",
            Activation::Softmax => "softmax",
        }
    }
}

impl fmt::Display for Activation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Activation {
    type Err = NetworkError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "linear" | "identity" => Ok(Activation::Linear),
            "relu" => Ok(Activation::Relu),
            "sigmoid" => Ok(Activation::Sigmoid),
            "tanh" => Ok(Activation::Tanh),
            "softmax" => Ok(Activation::Softmax),
            _ => Err(NetworkError::configuration(
                "activation",
                s,
                "one of: linear, relu, sigmoid, tanh, softmax",
            )),
        }
    }
}

/// Sigmoid activation function.
///
/// Returns the sigmoid of the input: 1 / (1 + exp(-x))
pub fn sigmoid(x: f32) -> f32 {
    1.0 / (1.0 + (-x).exp())
}

/// Sigmoid derivative assuming x = sigmoid(z).
///
/// Returns the derivative: x * (1 - x)
pub fn sigmoid_derivative(x: f32) -> f32 {
    x * (1.0 - x)
}

/// Softmax applied row-wise in place.
///
/// Uses the max-subtraction trick for numerical stability to avoid overflow
/// with large logits.
pub fn softmax_rows(outputs: &mut Array2<f32>) {
    if outputs.ncols() == 0 {
        return;
    }

    for mut row in outputs.axis_iter_mut(Axis(0)) {
        let max_value = row.iter().copied().fold(f32::NEG_INFINITY, f32::max);

        let mut sum = 0.0f32;
        for value in row.iter_mut() {
            *value = (*value - max_value).exp();
            sum += *value;
        }

        let inv_sum = 1.0f32 / sum;
        row.mapv_inplace(|v| v * inv_sum);
    }
}
