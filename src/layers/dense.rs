//! Dense (fully connected) layer implementation
//!
//! This module provides a DenseLayer (also known as Linear or Fully Connected
//! layer) that performs the transformation `a = f(x × W + b)`.

use ndarray::{Array2, ArrayView2, Axis};

use super::{ParamId, Parameter};
use crate::utils::Activation;

/// Dense (fully connected) layer with weights, biases and an activation.
///
/// Performs `y = f(xW + b)` where x is the input (batch × input_width),
/// W is the weight matrix (input_width × output_width), b is the bias row
/// (1 × output_width) and f the activation.
///
/// The layer doesn't store its tensors: it refers to them by [`ParamId`] in the
/// graph's parameter list, which keeps a single stable ordering for the
/// optimizer.
#[derive(Debug, Clone, PartialEq)]
pub struct DenseLayer {
    input_width: usize,
    output_width: usize,
    activation: Activation,
    weight: ParamId,
    bias: ParamId,
}

/// Gradients produced by [`DenseLayer::backward`].
#[derive(Debug, Clone)]
pub struct DenseGradients {
    /// Gradient with respect to the layer input (batch × input_width).
    pub input: Array2<f32>,
    /// Gradient with respect to the weight matrix.
    pub weight: Array2<f32>,
    /// Gradient with respect to the bias row.
    pub bias: Array2<f32>,
}

impl DenseLayer {
    pub fn new(
        input_width: usize,
        output_width: usize,
        activation: Activation,
        weight: ParamId,
        bias: ParamId,
    ) -> Self {
        Self {
            input_width,
            output_width,
            activation,
            weight,
            bias,
        }
    }

    pub fn input_width(&self) -> usize {
        self.input_width
    }

    pub fn output_width(&self) -> usize {
        self.output_width
    }

    pub fn activation(&self) -> Activation {
        self.activation
    }

    pub fn weight(&self) -> ParamId {
        self.weight
    }

    pub fn bias(&self) -> ParamId {
        self.bias
    }

    /// Returns input_width × output_width (weights) + output_width (biases).
    pub fn parameter_count(&self) -> usize {
        self.input_width * self.output_width + self.output_width
    }

    /// Forward propagation: activated output for a `(batch, input_width)` input.
    pub fn forward(&self, params: &[Parameter], input: &ArrayView2<f32>) -> Array2<f32> {
        let weights = params[self.weight.index()].value();
        let biases = params[self.bias.index()].value();

        let z = input.dot(weights) + biases;
        self.activation.forward(&z.view())
    }

    /// Backward propagation.
    ///
    /// `input` and `output` must be the values seen and produced by the
    /// matching forward pass; `grad_output` is the gradient of the loss with
    /// respect to `output`.
    pub fn backward(
        &self,
        params: &[Parameter],
        input: &ArrayView2<f32>,
        output: &ArrayView2<f32>,
        grad_output: &ArrayView2<f32>,
    ) -> DenseGradients {
        let delta = self.activation.backward(output, grad_output);
        self.backward_linear(params, input, &delta.view())
    }

    /// Backward propagation from the gradient of the pre-activation `z`.
    ///
    /// Used when the loss gradient already folds the activation in, as for a
    /// softmax output trained with categorical cross-entropy.
    pub fn backward_linear(
        &self,
        params: &[Parameter],
        input: &ArrayView2<f32>,
        delta: &ArrayView2<f32>,
    ) -> DenseGradients {
        let weights = params[self.weight.index()].value();

        let weight = input.t().dot(delta);
        let bias = delta.sum_axis(Axis(0)).insert_axis(Axis(0));
        let input = delta.dot(&weights.t());

        DenseGradients {
            input,
            weight,
            bias,
        }
    }
}
