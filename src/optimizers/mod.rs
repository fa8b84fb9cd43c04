//! Optimizer abstractions for neural network parameter updates
//!
//! This module provides the Optimizer trait and the update rules used to move
//! the parameters of a compiled network along its gradients.
//!
//! # Overview
//!
//! Optimizers define how to use gradients to update model parameters. The basic
//! gradient descent update is `weight = weight - step * gradient`; momentum
//! methods keep a velocity per parameter so that consistent gradients
//! accelerate the descent.
//!
//! # Available Optimizers
//!
//! - [`GradientDescent`]: plain gradient descent
//! - [`Momentum`]: classical and Nesterov momentum
//!
//! # Example
//!
//! ```
//! use momentum_nets::layers::Parameter;
//! use momentum_nets::optimizers::{Momentum, Optimizer};
//! use ndarray::array;
//!
//! let mut params = vec![Parameter::new("dense", "weight", array![[1.0f32, 2.0]])];
//! let grads = vec![array![[0.5f32, -0.5]]];
//!
//! let mut optimizer = Momentum::new(0.5, 0.9, false).unwrap();
//! optimizer.step(&mut params, &grads).unwrap();
//! assert_eq!(params[0].value(), &array![[0.75f32, 2.25]]);
//! ```

pub mod momentum;
pub mod sgd;

use ndarray::Array2;

pub use momentum::Momentum;
pub use sgd::GradientDescent;

use crate::error::{NetworkError, Result};
use crate::layers::Parameter;

/// Core trait for neural network optimizers.
///
/// Parameters and gradients are passed as parallel slices in the graph's
/// stable parameter order. Each call updates every parameter exactly once.
///
/// # State Management
///
/// Some optimizers (like [`Momentum`]) maintain internal state across updates.
/// The optimizer manages this state internally, so callers only need to
/// provide parameters and gradients.
pub trait Optimizer {
    /// Update parameters in place using gradients.
    ///
    /// # Errors
    ///
    /// [`NetworkError::GradientMismatch`] when the gradient list doesn't line
    /// up with the parameters, either in count or in shape.
    fn step(&mut self, parameters: &mut [Parameter], gradients: &[Array2<f32>]) -> Result<()>;

    /// Reset optimizer state.
    ///
    /// Clears any accumulated velocity. For stateless optimizers this is a
    /// no-op.
    fn reset(&mut self);

    /// Get the step size of this optimizer.
    fn learning_rate(&self) -> f32;

    /// Set the step size of this optimizer.
    fn set_learning_rate(&mut self, lr: f32);
}

/// Check that `gradients` pairs up with `parameters`, one matching shape each.
pub(crate) fn check_gradients(parameters: &[Parameter], gradients: &[Array2<f32>]) -> Result<()> {
    if parameters.len() != gradients.len() {
        return Err(NetworkError::GradientMismatch {
            parameter: String::from("<all>"),
            expected: (parameters.len(), 1),
            actual: (gradients.len(), 1),
        });
    }

    for (param, grad) in parameters.iter().zip(gradients) {
        if param.shape() != grad.dim() {
            return Err(NetworkError::GradientMismatch {
                parameter: param.name().to_string(),
                expected: param.shape(),
                actual: grad.dim(),
            });
        }
    }
    Ok(())
}
