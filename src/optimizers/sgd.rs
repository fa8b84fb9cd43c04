//! Gradient descent optimizer implementation
//!
//! This module provides a plain gradient descent optimizer that performs the
//! basic update: `parameter = parameter - step * gradient`

use ndarray::{Array2, Zip};

use super::check_gradients;
use crate::error::Result;
use crate::layers::Parameter;
use crate::optimizers::Optimizer;

/// Gradient descent optimizer.
///
/// Implements the basic gradient descent update rule without momentum:
///
/// `w = w - η * ∇L/∂w`
///
/// where w is the parameter, η (eta) is the step size, and ∇L/∂w is the gradient.
///
/// # Example
///
/// ```
/// use momentum_nets::layers::Parameter;
/// use momentum_nets::optimizers::{GradientDescent, Optimizer};
/// use ndarray::array;
///
/// let mut optimizer = GradientDescent::new(0.5);
/// let mut params = vec![Parameter::new("dense", "bias", array![[1.0f32, 2.0]])];
/// let grads = vec![array![[1.0f32, -2.0]]];
///
/// optimizer.step(&mut params, &grads).unwrap();
/// assert_eq!(params[0].value(), &array![[0.5f32, 3.0]]);
/// ```
#[derive(Debug, Clone)]
pub struct GradientDescent {
    learning_rate: f32,
}

impl GradientDescent {
    /// Creates a new optimizer with the specified step size.
    pub fn new(learning_rate: f32) -> Self {
        Self { learning_rate }
    }
}

impl Optimizer for GradientDescent {
    fn step(&mut self, parameters: &mut [Parameter], gradients: &[Array2<f32>]) -> Result<()> {
        check_gradients(parameters, gradients)?;

        let eta = self.learning_rate;
        for (param, grad) in parameters.iter_mut().zip(gradients) {
            Zip::from(param.value_mut())
                .and(grad)
                .for_each(|p, &g| *p -= eta * g);
        }
        Ok(())
    }

    /// Nothing to reset.
    fn reset(&mut self) {}

    fn learning_rate(&self) -> f32 {
        self.learning_rate
    }

    fn set_learning_rate(&mut self, lr: f32) {
        self.learning_rate = lr;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    fn params(values: Array2<f32>) -> Vec<Parameter> {
        vec![Parameter::new("dense", "weight", values)]
    }

    #[test]
    fn test_update() {
        let mut optimizer = GradientDescent::new(0.1);
        let mut p = params(array![[1.0f32, 2.0, 3.0]]);
        optimizer
            .step(&mut p, &[array![[0.1f32, 0.2, 0.3]]])
            .unwrap();

        let v = p[0].value();
        assert!((v[[0, 0]] - 0.99).abs() < 1e-6);
        assert!((v[[0, 1]] - 1.98).abs() < 1e-6);
        assert!((v[[0, 2]] - 2.97).abs() < 1e-6);
    }

    #[test]
    fn test_learning_rate_update() {
        let mut optimizer = GradientDescent::new(0.1);
        optimizer.set_learning_rate(0.01);
        assert_eq!(optimizer.learning_rate(), 0.01);

        let mut p = params(array![[1.0f32]]);
        optimizer.step(&mut p, &[array![[1.0f32]]]).unwrap();
        assert!((p[0].value()[[0, 0]] - 0.99).abs() < 1e-6);
    }

    #[test]
    fn test_mismatched_shapes() {
        let mut optimizer = GradientDescent::new(0.01);
        let mut p = params(array![[1.0f32, 2.0]]);
        let err = optimizer
            .step(&mut p, &[array![[0.1f32, 0.2, 0.3]]])
            .unwrap_err();
        assert!(err.to_string().contains("dense/weight"));
    }

    #[test]
    fn test_mismatched_count() {
        let mut optimizer = GradientDescent::new(0.01);
        let mut p = params(array![[1.0f32]]);
        assert!(optimizer.step(&mut p, &[]).is_err());
    }
}
