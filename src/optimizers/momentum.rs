//! Momentum optimizer implementation
//!
//! Classical momentum accumulates a velocity per parameter; the Nesterov
//! variant applies the update from the look-ahead position instead.

use log::debug;
use ndarray::{Array2, Zip};

use super::check_gradients;
use crate::config::TrainingConfig;
use crate::error::{NetworkError, Result};
use crate::layers::Parameter;
use crate::optimizers::Optimizer;

/// Gradient descent with momentum.
///
/// With step η and momentum μ, every parameter p with gradient g and
/// velocity v is updated as:
///
/// ```text
/// v = μ * v - η * g
/// p = p + v                    (classical)
/// p = p + μ * v - η * g        (Nesterov)
/// ```
///
/// Velocities start at zero. They are allocated either up front with
/// [`Momentum::for_parameters`] or on the first call to
/// [`Optimizer::step`], and are parallel to the parameter list from then on.
///
/// With μ = 0 both variants reduce to plain gradient descent.
#[derive(Debug, Clone)]
pub struct Momentum {
    learning_rate: f32,
    momentum: f32,
    nesterov: bool,
    velocities: Vec<Array2<f32>>,
}

impl Momentum {
    /// Creates a momentum optimizer.
    ///
    /// # Errors
    ///
    /// [`NetworkError::Configuration`] when the step isn't a positive finite
    /// number or the momentum lies outside `[0, 1)`.
    ///
    /// # Examples
    ///
    /// ```
    /// use momentum_nets::optimizers::{Momentum, Optimizer};
    ///
    /// let optimizer = Momentum::new(0.01, 0.9, true).unwrap();
    /// assert_eq!(optimizer.learning_rate(), 0.01);
    /// assert!(Momentum::new(0.01, 1.5, true).is_err());
    /// ```
    pub fn new(learning_rate: f32, momentum: f32, nesterov: bool) -> Result<Self> {
        let config = TrainingConfig::new()
            .with_step(learning_rate)?
            .with_momentum(momentum)?
            .with_nesterov(nesterov)?;
        Ok(Self::from_config(&config))
    }

    /// Take the step, momentum and Nesterov flag from a validated config.
    pub fn from_config(config: &TrainingConfig) -> Self {
        Self {
            learning_rate: config.step(),
            momentum: config.momentum(),
            nesterov: config.nesterov(),
            velocities: Vec::new(),
        }
    }

    /// Allocate zero velocities matching `parameters`.
    pub fn for_parameters(mut self, parameters: &[Parameter]) -> Self {
        self.velocities = zero_velocities(parameters);
        self
    }

    pub fn momentum(&self) -> f32 {
        self.momentum
    }

    pub fn nesterov(&self) -> bool {
        self.nesterov
    }

    /// Current velocities, in parameter order. Empty before the first step.
    pub fn velocities(&self) -> &[Array2<f32>] {
        &self.velocities
    }
}

fn zero_velocities(parameters: &[Parameter]) -> Vec<Array2<f32>> {
    parameters
        .iter()
        .map(|p| Array2::zeros(p.shape()))
        .collect()
}

impl Optimizer for Momentum {
    fn step(&mut self, parameters: &mut [Parameter], gradients: &[Array2<f32>]) -> Result<()> {
        check_gradients(parameters, gradients)?;

        if self.velocities.is_empty() {
            debug!("allocating {} velocity buffers", parameters.len());
            self.velocities = zero_velocities(parameters);
        }
        if parameters.len() != self.velocities.len() {
            return Err(NetworkError::GradientMismatch {
                parameter: String::from("<all>"),
                expected: (self.velocities.len(), 1),
                actual: (parameters.len(), 1),
            });
        }
        for (param, velocity) in parameters.iter().zip(&self.velocities) {
            if param.shape() != velocity.dim() {
                return Err(NetworkError::GradientMismatch {
                    parameter: param.name().to_string(),
                    expected: velocity.dim(),
                    actual: param.shape(),
                });
            }
        }

        let (eta, mu) = (self.learning_rate, self.momentum);
        let nesterov = self.nesterov;
        for ((param, grad), velocity) in parameters
            .iter_mut()
            .zip(gradients)
            .zip(self.velocities.iter_mut())
        {
            Zip::from(param.value_mut())
                .and(velocity)
                .and(grad)
                .for_each(|p, v, &g| {
                    *v = mu * *v - eta * g;
                    *p += if nesterov { mu * *v - eta * g } else { *v };
                });
        }
        Ok(())
    }

    /// Zero every velocity, keeping the buffers.
    fn reset(&mut self) {
        for velocity in &mut self.velocities {
            velocity.fill(0.0);
        }
    }

    fn learning_rate(&self) -> f32 {
        self.learning_rate
    }

    fn set_learning_rate(&mut self, lr: f32) {
        self.learning_rate = lr;
    }
}
