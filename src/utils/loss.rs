//! Loss (error) functions and their gradients.
//!
//! Every function takes predictions and targets of identical `(batch, width)`
//! shape. Gradients are taken with respect to the predictions.

use std::fmt;
use std::str::FromStr;

use ndarray::{Array2, ArrayView2, Axis, Zip};
use serde::{Deserialize, Serialize};

use crate::error::NetworkError;

/// Clipping bound keeping `ln` away from zero in cross-entropy losses.
pub const CLIP_EPSILON: f32 = 1e-7;

/// The `error` option of a training run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum LossKind {
    #[default]
    Mse,
    Rmse,
    Mae,
    BinaryCrossentropy,
    CategoricalCrossentropy,
}

impl LossKind {
    /// Scalar loss over the whole batch.
    pub fn loss(self, predicted: &ArrayView2<f32>, target: &ArrayView2<f32>) -> f32 {
        match self {
            LossKind::Mse => mse(predicted, target),
            LossKind::Rmse => mse(predicted, target).sqrt(),
            LossKind::Mae => mae(predicted, target),
            LossKind::BinaryCrossentropy => binary_crossentropy(predicted, target),
            LossKind::CategoricalCrossentropy => categorical_crossentropy(predicted, target),
        }
    }

    /// Gradient of [`LossKind::loss`] with respect to `predicted`.
    pub fn gradient(self, predicted: &ArrayView2<f32>, target: &ArrayView2<f32>) -> Array2<f32> {
        match self {
            LossKind::Mse => mse_gradient(predicted, target),
            LossKind::Rmse => {
                let rmse = mse(predicted, target).sqrt();
                let mut grad = mse_gradient(predicted, target);
                if rmse > 0.0 {
                    grad.mapv_inplace(|g| g / (2.0 * rmse));
                } else {
                    grad.fill(0.0);
                }
                grad
            }
            LossKind::Mae => {
                let n = predicted.len().max(1) as f32;
                let mut grad = predicted - target;
                grad.mapv_inplace(|d| {
                    if d > 0.0 {
                        1.0 / n
                    } else if d < 0.0 {
                        -1.0 / n
                    } else {
                        0.0
                    }
                });
                grad
            }
            LossKind::BinaryCrossentropy => {
                let n = predicted.len().max(1) as f32;
                let mut grad = Array2::zeros(predicted.raw_dim());
                Zip::from(&mut grad)
                    .and(predicted)
                    .and(target)
                    .for_each(|g, &p, &t| {
                        if p > CLIP_EPSILON && p < 1.0 - CLIP_EPSILON {
                            *g = (p - t) / (p * (1.0 - p)) / n;
                        }
                    });
                grad
            }
            LossKind::CategoricalCrossentropy => {
                let rows = predicted.nrows().max(1) as f32;
                let mut grad = Array2::zeros(predicted.raw_dim());
                Zip::from(&mut grad)
                    .and(predicted)
                    .and(target)
                    .for_each(|g, &p, &t| {
                        if p > CLIP_EPSILON && p < 1.0 - CLIP_EPSILON {
                            *g = -t / p / rows;
                        }
                    });
                grad
            }
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            LossKind::Mse => "mse",
            LossKind::Rmse => "rmse",
            LossKind::Mae => "mae",
            LossKind::BinaryCrossentropy => "binary_crossentropy",
            LossKind::CategoricalCrossentropy => "categorical_crossentropy",
        }
    }
}

impl fmt::Display for LossKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for LossKind {
    type Err = NetworkError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "mse" => Ok(LossKind::Mse),
            "rmse" => Ok(LossKind::Rmse),
            "mae" => Ok(LossKind::Mae),
            "binary_crossentropy" => Ok(LossKind::BinaryCrossentropy),
            "categorical_crossentropy" => Ok(LossKind::CategoricalCrossentropy),
            _ => Err(NetworkError::configuration(
                "error",
                s,
                "one of: mse, rmse, mae, binary_crossentropy, categorical_crossentropy",
            )),
        }
    }
}

fn clip(p: f32) -> f32 {
    p.clamp(CLIP_EPSILON, 1.0 - CLIP_EPSILON)
}

/// Mean squared error over every element.
pub fn mse(predicted: &ArrayView2<f32>, target: &ArrayView2<f32>) -> f32 {
    let n = predicted.len().max(1) as f32;
    let mut sum = 0.0f32;
    Zip::from(predicted)
        .and(target)
        .for_each(|&p, &t| sum += (p - t) * (p - t));
    sum / n
}

fn mse_gradient(predicted: &ArrayView2<f32>, target: &ArrayView2<f32>) -> Array2<f32> {
    let n = predicted.len().max(1) as f32;
    let mut grad = predicted - target;
    grad.mapv_inplace(|d| 2.0 * d / n);
    grad
}

/// Mean absolute error over every element.
pub fn mae(predicted: &ArrayView2<f32>, target: &ArrayView2<f32>) -> f32 {
    let n = predicted.len().max(1) as f32;
    let mut sum = 0.0f32;
    Zip::from(predicted)
        .and(target)
        .for_each(|&p, &t| sum += (p - t).abs());
    sum / n
}

/// Elementwise binary cross-entropy, averaged over every element.
pub fn binary_crossentropy(predicted: &ArrayView2<f32>, target: &ArrayView2<f32>) -> f32 {
    let n = predicted.len().max(1) as f32;
    let mut sum = 0.0f32;
    Zip::from(predicted).and(target).for_each(|&p, &t| {
        let p = clip(p);
        sum += t * p.ln() + (1.0 - t) * (1.0 - p).ln();
    });
    -sum / n
}

/// `-mean(sum(target * ln(clip(predicted, eps, 1 - eps))))` with the sum over
/// classes and the mean over the batch.
pub fn categorical_crossentropy(predicted: &ArrayView2<f32>, target: &ArrayView2<f32>) -> f32 {
    let rows = predicted.nrows().max(1) as f32;
    let total: f32 = predicted
        .axis_iter(Axis(0))
        .zip(target.axis_iter(Axis(0)))
        .map(|(p_row, t_row)| {
            p_row
                .iter()
                .zip(t_row.iter())
                .map(|(&p, &t)| t * clip(p).ln())
                .sum::<f32>()
        })
        .sum();
    -total / rows
}
