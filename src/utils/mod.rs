//! Shared utilities for network implementations
//!
//! This module provides the random source, activation functions and loss
//! functions used across the graph compiler and the training loop.

pub mod activations;
pub mod loss;
pub mod rng;

pub use activations::{sigmoid, sigmoid_derivative, softmax_rows, Activation};
pub use loss::{LossKind, CLIP_EPSILON};
pub use rng::RandomSource;
