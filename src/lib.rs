//! Momentum Nets
//!
//! A small neural network library: declare a graph of layers, compile it
//! against a loss, and train it with momentum or Nesterov gradient descent.
//!
//! # Modules
//!
//! - `layers`: layer specifications, dense and merge layers, parameters
//! - `graph`: graph builder with topological ordering and shape inference
//! - `compiler`: forward and backward passes over a built graph
//! - `optimizers`: `Optimizer` trait, gradient descent and momentum
//! - `trainer`: epoch loop with validation, hooks and early stopping
//! - `config`: validated training configuration
//! - `architecture`: JSON architecture files
//! - `metrics` / `data`: per-epoch records, accuracy, batching
//! - `utils`: random source, activations, losses
//!
//! # Example
//!
//! ```
//! use momentum_nets::prelude::*;
//! use ndarray::array;
//!
//! let mut rng = RandomSource::seeded(7);
//! let graph = GraphBuilder::sequential([
//!     LayerSpec::input(2),
//!     LayerSpec::relu(4),
//!     LayerSpec::softmax(2),
//! ])
//! .build(&mut rng)
//! .unwrap();
//!
//! let config = TrainingConfig::new()
//!     .with_error(LossKind::CategoricalCrossentropy)
//!     .unwrap()
//!     .with_epochs(3)
//!     .unwrap()
//!     .with_seed(Some(7));
//! let mut trainer = Trainer::from_graph(graph, config).unwrap();
//!
//! let x = array![[0.0f32, 1.0], [1.0, 0.0]];
//! let y = array![[0.0f32, 1.0], [1.0, 0.0]];
//! let report = trainer.fit(&x, &y, None).unwrap();
//! assert_eq!(report.history.len(), 3);
//! ```

pub mod architecture;
pub mod compiler;
pub mod config;
pub mod data;
pub mod error;
pub mod graph;
pub mod layers;
pub mod metrics;
pub mod optimizers;
pub mod trainer;
pub mod utils;

pub use error::{NetworkError, Result};

/// The types needed to declare, compile and train a network.
pub mod prelude {
    pub use crate::architecture::{load_architecture, ArchitectureConfig};
    pub use crate::compiler::{Compiler, Network};
    pub use crate::config::{load_config, TrainingConfig};
    pub use crate::error::{NetworkError, Result};
    pub use crate::graph::{Graph, GraphBuilder, NodeId};
    pub use crate::layers::{Initializer, LayerKind, LayerSpec};
    pub use crate::metrics::{accuracy, EpochMetrics, MetricsLog};
    pub use crate::optimizers::{GradientDescent, Momentum, Optimizer};
    pub use crate::trainer::{
        EarlyStopping, EpochSignal, Trainer, TrainingHook, TrainingReport, TrainingState,
    };
    pub use crate::utils::{Activation, LossKind, RandomSource};
}
