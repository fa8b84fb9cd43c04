//! Epoch-driven training loop
//!
//! A [`Trainer`] owns a compiled [`Network`], an [`Optimizer`] and the
//! [`TrainingConfig`] of the run. Each call to [`Trainer::train`] walks the
//! state machine `Idle -> Running -> {Completed, StoppedEarly, Failed}`:
//!
//! - every epoch plans its mini-batches (shuffled when `shuffle_data` is set),
//!   runs a training step and an optimizer update per batch, then evaluates
//!   the validation set if one was given;
//! - the epoch's [`EpochMetrics`] are appended to the history and handed to
//!   every registered [`TrainingHook`];
//! - a hook answering [`EpochSignal::Stop`] ends the run as `StoppedEarly`
//!   with the parameters as they are;
//! - a non-finite loss, gradient or parameter ends the run as `Failed` and the
//!   error is returned. The history up to the last complete epoch stays
//!   available from [`Trainer::history`].
//!
//! # Example
//!
//! ```
//! use momentum_nets::compiler::Compiler;
//! use momentum_nets::config::TrainingConfig;
//! use momentum_nets::graph::GraphBuilder;
//! use momentum_nets::layers::LayerSpec;
//! use momentum_nets::trainer::{Trainer, TrainingState};
//! use momentum_nets::utils::{LossKind, RandomSource};
//! use ndarray::array;
//!
//! let mut rng = RandomSource::seeded(1);
//! let graph = GraphBuilder::sequential([LayerSpec::input(1), LayerSpec::linear(1)])
//!     .build(&mut rng)
//!     .unwrap();
//! let network = Compiler::compile(graph, LossKind::Mse).unwrap();
//! let config = TrainingConfig::new().with_epochs(5).unwrap();
//!
//! let mut trainer = Trainer::momentum(network, config).unwrap();
//! let x = array![[0.0f32], [1.0], [2.0]];
//! let y = array![[1.0f32], [3.0], [5.0]];
//! let report = trainer.fit(&x, &y, None).unwrap();
//!
//! assert_eq!(report.state, TrainingState::Completed);
//! assert_eq!(report.history.len(), 5);
//! ```

use std::fmt;
use std::time::Instant;

use log::{debug, info, warn};
use ndarray::Array2;

use crate::compiler::{Compiler, Network};
use crate::config::TrainingConfig;
use crate::data::{epoch_batches, take_rows, validate_pair};
use crate::error::{NetworkError, Result};
use crate::graph::Graph;
use crate::metrics::{EpochMetrics, MetricsLog};
use crate::optimizers::{Momentum, Optimizer};
use crate::utils::RandomSource;

/// Lifecycle of a training run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TrainingState {
    Idle,
    Running,
    /// Ran the requested number of epochs.
    Completed,
    /// A hook asked to stop.
    StoppedEarly,
    /// Aborted on an error, typically numeric instability.
    Failed,
}

impl fmt::Display for TrainingState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            TrainingState::Idle => "idle",
            TrainingState::Running => "running",
            TrainingState::Completed => "completed",
            TrainingState::StoppedEarly => "stopped early",
            TrainingState::Failed => "failed",
        };
        f.write_str(name)
    }
}

/// What a hook wants the loop to do after an epoch.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EpochSignal {
    Continue,
    Stop,
}

/// Callback run at the end of every epoch.
///
/// Returning an error aborts the run as [`TrainingState::Failed`]; only
/// [`EpochSignal::Stop`] ends it gracefully.
pub trait TrainingHook {
    fn on_epoch_end(&mut self, metrics: &EpochMetrics) -> Result<EpochSignal>;
}

impl<F> TrainingHook for F
where
    F: FnMut(&EpochMetrics) -> Result<EpochSignal>,
{
    fn on_epoch_end(&mut self, metrics: &EpochMetrics) -> Result<EpochSignal> {
        self(metrics)
    }
}

/// Stops once the monitored loss hasn't improved by more than `min_delta`
/// for `patience` consecutive epochs.
///
/// The validation loss is monitored when present, the training loss otherwise.
#[derive(Debug, Clone)]
pub struct EarlyStopping {
    patience: usize,
    min_delta: f32,
    best: f32,
    waited: usize,
}

impl EarlyStopping {
    pub fn new(patience: usize, min_delta: f32) -> Result<Self> {
        if patience == 0 {
            return Err(NetworkError::configuration(
                "patience",
                patience,
                "an integer > 0",
            ));
        }
        if !(min_delta.is_finite() && min_delta >= 0.0) {
            return Err(NetworkError::configuration(
                "min_delta",
                min_delta,
                "a finite value >= 0",
            ));
        }
        Ok(Self {
            patience,
            min_delta,
            best: f32::INFINITY,
            waited: 0,
        })
    }

    /// Best monitored loss seen so far.
    pub fn best(&self) -> f32 {
        self.best
    }
}

impl TrainingHook for EarlyStopping {
    fn on_epoch_end(&mut self, metrics: &EpochMetrics) -> Result<EpochSignal> {
        let loss = metrics.monitored_loss();
        if loss < self.best - self.min_delta {
            self.best = loss;
            self.waited = 0;
            return Ok(EpochSignal::Continue);
        }

        self.waited += 1;
        if self.waited >= self.patience {
            info!(
                "early stopping at epoch {}: no improvement over {:.6} for {} epochs",
                metrics.epoch, self.best, self.waited
            );
            Ok(EpochSignal::Stop)
        } else {
            Ok(EpochSignal::Continue)
        }
    }
}

/// Outcome of a run that didn't fail.
#[derive(Debug, Clone, PartialEq)]
pub struct TrainingReport {
    pub state: TrainingState,
    pub history: MetricsLog,
}

/// Drives a [`Network`] through epochs of mini-batch updates.
pub struct Trainer<O: Optimizer = Momentum> {
    network: Network,
    optimizer: O,
    config: TrainingConfig,
    rng: RandomSource,
    state: TrainingState,
    history: MetricsLog,
    hooks: Vec<Box<dyn TrainingHook>>,
}

impl Trainer<Momentum> {
    /// A trainer using the momentum optimizer described by `config`.
    ///
    /// The network must have been compiled with the loss named by
    /// `config.error()`.
    pub fn momentum(network: Network, config: TrainingConfig) -> Result<Self> {
        let optimizer = Momentum::from_config(&config).for_parameters(network.parameters());
        Self::new(network, optimizer, config)
    }

    /// Compile `graph` with the configured loss and wrap it in a momentum trainer.
    pub fn from_graph(graph: Graph, config: TrainingConfig) -> Result<Self> {
        let network = Compiler::compile(graph, config.error())?;
        Self::momentum(network, config)
    }
}

impl<O: Optimizer + Clone> Trainer<O> {
    /// Pair a compiled network with any optimizer.
    ///
    /// Shuffling draws from a source seeded with `config.seed()` when set,
    /// from OS entropy otherwise.
    pub fn new(network: Network, optimizer: O, config: TrainingConfig) -> Result<Self> {
        if network.loss() != config.error() {
            return Err(NetworkError::configuration(
                "error",
                config.error(),
                format!("the loss the network was compiled with ({})", network.loss()),
            ));
        }

        let rng = RandomSource::from_seed(config.seed());
        Ok(Self {
            network,
            optimizer,
            config,
            rng,
            state: TrainingState::Idle,
            history: MetricsLog::new(),
            hooks: Vec::new(),
        })
    }

    /// Register a hook; hooks run in registration order.
    pub fn with_hook(mut self, hook: impl TrainingHook + 'static) -> Self {
        self.add_hook(hook);
        self
    }

    pub fn add_hook(&mut self, hook: impl TrainingHook + 'static) {
        self.hooks.push(Box::new(hook));
    }

    pub fn network(&self) -> &Network {
        &self.network
    }

    pub fn optimizer(&self) -> &O {
        &self.optimizer
    }

    pub fn config(&self) -> &TrainingConfig {
        &self.config
    }

    pub fn state(&self) -> TrainingState {
        self.state
    }

    /// Metrics of the current (or last) run.
    pub fn history(&self) -> &MetricsLog {
        &self.history
    }

    pub fn predict(&self, x: &Array2<f32>) -> Result<Array2<f32>> {
        self.network.predict(x)
    }

    /// Train for `config.epochs()` epochs.
    pub fn fit(
        &mut self,
        x: &Array2<f32>,
        y: &Array2<f32>,
        validation: Option<(&Array2<f32>, &Array2<f32>)>,
    ) -> Result<TrainingReport> {
        self.train(x, y, validation, self.config.epochs())
    }

    /// Train for `epochs` epochs.
    ///
    /// Data shapes are checked before any parameter changes. Every call starts
    /// a fresh history; optimizer state carries over between calls.
    ///
    /// # Errors
    ///
    /// [`NetworkError::DataShape`] for data that doesn't fit the network,
    /// [`NetworkError::Configuration`] for `epochs == 0`, and whatever aborted
    /// a running loop (the state is then [`TrainingState::Failed`]).
    pub fn train(
        &mut self,
        x: &Array2<f32>,
        y: &Array2<f32>,
        validation: Option<(&Array2<f32>, &Array2<f32>)>,
        epochs: usize,
    ) -> Result<TrainingReport> {
        if epochs == 0 {
            return Err(NetworkError::configuration("epochs", epochs, "an integer > 0"));
        }
        let (input_width, output_width) = (self.network.input_width(), self.network.output_width());
        validate_pair(&x.view(), &y.view(), input_width, output_width, "training")?;
        if let Some((x_val, y_val)) = validation {
            validate_pair(
                &x_val.view(),
                &y_val.view(),
                input_width,
                output_width,
                "validation",
            )?;
        }

        self.history = MetricsLog::new();
        self.state = TrainingState::Running;
        debug!("training started: {epochs} epochs on {} samples", x.nrows());

        match self.run(x, y, validation, epochs) {
            Ok(state) => {
                self.state = state;
                debug!("training {state} after {} epochs", self.history.len());
                Ok(TrainingReport {
                    state,
                    history: self.history.clone(),
                })
            }
            Err(e) => {
                self.state = TrainingState::Failed;
                warn!(
                    "training failed after {} complete epochs: {e}",
                    self.history.len()
                );
                Err(e)
            }
        }
    }

    fn run(
        &mut self,
        x: &Array2<f32>,
        y: &Array2<f32>,
        validation: Option<(&Array2<f32>, &Array2<f32>)>,
        epochs: usize,
    ) -> Result<TrainingState> {
        let rows = x.nrows();

        for epoch in 1..=epochs {
            let start = Instant::now();
            let batches = epoch_batches(
                rows,
                self.config.batch_size(),
                self.config.shuffle_data(),
                &mut self.rng,
            );

            // Sample-weighted running mean; a plain sum can overflow even
            // when every batch loss is finite.
            let mut train_loss = 0.0f32;
            let mut seen = 0usize;
            for (batch, indices) in batches.iter().enumerate() {
                let x_batch = take_rows(&x.view(), indices);
                let y_batch = take_rows(&y.view(), indices);

                let loss = self
                    .network
                    .train_step(&x_batch, &y_batch)
                    .and_then(|loss| {
                        self.network.apply_gradients(&mut self.optimizer)?;
                        Ok(loss)
                    })
                    .map_err(|e| e.at_position(epoch, batch + 1))?;
                seen += indices.len();
                train_loss += (loss - train_loss) * (indices.len() as f32 / seen as f32);
            }
            if !train_loss.is_finite() {
                return Err(NetworkError::numeric("epoch loss").at_position(epoch, 0));
            }

            let validation_loss = match validation {
                Some((x_val, y_val)) => {
                    let loss = self.network.evaluate(x_val, y_val)?;
                    if !loss.is_finite() {
                        return Err(NetworkError::numeric("validation loss").at_position(epoch, 0));
                    }
                    Some(loss)
                }
                None => None,
            };

            let metrics = EpochMetrics {
                epoch,
                train_loss,
                validation_loss,
                duration: start.elapsed(),
            };
            self.report(&metrics, epochs);
            self.history.push(metrics.clone());

            for hook in &mut self.hooks {
                if hook.on_epoch_end(&metrics)? == EpochSignal::Stop {
                    warn!("training stopped early at epoch {epoch}/{epochs}");
                    return Ok(TrainingState::StoppedEarly);
                }
            }
        }

        Ok(TrainingState::Completed)
    }

    fn report(&self, metrics: &EpochMetrics, epochs: usize) {
        let line = match metrics.validation_loss {
            Some(validation) => format!(
                "Epoch {}/{}, Loss: {:.6}, Validation loss: {:.6}, Time: {:.3}s",
                metrics.epoch,
                epochs,
                metrics.train_loss,
                validation,
                metrics.duration.as_secs_f32()
            ),
            None => format!(
                "Epoch {}/{}, Loss: {:.6}, Time: {:.3}s",
                metrics.epoch,
                epochs,
                metrics.train_loss,
                metrics.duration.as_secs_f32()
            ),
        };

        if self.config.verbose() {
            info!("{line}");
        } else {
            debug!("{line}");
        }
    }
}
