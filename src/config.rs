//! Configuration structures for training
//!
//! Hyperparameters are stored in [`ValidatedField`]s: a value paired with the
//! predicate that guards it. Setting a field never leaves it holding an
//! invalid value, and every rejection names the option and its accepted
//! domain.
//!
//! Options can also be read from JSON files:
//!
//! ```json
//! {
//!   "error": "categorical_crossentropy",
//!   "step": 0.01,
//!   "momentum": 0.99,
//!   "nesterov": true,
//!   "shuffle_data": true,
//!   "verbose": true,
//!   "epochs": 20,
//!   "batch_size": 128,
//!   "seed": 42
//! }
//! ```

use std::fmt;
use std::fs;
use std::path::Path;

use serde::Deserialize;

use crate::error::{NetworkError, Result};
use crate::utils::LossKind;

/// A hyperparameter value guarded by a validator.
#[derive(Clone)]
pub struct ValidatedField<T> {
    name: &'static str,
    domain: &'static str,
    validator: fn(&T) -> bool,
    value: T,
}

impl<T: fmt::Debug> ValidatedField<T> {
    /// Create a field, validating its initial value.
    pub fn new(
        name: &'static str,
        domain: &'static str,
        validator: fn(&T) -> bool,
        value: T,
    ) -> Result<Self> {
        let field = Self {
            name,
            domain,
            validator,
            value,
        };
        field.validate()?;
        Ok(field)
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    pub fn domain(&self) -> &'static str {
        self.domain
    }

    pub fn get(&self) -> &T {
        &self.value
    }

    /// Replace the value. On rejection the previous value is kept.
    pub fn set(&mut self, value: T) -> Result<()> {
        if !(self.validator)(&value) {
            return Err(self.reject(&value));
        }
        self.value = value;
        Ok(())
    }

    pub fn validate(&self) -> Result<()> {
        if (self.validator)(&self.value) {
            Ok(())
        } else {
            Err(self.reject(&self.value))
        }
    }

    fn reject(&self, value: &T) -> NetworkError {
        NetworkError::configuration(self.name, format!("{value:?}"), self.domain)
    }
}

impl<T: fmt::Debug> fmt::Debug for ValidatedField<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ValidatedField")
            .field("name", &self.name)
            .field("value", &self.value)
            .finish()
    }
}

fn positive_finite(v: &f32) -> bool {
    v.is_finite() && *v > 0.0
}

fn unit_interval(v: &f32) -> bool {
    (0.0..1.0).contains(v)
}

fn positive_count(v: &usize) -> bool {
    *v > 0
}

fn batch_size_domain(v: &Option<usize>) -> bool {
    v.map_or(true, |n| n > 0)
}

fn any<T>(_: &T) -> bool {
    true
}

/// Validated options for one training run.
#[derive(Debug, Clone)]
pub struct TrainingConfig {
    error: ValidatedField<LossKind>,
    step: ValidatedField<f32>,
    momentum: ValidatedField<f32>,
    nesterov: ValidatedField<bool>,
    shuffle_data: ValidatedField<bool>,
    verbose: ValidatedField<bool>,
    epochs: ValidatedField<usize>,
    batch_size: ValidatedField<Option<usize>>,
    seed: Option<u64>,
}

impl Default for TrainingConfig {
    fn default() -> Self {
        Self {
            error: ValidatedField {
                name: "error",
                domain: "a supported loss function",
                validator: any,
                value: LossKind::Mse,
            },
            step: ValidatedField {
                name: "step",
                domain: "a finite value > 0",
                validator: positive_finite,
                value: 0.1,
            },
            momentum: ValidatedField {
                name: "momentum",
                domain: "a value in [0, 1)",
                validator: unit_interval,
                value: 0.9,
            },
            nesterov: ValidatedField {
                name: "nesterov",
                domain: "a boolean",
                validator: any,
                value: false,
            },
            shuffle_data: ValidatedField {
                name: "shuffle_data",
                domain: "a boolean",
                validator: any,
                value: false,
            },
            verbose: ValidatedField {
                name: "verbose",
                domain: "a boolean",
                validator: any,
                value: false,
            },
            epochs: ValidatedField {
                name: "epochs",
                domain: "an integer > 0",
                validator: positive_count,
                value: 100,
            },
            batch_size: ValidatedField {
                name: "batch_size",
                domain: "an integer > 0, or absent for full-batch training",
                validator: batch_size_domain,
                value: None,
            },
            seed: None,
        }
    }
}

impl TrainingConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_error(mut self, error: LossKind) -> Result<Self> {
        self.error.set(error)?;
        Ok(self)
    }

    pub fn with_step(mut self, step: f32) -> Result<Self> {
        self.step.set(step)?;
        Ok(self)
    }

    pub fn with_momentum(mut self, momentum: f32) -> Result<Self> {
        self.momentum.set(momentum)?;
        Ok(self)
    }

    pub fn with_nesterov(mut self, nesterov: bool) -> Result<Self> {
        self.nesterov.set(nesterov)?;
        Ok(self)
    }

    pub fn with_shuffle_data(mut self, shuffle_data: bool) -> Result<Self> {
        self.shuffle_data.set(shuffle_data)?;
        Ok(self)
    }

    pub fn with_verbose(mut self, verbose: bool) -> Result<Self> {
        self.verbose.set(verbose)?;
        Ok(self)
    }

    pub fn with_epochs(mut self, epochs: usize) -> Result<Self> {
        self.epochs.set(epochs)?;
        Ok(self)
    }

    pub fn with_batch_size(mut self, batch_size: Option<usize>) -> Result<Self> {
        self.batch_size.set(batch_size)?;
        Ok(self)
    }

    pub fn with_seed(mut self, seed: Option<u64>) -> Self {
        self.seed = seed;
        self
    }

    pub fn error(&self) -> LossKind {
        *self.error.get()
    }

    pub fn step(&self) -> f32 {
        *self.step.get()
    }

    pub fn momentum(&self) -> f32 {
        *self.momentum.get()
    }

    pub fn nesterov(&self) -> bool {
        *self.nesterov.get()
    }

    pub fn shuffle_data(&self) -> bool {
        *self.shuffle_data.get()
    }

    pub fn verbose(&self) -> bool {
        *self.verbose.get()
    }

    pub fn epochs(&self) -> usize {
        *self.epochs.get()
    }

    pub fn batch_size(&self) -> Option<usize> {
        *self.batch_size.get()
    }

    pub fn seed(&self) -> Option<u64> {
        self.seed
    }

    /// Validate raw options, falling back to defaults for absent fields.
    pub fn from_options(options: &TrainingOptions) -> Result<Self> {
        let mut config = Self::default();
        if let Some(ref error) = options.error {
            config = config.with_error(error.parse()?)?;
        }
        if let Some(step) = options.step {
            config = config.with_step(step)?;
        }
        if let Some(momentum) = options.momentum {
            config = config.with_momentum(momentum)?;
        }
        if let Some(nesterov) = options.nesterov {
            config = config.with_nesterov(nesterov)?;
        }
        if let Some(shuffle_data) = options.shuffle_data {
            config = config.with_shuffle_data(shuffle_data)?;
        }
        if let Some(verbose) = options.verbose {
            config = config.with_verbose(verbose)?;
        }
        if let Some(epochs) = options.epochs {
            config = config.with_epochs(epochs)?;
        }
        if options.batch_size.is_some() {
            config = config.with_batch_size(options.batch_size)?;
        }
        Ok(config.with_seed(options.seed))
    }
}

/// Raw training options as they appear in a JSON file.
///
/// Every field is optional; absent fields take the [`TrainingConfig`] default.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct TrainingOptions {
    /// Loss function: "mse", "rmse", "mae", "binary_crossentropy" or "categorical_crossentropy"
    pub error: Option<String>,
    /// Learning rate (> 0)
    pub step: Option<f32>,
    /// Momentum coefficient in [0, 1)
    pub momentum: Option<f32>,
    /// Use Nesterov momentum
    pub nesterov: Option<bool>,
    /// Shuffle the training set before every epoch
    pub shuffle_data: Option<bool>,
    /// Report progress through the logger
    pub verbose: Option<bool>,
    /// Number of epochs (> 0)
    pub epochs: Option<usize>,
    /// Mini-batch size; absent means full-batch
    pub batch_size: Option<usize>,
    /// Seed for shuffling
    pub seed: Option<u64>,
}

/// Loads and validates a training configuration from a JSON file.
///
/// # Examples
///
/// ```no_run
/// use momentum_nets::config::load_config;
///
/// let cfg = load_config("config/momentum.json").unwrap();
/// assert!(cfg.step() > 0.0);
/// ```
pub fn load_config(path: impl AsRef<Path>) -> Result<TrainingConfig> {
    let contents = fs::read_to_string(path)?;
    let options: TrainingOptions = serde_json::from_str(&contents)?;
    TrainingConfig::from_options(&options)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_are_valid() {
        let config = TrainingConfig::new();
        assert_eq!(config.error(), LossKind::Mse);
        assert_eq!(config.batch_size(), None);
        assert!(config.step() > 0.0);
        assert!((0.0..1.0).contains(&config.momentum()));
    }

    #[test]
    fn test_rejected_set_keeps_previous_value() {
        let mut field =
            ValidatedField::new("momentum", "a value in [0, 1)", unit_interval, 0.5f32).unwrap();

        assert!(field.set(1.0).is_err());
        assert_eq!(*field.get(), 0.5);

        field.set(0.0).unwrap();
        assert_eq!(*field.get(), 0.0);
    }

    #[test]
    fn test_new_field_validates_initial_value() {
        assert!(ValidatedField::new("epochs", "an integer > 0", positive_count, 0usize).is_err());
    }

    #[test]
    fn test_invalid_step_names_option() {
        let err = TrainingConfig::new().with_step(-0.1).unwrap_err();
        match err {
            NetworkError::Configuration { option, .. } => assert_eq!(option, "step"),
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_nan_step_rejected() {
        assert!(TrainingConfig::new().with_step(f32::NAN).is_err());
    }

    #[test]
    fn test_zero_batch_size_rejected() {
        assert!(TrainingConfig::new().with_batch_size(Some(0)).is_err());
        assert!(TrainingConfig::new().with_batch_size(None).is_ok());
    }

    #[test]
    fn test_from_options() {
        let options = TrainingOptions {
            error: Some("categorical_crossentropy".to_string()),
            step: Some(0.01),
            momentum: Some(0.99),
            nesterov: Some(true),
            epochs: Some(20),
            ..Default::default()
        };

        let config = TrainingConfig::from_options(&options).unwrap();
        assert_eq!(config.error(), LossKind::CategoricalCrossentropy);
        assert_eq!(config.step(), 0.01);
        assert_eq!(config.momentum(), 0.99);
        assert!(config.nesterov());
        assert_eq!(config.epochs(), 20);
        assert!(!config.shuffle_data());
    }
}
