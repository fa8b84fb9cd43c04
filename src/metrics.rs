//! Per-epoch training metrics and evaluation helpers.

use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;
use std::time::Duration;

use ndarray::{ArrayView2, Axis};

use crate::error::{NetworkError, Result};

/// What happened during one epoch.
#[derive(Debug, Clone, PartialEq)]
pub struct EpochMetrics {
    /// 1-based epoch number.
    pub epoch: usize,
    /// Mean of the batch losses of the epoch.
    pub train_loss: f32,
    /// Loss on the validation set, when one was supplied.
    pub validation_loss: Option<f32>,
    pub duration: Duration,
}

impl EpochMetrics {
    /// The loss early stopping should watch: validation if present, training otherwise.
    pub fn monitored_loss(&self) -> f32 {
        self.validation_loss.unwrap_or(self.train_loss)
    }
}

/// Append-only record of completed epochs.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MetricsLog {
    epochs: Vec<EpochMetrics>,
}

impl MetricsLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub(crate) fn push(&mut self, metrics: EpochMetrics) {
        self.epochs.push(metrics);
    }

    pub fn len(&self) -> usize {
        self.epochs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.epochs.is_empty()
    }

    pub fn last(&self) -> Option<&EpochMetrics> {
        self.epochs.last()
    }

    pub fn iter(&self) -> impl Iterator<Item = &EpochMetrics> {
        self.epochs.iter()
    }

    pub fn as_slice(&self) -> &[EpochMetrics] {
        &self.epochs
    }

    pub fn train_losses(&self) -> Vec<f32> {
        self.epochs.iter().map(|m| m.train_loss).collect()
    }

    /// Validation losses of the epochs that had one.
    pub fn validation_losses(&self) -> Vec<f32> {
        self.epochs.iter().filter_map(|m| m.validation_loss).collect()
    }

    /// Write `epoch,train_loss,validation_loss,seconds` lines to `path`.
    /// The validation column is empty for epochs without validation.
    pub fn write_csv(&self, path: impl AsRef<Path>) -> Result<()> {
        let mut out = BufWriter::new(File::create(path)?);
        writeln!(out, "epoch,train_loss,validation_loss,seconds")?;
        for m in &self.epochs {
            let validation = m
                .validation_loss
                .map(|v| v.to_string())
                .unwrap_or_default();
            writeln!(
                out,
                "{},{},{},{}",
                m.epoch,
                m.train_loss,
                validation,
                m.duration.as_secs_f32()
            )?;
        }
        out.flush()?;
        Ok(())
    }
}

impl<'a> IntoIterator for &'a MetricsLog {
    type Item = &'a EpochMetrics;
    type IntoIter = std::slice::Iter<'a, EpochMetrics>;

    fn into_iter(self) -> Self::IntoIter {
        self.epochs.iter()
    }
}

/// Fraction of rows whose highest-scoring column matches the target's.
pub fn accuracy(predicted: &ArrayView2<f32>, targets: &ArrayView2<f32>) -> Result<f32> {
    if predicted.dim() != targets.dim() {
        return Err(NetworkError::data_shape(
            "accuracy targets",
            format!("{:?}", predicted.dim()),
            format!("{:?}", targets.dim()),
        ));
    }
    if predicted.nrows() == 0 {
        return Ok(0.0);
    }

    let correct = predicted
        .axis_iter(Axis(0))
        .zip(targets.axis_iter(Axis(0)))
        .filter(|(p, t)| argmax(p.iter()) == argmax(t.iter()))
        .count();
    Ok(correct as f32 / predicted.nrows() as f32)
}

/// Index of the largest value; ties go to the first one.
fn argmax<'a>(values: impl Iterator<Item = &'a f32>) -> usize {
    let mut best = 0;
    let mut best_value = f32::NEG_INFINITY;
    for (i, &value) in values.enumerate() {
        if value > best_value {
            best_value = value;
            best = i;
        }
    }
    best
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    fn metrics(epoch: usize, train: f32, validation: Option<f32>) -> EpochMetrics {
        EpochMetrics {
            epoch,
            train_loss: train,
            validation_loss: validation,
            duration: Duration::from_millis(10),
        }
    }

    #[test]
    fn test_accuracy() {
        let predicted = array![[0.9f32, 0.1], [0.2, 0.8], [0.6, 0.4]];
        let targets = array![[1.0f32, 0.0], [0.0, 1.0], [0.0, 1.0]];
        let acc = accuracy(&predicted.view(), &targets.view()).unwrap();
        assert!((acc - 2.0 / 3.0).abs() < 1e-6);
    }

    #[test]
    fn test_accuracy_shape_mismatch() {
        let predicted = array![[0.9f32, 0.1]];
        let targets = array![[1.0f32, 0.0, 0.0]];
        assert!(accuracy(&predicted.view(), &targets.view()).is_err());
    }

    #[test]
    fn test_log_accessors() {
        let mut log = MetricsLog::new();
        log.push(metrics(1, 0.5, None));
        log.push(metrics(2, 0.4, Some(0.45)));

        assert_eq!(log.len(), 2);
        assert_eq!(log.last().unwrap().epoch, 2);
        assert_eq!(log.train_losses(), vec![0.5, 0.4]);
        assert_eq!(log.validation_losses(), vec![0.45]);
        assert_eq!(log.last().unwrap().monitored_loss(), 0.45);
    }

    #[test]
    fn test_write_csv() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("loss.csv");

        let mut log = MetricsLog::new();
        log.push(metrics(1, 0.5, None));
        log.push(metrics(2, 0.25, Some(0.75)));
        log.write_csv(&path).unwrap();

        let contents = std::fs::read_to_string(&path).unwrap();
        let lines: Vec<&str> = contents.lines().collect();
        assert_eq!(lines[0], "epoch,train_loss,validation_loss,seconds");
        assert!(lines[1].starts_with("1,0.5,,"));
        assert!(lines[2].starts_with("2,0.25,0.75,"));
    }
}
