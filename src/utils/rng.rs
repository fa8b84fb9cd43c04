//! Explicit random source for reproducibility.
//!
//! Every consumer of randomness (weight initialization, data shuffling) receives
//! a `RandomSource` handle instead of reaching for a process-wide generator, so
//! two training runs in the same process stay independent and, when seeded,
//! deterministic.

use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::{Rng, SeedableRng};
use rand_distr::{Distribution, Normal, Uniform};

use crate::error::{NetworkError, Result};

/// Seedable random number generator handed down to the code that needs it.
#[derive(Debug, Clone)]
pub struct RandomSource {
    rng: StdRng,
    seed: Option<u64>,
}

impl RandomSource {
    /// Create a deterministic source from an explicit seed.
    pub fn seeded(seed: u64) -> Self {
        Self {
            rng: StdRng::seed_from_u64(seed),
            seed: Some(seed),
        }
    }

    /// Create a fresh, non-reproducible source seeded by the OS.
    pub fn from_entropy() -> Self {
        Self {
            rng: StdRng::from_os_rng(),
            seed: None,
        }
    }

    /// Seeded when `seed` is set, fresh otherwise.
    pub fn from_seed(seed: Option<u64>) -> Self {
        match seed {
            Some(seed) => Self::seeded(seed),
            None => Self::from_entropy(),
        }
    }

    /// The seed this source was created with, if any.
    pub fn seed(&self) -> Option<u64> {
        self.seed
    }

    /// Uniform sample in [0, 1).
    pub fn next_f32(&mut self) -> f32 {
        self.rng.random::<f32>()
    }

    /// Uniform sample in [low, high).
    pub fn uniform(&mut self, low: f32, high: f32) -> Result<f32> {
        let dist = Uniform::new(low, high).map_err(|_| {
            NetworkError::configuration("uniform range", format!("[{low}, {high})"), "low < high")
        })?;
        Ok(dist.sample(&mut self.rng))
    }

    /// Gaussian sample with the given mean and standard deviation.
    pub fn normal(&mut self, mean: f32, std: f32) -> Result<f32> {
        let dist = Normal::new(mean, std).map_err(|_| {
            NetworkError::configuration("standard deviation", std, "a finite value >= 0")
        })?;
        Ok(dist.sample(&mut self.rng))
    }

    /// Fill a buffer with samples from `N(mean, std)`.
    pub fn fill_normal(&mut self, out: &mut [f32], mean: f32, std: f32) -> Result<()> {
        let dist = Normal::new(mean, std).map_err(|_| {
            NetworkError::configuration("standard deviation", std, "a finite value >= 0")
        })?;
        for value in out.iter_mut() {
            *value = dist.sample(&mut self.rng);
        }
        Ok(())
    }

    /// Fill a buffer with samples from `U[low, high)`.
    pub fn fill_uniform(&mut self, out: &mut [f32], low: f32, high: f32) -> Result<()> {
        let dist = Uniform::new(low, high).map_err(|_| {
            NetworkError::configuration("uniform range", format!("[{low}, {high})"), "low < high")
        })?;
        for value in out.iter_mut() {
            *value = dist.sample(&mut self.rng);
        }
        Ok(())
    }

    /// Shuffle a slice in place.
    pub fn shuffle<T>(&mut self, data: &mut [T]) {
        data.shuffle(&mut self.rng);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_seeded_deterministic() {
        let mut rng1 = RandomSource::seeded(42);
        let mut rng2 = RandomSource::seeded(42);

        for _ in 0..100 {
            assert_eq!(rng1.next_f32().to_bits(), rng2.next_f32().to_bits());
        }
    }

    #[test]
    fn test_uniform_range() {
        let mut rng = RandomSource::seeded(67890);

        for _ in 0..1000 {
            let val = rng.uniform(-1.0, 1.0).unwrap();
            assert!((-1.0..1.0).contains(&val));
        }
    }

    #[test]
    fn test_uniform_rejects_empty_range() {
        let mut rng = RandomSource::seeded(1);
        assert!(rng.uniform(1.0, 1.0).is_err());
    }

    #[test]
    fn test_normal_rejects_negative_std() {
        let mut rng = RandomSource::seeded(1);
        assert!(rng.normal(0.0, -1.0).is_err());
    }

    #[test]
    fn test_shuffle_keeps_elements() {
        let mut rng = RandomSource::seeded(33333);
        let mut data: Vec<usize> = (0..10).collect();
        let original = data.clone();

        rng.shuffle(&mut data);

        let mut sorted = data.clone();
        sorted.sort();
        assert_eq!(sorted, original);
        assert_ne!(data, original);
    }

    #[test]
    fn test_entropy_has_no_seed() {
        let rng = RandomSource::from_seed(None);
        assert_eq!(rng.seed(), None);
    }
}
