//! Progress samplers
//!
//! The tick loop's only source of randomness sits behind [`ProgressSampler`]
//! so it can be swapped for a fixed sequence in tests.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use crate::error::{CoreError, CoreResult};

/// Supplies the percentage-point increment for each progress tick.
pub trait ProgressSampler: Send + Sync {
    fn next_increment(&self) -> u8;
}

fn check_range(min: u8, max: u8) -> CoreResult<()> {
    if min == 0 {
        return Err(CoreError::config("minimum increment must be positive"));
    }
    if min > max {
        return Err(CoreError::config(format!(
            "increment range is inverted: {}..={}",
            min, max
        )));
    }
    if max > 100 {
        return Err(CoreError::config(format!(
            "maximum increment {} exceeds 100",
            max
        )));
    }
    Ok(())
}

/// Uniform increments in `min..=max`.
pub struct RandomSampler {
    rng: Mutex<StdRng>,
    min: u8,
    max: u8,
}

impl RandomSampler {
    /// Entropy-seeded sampler
    pub fn new(min: u8, max: u8) -> CoreResult<Self> {
        check_range(min, max)?;
        Ok(Self {
            rng: Mutex::new(StdRng::from_entropy()),
            min,
            max,
        })
    }

    /// Reproducible sampler
    pub fn seeded(min: u8, max: u8, seed: u64) -> CoreResult<Self> {
        check_range(min, max)?;
        Ok(Self {
            rng: Mutex::new(StdRng::seed_from_u64(seed)),
            min,
            max,
        })
    }
}

impl ProgressSampler for RandomSampler {
    fn next_increment(&self) -> u8 {
        let mut rng = self.rng.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
        rng.gen_range(self.min..=self.max)
    }
}

impl std::fmt::Debug for RandomSampler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RandomSampler")
            .field("min", &self.min)
            .field("max", &self.max)
            .finish()
    }
}

/// Cycles through a fixed list of increments.
#[derive(Debug)]
pub struct FixedSampler {
    increments: Vec<u8>,
    cursor: AtomicUsize,
}

impl FixedSampler {
    pub fn new(increments: Vec<u8>) -> CoreResult<Self> {
        if increments.is_empty() {
            return Err(CoreError::config("fixed sampler needs at least one increment"));
        }
        if increments.iter().any(|&i| i == 0 || i > 100) {
            return Err(CoreError::config("fixed increments must be within 1..=100"));
        }
        Ok(Self {
            increments,
            cursor: AtomicUsize::new(0),
        })
    }

    /// Same increment on every tick
    pub fn constant(increment: u8) -> CoreResult<Self> {
        Self::new(vec![increment])
    }
}

impl ProgressSampler for FixedSampler {
    fn next_increment(&self) -> u8 {
        let i = self.cursor.fetch_add(1, Ordering::Relaxed);
        self.increments[i % self.increments.len()]
    }
}
