//! Randomness sources for backoff jitter.
//!
//! Delay computation never reaches for a global generator directly. It asks a
//! [`JitterSource`] for a sample, so tests can pin the sample and production can
//! use the thread-local RNG.

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::sync::{Mutex, PoisonError};

/// Supplies uniformly distributed samples in `[0.0, 1.0)`.
///
/// A sample of `0.5` means "no jitter"; `0.0` pulls the delay down by the full
/// jitter factor and samples approaching `1.0` push it up by the full factor.
pub trait JitterSource: Send + Sync {
    /// Returns the next sample.
    fn sample(&self) -> f64;
}

impl<F> JitterSource for F
where
    F: Fn() -> f64 + Send + Sync,
{
    fn sample(&self) -> f64 {
        self()
    }
}

/// Jitter drawn from the thread-local RNG. This is the default.
#[derive(Debug, Clone, Copy, Default)]
pub struct ThreadRngJitter;

impl JitterSource for ThreadRngJitter {
    fn sample(&self) -> f64 {
        rand::rng().random::<f64>()
    }
}

/// Deterministic jitter from a seeded generator.
///
/// Two sources created with the same seed produce the same sequence.
#[derive(Debug)]
pub struct SeededJitter {
    rng: Mutex<StdRng>,
}

impl SeededJitter {
    /// Creates a source seeded with `seed`.
    pub fn new(seed: u64) -> Self {
        Self {
            rng: Mutex::new(StdRng::seed_from_u64(seed)),
        }
    }
}

impl JitterSource for SeededJitter {
    fn sample(&self) -> f64 {
        self.rng
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .random::<f64>()
    }
}

/// Always returns the same sample.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FixedJitter(f64);

impl FixedJitter {
    /// Creates a source that always yields `sample`, clamped to `[0.0, 1.0]`.
    pub fn new(sample: f64) -> Self {
        let sample = if sample.is_nan() { 0.5 } else { sample };
        Self(sample.clamp(0.0, 1.0))
    }

    /// A source that yields the midpoint, cancelling jitter entirely.
    pub fn centered() -> Self {
        Self(0.5)
    }
}

impl JitterSource for FixedJitter {
    fn sample(&self) -> f64 {
        self.0
    }
}
