//! Exponential backoff with symmetric jitter.

use std::time::Duration;

/// The backoff curve of a reconnection ladder.
///
/// `base_delay(n) = min(initial_delay * backoff_factor^n, max_delay)`. The jittered
/// delay then moves the base by up to `± jitter_factor * base`, rounds to the
/// nearest millisecond and never goes below zero or above
/// `max_delay * (1 + jitter_factor)`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Backoff {
    initial_delay: Duration,
    max_delay: Duration,
    backoff_factor: f64,
    jitter_factor: f64,
}

impl Backoff {
    /// Creates a backoff curve.
    ///
    /// A non-finite or negative factor becomes `1.0` and a NaN, infinite or
    /// negative jitter becomes `0.0`. Jitter above `1.0` is kept; the delay is
    /// clamped at zero instead. `max_delay` caps the base delay even when it is
    /// below `initial_delay`.
    pub fn new(
        initial_delay: Duration,
        max_delay: Duration,
        backoff_factor: f64,
        jitter_factor: f64,
    ) -> Self {
        let backoff_factor = if backoff_factor.is_finite() && backoff_factor >= 0.0 {
            backoff_factor
        } else {
            1.0
        };
        let jitter_factor = if jitter_factor.is_finite() && jitter_factor >= 0.0 {
            jitter_factor
        } else {
            0.0
        };

        Self {
            initial_delay,
            max_delay,
            backoff_factor,
            jitter_factor,
        }
    }

    /// Delay before the first attempt of a ladder.
    pub fn initial_delay(&self) -> Duration {
        self.initial_delay
    }

    /// Upper bound of the unjittered delay.
    pub fn max_delay(&self) -> Duration {
        self.max_delay
    }

    /// Growth multiplier between consecutive attempts.
    pub fn backoff_factor(&self) -> f64 {
        self.backoff_factor
    }

    /// Relative jitter amplitude.
    pub fn jitter_factor(&self) -> f64 {
        self.jitter_factor
    }

    /// Unjittered delay for `attempt` (0-indexed), capped at `max_delay`.
    pub fn base_delay(&self, attempt: u32) -> Duration {
        let nanos = self.base_nanos(attempt);
        Duration::from_nanos(nanos.round() as u64)
    }

    /// Jittered delay for `attempt` given a uniform `sample` in `[0.0, 1.0)`.
    pub fn delay(&self, attempt: u32, sample: f64) -> Duration {
        let sample = if sample.is_nan() {
            0.5
        } else {
            sample.clamp(0.0, 1.0)
        };

        let base_ms = self.base_nanos(attempt) / 1_000_000.0;
        let amplitude = self.jitter_factor * base_ms;
        let offset = (2.0 * sample - 1.0) * amplitude;

        let mut millis = (base_ms + offset).round();
        // Rounding up must not carry a capped delay past the jitter envelope.
        let max_ms = self.max_delay.as_nanos() as f64 / 1_000_000.0;
        let ceiling = max_ms * (1.0 + self.jitter_factor);
        if millis > ceiling {
            millis = ceiling.floor();
        }
        let millis = millis.max(0.0);

        Duration::from_millis(millis as u64)
    }

    fn base_nanos(&self, attempt: u32) -> f64 {
        let initial = self.initial_delay.as_nanos() as f64;
        let max = self.max_delay.as_nanos() as f64;
        if initial == 0.0 {
            return 0.0;
        }

        let exponent = i32::try_from(attempt).unwrap_or(i32::MAX);
        let raw = initial * self.backoff_factor.powi(exponent);
        if raw.is_finite() {
            raw.min(max)
        } else {
            max
        }
    }
}

impl Default for Backoff {
    fn default() -> Self {
        Self::new(Duration::from_secs(1), Duration::from_secs(300), 2.0, 0.1)
    }
}
