//! Attempt and timing statistics for a reconnection strategy.

use std::time::Duration;
use tokio::time::Instant;

/// Running totals of reconnection attempts and their outcomes.
///
/// The strategy owns the live accumulator and hands out clones, so a snapshot
/// never changes underneath its reader.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReconnectionStatistics {
    total_attempts: u64,
    successful_reconnections: u64,
    failed_reconnections: u64,
    reconnection_times: Vec<Duration>,
    last_attempt_time: Option<Instant>,
}

impl ReconnectionStatistics {
    /// Creates an empty accumulator.
    pub fn new() -> Self {
        Self::default()
    }

    /// Counts an attempt started now.
    pub fn record_attempt(&mut self) {
        self.record_attempt_at(Instant::now());
    }

    /// Counts an attempt started at `at`.
    pub fn record_attempt_at(&mut self, at: Instant) {
        self.total_attempts = self.total_attempts.saturating_add(1);
        self.last_attempt_time = Some(at);
    }

    /// Counts a success that took `reconnection_time`.
    pub fn record_success(&mut self, reconnection_time: Duration) {
        self.successful_reconnections = self.successful_reconnections.saturating_add(1);
        self.reconnection_times.push(reconnection_time);
    }

    /// Counts a failure.
    pub fn record_failure(&mut self) {
        self.failed_reconnections = self.failed_reconnections.saturating_add(1);
    }

    /// Clears every counter and the timing history.
    pub fn reset(&mut self) {
        *self = Self::default();
    }

    pub fn total_attempts(&self) -> u64 {
        self.total_attempts
    }

    pub fn successful_reconnections(&self) -> u64 {
        self.successful_reconnections
    }

    pub fn failed_reconnections(&self) -> u64 {
        self.failed_reconnections
    }

    /// Durations passed to [`record_success`](Self::record_success), oldest first.
    pub fn reconnection_times(&self) -> &[Duration] {
        &self.reconnection_times
    }

    pub fn last_attempt_time(&self) -> Option<Instant> {
        self.last_attempt_time
    }

    /// Mean of the recorded reconnection times, `None` before the first success.
    pub fn average_reconnection_time(&self) -> Option<Duration> {
        if self.reconnection_times.is_empty() {
            return None;
        }

        let total: u128 = self.reconnection_times.iter().map(Duration::as_nanos).sum();
        let mean = total / self.reconnection_times.len() as u128;
        Some(Duration::from_nanos(u64::try_from(mean).unwrap_or(u64::MAX)))
    }

    /// `successful_reconnections / total_attempts`, or `0.0` with no attempts.
    pub fn success_rate(&self) -> f64 {
        if self.total_attempts == 0 {
            0.0
        } else {
            self.successful_reconnections as f64 / self.total_attempts as f64
        }
    }
}
