use std::num::NonZeroU32;
use std::time::Duration;
use tokio::time::Instant;

/// Circuit breaker parameters.
///
/// A breaker only exists when a threshold is configured, so an open circuit
/// without a threshold cannot be expressed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CircuitBreakerSettings {
    threshold: NonZeroU32,
    open_duration: Option<Duration>,
}

impl CircuitBreakerSettings {
    /// Opens after `threshold` consecutive failures and stays open until a success.
    pub fn new(threshold: NonZeroU32) -> Self {
        Self {
            threshold,
            open_duration: None,
        }
    }

    /// Closes automatically once `duration` has elapsed since opening.
    pub fn open_for(mut self, duration: Duration) -> Self {
        self.open_duration = Some(duration);
        self
    }

    /// Consecutive failures that open the circuit.
    pub fn threshold(&self) -> u32 {
        self.threshold.get()
    }

    /// How long the circuit stays open, if bounded.
    pub fn open_duration(&self) -> Option<Duration> {
        self.open_duration
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum BreakerState {
    Closed {
        consecutive_failures: u32,
    },
    Open {
        consecutive_failures: u32,
        opened_at: Instant,
    },
}

/// Consecutive-failure breaker owned by the strategy.
///
/// Without settings it still counts consecutive failures but never opens.
#[derive(Debug, Clone)]
pub(crate) struct Breaker {
    settings: Option<CircuitBreakerSettings>,
    state: BreakerState,
}

impl Breaker {
    pub(crate) fn new(settings: Option<CircuitBreakerSettings>) -> Self {
        Self {
            settings,
            state: BreakerState::Closed {
                consecutive_failures: 0,
            },
        }
    }

    pub(crate) fn consecutive_failures(&self) -> u32 {
        match self.state {
            BreakerState::Closed {
                consecutive_failures,
            }
            | BreakerState::Open {
                consecutive_failures,
                ..
            } => consecutive_failures,
        }
    }

    pub(crate) fn opened_at(&self) -> Option<Instant> {
        match self.state {
            BreakerState::Open { opened_at, .. } => Some(opened_at),
            BreakerState::Closed { .. } => None,
        }
    }

    pub(crate) fn is_open(&self) -> bool {
        matches!(self.state, BreakerState::Open { .. })
    }

    /// Closes an expired circuit. Returns true when it closed.
    pub(crate) fn refresh(&mut self, now: Instant) -> bool {
        let BreakerState::Open { opened_at, .. } = self.state else {
            return false;
        };
        let Some(open_duration) = self.settings.and_then(|s| s.open_duration) else {
            return false;
        };

        if now.saturating_duration_since(opened_at) >= open_duration {
            self.close();
            true
        } else {
            false
        }
    }

    /// Counts a failure. Returns true when this failure opened the circuit.
    ///
    /// Failures while already open are counted but do not re-open.
    pub(crate) fn record_failure(&mut self, now: Instant) -> bool {
        match self.state {
            BreakerState::Open {
                consecutive_failures,
                opened_at,
            } => {
                self.state = BreakerState::Open {
                    consecutive_failures: consecutive_failures.saturating_add(1),
                    opened_at,
                };
                false
            }
            BreakerState::Closed {
                consecutive_failures,
            } => {
                let consecutive_failures = consecutive_failures.saturating_add(1);
                match self.settings {
                    Some(settings) if consecutive_failures >= settings.threshold() => {
                        self.state = BreakerState::Open {
                            consecutive_failures,
                            opened_at: now,
                        };
                        true
                    }
                    _ => {
                        self.state = BreakerState::Closed {
                            consecutive_failures,
                        };
                        false
                    }
                }
            }
        }
    }

    /// Clears the failure streak. Returns true when the circuit was open.
    pub(crate) fn close(&mut self) -> bool {
        let was_open = self.is_open();
        self.state = BreakerState::Closed {
            consecutive_failures: 0,
        };
        was_open
    }
}
