use thiserror::Error;

/// Why a reconnection could not be scheduled.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum ScheduleError {
    /// The strategy was disposed; it no longer arms timers.
    #[error("reconnection strategy has been disposed")]
    Disposed,

    /// Scheduling needs a tokio runtime to drive the timer.
    #[error("no tokio runtime available to drive the reconnection timer")]
    NoRuntime,
}

/// Terminal outcomes of [`ReconnectSupervisor::reconnect`](crate::ReconnectSupervisor::reconnect).
#[derive(Debug, Error)]
pub enum ReconnectError<E> {
    /// The reconnection policy does not permit reconnecting from this state.
    #[error("reconnection not permitted by policy")]
    PolicyRejected,

    /// The retry condition declined to retry after this error.
    #[error("attempt {attempt} failed with a non-retryable error: {source}")]
    NotRetryable {
        /// The attempt that failed.
        attempt: u32,
        /// The error that ended the ladder.
        #[source]
        source: E,
    },

    /// Every permitted attempt failed.
    #[error("reconnection exhausted after {attempts} attempts")]
    RetriesExhausted {
        /// Attempts made in this ladder.
        attempts: u32,
        /// The last connect error.
        last_error: Option<E>,
    },

    /// The circuit breaker is open.
    #[error("circuit is open; reconnection suspended")]
    CircuitOpen {
        /// The last connect error, if this ladder made any attempt.
        last_error: Option<E>,
    },

    /// The scheduled attempt was cancelled before it fired.
    #[error("scheduled reconnection was cancelled")]
    Cancelled,

    /// The attempt could not be scheduled.
    #[error(transparent)]
    Schedule(#[from] ScheduleError),
}

impl<E> ReconnectError<E> {
    /// Returns true if the circuit breaker stopped the ladder.
    pub fn is_circuit_open(&self) -> bool {
        matches!(self, ReconnectError::CircuitOpen { .. })
    }

    /// Returns true if the ladder ran out of attempts.
    pub fn is_exhausted(&self) -> bool {
        matches!(self, ReconnectError::RetriesExhausted { .. })
    }

    /// Returns the last connect error, if one was recorded.
    pub fn into_last_error(self) -> Option<E> {
        match self {
            ReconnectError::NotRetryable { source, .. } => Some(source),
            ReconnectError::RetriesExhausted { last_error, .. }
            | ReconnectError::CircuitOpen { last_error } => last_error,
            _ => None,
        }
    }
}
