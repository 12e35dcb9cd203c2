use relay_resilience_core::events::ResilienceEvent;
use std::fmt;
use std::time::{Duration, Instant};

/// What happened in a [`ReconnectionEvent`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ReconnectionEventKind {
    /// A reconnection attempt was armed on a timer.
    Scheduled,
    /// The caller started an attempt.
    AttemptStarted,
    /// The caller reported a successful reconnection.
    Succeeded,
    /// The caller reported a failed attempt.
    Failed,
    /// Consecutive failures reached the breaker threshold.
    CircuitOpened,
    /// The breaker closed again, after its cooldown or a success.
    CircuitClosed,
    /// Retrying is no longer permitted for the current ladder.
    Exhausted,
}

impl ReconnectionEventKind {
    /// Stable snake_case name, used for logs and metric labels.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Scheduled => "scheduled",
            Self::AttemptStarted => "attempt_started",
            Self::Succeeded => "succeeded",
            Self::Failed => "failed",
            Self::CircuitOpened => "circuit_opened",
            Self::CircuitClosed => "circuit_closed",
            Self::Exhausted => "exhausted",
        }
    }
}

impl fmt::Display for ReconnectionEventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Immutable record of one reconnection state transition.
///
/// Which optional fields are populated depends on the kind:
///
/// | kind             | attempt | delay            | error |
/// |------------------|---------|------------------|-------|
/// | `Scheduled`      | next    | scheduled delay  |       |
/// | `AttemptStarted` | current |                  |       |
/// | `Succeeded`      | current |                  |       |
/// | `Failed`         | current |                  | maybe |
/// | `CircuitOpened`  | current | cooldown, if set |       |
/// | `CircuitClosed`  |         |                  |       |
/// | `Exhausted`      | current |                  |       |
#[derive(Debug, Clone, PartialEq)]
pub struct ReconnectionEvent {
    pattern_name: String,
    kind: ReconnectionEventKind,
    attempt: Option<u32>,
    delay: Option<Duration>,
    error: Option<String>,
    timestamp: Instant,
}

impl ReconnectionEvent {
    pub(crate) fn new(pattern_name: &str, kind: ReconnectionEventKind) -> Self {
        Self {
            pattern_name: pattern_name.to_owned(),
            kind,
            attempt: None,
            delay: None,
            error: None,
            timestamp: tokio::time::Instant::now().into_std(),
        }
    }

    pub(crate) fn with_attempt(mut self, attempt: u32) -> Self {
        self.attempt = (attempt > 0).then_some(attempt);
        self
    }

    pub(crate) fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    pub(crate) fn with_error(mut self, error: Option<String>) -> Self {
        self.error = error;
        self
    }

    /// The transition this event records.
    pub fn kind(&self) -> ReconnectionEventKind {
        self.kind
    }

    /// Attempt number, 1-based. Absent when no attempt applies.
    pub fn attempt(&self) -> Option<u32> {
        self.attempt
    }

    /// Delay associated with the event.
    pub fn delay(&self) -> Option<Duration> {
        self.delay
    }

    /// Error text reported with a failure.
    pub fn error(&self) -> Option<&str> {
        self.error.as_deref()
    }
}

impl ResilienceEvent for ReconnectionEvent {
    fn event_type(&self) -> &'static str {
        self.kind.as_str()
    }

    fn timestamp(&self) -> Instant {
        self.timestamp
    }

    fn pattern_name(&self) -> &str {
        &self.pattern_name
    }
}

impl fmt::Display for ReconnectionEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}] {}", self.pattern_name, self.kind)?;
        if let Some(attempt) = self.attempt {
            write!(f, " attempt={attempt}")?;
        }
        if let Some(delay) = self.delay {
            write!(f, " delay={delay:?}")?;
        }
        if let Some(error) = &self.error {
            write!(f, " error={error}")?;
        }
        Ok(())
    }
}
