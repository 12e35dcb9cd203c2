use crate::backoff::Backoff;
use crate::circuit::CircuitBreakerSettings;
use crate::events::{ReconnectionEvent, ReconnectionEventKind};
use crate::jitter::{FixedJitter, JitterSource, SeededJitter, ThreadRngJitter};
use crate::strategy::ReconnectionStrategy;
use relay_resilience_core::{EventListeners, FnListener};
use std::num::NonZeroU32;
use std::sync::Arc;
use std::time::Duration;

/// Decides whether an error is worth another attempt.
///
/// Receives the 1-based number of the attempt that failed.
pub type RetryCondition = Arc<dyn Fn(u32, &dyn std::error::Error) -> bool + Send + Sync>;

const DEFAULT_EVENT_CAPACITY: usize = 64;

/// Configuration for a [`ReconnectionStrategy`].
///
/// Fixed at construction; changing policy means building a new strategy.
pub struct ReconnectConfig {
    pub(crate) name: String,
    pub(crate) backoff: Backoff,
    pub(crate) max_retries: u32,
    pub(crate) circuit_breaker: Option<CircuitBreakerSettings>,
    pub(crate) retry_condition: Option<RetryCondition>,
    pub(crate) jitter: Arc<dyn JitterSource>,
    pub(crate) event_listeners: EventListeners<ReconnectionEvent>,
    pub(crate) event_capacity: usize,
}

impl ReconnectConfig {
    /// Creates a new builder for configuring reconnection behavior.
    pub fn builder() -> ReconnectConfigBuilder {
        ReconnectConfigBuilder::default()
    }

    /// Instance name used in events, logs and metric labels.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// The backoff curve.
    pub fn backoff(&self) -> &Backoff {
        &self.backoff
    }

    /// Attempts allowed per ladder.
    pub fn max_retries(&self) -> u32 {
        self.max_retries
    }

    /// Breaker parameters, if a breaker is configured.
    pub fn circuit_breaker(&self) -> Option<CircuitBreakerSettings> {
        self.circuit_breaker
    }

    /// Broadcast buffer size for event subscribers.
    pub fn event_capacity(&self) -> usize {
        self.event_capacity
    }

    /// Builds a strategy from this configuration.
    pub fn into_strategy(self) -> ReconnectionStrategy {
        ReconnectionStrategy::new(self)
    }
}

impl Default for ReconnectConfig {
    fn default() -> Self {
        Self::builder().build()
    }
}

impl std::fmt::Debug for ReconnectConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ReconnectConfig")
            .field("name", &self.name)
            .field("backoff", &self.backoff)
            .field("max_retries", &self.max_retries)
            .field("circuit_breaker", &self.circuit_breaker)
            .field("retry_condition", &self.retry_condition.is_some())
            .field("event_listeners", &self.event_listeners.len())
            .field("event_capacity", &self.event_capacity)
            .finish()
    }
}

/// Builder for constructing a [`ReconnectConfig`].
pub struct ReconnectConfigBuilder {
    name: String,
    initial_delay: Duration,
    max_delay: Duration,
    max_retries: u32,
    backoff_factor: f64,
    jitter_factor: f64,
    circuit_breaker_threshold: Option<NonZeroU32>,
    circuit_breaker_duration: Option<Duration>,
    retry_condition: Option<RetryCondition>,
    jitter: Arc<dyn JitterSource>,
    event_listeners: EventListeners<ReconnectionEvent>,
    event_capacity: usize,
}

impl ReconnectConfigBuilder {
    /// Creates a new builder with default settings.
    pub fn new() -> Self {
        Self::default()
    }

    /// Give this strategy a human-readable name for observability.
    ///
    /// Default: `<unnamed>`
    pub fn name<N: Into<String>>(mut self, name: N) -> Self {
        self.name = name.into();
        self
    }

    /// Delay before the first attempt of a ladder.
    ///
    /// Default: 1 second
    pub fn initial_delay(mut self, delay: Duration) -> Self {
        self.initial_delay = delay;
        self
    }

    /// Cap on the unjittered delay, applied even when below the initial delay.
    ///
    /// Default: 5 minutes
    pub fn max_delay(mut self, delay: Duration) -> Self {
        self.max_delay = delay;
        self
    }

    /// Attempts allowed before the ladder is exhausted.
    ///
    /// Default: 10
    pub fn max_retries(mut self, max_retries: u32) -> Self {
        self.max_retries = max_retries;
        self
    }

    /// Multiplier between consecutive delays.
    ///
    /// Default: 2.0
    pub fn backoff_factor(mut self, factor: f64) -> Self {
        self.backoff_factor = factor;
        self
    }

    /// Relative jitter amplitude; `0.1` spreads delays by ±10%.
    ///
    /// Values above `1.0` are allowed; the low side of the spread is clamped
    /// at zero. Negative or non-finite values disable jitter.
    ///
    /// Default: 0.1
    pub fn jitter_factor(mut self, factor: f64) -> Self {
        self.jitter_factor = factor;
        self
    }

    /// Opens the circuit after `threshold` consecutive failures.
    ///
    /// A threshold of zero disables the breaker.
    ///
    /// Default: disabled
    pub fn circuit_breaker_threshold(mut self, threshold: u32) -> Self {
        self.circuit_breaker_threshold = NonZeroU32::new(threshold);
        self
    }

    /// How long an open circuit stays open before closing on its own.
    ///
    /// Without a duration an open circuit only closes on success or
    /// `reset_statistics`. Ignored unless a threshold is set.
    ///
    /// Default: unbounded
    pub fn circuit_breaker_duration(mut self, duration: Duration) -> Self {
        self.circuit_breaker_duration = Some(duration);
        self
    }

    /// Decides per error whether another attempt is worthwhile.
    ///
    /// # Examples
    ///
    /// ```
    /// use relay_resilience_reconnect::ReconnectConfig;
    ///
    /// let config = ReconnectConfig::builder()
    ///     .retry_condition(|_attempt, error| {
    ///         !error.to_string().to_lowercase().contains("blocked")
    ///     })
    ///     .build();
    /// ```
    pub fn retry_condition<F>(mut self, condition: F) -> Self
    where
        F: Fn(u32, &dyn std::error::Error) -> bool + Send + Sync + 'static,
    {
        self.retry_condition = Some(Arc::new(condition));
        self
    }

    /// Supplies the randomness used for jitter.
    ///
    /// Default: [`ThreadRngJitter`]
    pub fn jitter_source<J>(mut self, source: J) -> Self
    where
        J: JitterSource + 'static,
    {
        self.jitter = Arc::new(source);
        self
    }

    /// Uses a seeded generator so delays are reproducible.
    pub fn jitter_seed(self, seed: u64) -> Self {
        self.jitter_source(SeededJitter::new(seed))
    }

    /// Uses a constant jitter sample.
    pub fn fixed_jitter(self, sample: f64) -> Self {
        self.jitter_source(FixedJitter::new(sample))
    }

    /// How many events a slow subscriber may fall behind before lagging.
    ///
    /// Default: 64
    pub fn event_capacity(mut self, capacity: usize) -> Self {
        self.event_capacity = capacity;
        self
    }

    /// Registers a callback for every event.
    pub fn on_event<F>(mut self, f: F) -> Self
    where
        F: Fn(&ReconnectionEvent) + Send + Sync + 'static,
    {
        self.event_listeners.add(FnListener::new(f));
        self
    }

    /// Registers a callback when an attempt is scheduled.
    ///
    /// # Callback Signature
    /// `Fn(u32, Duration)`: the attempt number about to run and its delay.
    pub fn on_scheduled<F>(self, f: F) -> Self
    where
        F: Fn(u32, Duration) + Send + Sync + 'static,
    {
        self.on_kind(ReconnectionEventKind::Scheduled, move |event| {
            f(
                event.attempt().unwrap_or_default(),
                event.delay().unwrap_or_default(),
            )
        })
    }

    /// Registers a callback when an attempt starts.
    pub fn on_attempt<F>(self, f: F) -> Self
    where
        F: Fn(u32) + Send + Sync + 'static,
    {
        self.on_kind(ReconnectionEventKind::AttemptStarted, move |event| {
            f(event.attempt().unwrap_or_default())
        })
    }

    /// Registers a callback when a reconnection succeeds.
    pub fn on_success<F>(self, f: F) -> Self
    where
        F: Fn(u32) + Send + Sync + 'static,
    {
        self.on_kind(ReconnectionEventKind::Succeeded, move |event| {
            f(event.attempt().unwrap_or_default())
        })
    }

    /// Registers a callback when an attempt fails.
    ///
    /// # Callback Signature
    /// `Fn(u32, Option<&str>)`: the failed attempt and the reported error, if any.
    pub fn on_failure<F>(self, f: F) -> Self
    where
        F: Fn(u32, Option<&str>) + Send + Sync + 'static,
    {
        self.on_kind(ReconnectionEventKind::Failed, move |event| {
            f(event.attempt().unwrap_or_default(), event.error())
        })
    }

    /// Registers a callback when the circuit opens.
    pub fn on_circuit_opened<F>(self, f: F) -> Self
    where
        F: Fn() + Send + Sync + 'static,
    {
        self.on_kind(ReconnectionEventKind::CircuitOpened, move |_| f())
    }

    /// Registers a callback when the circuit closes.
    pub fn on_circuit_closed<F>(self, f: F) -> Self
    where
        F: Fn() + Send + Sync + 'static,
    {
        self.on_kind(ReconnectionEventKind::CircuitClosed, move |_| f())
    }

    /// Registers a callback when the ladder is exhausted.
    ///
    /// # Example
    /// ```rust,no_run
    /// use relay_resilience_reconnect::ReconnectConfig;
    ///
    /// let config = ReconnectConfig::builder()
    ///     .max_retries(5)
    ///     .on_exhausted(|attempts| {
    ///         eprintln!("relay offline after {attempts} attempts");
    ///     })
    ///     .build();
    /// ```
    pub fn on_exhausted<F>(self, f: F) -> Self
    where
        F: Fn(u32) + Send + Sync + 'static,
    {
        self.on_kind(ReconnectionEventKind::Exhausted, move |event| {
            f(event.attempt().unwrap_or_default())
        })
    }

    fn on_kind<F>(mut self, kind: ReconnectionEventKind, f: F) -> Self
    where
        F: Fn(&ReconnectionEvent) + Send + Sync + 'static,
    {
        self.event_listeners
            .add(FnListener::new(move |event: &ReconnectionEvent| {
                if event.kind() == kind {
                    f(event);
                }
            }));
        self
    }

    /// Builds the configuration.
    pub fn build(self) -> ReconnectConfig {
        let backoff = Backoff::new(
            self.initial_delay,
            self.max_delay,
            self.backoff_factor,
            self.jitter_factor,
        );

        let circuit_breaker = self.circuit_breaker_threshold.map(|threshold| {
            let settings = CircuitBreakerSettings::new(threshold);
            match self.circuit_breaker_duration {
                Some(duration) => settings.open_for(duration),
                None => settings,
            }
        });

        ReconnectConfig {
            name: self.name,
            backoff,
            max_retries: self.max_retries,
            circuit_breaker,
            retry_condition: self.retry_condition,
            jitter: self.jitter,
            event_listeners: self.event_listeners,
            event_capacity: self.event_capacity,
        }
    }
}

impl Default for ReconnectConfigBuilder {
    fn default() -> Self {
        Self {
            name: String::from("<unnamed>"),
            initial_delay: Duration::from_secs(1),
            max_delay: Duration::from_secs(300),
            max_retries: 10,
            backoff_factor: 2.0,
            jitter_factor: 0.1,
            circuit_breaker_threshold: None,
            circuit_breaker_duration: None,
            retry_condition: None,
            jitter: Arc::new(ThreadRngJitter),
            event_listeners: EventListeners::new(),
            event_capacity: DEFAULT_EVENT_CAPACITY,
        }
    }
}

impl std::fmt::Debug for ReconnectConfigBuilder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ReconnectConfigBuilder")
            .field("name", &self.name)
            .field("initial_delay", &self.initial_delay)
            .field("max_delay", &self.max_delay)
            .field("max_retries", &self.max_retries)
            .field("backoff_factor", &self.backoff_factor)
            .field("jitter_factor", &self.jitter_factor)
            .field("circuit_breaker_threshold", &self.circuit_breaker_threshold)
            .field("circuit_breaker_duration", &self.circuit_breaker_duration)
            .field("retry_condition", &self.retry_condition.is_some())
            .field("event_listeners", &self.event_listeners.len())
            .finish()
    }
}
