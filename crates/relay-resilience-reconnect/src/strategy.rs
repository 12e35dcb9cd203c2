use crate::circuit::Breaker;
use crate::config::ReconnectConfig;
use crate::error::ScheduleError;
use crate::events::{ReconnectionEvent, ReconnectionEventKind};
use crate::handle::ReconnectHandle;
use crate::state::ReconnectPhase;
use crate::statistics::ReconnectionStatistics;
#[cfg(feature = "metrics")]
use metrics::{counter, gauge, histogram};
use relay_resilience_core::EventHub;
use std::collections::VecDeque;
use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;
use tokio::sync::broadcast;
use tokio::time::Instant;

/// Mutable state of the current retry ladder.
struct Ladder {
    current_attempt: u32,
    phase: ReconnectPhase,
    breaker: Breaker,
    statistics: ReconnectionStatistics,
    exhausted_reported: bool,
    last_armed: Option<ReconnectHandle>,
}

impl Ladder {
    fn should_retry(&self, max_retries: u32) -> bool {
        self.current_attempt < max_retries && !self.breaker.is_open()
    }
}

/// Reconnection engine for a single logical connection.
///
/// The strategy computes backoff delays, arms reconnection timers, tracks the
/// attempt counter and circuit breaker, accumulates statistics and publishes a
/// [`ReconnectionEvent`] for every transition. It never opens sockets itself:
/// the connection manager reports each outcome through
/// [`record_attempt`](Self::record_attempt), [`record_success`](Self::record_success)
/// and [`record_failure`](Self::record_failure).
///
/// All state sits behind one mutex because timers fire on runtime workers.
/// Events are queued in transition order while that mutex is held and
/// delivered after it is released, one event at a time and in the same order
/// on every thread. Listeners may therefore query or drive the strategy
/// freely; when a single caller drives it, a listener observes exactly the
/// state that produced the event.
///
/// # Examples
///
/// ```
/// use relay_resilience_reconnect::{ReconnectConfig, ReconnectionStrategy};
/// use std::time::Duration;
///
/// let strategy = ReconnectionStrategy::new(
///     ReconnectConfig::builder()
///         .name("relay.example.com")
///         .initial_delay(Duration::from_secs(1))
///         .max_delay(Duration::from_secs(30))
///         .jitter_factor(0.0)
///         .build(),
/// );
///
/// assert_eq!(strategy.next_delay(0), Duration::from_secs(1));
/// assert_eq!(strategy.next_delay(3), Duration::from_secs(8));
/// assert_eq!(strategy.next_delay(10), Duration::from_secs(30));
/// ```
pub struct ReconnectionStrategy {
    config: ReconnectConfig,
    ladder: Mutex<Ladder>,
    hub: EventHub<ReconnectionEvent>,
    pending: Mutex<VecDeque<ReconnectionEvent>>,
    draining: AtomicBool,
    disposed: Arc<AtomicBool>,
}

impl ReconnectionStrategy {
    /// Creates a strategy from `config`.
    pub fn new(config: ReconnectConfig) -> Self {
        #[cfg(feature = "metrics")]
        crate::describe_metrics();

        let hub = EventHub::new(config.event_listeners.clone(), config.event_capacity);
        let ladder = Ladder {
            current_attempt: 0,
            phase: ReconnectPhase::Idle,
            breaker: Breaker::new(config.circuit_breaker),
            statistics: ReconnectionStatistics::new(),
            exhausted_reported: false,
            last_armed: None,
        };

        Self {
            config,
            ladder: Mutex::new(ladder),
            hub,
            pending: Mutex::new(VecDeque::new()),
            draining: AtomicBool::new(false),
            disposed: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Creates a strategy with the default configuration.
    pub fn with_defaults() -> Self {
        Self::new(ReconnectConfig::default())
    }

    /// The configuration this strategy was built with.
    pub fn config(&self) -> &ReconnectConfig {
        &self.config
    }

    /// Instance name.
    pub fn name(&self) -> &str {
        &self.config.name
    }

    /// Attempts started in the current ladder.
    pub fn current_attempt(&self) -> u32 {
        self.lock().current_attempt
    }

    /// Position within the current ladder.
    pub fn phase(&self) -> ReconnectPhase {
        self.lock().phase
    }

    /// Whether another attempt is permitted.
    ///
    /// False exactly when the attempt budget is spent or the circuit is open.
    pub fn should_retry(&self) -> bool {
        let max_retries = self.config.max_retries;
        self.inspect(|ladder| ladder.should_retry(max_retries))
    }

    /// Whether the circuit breaker is open.
    ///
    /// An open circuit whose cooldown has elapsed is closed by this call, which
    /// publishes [`ReconnectionEventKind::CircuitClosed`].
    pub fn is_circuit_open(&self) -> bool {
        self.inspect(|ladder| ladder.breaker.is_open())
    }

    /// Failures since the last success, auto-close or statistics reset.
    pub fn consecutive_failures(&self) -> u32 {
        self.inspect(|ladder| ladder.breaker.consecutive_failures())
    }

    /// When the circuit opened, while it is open.
    pub fn circuit_open_time(&self) -> Option<Instant> {
        self.inspect(|ladder| ladder.breaker.opened_at())
    }

    /// Snapshot of the accumulated statistics.
    pub fn statistics(&self) -> ReconnectionStatistics {
        self.lock().statistics.clone()
    }

    /// Subscribes to the event stream, or `None` once disposed.
    pub fn subscribe(&self) -> Option<broadcast::Receiver<ReconnectionEvent>> {
        self.hub.subscribe()
    }

    /// Number of live event subscribers.
    pub fn subscriber_count(&self) -> usize {
        self.hub.subscriber_count()
    }

    /// Returns true once [`dispose`](Self::dispose) was called.
    pub fn is_disposed(&self) -> bool {
        self.disposed.load(Ordering::Acquire)
    }

    /// Jittered delay for `attempt` (0-indexed).
    ///
    /// Reads only the configuration and the jitter source; engine state is
    /// neither read nor changed.
    pub fn next_delay(&self, attempt: u32) -> Duration {
        self.config
            .backoff
            .delay(attempt, self.config.jitter.sample())
    }

    /// Asks the configured retry condition whether `error` deserves another try.
    ///
    /// Returns true when no condition is configured.
    pub fn should_retry_with_error(&self, attempt: u32, error: &dyn std::error::Error) -> bool {
        match &self.config.retry_condition {
            Some(condition) => condition(attempt, error),
            None => true,
        }
    }

    /// Arms a timer that invokes `callback` after the backoff delay for the
    /// current attempt.
    ///
    /// Publishes [`ReconnectionEventKind::Scheduled`] carrying the upcoming
    /// attempt number. The attempt counter is not advanced; call
    /// [`record_attempt`](Self::record_attempt) when the attempt actually starts.
    ///
    /// # Errors
    ///
    /// Fails after [`dispose`](Self::dispose) or outside a tokio runtime.
    pub fn schedule_reconnection<F>(&self, callback: F) -> Result<ReconnectHandle, ScheduleError>
    where
        F: FnOnce() + Send + 'static,
    {
        let attempt = self.current_attempt();
        let delay = self.next_delay(attempt);
        self.arm(attempt, delay, callback)
    }

    /// Like [`schedule_reconnection`](Self::schedule_reconnection) with a zero
    /// delay.
    ///
    /// The callback still runs on the runtime, never inline.
    pub fn schedule_immediate_reconnection<F>(
        &self,
        callback: F,
    ) -> Result<ReconnectHandle, ScheduleError>
    where
        F: FnOnce() + Send + 'static,
    {
        let attempt = self.current_attempt();
        self.arm(attempt, Duration::ZERO, callback)
    }

    /// Marks the start of an attempt.
    pub fn record_attempt(&self) {
        self.transition(|this, ladder, now, events| {
            ladder.current_attempt = ladder.current_attempt.saturating_add(1);
            ladder.statistics.record_attempt_at(now);
            ladder.phase = ReconnectPhase::Attempting;
            events.push(
                this.event(ReconnectionEventKind::AttemptStarted)
                    .with_attempt(ladder.current_attempt),
            );
        });
    }

    /// Records a successful reconnection that took `reconnection_time`.
    ///
    /// Clears the failure streak, closing an open circuit, and restarts the
    /// ladder so the next disconnect backs off from the initial delay.
    pub fn record_success(&self, reconnection_time: Duration) {
        self.transition(|this, ladder, _now, events| {
            ladder.statistics.record_success(reconnection_time);
            let was_open = ladder.breaker.close();

            events.push(
                this.event(ReconnectionEventKind::Succeeded)
                    .with_attempt(ladder.current_attempt),
            );
            if was_open {
                events.push(this.event(ReconnectionEventKind::CircuitClosed));
            }

            ladder.current_attempt = 0;
            ladder.phase = ReconnectPhase::Idle;
            ladder.exhausted_reported = false;
        });

        #[cfg(feature = "metrics")]
        histogram!("reconnect_duration_seconds", "reconnect" => self.config.name.clone())
            .record(reconnection_time.as_secs_f64());
    }

    /// Records a failed attempt.
    pub fn record_failure(&self) {
        self.fail(None);
    }

    /// Records a failed attempt, carrying `error` into the published event.
    pub fn record_failure_with_error<E>(&self, error: &E)
    where
        E: fmt::Display + ?Sized,
    {
        self.fail(Some(error.to_string()));
    }

    /// Restarts the attempt counter. Statistics and breaker state are kept.
    pub fn reset(&self) {
        let mut ladder = self.lock();
        ladder.current_attempt = 0;
        ladder.exhausted_reported = false;
    }

    /// Clears statistics, the failure streak and any open circuit.
    pub fn reset_statistics(&self) {
        self.transition(|this, ladder, _now, events| {
            ladder.statistics.reset();
            ladder.exhausted_reported = false;
            if ladder.breaker.close() {
                events.push(this.event(ReconnectionEventKind::CircuitClosed));
            }
        });
    }

    /// Closes the event stream and cancels every pending timer. Idempotent.
    ///
    /// Recording methods keep updating state afterwards but publish nothing,
    /// and scheduling fails with [`ScheduleError::Disposed`].
    pub fn dispose(&self) {
        if self.disposed.swap(true, Ordering::AcqRel) {
            return;
        }

        let pending = {
            let mut ladder = self.lock();
            ladder.phase = ReconnectPhase::Idle;
            ladder.last_armed.take()
        };
        if let Some(handle) = pending {
            handle.cancel();
        }

        self.hub.close();

        #[cfg(feature = "tracing")]
        tracing::debug!(strategy = %self.config.name, "reconnection strategy disposed");
    }

    fn arm<F>(
        &self,
        attempt: u32,
        delay: Duration,
        callback: F,
    ) -> Result<ReconnectHandle, ScheduleError>
    where
        F: FnOnce() + Send + 'static,
    {
        if self.is_disposed() {
            return Err(ScheduleError::Disposed);
        }
        let runtime =
            tokio::runtime::Handle::try_current().map_err(|_| ScheduleError::NoRuntime)?;

        let next_attempt = attempt.saturating_add(1);
        self.transition(|this, ladder, _now, events| {
            ladder.phase = ReconnectPhase::Scheduled;
            events.push(
                this.event(ReconnectionEventKind::Scheduled)
                    .with_attempt(next_attempt)
                    .with_delay(delay),
            );
        });

        let cancelled = Arc::new(AtomicBool::new(false));
        let fired = Arc::new(AtomicBool::new(false));
        let task = {
            let cancelled = Arc::clone(&cancelled);
            let fired = Arc::clone(&fired);
            let disposed = Arc::clone(&self.disposed);
            runtime.spawn(async move {
                tokio::time::sleep(delay).await;
                if cancelled.load(Ordering::Acquire) || disposed.load(Ordering::Acquire) {
                    return;
                }
                fired.store(true, Ordering::Release);
                callback();
            })
        };

        let handle = ReconnectHandle::new(
            cancelled,
            fired,
            task.abort_handle(),
            next_attempt,
            delay,
        );
        self.lock().last_armed = Some(handle.clone());
        Ok(handle)
    }

    fn fail(&self, error: Option<String>) {
        let max_retries = self.config.max_retries;
        let cooldown = self
            .config
            .circuit_breaker
            .and_then(|settings| settings.open_duration());

        self.transition(|this, ladder, now, events| {
            ladder.statistics.record_failure();
            let opened = ladder.breaker.record_failure(now);
            ladder.phase = ReconnectPhase::Idle;

            let attempt = ladder.current_attempt;
            events.push(
                this.event(ReconnectionEventKind::Failed)
                    .with_attempt(attempt)
                    .with_error(error),
            );

            if opened {
                let mut event = this
                    .event(ReconnectionEventKind::CircuitOpened)
                    .with_attempt(attempt);
                if let Some(cooldown) = cooldown {
                    event = event.with_delay(cooldown);
                }
                events.push(event);
            }

            if !ladder.should_retry(max_retries) && !ladder.exhausted_reported {
                ladder.exhausted_reported = true;
                events.push(
                    this.event(ReconnectionEventKind::Exhausted)
                        .with_attempt(attempt),
                );
            }
        });
    }

    /// Runs `f` under the lock after expiring a stale circuit. Events pushed by
    /// `f` join the pending queue before the lock is released, then the queue
    /// is flushed.
    fn transition<T, F>(&self, f: F) -> T
    where
        F: FnOnce(&Self, &mut Ladder, Instant, &mut Vec<ReconnectionEvent>) -> T,
    {
        let value = {
            let now = Instant::now();
            let mut events = Vec::new();
            let mut ladder = self.lock();
            self.expire_circuit(&mut ladder, now, &mut events);
            let value = f(self, &mut ladder, now, &mut events);
            if !events.is_empty() {
                self.pending_queue().extend(events);
            }
            value
        };
        self.flush();
        value
    }

    fn inspect<T>(&self, f: impl FnOnce(&Ladder) -> T) -> T {
        self.transition(|_, ladder, _, _| f(ladder))
    }

    fn expire_circuit(&self, ladder: &mut Ladder, now: Instant, events: &mut Vec<ReconnectionEvent>) {
        if ladder.breaker.refresh(now) {
            if ladder.current_attempt < self.config.max_retries {
                ladder.exhausted_reported = false;
            }
            events.push(self.event(ReconnectionEventKind::CircuitClosed));
        }
    }

    fn lock(&self) -> MutexGuard<'_, Ladder> {
        self.ladder.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn event(&self, kind: ReconnectionEventKind) -> ReconnectionEvent {
        ReconnectionEvent::new(&self.config.name, kind)
    }

    fn pending_queue(&self) -> MutexGuard<'_, VecDeque<ReconnectionEvent>> {
        self.pending.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn next_pending(&self) -> Option<ReconnectionEvent> {
        self.pending_queue().pop_front()
    }

    /// Delivers queued events in order. One caller drains at a time; events
    /// queued by others meanwhile, including listeners re-entering the
    /// strategy, are delivered by the draining caller.
    fn flush(&self) {
        loop {
            if self
                .draining
                .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
                .is_err()
            {
                return;
            }
            {
                let _draining = DrainGuard(&self.draining);
                while let Some(event) = self.next_pending() {
                    self.observe(&event);
                    self.hub.emit(event);
                }
            }
            if self.pending_queue().is_empty() {
                return;
            }
        }
    }

    fn observe(&self, event: &ReconnectionEvent) {
        #[cfg(feature = "tracing")]
        {
            let name = &self.config.name;
            let attempt = event.attempt().unwrap_or_default();
            match event.kind() {
                ReconnectionEventKind::Scheduled => tracing::debug!(
                    strategy = %name,
                    attempt,
                    delay_ms = event.delay().unwrap_or_default().as_millis() as u64,
                    "reconnection scheduled"
                ),
                ReconnectionEventKind::AttemptStarted => {
                    tracing::debug!(strategy = %name, attempt, "reconnection attempt started")
                }
                ReconnectionEventKind::Succeeded => {
                    tracing::debug!(strategy = %name, attempt, "reconnected")
                }
                ReconnectionEventKind::Failed => tracing::debug!(
                    strategy = %name,
                    attempt,
                    error = event.error().unwrap_or("<unreported>"),
                    "reconnection attempt failed"
                ),
                ReconnectionEventKind::CircuitOpened => {
                    tracing::warn!(strategy = %name, attempt, "reconnection circuit opened")
                }
                ReconnectionEventKind::CircuitClosed => {
                    tracing::info!(strategy = %name, "reconnection circuit closed")
                }
                ReconnectionEventKind::Exhausted => {
                    tracing::warn!(strategy = %name, attempt, "reconnection attempts exhausted")
                }
            }
        }

        #[cfg(feature = "metrics")]
        {
            let name = self.config.name.clone();
            match event.kind() {
                ReconnectionEventKind::Scheduled => {}
                ReconnectionEventKind::AttemptStarted => {
                    counter!("reconnect_attempts_total", "reconnect" => name).increment(1)
                }
                ReconnectionEventKind::Succeeded => {
                    counter!("reconnect_outcomes_total", "reconnect" => name, "outcome" => "success")
                        .increment(1)
                }
                ReconnectionEventKind::Failed => {
                    counter!("reconnect_outcomes_total", "reconnect" => name, "outcome" => "failure")
                        .increment(1)
                }
                ReconnectionEventKind::CircuitOpened => {
                    counter!("reconnect_circuit_transitions_total", "reconnect" => name.clone(), "to" => "open")
                        .increment(1);
                    gauge!("reconnect_circuit_open", "reconnect" => name).set(1.0);
                }
                ReconnectionEventKind::CircuitClosed => {
                    counter!("reconnect_circuit_transitions_total", "reconnect" => name.clone(), "to" => "closed")
                        .increment(1);
                    gauge!("reconnect_circuit_open", "reconnect" => name).set(0.0);
                }
                ReconnectionEventKind::Exhausted => {
                    counter!("reconnect_exhausted_total", "reconnect" => name).increment(1)
                }
            }
        }

        #[cfg(not(any(feature = "tracing", feature = "metrics")))]
        let _ = event;
    }
}

struct DrainGuard<'a>(&'a AtomicBool);

impl Drop for DrainGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

impl Default for ReconnectionStrategy {
    fn default() -> Self {
        Self::with_defaults()
    }
}

impl Drop for ReconnectionStrategy {
    fn drop(&mut self) {
        self.dispose();
    }
}

impl fmt::Debug for ReconnectionStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let ladder = self.lock();
        f.debug_struct("ReconnectionStrategy")
            .field("name", &self.config.name)
            .field("current_attempt", &ladder.current_attempt)
            .field("phase", &ladder.phase)
            .field("consecutive_failures", &ladder.breaker.consecutive_failures())
            .field("circuit_open", &ladder.breaker.is_open())
            .field("disposed", &self.is_disposed())
            .finish()
    }
}
