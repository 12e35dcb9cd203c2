//! Drives a full reconnection ladder against an async connect function.

use crate::error::ReconnectError;
use crate::policy::ReconnectionPolicy;
use crate::state::ConnectionState;
use crate::strategy::ReconnectionStrategy;
use std::error::Error;
use std::future::Future;
use std::sync::Arc;
use tokio::sync::oneshot;
use tokio::time::Instant;

/// Runs the schedule → attempt → record loop on behalf of a connection manager.
///
/// The supervisor owns no connection state of its own; everything it learns is
/// recorded into the shared [`ReconnectionStrategy`], so listeners and
/// subscribers see the same events as with manual driving.
///
/// # Examples
///
/// ```
/// use relay_resilience_reconnect::{
///     ConnectionState, ReconnectConfig, ReconnectSupervisor, ReconnectionPolicy,
/// };
/// use std::sync::atomic::{AtomicU32, Ordering};
/// use std::sync::Arc;
/// use std::time::Duration;
///
/// # #[tokio::main(flavor = "current_thread", start_paused = true)]
/// # async fn main() {
/// let strategy = Arc::new(
///     ReconnectConfig::builder()
///         .initial_delay(Duration::from_millis(10))
///         .max_retries(5)
///         .build()
///         .into_strategy(),
/// );
/// let supervisor = ReconnectSupervisor::new(strategy, ReconnectionPolicy::default());
///
/// let calls = AtomicU32::new(0);
/// let counter = &calls;
/// let connected = supervisor
///     .reconnect(ConnectionState::Error, None, move || async move {
///         if counter.fetch_add(1, Ordering::SeqCst) < 2 {
///             Err(std::io::Error::new(std::io::ErrorKind::ConnectionRefused, "refused"))
///         } else {
///             Ok("session")
///         }
///     })
///     .await;
///
/// assert_eq!(connected.unwrap(), "session");
/// assert_eq!(calls.load(Ordering::SeqCst), 3);
/// # }
/// ```
#[derive(Debug, Clone)]
pub struct ReconnectSupervisor {
    strategy: Arc<ReconnectionStrategy>,
    policy: ReconnectionPolicy,
}

impl ReconnectSupervisor {
    pub fn new(strategy: Arc<ReconnectionStrategy>, policy: ReconnectionPolicy) -> Self {
        Self { strategy, policy }
    }

    pub fn strategy(&self) -> &Arc<ReconnectionStrategy> {
        &self.strategy
    }

    pub fn policy(&self) -> &ReconnectionPolicy {
        &self.policy
    }

    /// Reconnects after the connection ended in `state`.
    ///
    /// Each round consults the policy and the strategy, waits out the backoff
    /// delay, then calls `connect`. The first success is returned. The ladder
    /// ends early when the policy refuses, the retry condition rejects an error,
    /// the attempt budget runs out or the circuit opens.
    ///
    /// `last_error` is the error that ended the previous connection, if any. It
    /// is shown to the policy until this ladder produces an error of its own.
    ///
    /// # Errors
    ///
    /// See [`ReconnectError`] for every terminal outcome.
    pub async fn reconnect<T, E, F, Fut>(
        &self,
        state: ConnectionState,
        last_error: Option<&(dyn Error + Send + Sync + 'static)>,
        mut connect: F,
    ) -> Result<T, ReconnectError<E>>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, E>>,
        E: Error + 'static,
    {
        let mut failure: Option<E> = None;

        loop {
            let permitted = match &failure {
                Some(error) => self.policy.should_reconnect(state, Some(error)),
                None => self
                    .policy
                    .should_reconnect(state, last_error.map(|e| e as &dyn Error)),
            };
            if !permitted {
                return Err(ReconnectError::PolicyRejected);
            }

            if !self.strategy.should_retry() {
                return Err(if self.strategy.is_circuit_open() {
                    ReconnectError::CircuitOpen {
                        last_error: failure,
                    }
                } else {
                    ReconnectError::RetriesExhausted {
                        attempts: self.strategy.current_attempt(),
                        last_error: failure,
                    }
                });
            }

            let (fire, fired) = oneshot::channel();
            self.strategy.schedule_reconnection(move || {
                let _ = fire.send(());
            })?;
            if fired.await.is_err() {
                return Err(ReconnectError::Cancelled);
            }

            self.strategy.record_attempt();
            let attempt = self.strategy.current_attempt();
            let started = Instant::now();

            match connect().await {
                Ok(connection) => {
                    self.strategy.record_success(started.elapsed());
                    return Ok(connection);
                }
                Err(error) => {
                    self.strategy.record_failure_with_error(&error);
                    if !self.strategy.should_retry_with_error(attempt, &error) {
                        return Err(ReconnectError::NotRetryable {
                            attempt,
                            source: error,
                        });
                    }
                    failure = Some(error);
                }
            }
        }
    }
}
