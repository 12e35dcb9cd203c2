//! Reconnection engine for persistent relay connections.
//!
//! A client holding a long-lived connection (a WebSocket to a relay, for
//! instance) needs to decide, every time that connection drops, whether to
//! reconnect, how long to wait first, and when to stop trying for a while. This
//! crate makes those decisions. It does not open connections itself; the
//! connection manager drives it and reports outcomes.
//!
//! # Features
//!
//! - **Exponential backoff with jitter**: delays grow by a configurable factor,
//!   are capped, and are spread by a symmetric jitter envelope
//! - **Circuit breaker**: a run of consecutive failures suspends reconnection,
//!   optionally only for a cooldown period
//! - **Reconnection policy**: gates reconnection by terminal connection state and
//!   custom conditions
//! - **Statistics**: attempts, outcomes and reconnection durations
//! - **Event system**: synchronous listeners plus broadcast subscriptions
//! - **Supervisor**: an async loop that runs a full ladder against a connect
//!   function
//!
//! # Examples
//!
//! ## Driving the strategy manually
//!
//! ```rust
//! use relay_resilience_reconnect::{ReconnectConfig, ReconnectionEventKind};
//! use std::time::Duration;
//!
//! # #[tokio::main(flavor = "current_thread", start_paused = true)]
//! # async fn main() {
//! let strategy = ReconnectConfig::builder()
//!     .name("wss://relay.example.com")
//!     .initial_delay(Duration::from_millis(500))
//!     .max_delay(Duration::from_secs(60))
//!     .max_retries(8)
//!     .circuit_breaker_threshold(5)
//!     .circuit_breaker_duration(Duration::from_secs(120))
//!     .on_exhausted(|attempt| eprintln!("giving up after {attempt} attempts"))
//!     .build()
//!     .into_strategy();
//!
//! let mut events = strategy.subscribe().expect("strategy is live");
//!
//! let (tx, rx) = tokio::sync::oneshot::channel();
//! strategy
//!     .schedule_reconnection(move || {
//!         let _ = tx.send(());
//!     })
//!     .expect("inside a runtime");
//! rx.await.unwrap();
//!
//! strategy.record_attempt();
//! strategy.record_success(Duration::from_millis(80));
//!
//! assert_eq!(events.recv().await.unwrap().kind(), ReconnectionEventKind::Scheduled);
//! assert_eq!(events.recv().await.unwrap().kind(), ReconnectionEventKind::AttemptStarted);
//! assert_eq!(events.recv().await.unwrap().kind(), ReconnectionEventKind::Succeeded);
//! assert_eq!(strategy.statistics().success_rate(), 1.0);
//! # }
//! ```
//!
//! ## Feature flags
//!
//! - `tracing`: log transitions through the `tracing` crate
//! - `metrics`: record counters, a gauge and a histogram through the `metrics` crate

mod backoff;
mod circuit;
mod config;
mod error;
mod events;
mod handle;
mod jitter;
mod policy;
mod state;
mod statistics;
mod strategy;
mod supervisor;

pub use backoff::Backoff;
pub use circuit::CircuitBreakerSettings;
pub use config::{ReconnectConfig, ReconnectConfigBuilder, RetryCondition};
pub use error::{ReconnectError, ScheduleError};
pub use events::{ReconnectionEvent, ReconnectionEventKind};
pub use handle::ReconnectHandle;
pub use jitter::{FixedJitter, JitterSource, SeededJitter, ThreadRngJitter};
pub use policy::{ReconnectCondition, ReconnectionPolicy, ReconnectionPolicyBuilder};
pub use state::{ConnectionState, ReconnectPhase};
pub use statistics::ReconnectionStatistics;
pub use strategy::ReconnectionStrategy;
pub use supervisor::ReconnectSupervisor;

pub use relay_resilience_core::{EventListener, FnListener, ResilienceEvent};

#[cfg(feature = "metrics")]
static METRICS_INIT: std::sync::Once = std::sync::Once::new();

#[cfg(feature = "metrics")]
pub(crate) fn describe_metrics() {
    use metrics::{describe_counter, describe_gauge, describe_histogram};

    METRICS_INIT.call_once(|| {
        describe_counter!(
            "reconnect_attempts_total",
            "Total number of reconnection attempts started"
        );
        describe_counter!(
            "reconnect_outcomes_total",
            "Total number of reconnection attempts by outcome"
        );
        describe_counter!(
            "reconnect_circuit_transitions_total",
            "Total number of reconnection circuit breaker transitions"
        );
        describe_counter!(
            "reconnect_exhausted_total",
            "Total number of reconnection ladders that ran out of attempts"
        );
        describe_gauge!(
            "reconnect_circuit_open",
            "Whether the reconnection circuit is open (1) or closed (0)"
        );
        describe_histogram!(
            "reconnect_duration_seconds",
            "Time taken by successful reconnections"
        );
    });
}
