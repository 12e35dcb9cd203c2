use super::{drain, kinds, quiet_builder, RelayError};
use relay_resilience_reconnect::{ReconnectionEventKind, ReconnectionStrategy, ResilienceEvent};
use std::sync::atomic::{AtomicU32, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, Weak};
use std::time::Duration;
use tokio::sync::broadcast::error::{RecvError, TryRecvError};

#[test]
fn failure_ladder_event_order() {
    let strategy = quiet_builder("order")
        .max_retries(2)
        .build()
        .into_strategy();
    let mut rx = strategy.subscribe().unwrap();

    strategy.record_attempt();
    strategy.record_failure();
    strategy.record_attempt();
    strategy.record_failure();

    assert_eq!(
        kinds(&drain(&mut rx)),
        vec![
            ReconnectionEventKind::AttemptStarted,
            ReconnectionEventKind::Failed,
            ReconnectionEventKind::AttemptStarted,
            ReconnectionEventKind::Failed,
            ReconnectionEventKind::Exhausted,
        ]
    );
}

#[test]
fn exhausted_once_per_ladder() {
    let exhausted = Arc::new(AtomicU32::new(0));
    let last_attempt = Arc::new(AtomicU32::new(0));
    let (count, last) = (Arc::clone(&exhausted), Arc::clone(&last_attempt));

    let strategy = quiet_builder("exhausted")
        .max_retries(3)
        .on_exhausted(move |attempt| {
            count.fetch_add(1, Ordering::SeqCst);
            last.store(attempt, Ordering::SeqCst);
        })
        .build()
        .into_strategy();

    for _ in 0..3 {
        strategy.record_attempt();
        strategy.record_failure();
    }
    assert_eq!(exhausted.load(Ordering::SeqCst), 1);
    assert_eq!(last_attempt.load(Ordering::SeqCst), 3);
    assert!(!strategy.should_retry());

    // Further failures in the same ladder stay silent.
    strategy.record_failure();
    assert_eq!(exhausted.load(Ordering::SeqCst), 1);

    // A new ladder may exhaust again.
    strategy.reset();
    assert!(strategy.should_retry());
    for _ in 0..3 {
        strategy.record_attempt();
        strategy.record_failure();
    }
    assert_eq!(exhausted.load(Ordering::SeqCst), 2);
}

#[test]
fn opening_circuit_also_exhausts() {
    let strategy = quiet_builder("open")
        .max_retries(10)
        .circuit_breaker_threshold(2)
        .build()
        .into_strategy();
    let mut rx = strategy.subscribe().unwrap();

    for _ in 0..2 {
        strategy.record_attempt();
        strategy.record_failure();
    }

    let events = kinds(&drain(&mut rx));
    assert_eq!(
        &events[events.len() - 3..],
        &[
            ReconnectionEventKind::Failed,
            ReconnectionEventKind::CircuitOpened,
            ReconnectionEventKind::Exhausted,
        ]
    );
}

#[test]
fn failure_error_text_is_carried() {
    let errors = Arc::new(Mutex::new(Vec::new()));
    let seen = Arc::clone(&errors);

    let strategy = quiet_builder("errors")
        .on_failure(move |attempt, error| {
            seen.lock()
                .unwrap()
                .push((attempt, error.map(str::to_owned)));
        })
        .build()
        .into_strategy();

    strategy.record_attempt();
    strategy.record_failure_with_error(&RelayError("handshake timed out"));
    strategy.record_attempt();
    strategy.record_failure();

    assert_eq!(
        *errors.lock().unwrap(),
        vec![
            (1, Some("relay error: handshake timed out".to_owned())),
            (2, None),
        ]
    );
}

#[test]
fn event_payloads() {
    let strategy = quiet_builder("payloads").build().into_strategy();
    let mut rx = strategy.subscribe().unwrap();

    strategy.record_attempt();
    strategy.record_success(Duration::from_millis(12));

    let events = drain(&mut rx);
    assert_eq!(events.len(), 2);

    assert_eq!(events[0].kind(), ReconnectionEventKind::AttemptStarted);
    assert_eq!(events[0].attempt(), Some(1));
    assert_eq!(events[0].pattern_name(), "payloads");
    assert_eq!(events[0].event_type(), "attempt_started");

    assert_eq!(events[1].kind(), ReconnectionEventKind::Succeeded);
    assert_eq!(events[1].attempt(), Some(1));
    assert!(events[1].timestamp() >= events[0].timestamp());
    assert_eq!(events[1].to_string(), "[payloads] succeeded attempt=1");
}

#[test]
fn listeners_observe_updated_state() {
    let slot: Arc<Mutex<Weak<ReconnectionStrategy>>> = Arc::new(Mutex::new(Weak::new()));
    let observed = Arc::new(Mutex::new(Vec::new()));

    let (strategy_slot, log) = (Arc::clone(&slot), Arc::clone(&observed));
    let strategy = Arc::new(
        quiet_builder("reentrant")
            .on_event(move |event| {
                if let Some(strategy) = strategy_slot.lock().unwrap().upgrade() {
                    let stats = strategy.statistics();
                    log.lock().unwrap().push((
                        event.kind(),
                        strategy.current_attempt(),
                        stats.total_attempts(),
                        stats.failed_reconnections(),
                    ));
                }
            })
            .build()
            .into_strategy(),
    );
    *slot.lock().unwrap() = Arc::downgrade(&strategy);

    strategy.record_attempt();
    strategy.record_failure();

    assert_eq!(
        *observed.lock().unwrap(),
        vec![
            (ReconnectionEventKind::AttemptStarted, 1, 1, 0),
            (ReconnectionEventKind::Failed, 1, 1, 1),
        ]
    );
}

#[test]
fn panicking_listener_does_not_break_emission() {
    let calls = Arc::new(AtomicUsize::new(0));
    let counter = Arc::clone(&calls);

    let strategy = quiet_builder("panics")
        .on_attempt(|_| panic!("listener bug"))
        .on_attempt(move |_| {
            counter.fetch_add(1, Ordering::SeqCst);
        })
        .build()
        .into_strategy();
    let mut rx = strategy.subscribe().unwrap();

    strategy.record_attempt();

    assert_eq!(calls.load(Ordering::SeqCst), 1);
    assert_eq!(strategy.current_attempt(), 1);
    assert_eq!(
        kinds(&drain(&mut rx)),
        vec![ReconnectionEventKind::AttemptStarted]
    );
}

#[test]
fn late_subscribers_miss_earlier_events() {
    let strategy = quiet_builder("late").build().into_strategy();

    strategy.record_attempt();
    let mut rx = strategy.subscribe().unwrap();
    assert!(matches!(rx.try_recv(), Err(TryRecvError::Empty)));

    strategy.record_failure();
    assert_eq!(rx.try_recv().unwrap().kind(), ReconnectionEventKind::Failed);
}

#[test]
fn emission_without_observers() {
    let strategy = quiet_builder("silent").max_retries(1).build().into_strategy();
    assert_eq!(strategy.subscriber_count(), 0);

    strategy.record_attempt();
    strategy.record_failure();
    assert_eq!(strategy.statistics().failed_reconnections(), 1);
}

#[test]
fn subscriber_count_tracks_receivers() {
    let strategy = quiet_builder("count").build().into_strategy();

    let a = strategy.subscribe().unwrap();
    let b = strategy.subscribe().unwrap();
    assert_eq!(strategy.subscriber_count(), 2);

    drop(a);
    assert_eq!(strategy.subscriber_count(), 1);
    drop(b);
    assert_eq!(strategy.subscriber_count(), 0);
}

#[test]
fn slow_subscriber_lags() {
    let strategy = quiet_builder("lag")
        .max_retries(100)
        .event_capacity(2)
        .build()
        .into_strategy();
    let mut rx = strategy.subscribe().unwrap();

    for _ in 0..3 {
        strategy.record_attempt();
    }

    assert!(matches!(rx.try_recv(), Err(TryRecvError::Lagged(1))));
    assert_eq!(rx.try_recv().unwrap().attempt(), Some(2));
    assert_eq!(rx.try_recv().unwrap().attempt(), Some(3));
}

#[tokio::test]
async fn dispose_completes_subscriptions() {
    let strategy = quiet_builder("dispose").build().into_strategy();
    let mut rx = strategy.subscribe().unwrap();

    strategy.record_attempt();
    strategy.dispose();

    assert_eq!(
        rx.recv().await.unwrap().kind(),
        ReconnectionEventKind::AttemptStarted
    );
    assert!(matches!(rx.recv().await, Err(RecvError::Closed)));
    assert_eq!(strategy.subscriber_count(), 0);
}

#[test]
fn no_events_after_dispose() {
    let calls = Arc::new(AtomicUsize::new(0));
    let counter = Arc::clone(&calls);
    let strategy = quiet_builder("disposed")
        .on_event(move |_| {
            counter.fetch_add(1, Ordering::SeqCst);
        })
        .build()
        .into_strategy();

    strategy.dispose();
    strategy.record_attempt();
    strategy.record_failure();
    strategy.record_success(Duration::from_millis(5));

    assert_eq!(calls.load(Ordering::SeqCst), 0);
}

#[test]
fn concurrent_recording_delivers_in_transition_order() {
    let threads = 8;
    let per_thread = 500;
    let total = threads * per_thread;

    let seen = Arc::new(Mutex::new(Vec::with_capacity(total)));
    let log = Arc::clone(&seen);
    let strategy = Arc::new(
        quiet_builder("ordered")
            .max_retries(u32::MAX)
            .event_capacity(total)
            .on_attempt(move |attempt| log.lock().unwrap().push(attempt))
            .build()
            .into_strategy(),
    );
    let mut rx = strategy.subscribe().unwrap();

    let handles: Vec<_> = (0..threads)
        .map(|_| {
            let strategy = Arc::clone(&strategy);
            std::thread::spawn(move || {
                for _ in 0..per_thread {
                    strategy.record_attempt();
                }
            })
        })
        .collect();
    for handle in handles {
        handle.join().unwrap();
    }

    let expected: Vec<u32> = (1..=total as u32).collect();
    assert_eq!(*seen.lock().unwrap(), expected);

    let broadcast: Vec<u32> = drain(&mut rx)
        .iter()
        .map(|event| event.attempt().unwrap())
        .collect();
    assert_eq!(broadcast, expected);
}

#[test]
fn reentrant_listener_events_follow_the_triggering_event() {
    let slot: Arc<Mutex<Weak<ReconnectionStrategy>>> = Arc::new(Mutex::new(Weak::new()));
    let observed = Arc::new(Mutex::new(Vec::new()));

    let (strategy_slot, log) = (Arc::clone(&slot), Arc::clone(&observed));
    let strategy = Arc::new(
        quiet_builder("reentrant-record")
            .on_event(move |event| {
                log.lock().unwrap().push(event.kind());
                if event.kind() == ReconnectionEventKind::AttemptStarted {
                    if let Some(strategy) = strategy_slot.lock().unwrap().upgrade() {
                        strategy.record_failure();
                    }
                }
            })
            .build()
            .into_strategy(),
    );
    *slot.lock().unwrap() = Arc::downgrade(&strategy);
    let mut rx = strategy.subscribe().unwrap();

    strategy.record_attempt();

    let expected = vec![
        ReconnectionEventKind::AttemptStarted,
        ReconnectionEventKind::Failed,
    ];
    assert_eq!(*observed.lock().unwrap(), expected);
    assert_eq!(kinds(&drain(&mut rx)), expected);
    assert_eq!(strategy.statistics().failed_reconnections(), 1);
}
