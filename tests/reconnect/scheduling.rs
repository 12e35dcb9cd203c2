use super::{drain, quiet_builder};
use relay_resilience_reconnect::{ReconnectPhase, ReconnectionEventKind, ScheduleError};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

fn flag() -> (Arc<AtomicBool>, impl FnOnce() + Send + 'static) {
    let fired = Arc::new(AtomicBool::new(false));
    let setter = Arc::clone(&fired);
    (fired, move || setter.store(true, Ordering::SeqCst))
}

#[tokio::test(start_paused = true)]
async fn fires_after_backoff_delay() {
    let strategy = quiet_builder("timer").build().into_strategy();
    let (fired, callback) = flag();

    let handle = tokio_test::assert_ok!(strategy.schedule_reconnection(callback));
    assert_eq!(handle.delay(), Duration::from_millis(100));

    tokio::time::sleep(Duration::from_millis(50)).await;
    assert!(!fired.load(Ordering::SeqCst));
    assert!(!handle.has_fired());

    tokio::time::sleep(Duration::from_millis(60)).await;
    assert!(fired.load(Ordering::SeqCst));
    assert!(handle.has_fired());
}

#[tokio::test(start_paused = true)]
async fn delay_follows_ladder_position() {
    let strategy = quiet_builder("ladder").max_retries(10).build().into_strategy();
    let mut rx = strategy.subscribe().unwrap();

    strategy.record_attempt();
    strategy.record_failure();
    strategy.record_attempt();
    strategy.record_failure();
    drain(&mut rx);

    let handle = strategy.schedule_reconnection(|| {}).unwrap();
    assert_eq!(handle.attempt(), 3);
    assert_eq!(handle.delay(), Duration::from_millis(400));

    let scheduled = drain(&mut rx);
    assert_eq!(scheduled.len(), 1);
    assert_eq!(scheduled[0].kind(), ReconnectionEventKind::Scheduled);
    assert_eq!(scheduled[0].attempt(), Some(3));
    assert_eq!(scheduled[0].delay(), Some(Duration::from_millis(400)));
}

#[tokio::test(start_paused = true)]
async fn scheduling_does_not_advance_attempts() {
    let strategy = quiet_builder("pure").build().into_strategy();

    strategy.schedule_reconnection(|| {}).unwrap();
    strategy.schedule_reconnection(|| {}).unwrap();

    assert_eq!(strategy.current_attempt(), 0);
    assert_eq!(strategy.phase(), ReconnectPhase::Scheduled);
    assert_eq!(strategy.statistics().total_attempts(), 0);
}

#[tokio::test(start_paused = true)]
async fn immediate_is_not_synchronous() {
    let strategy = quiet_builder("immediate").build().into_strategy();
    let mut rx = strategy.subscribe().unwrap();
    let (fired, callback) = flag();

    let handle = strategy.schedule_immediate_reconnection(callback).unwrap();
    assert_eq!(handle.delay(), Duration::ZERO);
    assert!(!fired.load(Ordering::SeqCst));

    tokio::time::sleep(Duration::from_millis(1)).await;
    assert!(fired.load(Ordering::SeqCst));

    let scheduled = rx.try_recv().unwrap();
    assert_eq!(scheduled.kind(), ReconnectionEventKind::Scheduled);
    assert_eq!(scheduled.delay(), Some(Duration::ZERO));
    assert_eq!(scheduled.attempt(), Some(1));
}

#[tokio::test(start_paused = true)]
async fn cancel_prevents_callback() {
    let strategy = quiet_builder("cancel").build().into_strategy();
    let (fired, callback) = flag();

    let handle = strategy.schedule_reconnection(callback).unwrap();
    handle.cancel();
    handle.cancel();

    tokio::time::sleep(Duration::from_secs(1)).await;
    assert!(handle.is_cancelled());
    assert!(!handle.has_fired());
    assert!(!fired.load(Ordering::SeqCst));
}

#[tokio::test(start_paused = true)]
async fn cancel_after_fire_is_noop() {
    let strategy = quiet_builder("late-cancel").build().into_strategy();
    let (fired, callback) = flag();

    let handle = strategy.schedule_reconnection(callback).unwrap();
    tokio::time::sleep(Duration::from_millis(200)).await;
    handle.cancel();

    assert!(fired.load(Ordering::SeqCst));
    assert!(handle.has_fired());
}

#[tokio::test(start_paused = true)]
async fn dropping_handle_keeps_timer() {
    let strategy = quiet_builder("drop").build().into_strategy();
    let (fired, callback) = flag();

    drop(strategy.schedule_reconnection(callback).unwrap());

    tokio::time::sleep(Duration::from_millis(200)).await;
    assert!(fired.load(Ordering::SeqCst));
}

#[tokio::test(start_paused = true)]
async fn dispose_cancels_pending_timer() {
    let strategy = quiet_builder("dispose").build().into_strategy();
    let (fired, callback) = flag();

    let handle = strategy.schedule_reconnection(callback).unwrap();
    strategy.dispose();

    tokio::time::sleep(Duration::from_secs(1)).await;
    assert!(!fired.load(Ordering::SeqCst));
    assert!(handle.is_cancelled());
    assert_eq!(strategy.phase(), ReconnectPhase::Idle);
}

#[tokio::test(start_paused = true)]
async fn dispose_suppresses_earlier_timers_too() {
    let strategy = quiet_builder("dispose-all").build().into_strategy();
    let calls = Arc::new(AtomicUsize::new(0));

    for _ in 0..3 {
        let calls = Arc::clone(&calls);
        strategy
            .schedule_reconnection(move || {
                calls.fetch_add(1, Ordering::SeqCst);
            })
            .unwrap();
    }
    strategy.dispose();

    tokio::time::sleep(Duration::from_secs(1)).await;
    assert_eq!(calls.load(Ordering::SeqCst), 0);
}

#[tokio::test(start_paused = true)]
async fn schedule_after_dispose_fails() {
    let strategy = quiet_builder("gone").build().into_strategy();
    strategy.dispose();

    let err = tokio_test::assert_err!(strategy.schedule_reconnection(|| {}));
    assert_eq!(err, ScheduleError::Disposed);
    assert_eq!(
        strategy.schedule_immediate_reconnection(|| {}).unwrap_err(),
        ScheduleError::Disposed
    );
}

#[test]
fn schedule_outside_runtime_fails() {
    let strategy = quiet_builder("no-runtime").build().into_strategy();
    assert_eq!(
        strategy.schedule_reconnection(|| {}).unwrap_err(),
        ScheduleError::NoRuntime
    );
    assert_eq!(strategy.phase(), ReconnectPhase::Idle);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn callback_runs_on_runtime() {
    let strategy = quiet_builder("threaded")
        .initial_delay(Duration::from_millis(5))
        .build()
        .into_strategy();
    let (tx, rx) = tokio::sync::oneshot::channel();

    strategy
        .schedule_reconnection(move || {
            let _ = tx.send(std::thread::current().id());
        })
        .unwrap();

    let worker = tokio::time::timeout(Duration::from_secs(5), rx)
        .await
        .unwrap()
        .unwrap();
    assert_ne!(worker, std::thread::current().id());
}
