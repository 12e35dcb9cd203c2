//! Reconnecting to a flaky relay with backoff, a circuit breaker and events.
//!
//! Run with: cargo run --example relay_reconnect -p relay-resilience-reconnect --features tracing
//!
//! The "relay" refuses the first few connections, then accepts one. Every
//! transition is logged through `tracing` and printed by a broadcast subscriber.

use relay_resilience_reconnect::{
    ConnectionState, ReconnectConfig, ReconnectSupervisor, ReconnectionPolicy,
};
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use std::time::Duration;

#[derive(Debug)]
struct RelaySession {
    url: &'static str,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_max_level(tracing::Level::DEBUG)
        .init();

    println!("Relay reconnect example\n");

    let strategy = Arc::new(
        ReconnectConfig::builder()
            .name("wss://relay.example.com")
            .initial_delay(Duration::from_millis(100))
            .max_delay(Duration::from_secs(2))
            .max_retries(6)
            .jitter_factor(0.2)
            .circuit_breaker_threshold(5)
            .circuit_breaker_duration(Duration::from_secs(30))
            .on_failure(|attempt, error| {
                println!("  attempt {attempt} failed: {}", error.unwrap_or("unknown"));
            })
            .build()
            .into_strategy(),
    );

    let mut events = strategy
        .subscribe()
        .ok_or("strategy disposed before subscribing")?;
    let printer = tokio::spawn(async move {
        while let Ok(event) = events.recv().await {
            println!("event: {event}");
        }
    });

    // Only reconnect after errors; a clean close means the user logged out.
    let policy = ReconnectionPolicy::builder().reconnect_on_close(false).build();
    let supervisor = ReconnectSupervisor::new(Arc::clone(&strategy), policy);

    let refusals = AtomicU32::new(3);
    let remaining = &refusals;
    let session = supervisor
        .reconnect(ConnectionState::Error, None, move || async move {
            if remaining
                .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
                .is_ok()
            {
                Err(std::io::Error::new(
                    std::io::ErrorKind::ConnectionRefused,
                    "relay refused the connection",
                ))
            } else {
                Ok(RelaySession {
                    url: "wss://relay.example.com",
                })
            }
        })
        .await?;

    println!("\nconnected to {}", session.url);

    let stats = strategy.statistics();
    println!("Statistics:");
    println!("  attempts: {}", stats.total_attempts());
    println!("  failures: {}", stats.failed_reconnections());
    println!("  success rate: {:.2}", stats.success_rate());
    if let Some(average) = stats.average_reconnection_time() {
        println!("  average reconnection time: {average:?}");
    }

    strategy.dispose();
    printer.await?;

    Ok(())
}
