//! Event system for resilience patterns.
//!
//! Every pattern describes its lifecycle as a stream of immutable events. Observers
//! attach in one of two ways:
//!
//! - **Listeners** are plain callbacks collected while building a configuration.
//!   They run synchronously, in registration order, on the thread that emitted.
//! - **Subscribers** call [`EventHub::subscribe`] at any time and receive a
//!   `tokio::sync::broadcast` receiver.
//!
//! Emission tolerates zero observers of either kind.

use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Instant;

use tokio::sync::broadcast;

/// Trait for events emitted by resilience patterns.
pub trait ResilienceEvent: Send + Sync + fmt::Debug {
    /// Returns the type of event (e.g., "scheduled", "circuit_opened").
    fn event_type(&self) -> &'static str;

    /// Returns when this event occurred.
    fn timestamp(&self) -> Instant;

    /// Returns the name of the pattern instance that emitted this event.
    fn pattern_name(&self) -> &str;
}

/// Trait for listening to resilience events.
pub trait EventListener<E: ResilienceEvent>: Send + Sync {
    /// Called when an event occurs.
    fn on_event(&self, event: &E);
}

/// Type alias for boxed event listeners.
pub type BoxedEventListener<E> = Arc<dyn EventListener<E>>;

/// A collection of event listeners.
#[derive(Clone)]
pub struct EventListeners<E: ResilienceEvent> {
    listeners: Vec<BoxedEventListener<E>>,
}

impl<E: ResilienceEvent> EventListeners<E> {
    /// Creates a new empty event listener collection.
    pub fn new() -> Self {
        Self {
            listeners: Vec::new(),
        }
    }

    /// Adds a listener to the collection.
    pub fn add<L>(&mut self, listener: L)
    where
        L: EventListener<E> + 'static,
    {
        self.listeners.push(Arc::new(listener));
    }

    /// Emits an event to all registered listeners.
    ///
    /// A panicking listener is isolated: the panic is caught and the remaining
    /// listeners still observe the event.
    pub fn emit(&self, event: &E) {
        for listener in &self.listeners {
            let outcome = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| {
                listener.on_event(event);
            }));

            #[cfg(feature = "tracing")]
            if outcome.is_err() {
                tracing::warn!(
                    pattern = event.pattern_name(),
                    event_type = event.event_type(),
                    "event listener panicked"
                );
            }
            #[cfg(not(feature = "tracing"))]
            let _ = outcome;
        }
    }

    /// Returns true if there are no listeners.
    pub fn is_empty(&self) -> bool {
        self.listeners.is_empty()
    }

    /// Returns the number of listeners.
    pub fn len(&self) -> usize {
        self.listeners.len()
    }
}

impl<E: ResilienceEvent> Default for EventListeners<E> {
    fn default() -> Self {
        Self::new()
    }
}

impl<E: ResilienceEvent> fmt::Debug for EventListeners<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EventListeners")
            .field("len", &self.listeners.len())
            .finish()
    }
}

/// A simple function-based event listener.
pub struct FnListener<E, F>
where
    F: Fn(&E) + Send + Sync,
{
    f: F,
    _phantom: std::marker::PhantomData<fn(&E)>,
}

impl<E, F> FnListener<E, F>
where
    F: Fn(&E) + Send + Sync,
{
    /// Creates a new function-based listener.
    pub fn new(f: F) -> Self {
        Self {
            f,
            _phantom: std::marker::PhantomData,
        }
    }
}

impl<E, F> EventListener<E> for FnListener<E, F>
where
    E: ResilienceEvent,
    F: Fn(&E) + Send + Sync,
{
    fn on_event(&self, event: &E) {
        (self.f)(event)
    }
}

/// Publish/subscribe hub combining static listeners and broadcast subscribers.
///
/// Once [`close`](EventHub::close)d the hub drops its broadcast sender, so every
/// outstanding receiver observes `RecvError::Closed` after draining, and later
/// emissions are discarded.
pub struct EventHub<E: ResilienceEvent> {
    listeners: EventListeners<E>,
    sender: Mutex<Option<broadcast::Sender<E>>>,
    closed: AtomicBool,
}

impl<E> EventHub<E>
where
    E: ResilienceEvent + Clone + 'static,
{
    /// Creates a hub delivering to `listeners` and to broadcast subscribers.
    ///
    /// `capacity` bounds how many events a slow subscriber may fall behind before
    /// it observes `RecvError::Lagged`. A capacity of zero is raised to one.
    pub fn new(listeners: EventListeners<E>, capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity.max(1));
        Self {
            listeners,
            sender: Mutex::new(Some(sender)),
            closed: AtomicBool::new(false),
        }
    }

    /// Delivers `event` to every listener, then to every live subscriber.
    pub fn emit(&self, event: E) {
        if self.is_closed() {
            return;
        }

        self.listeners.emit(&event);

        let sender = self
            .sender
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        if let Some(sender) = sender.as_ref() {
            // No receivers is not an error for a fan-out.
            let _ = sender.send(event);
        }
    }

    /// Opens a new subscription, or `None` once the hub is closed.
    pub fn subscribe(&self) -> Option<broadcast::Receiver<E>> {
        self.sender
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .as_ref()
            .map(broadcast::Sender::subscribe)
    }

    /// Number of live broadcast subscribers.
    pub fn subscriber_count(&self) -> usize {
        self.sender
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .as_ref()
            .map_or(0, broadcast::Sender::receiver_count)
    }

    /// Number of synchronous listeners.
    pub fn listener_count(&self) -> usize {
        self.listeners.len()
    }

    /// Closes the hub. Idempotent.
    pub fn close(&self) {
        self.closed.store(true, Ordering::Release);
        self.sender
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
    }

    /// Returns true once [`close`](EventHub::close) has been called.
    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Acquire)
    }
}

impl<E: ResilienceEvent> fmt::Debug for EventHub<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EventHub")
            .field("listeners", &self.listeners.len())
            .field("closed", &self.closed.load(Ordering::Acquire))
            .finish()
    }
}
