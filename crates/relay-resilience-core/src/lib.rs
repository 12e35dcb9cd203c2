//! Core infrastructure for relay-resilience.
//!
//! This crate provides the event plumbing shared by the relay resilience crates:
//! - [`ResilienceEvent`], the common shape of every emitted event
//! - [`EventListeners`], synchronous callbacks registered at configuration time
//! - [`EventHub`], fan-out to listeners plus any number of broadcast subscribers

pub mod events;

pub use events::{EventHub, EventListener, EventListeners, FnListener, ResilienceEvent};
