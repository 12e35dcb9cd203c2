//! Whether a dropped connection may be re-established at all.

use crate::state::ConnectionState;
use std::error::Error;
use std::fmt;
use std::sync::Arc;

/// Extra gate consulted by [`ReconnectionPolicy::should_reconnect`].
pub type ReconnectCondition =
    Arc<dyn Fn(ConnectionState, Option<&dyn Error>) -> bool + Send + Sync>;

/// Decides whether a reconnect is permitted for a given state and error.
///
/// The policy is immutable and side-effect free: the same inputs always
/// produce the same answer.
///
/// # Examples
///
/// ```
/// use relay_resilience_reconnect::{ConnectionState, ReconnectionPolicy};
///
/// let policy = ReconnectionPolicy::builder()
///     .reconnect_on_close(false)
///     .build();
///
/// assert!(policy.should_reconnect(ConnectionState::Error, None));
/// assert!(!policy.should_reconnect(ConnectionState::Closed, None));
/// ```
#[derive(Clone)]
pub struct ReconnectionPolicy {
    enable_reconnection: bool,
    reconnect_on_error: bool,
    reconnect_on_close: bool,
    conditions: Vec<ReconnectCondition>,
}

impl ReconnectionPolicy {
    /// Creates a new builder. Everything is permitted by default.
    pub fn builder() -> ReconnectionPolicyBuilder {
        ReconnectionPolicyBuilder::default()
    }

    /// A policy that never permits reconnection.
    pub fn disabled() -> Self {
        Self::builder().enable_reconnection(false).build()
    }

    pub fn enable_reconnection(&self) -> bool {
        self.enable_reconnection
    }

    pub fn reconnect_on_error(&self) -> bool {
        self.reconnect_on_error
    }

    pub fn reconnect_on_close(&self) -> bool {
        self.reconnect_on_close
    }

    /// Returns whether a reconnect attempt is permitted.
    ///
    /// Conditions run in registration order and the first `false` wins.
    pub fn should_reconnect(&self, state: ConnectionState, last_error: Option<&dyn Error>) -> bool {
        if !self.enable_reconnection {
            return false;
        }

        match state {
            ConnectionState::Error if !self.reconnect_on_error => return false,
            ConnectionState::Closed if !self.reconnect_on_close => return false,
            _ => {}
        }

        self.conditions
            .iter()
            .all(|condition| condition(state, last_error))
    }
}

impl Default for ReconnectionPolicy {
    fn default() -> Self {
        Self::builder().build()
    }
}

impl fmt::Debug for ReconnectionPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ReconnectionPolicy")
            .field("enable_reconnection", &self.enable_reconnection)
            .field("reconnect_on_error", &self.reconnect_on_error)
            .field("reconnect_on_close", &self.reconnect_on_close)
            .field("conditions", &self.conditions.len())
            .finish()
    }
}

/// Builder for [`ReconnectionPolicy`].
pub struct ReconnectionPolicyBuilder {
    enable_reconnection: bool,
    reconnect_on_error: bool,
    reconnect_on_close: bool,
    conditions: Vec<ReconnectCondition>,
}

impl ReconnectionPolicyBuilder {
    /// Master switch.
    ///
    /// Default: true
    pub fn enable_reconnection(mut self, enabled: bool) -> Self {
        self.enable_reconnection = enabled;
        self
    }

    /// Whether a connection that ended in [`ConnectionState::Error`] may reconnect.
    ///
    /// Default: true
    pub fn reconnect_on_error(mut self, enabled: bool) -> Self {
        self.reconnect_on_error = enabled;
        self
    }

    /// Whether a connection that ended in [`ConnectionState::Closed`] may reconnect.
    ///
    /// Default: true
    pub fn reconnect_on_close(mut self, enabled: bool) -> Self {
        self.reconnect_on_close = enabled;
        self
    }

    /// Adds a condition that must hold for a reconnect to be permitted.
    ///
    /// # Examples
    ///
    /// ```
    /// use relay_resilience_reconnect::{ConnectionState, ReconnectionPolicy};
    ///
    /// // Never reconnect after an authentication rejection.
    /// let policy = ReconnectionPolicy::builder()
    ///     .condition(|_state, error| {
    ///         error.map_or(true, |e| !e.to_string().contains("auth-required"))
    ///     })
    ///     .build();
    ///
    /// let rejected = std::io::Error::new(std::io::ErrorKind::Other, "auth-required: sign in");
    /// assert!(!policy.should_reconnect(ConnectionState::Error, Some(&rejected)));
    /// assert!(policy.should_reconnect(ConnectionState::Error, None));
    /// ```
    pub fn condition<F>(mut self, condition: F) -> Self
    where
        F: Fn(ConnectionState, Option<&dyn Error>) -> bool + Send + Sync + 'static,
    {
        self.conditions.push(Arc::new(condition));
        self
    }

    /// Builds the policy.
    pub fn build(self) -> ReconnectionPolicy {
        ReconnectionPolicy {
            enable_reconnection: self.enable_reconnection,
            reconnect_on_error: self.reconnect_on_error,
            reconnect_on_close: self.reconnect_on_close,
            conditions: self.conditions,
        }
    }
}

impl Default for ReconnectionPolicyBuilder {
    fn default() -> Self {
        Self {
            enable_reconnection: true,
            reconnect_on_error: true,
            reconnect_on_close: true,
            conditions: Vec::new(),
        }
    }
}

impl fmt::Debug for ReconnectionPolicyBuilder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ReconnectionPolicyBuilder")
            .field("enable_reconnection", &self.enable_reconnection)
            .field("reconnect_on_error", &self.reconnect_on_error)
            .field("reconnect_on_close", &self.reconnect_on_close)
            .field("conditions", &self.conditions.len())
            .finish()
    }
}
