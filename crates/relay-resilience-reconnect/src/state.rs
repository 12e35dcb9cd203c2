//! Connection and ladder state.

use std::fmt;

/// State of the relay connection as seen by the connection manager.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ConnectionState {
    /// No connection and none in progress.
    Disconnected,

    /// A connection is being established.
    Connecting,

    /// Connected and healthy.
    Connected,

    /// A close handshake is in progress.
    Closing,

    /// The connection was closed, by either side.
    Closed,

    /// The connection failed with an error.
    Error,
}

impl ConnectionState {
    /// Stable lowercase name.
    pub fn as_str(&self) -> &'static str {
        match self {
            ConnectionState::Disconnected => "disconnected",
            ConnectionState::Connecting => "connecting",
            ConnectionState::Connected => "connected",
            ConnectionState::Closing => "closing",
            ConnectionState::Closed => "closed",
            ConnectionState::Error => "error",
        }
    }

    /// True while a live or in-progress connection exists.
    pub fn is_active(&self) -> bool {
        matches!(
            self,
            ConnectionState::Connecting | ConnectionState::Connected
        )
    }
}

impl fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Where the strategy is within the current retry ladder.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum ReconnectPhase {
    /// Nothing scheduled and no attempt in flight.
    #[default]
    Idle,

    /// A timer is armed for the next attempt.
    Scheduled,

    /// An attempt was started and its outcome is not yet reported.
    Attempting,
}
