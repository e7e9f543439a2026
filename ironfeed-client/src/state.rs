//! Connection lifecycle state.

use std::fmt;

/// State of the feed connection.
///
/// ```text
/// Disconnected -> Connecting -> Resubscribing -> Connected
///      ^               |              |              |
///      +---------------+--------------+--------------+  (transport error)
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ConnectionState {
    /// No transport; waiting for the backoff to expire.
    Disconnected,
    /// Transport handshake in progress.
    Connecting,
    /// Transport open, replaying subscriptions.
    Resubscribing,
    /// Subscriptions replayed; intents are sent as they arrive.
    Connected,
}

impl ConnectionState {
    /// Canonical lower-case name.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Disconnected => "disconnected",
            Self::Connecting => "connecting",
            Self::Resubscribing => "resubscribing",
            Self::Connected => "connected",
        }
    }

    /// Returns true if control frames are written as soon as they are queued.
    #[must_use]
    pub const fn is_connected(self) -> bool {
        matches!(self, Self::Connected)
    }
}

impl fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
