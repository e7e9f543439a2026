//! Feed builder.

use crate::config::FeedConfig;
use crate::connection::FeedConnection;
use crate::dispatcher::Dispatcher;
use crate::handle::{FeedHandle, FeedShared};
use crate::session::{Connector, WebSocketConnector};
use ironfeed_channel::broadcast;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

/// Builder for configuring and creating a feed.
#[derive(Default)]
pub struct FeedBuilder {
    config: FeedConfig,
    connector: Option<Arc<dyn Connector>>,
    shutdown: Option<CancellationToken>,
}

impl FeedBuilder {
    /// Creates a builder with default settings.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a builder from a loaded configuration.
    #[must_use]
    pub fn from_config(config: FeedConfig) -> Self {
        Self {
            config,
            ..Self::default()
        }
    }

    /// Sets the WebSocket endpoint.
    #[must_use]
    pub fn url(mut self, url: impl Into<String>) -> Self {
        self.config.url = url.into();
        self
    }

    /// Sets the connection timeout.
    #[must_use]
    pub fn connect_timeout(mut self, timeout: Duration) -> Self {
        self.config.connect_timeout = timeout;
        self
    }

    /// Sets how long the transport may stay silent.
    #[must_use]
    pub fn idle_timeout(mut self, timeout: Duration) -> Self {
        self.config.idle_timeout = timeout;
        self
    }

    /// Sets the ping interval.
    #[must_use]
    pub fn ping_interval(mut self, interval: Duration) -> Self {
        self.config.ping_interval = interval;
        self
    }

    /// Enables or disables automatic reconnection.
    #[must_use]
    pub fn reconnect(mut self, enabled: bool) -> Self {
        self.config.reconnect.enabled = enabled;
        self
    }

    /// Sets the initial reconnection delay.
    #[must_use]
    pub fn reconnect_delay(mut self, delay: Duration) -> Self {
        self.config.reconnect.initial_delay = delay;
        self
    }

    /// Sets the reconnection delay cap.
    #[must_use]
    pub fn max_reconnect_delay(mut self, delay: Duration) -> Self {
        self.config.reconnect.max_delay = delay;
        self
    }

    /// Sets the relative reconnection jitter.
    #[must_use]
    pub fn jitter(mut self, jitter: f64) -> Self {
        self.config.reconnect.jitter = jitter;
        self
    }

    /// Sets the maximum reconnection attempts (0 = unlimited).
    #[must_use]
    pub fn max_reconnect_attempts(mut self, max: usize) -> Self {
        self.config.reconnect.max_attempts = max;
        self
    }

    /// Sets the number of levels per side in order book views.
    #[must_use]
    pub fn display_depth(mut self, depth: usize) -> Self {
        self.config.book.display_depth = depth;
        self
    }

    /// Prunes order books to `depth` levels per side after every update.
    #[must_use]
    pub fn retain_depth(mut self, depth: Option<usize>) -> Self {
        self.config.book.retain_depth = depth;
        self
    }

    /// Sets the number of trades kept per instrument.
    #[must_use]
    pub fn trade_capacity(mut self, capacity: usize) -> Self {
        self.config.trade_capacity = capacity;
        self
    }

    /// Sets the event buffer capacity.
    #[must_use]
    pub fn event_capacity(mut self, capacity: usize) -> Self {
        self.config.event_capacity = capacity;
        self
    }

    /// Enables or disables the heartbeats subscription.
    #[must_use]
    pub fn heartbeats(mut self, enabled: bool) -> Self {
        self.config.heartbeats = enabled;
        self
    }

    /// Enables or disables order book resync on sequence gaps.
    #[must_use]
    pub fn resync_on_gap(mut self, enabled: bool) -> Self {
        self.config.resync_on_gap = enabled;
        self
    }

    /// Sets how long a resync may wait for its snapshot.
    #[must_use]
    pub fn resync_timeout(mut self, timeout: Duration) -> Self {
        self.config.resync_timeout = timeout;
        self
    }

    /// Replaces the WebSocket connector.
    #[must_use]
    pub fn connector(mut self, connector: impl Connector + 'static) -> Self {
        self.connector = Some(Arc::new(connector));
        self
    }

    /// Uses an existing cancellation token for shutdown.
    #[must_use]
    pub fn shutdown_token(mut self, token: CancellationToken) -> Self {
        self.shutdown = Some(token);
        self
    }

    /// Returns the configuration built so far.
    #[must_use]
    pub fn config(&self) -> &FeedConfig {
        &self.config
    }

    /// Builds the connection and its handle.
    ///
    /// Nothing connects until [`FeedConnection::run`] is awaited.
    #[must_use]
    pub fn build(self) -> (FeedConnection, FeedHandle) {
        let events = broadcast::channel(self.config.event_capacity);
        let dispatcher = Arc::new(Dispatcher::new(
            self.config.book.clone(),
            self.config.trade_capacity,
            events.clone(),
        ));
        let shared = Arc::new(FeedShared::new(
            dispatcher,
            events,
            self.shutdown.unwrap_or_default(),
        ));

        let connector = self
            .connector
            .unwrap_or_else(|| Arc::new(WebSocketConnector::new(self.config.url.clone())));

        let connection = FeedConnection::new(self.config, connector, Arc::clone(&shared));
        (connection, FeedHandle::new(shared))
    }
}

impl std::fmt::Debug for FeedBuilder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FeedBuilder")
            .field("config", &self.config)
            .field("custom_connector", &self.connector.is_some())
            .finish_non_exhaustive()
    }
}
