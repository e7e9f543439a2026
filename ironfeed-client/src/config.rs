//! Feed configuration.
//!
//! [`FeedConfig`] deserializes with defaults so it can sit inside an
//! application's own config file:
//!
//! ```toml
//! [feed]
//! url = "wss://advanced-trade-ws.coinbase.com"
//! idle_timeout_ms = 30000
//!
//! [feed.reconnect]
//! initial_delay_ms = 1000
//! max_attempts = 0
//!
//! [feed.book]
//! display_depth = 10
//! ```

use crate::reconnect::ReconnectConfig;
use ironfeed_marketdata::{BookConfig, DEFAULT_TRADE_CAPACITY};
use serde::{Deserialize, Deserializer};
use std::time::Duration;

/// Default feed endpoint.
pub const DEFAULT_URL: &str = "wss://advanced-trade-ws.coinbase.com";

/// Feed connection and store configuration.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct FeedConfig {
    /// WebSocket endpoint.
    pub url: String,
    /// Handshake timeout.
    #[serde(rename = "connect_timeout_ms", deserialize_with = "millis")]
    pub connect_timeout: Duration,
    /// Silence after which the transport is considered dead.
    #[serde(rename = "idle_timeout_ms", deserialize_with = "millis")]
    pub idle_timeout: Duration,
    /// Interval between transport pings and resync timeout checks.
    #[serde(rename = "ping_interval_ms", deserialize_with = "millis")]
    pub ping_interval: Duration,
    /// Backoff settings.
    pub reconnect: ReconnectConfig,
    /// Order book settings.
    pub book: BookConfig,
    /// Trades kept per instrument.
    pub trade_capacity: usize,
    /// Events buffered for slow consumers.
    pub event_capacity: usize,
    /// Subscribe to the heartbeats channel on every connection.
    pub heartbeats: bool,
    /// Resync live order books when the sequence skips ahead.
    pub resync_on_gap: bool,
    /// Time allowed for a resync snapshot before it is requested again.
    #[serde(rename = "resync_timeout_ms", deserialize_with = "millis")]
    pub resync_timeout: Duration,
}

impl Default for FeedConfig {
    fn default() -> Self {
        Self {
            url: DEFAULT_URL.to_string(),
            connect_timeout: Duration::from_secs(10),
            idle_timeout: Duration::from_secs(30),
            ping_interval: Duration::from_secs(15),
            reconnect: ReconnectConfig::default(),
            book: BookConfig::default(),
            trade_capacity: DEFAULT_TRADE_CAPACITY,
            event_capacity: 1024,
            heartbeats: true,
            resync_on_gap: true,
            resync_timeout: Duration::from_secs(5),
        }
    }
}

/// Deserializes a millisecond count into a `Duration`.
pub(crate) fn millis<'de, D>(deserializer: D) -> Result<Duration, D::Error>
where
    D: Deserializer<'de>,
{
    u64::deserialize(deserializer).map(Duration::from_millis)
}
