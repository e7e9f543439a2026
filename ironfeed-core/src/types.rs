//! Identifier and topic types shared by every IronFeed crate.
//!
//! This module provides:
//! - [`ProductId`] - exchange instrument identifier (e.g. `BTC-USD`)
//! - [`Channel`] - market-data channel names and their wire aliases
//! - [`SubscriptionKey`] - the (channel, product) topic unit
//! - [`Side`] - order book side

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Exchange instrument identifier, usually a `BASE-QUOTE` pair.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ProductId(String);

impl ProductId {
    /// Creates a product identifier from any string-like value.
    #[must_use]
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Returns the identifier as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ProductId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for ProductId {
    fn from(id: &str) -> Self {
        Self(id.to_string())
    }
}

impl From<String> for ProductId {
    fn from(id: String) -> Self {
        Self(id)
    }
}

impl AsRef<str> for ProductId {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

/// Market-data channel.
///
/// Outbound control frames always use the canonical name returned by
/// [`Channel::as_str`]; inbound frames may use the aliases accepted by
/// [`Channel::from_wire`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Channel {
    /// Last price and 24h statistics.
    Ticker,
    /// Full depth order book (snapshot + updates).
    Level2,
    /// Executed trades.
    Matches,
    /// Authenticated user order updates.
    User,
    /// Connection keep-alive ticks.
    Heartbeats,
}

impl Channel {
    /// Canonical channel name used in control frames.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Ticker => "ticker",
            Self::Level2 => "level2",
            Self::Matches => "matches",
            Self::User => "user",
            Self::Heartbeats => "heartbeats",
        }
    }

    /// Maps an inbound `channel` field to a channel, accepting the
    /// exchange's data-channel aliases.
    #[must_use]
    pub fn from_wire(name: &str) -> Option<Self> {
        match name {
            "ticker" | "ticker_batch" => Some(Self::Ticker),
            "level2" | "l2_data" => Some(Self::Level2),
            "matches" | "market_trades" => Some(Self::Matches),
            "user" => Some(Self::User),
            "heartbeats" => Some(Self::Heartbeats),
            _ => None,
        }
    }

    /// Returns true if this core maintains a store for the channel.
    #[must_use]
    pub const fn is_market_data(self) -> bool {
        matches!(self, Self::Ticker | Self::Level2 | Self::Matches)
    }
}

impl fmt::Display for Channel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Channel {
    type Err = UnknownChannel;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::from_wire(s).ok_or_else(|| UnknownChannel(s.to_string()))
    }
}

/// Error returned when a channel name is not recognised.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown channel: {0}")]
pub struct UnknownChannel(pub String);

/// A (channel, product) topic. The unit of subscription dedup and routing.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct SubscriptionKey {
    /// Channel name.
    pub channel: Channel,
    /// Instrument identifier.
    pub product_id: ProductId,
}

impl SubscriptionKey {
    /// Creates a new subscription key.
    #[must_use]
    pub fn new(channel: Channel, product_id: impl Into<ProductId>) -> Self {
        Self {
            channel,
            product_id: product_id.into(),
        }
    }
}

impl fmt::Display for SubscriptionKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.channel, self.product_id)
    }
}

/// Order book side.
///
/// Accepts both the `buy`/`sell` and `bid`/`offer` vocabularies on the wire.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Side {
    /// Bid (buy) side.
    #[serde(rename = "buy", alias = "bid", alias = "BUY", alias = "BID")]
    Bid,
    /// Ask (sell) side.
    #[serde(
        rename = "sell",
        alias = "offer",
        alias = "ask",
        alias = "SELL",
        alias = "OFFER",
        alias = "ASK"
    )]
    Ask,
}
