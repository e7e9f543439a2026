//! Typed market-data messages produced by the decoder.
//!
//! Every [`TopicMessage`] belongs to exactly one [`SubscriptionKey`], so the
//! dispatcher can route it without looking inside the payload.

use crate::error::{Result, WireError};
use crate::types::{Channel, ProductId, Side, SubscriptionKey};
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Price level in an order book snapshot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PriceLevel {
    /// Level price.
    pub price: Decimal,
    /// Absolute size resting at this price. Zero removes the level.
    pub size: Decimal,
}

impl PriceLevel {
    /// Creates a validated price level.
    ///
    /// # Errors
    /// Returns `WireError` if the price is not positive or the size is negative.
    pub fn new(product_id: &ProductId, price: Decimal, size: Decimal) -> Result<Self> {
        validate(product_id, price, size)?;
        Ok(Self { price, size })
    }
}

/// One level change carried by an order book update.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct LevelUpdate {
    /// Book side.
    pub side: Side,
    /// Level price.
    pub price: Decimal,
    /// New absolute size (0 = delete level).
    pub size: Decimal,
}

impl LevelUpdate {
    /// Creates a validated level update.
    ///
    /// # Errors
    /// Returns `WireError` if the price is not positive or the size is negative.
    pub fn new(product_id: &ProductId, side: Side, price: Decimal, size: Decimal) -> Result<Self> {
        validate(product_id, price, size)?;
        Ok(Self { side, price, size })
    }
}

fn validate(product_id: &ProductId, price: Decimal, size: Decimal) -> Result<()> {
    if price <= Decimal::ZERO {
        return Err(WireError::InvalidPrice {
            product_id: product_id.to_string(),
            price,
        });
    }
    if size.is_sign_negative() && !size.is_zero() {
        return Err(WireError::NegativeSize {
            product_id: product_id.to_string(),
            price,
            size,
        });
    }
    Ok(())
}

/// Full order book replacement.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BookSnapshot {
    /// Instrument identifier.
    pub product_id: ProductId,
    /// Bid levels, any order.
    pub bids: Vec<PriceLevel>,
    /// Ask levels, any order.
    pub asks: Vec<PriceLevel>,
}

/// Incremental order book change: every level update of one wire event.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BookDelta {
    /// Instrument identifier.
    pub product_id: ProductId,
    /// Level updates in message order.
    pub updates: Vec<LevelUpdate>,
}

/// Executed trade.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Trade {
    /// Exchange trade identifier, unique per instrument.
    pub trade_id: String,
    /// Instrument identifier.
    pub product_id: ProductId,
    /// Execution price.
    pub price: Decimal,
    /// Executed size.
    pub size: Decimal,
    /// Taker side.
    pub side: Side,
    /// Execution time.
    pub time: Option<DateTime<Utc>>,
}

/// Latest price and 24h statistics for an instrument.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TickerSnapshot {
    /// Instrument identifier.
    pub product_id: ProductId,
    /// Last traded price.
    pub price: Decimal,
    /// Rolling 24h volume.
    pub volume_24h: Option<Decimal>,
    /// Rolling 24h low.
    pub low_24h: Option<Decimal>,
    /// Rolling 24h high.
    pub high_24h: Option<Decimal>,
    /// Rolling 24h price change in percent.
    pub price_percent_chg_24h: Option<Decimal>,
    /// Frame timestamp the snapshot arrived with.
    pub updated_at: Option<DateTime<Utc>>,
}

/// Payload of a routed message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Payload {
    /// Level2 snapshot.
    BookSnapshot(BookSnapshot),
    /// Level2 update.
    BookDelta(BookDelta),
    /// Ticker overwrite.
    Ticker(TickerSnapshot),
    /// Trade batch for one instrument, in wire order.
    Trades(Vec<Trade>),
}

/// A payload tagged with the topic it belongs to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TopicMessage {
    /// Routing key.
    pub key: SubscriptionKey,
    /// Message payload.
    pub payload: Payload,
}

impl TopicMessage {
    /// Creates a topic message.
    #[must_use]
    pub fn new(channel: Channel, product_id: ProductId, payload: Payload) -> Self {
        Self {
            key: SubscriptionKey::new(channel, product_id),
            payload,
        }
    }
}

/// Decoded market-data frame.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FeedFrame {
    /// Channel the frame arrived on.
    pub channel: Channel,
    /// Connection-wide sequence number.
    pub sequence_num: Option<u64>,
    /// Exchange timestamp.
    pub timestamp: Option<DateTime<Utc>>,
    /// Routed messages in wire order.
    pub messages: Vec<TopicMessage>,
}

/// Any inbound frame.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InboundFrame {
    /// Market data for a store-backed channel.
    Data(FeedFrame),
    /// Subscription acknowledgement, heartbeat or other frame without
    /// store-bound data.
    Ignored {
        /// Channel name as received.
        channel: String,
        /// Connection-wide sequence number.
        sequence_num: Option<u64>,
    },
    /// Error reported by the exchange.
    Error {
        /// Error text.
        message: String,
    },
}

impl InboundFrame {
    /// Returns the connection-wide sequence number, if the frame has one.
    #[must_use]
    pub fn sequence_num(&self) -> Option<u64> {
        match self {
            Self::Data(frame) => frame.sequence_num,
            Self::Ignored { sequence_num, .. } => *sequence_num,
            Self::Error { .. } => None,
        }
    }
}
