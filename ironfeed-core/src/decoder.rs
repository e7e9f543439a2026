//! Inbound frame decoding.
//!
//! Frames are JSON envelopes of the form
//!
//! ```text
//! {
//!   "channel": "l2_data",
//!   "timestamp": "2023-02-09T20:32:50.714964855Z",
//!   "sequence_num": 0,
//!   "events": [ { "type": "snapshot", "product_id": "BTC-USD", ... } ]
//! }
//! ```
//!
//! [`decode_frame`] turns one envelope into an [`InboundFrame`] whose
//! messages are already split per (channel, product) topic.

use crate::error::{Result, WireError};
use crate::message::{
    BookDelta, BookSnapshot, FeedFrame, InboundFrame, LevelUpdate, Payload, PriceLevel,
    TickerSnapshot, TopicMessage, Trade,
};
use crate::types::{Channel, ProductId, Side};
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Deserializer};

#[derive(Debug, Deserialize)]
struct RawEnvelope {
    #[serde(rename = "type", default)]
    kind: Option<String>,
    #[serde(default)]
    channel: Option<String>,
    #[serde(default)]
    timestamp: Option<DateTime<Utc>>,
    #[serde(default)]
    sequence_num: Option<u64>,
    #[serde(default)]
    events: Vec<serde_json::Value>,
    #[serde(default)]
    message: Option<String>,
}

#[derive(Debug, Deserialize)]
struct RawLevel2Event {
    #[serde(rename = "type")]
    kind: String,
    product_id: ProductId,
    #[serde(default)]
    bids: Vec<(Decimal, Decimal)>,
    #[serde(default)]
    asks: Vec<(Decimal, Decimal)>,
    #[serde(default)]
    updates: Vec<RawLevelUpdate>,
}

#[derive(Debug, Deserialize)]
struct RawLevelUpdate {
    side: Side,
    price_level: Decimal,
    new_quantity: Decimal,
}

#[derive(Debug, Deserialize)]
struct RawTickerEvent {
    #[serde(default)]
    tickers: Vec<RawTicker>,
}

#[derive(Debug, Deserialize)]
struct RawTicker {
    product_id: ProductId,
    price: Decimal,
    #[serde(default)]
    volume_24h: Option<Decimal>,
    #[serde(default)]
    low_24h: Option<Decimal>,
    #[serde(default)]
    high_24h: Option<Decimal>,
    #[serde(default)]
    price_percent_chg_24h: Option<Decimal>,
}

#[derive(Debug, Deserialize)]
struct RawMatchesEvent {
    #[serde(default)]
    trades: Vec<RawTrade>,
}

#[derive(Debug, Deserialize)]
struct RawTrade {
    #[serde(deserialize_with = "string_or_number")]
    trade_id: String,
    product_id: ProductId,
    price: Decimal,
    size: Decimal,
    side: Side,
    #[serde(default)]
    time: Option<DateTime<Utc>>,
}

fn string_or_number<'de, D>(deserializer: D) -> std::result::Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    match serde_json::Value::deserialize(deserializer)? {
        serde_json::Value::String(s) => Ok(s),
        serde_json::Value::Number(n) => Ok(n.to_string()),
        other => Err(serde::de::Error::custom(format!(
            "expected string or number, found {other}"
        ))),
    }
}

/// Decodes one inbound text frame.
///
/// # Errors
/// Returns `WireError` if the frame is not valid JSON, names an unknown
/// channel or event type, or carries invalid prices or sizes. A frame that
/// fails to decode is never partially applied.
pub fn decode_frame(text: &str) -> Result<InboundFrame> {
    let envelope: RawEnvelope = serde_json::from_str(text)?;

    if envelope.kind.as_deref() == Some("error") {
        return Ok(InboundFrame::Error {
            message: envelope.message.unwrap_or_default(),
        });
    }

    let channel_name = envelope.channel.ok_or(WireError::MissingField("channel"))?;
    if channel_name == "subscriptions" {
        return Ok(InboundFrame::Ignored {
            channel: channel_name,
            sequence_num: envelope.sequence_num,
        });
    }

    let channel = Channel::from_wire(&channel_name)
        .ok_or_else(|| WireError::UnknownChannel(channel_name.clone()))?;
    if !channel.is_market_data() {
        return Ok(InboundFrame::Ignored {
            channel: channel_name,
            sequence_num: envelope.sequence_num,
        });
    }

    let mut messages = Vec::new();
    for event in envelope.events {
        match channel {
            Channel::Level2 => messages.push(decode_level2(event)?),
            Channel::Ticker => decode_ticker(event, envelope.timestamp, &mut messages)?,
            Channel::Matches => decode_matches(event, &mut messages)?,
            Channel::User | Channel::Heartbeats => {}
        }
    }

    Ok(InboundFrame::Data(FeedFrame {
        channel,
        sequence_num: envelope.sequence_num,
        timestamp: envelope.timestamp,
        messages,
    }))
}

fn decode_level2(event: serde_json::Value) -> Result<TopicMessage> {
    let raw: RawLevel2Event = serde_json::from_value(event)?;
    let product_id = raw.product_id;

    let mut updates = Vec::with_capacity(raw.bids.len() + raw.asks.len() + raw.updates.len());
    for (price, size) in raw.bids {
        updates.push(LevelUpdate::new(&product_id, Side::Bid, price, size)?);
    }
    for (price, size) in raw.asks {
        updates.push(LevelUpdate::new(&product_id, Side::Ask, price, size)?);
    }
    for u in raw.updates {
        updates.push(LevelUpdate::new(
            &product_id,
            u.side,
            u.price_level,
            u.new_quantity,
        )?);
    }

    let payload = match raw.kind.as_str() {
        "snapshot" => {
            let mut bids = Vec::new();
            let mut asks = Vec::new();
            for u in updates {
                let level = PriceLevel::new(&product_id, u.price, u.size)?;
                match u.side {
                    Side::Bid => bids.push(level),
                    Side::Ask => asks.push(level),
                }
            }
            Payload::BookSnapshot(BookSnapshot {
                product_id: product_id.clone(),
                bids,
                asks,
            })
        }
        "update" | "l2update" => Payload::BookDelta(BookDelta {
            product_id: product_id.clone(),
            updates,
        }),
        other => {
            return Err(WireError::UnknownEvent {
                channel: Channel::Level2.as_str(),
                kind: other.to_string(),
            });
        }
    };

    Ok(TopicMessage::new(Channel::Level2, product_id, payload))
}

fn decode_ticker(
    event: serde_json::Value,
    timestamp: Option<DateTime<Utc>>,
    out: &mut Vec<TopicMessage>,
) -> Result<()> {
    let raw: RawTickerEvent = serde_json::from_value(event)?;
    for t in raw.tickers {
        let snapshot = TickerSnapshot {
            product_id: t.product_id.clone(),
            price: t.price,
            volume_24h: t.volume_24h,
            low_24h: t.low_24h,
            high_24h: t.high_24h,
            price_percent_chg_24h: t.price_percent_chg_24h,
            updated_at: timestamp,
        };
        out.push(TopicMessage::new(
            Channel::Ticker,
            t.product_id,
            Payload::Ticker(snapshot),
        ));
    }
    Ok(())
}

fn decode_matches(event: serde_json::Value, out: &mut Vec<TopicMessage>) -> Result<()> {
    let raw: RawMatchesEvent = serde_json::from_value(event)?;

    // One batch per product, first-seen order, wire order within a product.
    let mut batches: Vec<(ProductId, Vec<Trade>)> = Vec::new();
    for t in raw.trades {
        if t.price <= Decimal::ZERO {
            return Err(WireError::InvalidPrice {
                product_id: t.product_id.to_string(),
                price: t.price,
            });
        }
        if t.size < Decimal::ZERO {
            return Err(WireError::NegativeSize {
                product_id: t.product_id.to_string(),
                price: t.price,
                size: t.size,
            });
        }
        let trade = Trade {
            trade_id: t.trade_id,
            product_id: t.product_id,
            price: t.price,
            size: t.size,
            side: t.side,
            time: t.time,
        };
        match batches.iter_mut().find(|(p, _)| *p == trade.product_id) {
            Some((_, batch)) => batch.push(trade),
            None => batches.push((trade.product_id.clone(), vec![trade])),
        }
    }

    for (product_id, trades) in batches {
        out.push(TopicMessage::new(
            Channel::Matches,
            product_id,
            Payload::Trades(trades),
        ));
    }
    Ok(())
}
