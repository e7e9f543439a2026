//! # IronFeed Core
//!
//! Core types for exchange market-data ingestion.
//!
//! This crate provides:
//! - Identifier and topic types ([`ProductId`], [`Channel`], [`SubscriptionKey`])
//! - Typed market-data messages (book snapshots/deltas, trades, tickers)
//! - JSON decoding of inbound frames, already split per topic
//! - Encoding of subscribe/unsubscribe control frames
//! - Error types for wire operations

pub mod decoder;
pub mod encoder;
pub mod error;
pub mod message;
pub mod types;

pub use decoder::decode_frame;
pub use encoder::{ControlFrame, ControlKind};
pub use error::{Result, WireError};
pub use message::{
    BookDelta, BookSnapshot, FeedFrame, InboundFrame, LevelUpdate, Payload, PriceLevel,
    TickerSnapshot, TopicMessage, Trade,
};
pub use types::{Channel, ProductId, Side, SubscriptionKey};

pub use rust_decimal::Decimal;
