//! # IronFeed Client
//!
//! Streaming market-data client.
//!
//! This crate provides:
//! - Feed builder with configuration options
//! - A single connection task with automatic reconnection and replay
//! - Reference-counted subscriptions shared by many consumers
//! - Dispatch of decoded frames to per-instrument stores
//! - A cloneable, non-blocking handle for consumers

pub mod builder;
pub mod config;
pub mod connection;
pub mod dispatcher;
pub mod error;
pub mod events;
pub mod handle;
pub mod reconnect;
pub mod registry;
pub mod session;
pub mod state;

pub use builder::FeedBuilder;
pub use config::{DEFAULT_URL, FeedConfig};
pub use connection::FeedConnection;
pub use dispatcher::{DispatchReport, Dispatcher, Route};
pub use error::{ClientError, FeedError};
pub use events::FeedEvent;
pub use handle::FeedHandle;
pub use reconnect::{ReconnectConfig, ReconnectState};
pub use registry::{ChannelRegistry, ConsumerId, Intent};
pub use session::{Connector, FeedTransport, OutboundFrame, WebSocketConnector};
pub use state::ConnectionState;
