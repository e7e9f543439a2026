//! # IronFeed Channel
//!
//! Fan-out channels used to notify feed consumers.
//!
//! This crate provides:
//! - [`broadcast`] - Bounded one-to-many ring with per-receiver cursors

pub mod broadcast;

pub use broadcast::{BroadcastReceiver, BroadcastSender};
