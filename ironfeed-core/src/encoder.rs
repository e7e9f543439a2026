//! Outbound control frames.
//!
//! ```text
//! {"type":"subscribe","product_ids":["BTC-USD"],"channel":"level2"}
//! ```

use crate::error::Result;
use crate::types::{Channel, ProductId, SubscriptionKey};
use serde::Serialize;

/// Control frame verb.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ControlKind {
    /// Start receiving a channel.
    Subscribe,
    /// Stop receiving a channel.
    Unsubscribe,
}

/// Subscribe/unsubscribe request sent to the exchange.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ControlFrame {
    /// Frame verb.
    #[serde(rename = "type")]
    pub kind: ControlKind,
    /// Instruments the request applies to.
    pub product_ids: Vec<ProductId>,
    /// Target channel.
    pub channel: Channel,
}

impl ControlFrame {
    /// Subscribe frame for a single topic.
    #[must_use]
    pub fn subscribe(key: &SubscriptionKey) -> Self {
        Self {
            kind: ControlKind::Subscribe,
            product_ids: vec![key.product_id.clone()],
            channel: key.channel,
        }
    }

    /// Unsubscribe frame for a single topic.
    #[must_use]
    pub fn unsubscribe(key: &SubscriptionKey) -> Self {
        Self {
            kind: ControlKind::Unsubscribe,
            product_ids: vec![key.product_id.clone()],
            channel: key.channel,
        }
    }

    /// Heartbeats subscription, which keeps quiet connections open.
    #[must_use]
    pub fn heartbeats() -> Self {
        Self {
            kind: ControlKind::Subscribe,
            product_ids: Vec::new(),
            channel: Channel::Heartbeats,
        }
    }

    /// Serializes the frame to its JSON text form.
    ///
    /// # Errors
    /// Returns `WireError::Json` if serialization fails.
    pub fn encode(&self) -> Result<String> {
        Ok(serde_json::to_string(self)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_encode_subscribe() {
        let key = SubscriptionKey::new(Channel::Level2, "BTC-USD");
        let text = ControlFrame::subscribe(&key).encode().unwrap();
        assert_eq!(
            text,
            r#"{"type":"subscribe","product_ids":["BTC-USD"],"channel":"level2"}"#
        );
    }

    #[test]
    fn test_encode_unsubscribe() {
        let key = SubscriptionKey::new(Channel::Matches, "ETH-USD");
        let text = ControlFrame::unsubscribe(&key).encode().unwrap();
        assert_eq!(
            text,
            r#"{"type":"unsubscribe","product_ids":["ETH-USD"],"channel":"matches"}"#
        );
    }

    #[test]
    fn test_encode_heartbeats() {
        let text = ControlFrame::heartbeats().encode().unwrap();
        assert_eq!(
            text,
            r#"{"type":"subscribe","product_ids":[],"channel":"heartbeats"}"#
        );
    }
}
