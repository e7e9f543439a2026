//! Consumer-facing handle.

use crate::dispatcher::Dispatcher;
use crate::error::FeedError;
use crate::events::FeedEvent;
use crate::registry::{ChannelRegistry, ConsumerId};
use crate::state::ConnectionState;
use ironfeed_channel::{BroadcastReceiver, BroadcastSender};
use ironfeed_core::{BookSnapshot, Channel, ProductId, SubscriptionKey, TickerSnapshot, Trade};
use ironfeed_marketdata::{Instrument, InstrumentCatalog, OrderBookView};
use parking_lot::RwLock;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use tokio::sync::watch;
use tokio_util::sync::CancellationToken;

/// State shared by the connection task and every handle.
#[derive(Debug)]
pub(crate) struct FeedShared {
    pub(crate) registry: ChannelRegistry,
    pub(crate) dispatcher: Arc<Dispatcher>,
    pub(crate) instruments: RwLock<InstrumentCatalog>,
    pub(crate) events: BroadcastSender<FeedEvent>,
    pub(crate) shutdown: CancellationToken,
    next_consumer: AtomicU64,
}

impl FeedShared {
    pub(crate) fn new(
        dispatcher: Arc<Dispatcher>,
        events: BroadcastSender<FeedEvent>,
        shutdown: CancellationToken,
    ) -> Self {
        Self {
            registry: ChannelRegistry::new(Arc::clone(&dispatcher), events.clone()),
            dispatcher,
            instruments: RwLock::new(InstrumentCatalog::new()),
            events,
            shutdown,
            next_consumer: AtomicU64::new(1),
        }
    }
}

/// Cloneable handle to a running feed.
///
/// Reads never wait on the network; they return the best-known state along
/// with staleness signals (book state, last update, connection state).
///
/// Every successful [`subscribe`](Self::subscribe) must eventually be paired
/// with an [`unsubscribe`](Self::unsubscribe) (or
/// [`unsubscribe_all`](Self::unsubscribe_all)); stores live as long as one
/// consumer holds interest.
#[derive(Debug, Clone)]
pub struct FeedHandle {
    shared: Arc<FeedShared>,
}

impl FeedHandle {
    pub(crate) fn new(shared: Arc<FeedShared>) -> Self {
        Self { shared }
    }

    /// Allocates a fresh consumer identifier.
    #[must_use]
    pub fn consumer(&self) -> ConsumerId {
        ConsumerId(self.shared.next_consumer.fetch_add(1, Ordering::Relaxed))
    }

    /// Registers a consumer's interest in a topic.
    ///
    /// # Errors
    /// Returns `FeedError::UnsupportedChannel` for channels without a store
    /// and `FeedError::UnknownInstrument` if an instrument catalog is loaded
    /// and does not list the product.
    pub fn subscribe(
        &self,
        consumer: ConsumerId,
        channel: Channel,
        product_id: impl Into<ProductId>,
    ) -> Result<(), FeedError> {
        let key = self.validate(channel, product_id.into())?;
        self.shared.registry.add_interest(consumer, key);
        Ok(())
    }

    /// Withdraws a consumer's interest in a topic.
    ///
    /// # Errors
    /// Returns `FeedError::UnsupportedChannel` for channels without a store.
    pub fn unsubscribe(
        &self,
        consumer: ConsumerId,
        channel: Channel,
        product_id: impl Into<ProductId>,
    ) -> Result<(), FeedError> {
        if !channel.is_market_data() {
            return Err(FeedError::UnsupportedChannel(channel));
        }
        let key = SubscriptionKey::new(channel, product_id);
        self.shared.registry.remove_interest(consumer, &key);
        Ok(())
    }

    /// Withdraws every interest held by a consumer.
    pub fn unsubscribe_all(&self, consumer: ConsumerId) {
        self.shared.registry.remove_consumer(consumer);
    }

    fn validate(
        &self,
        channel: Channel,
        product_id: ProductId,
    ) -> Result<SubscriptionKey, FeedError> {
        if !channel.is_market_data() {
            return Err(FeedError::UnsupportedChannel(channel));
        }
        let instruments = self.shared.instruments.read();
        if !instruments.is_empty() && !instruments.contains(&product_id) {
            return Err(FeedError::UnknownInstrument(product_id));
        }
        Ok(SubscriptionKey::new(channel, product_id))
    }

    /// Current order book view, if a consumer holds level2 interest.
    #[must_use]
    pub fn order_book(&self, product_id: &ProductId) -> Option<OrderBookView> {
        self.shared
            .dispatcher
            .order_book(product_id)
            .map(|store| store.view())
    }

    /// Recent trades, newest first.
    #[must_use]
    pub fn recent_trades(&self, product_id: &ProductId) -> Vec<Trade> {
        self.shared
            .dispatcher
            .trade_tape(product_id)
            .map(|tape| tape.recent())
            .unwrap_or_default()
    }

    /// Latest ticker.
    #[must_use]
    pub fn ticker(&self, product_id: &ProductId) -> Option<TickerSnapshot> {
        self.shared.dispatcher.ticker(product_id)
    }

    /// Seeds an order book with an out-of-band snapshot until the feed's
    /// own snapshot arrives.
    ///
    /// # Returns
    /// `true` if the seed was applied.
    pub fn seed_order_book(&self, snapshot: &BookSnapshot) -> bool {
        self.shared
            .dispatcher
            .order_book(&snapshot.product_id)
            .is_some_and(|store| store.seed(snapshot))
    }

    /// Replaces the instrument catalog.
    pub fn replace_instruments(&self, instruments: Vec<Instrument>) {
        let mut catalog = self.shared.instruments.write();
        catalog.replace_all(instruments);
        tracing::info!(count = catalog.len(), "instrument catalog replaced");
    }

    /// Looks up an instrument.
    #[must_use]
    pub fn instrument(&self, product_id: &ProductId) -> Option<Instrument> {
        self.shared.instruments.read().get(product_id).cloned()
    }

    /// Current connection state.
    #[must_use]
    pub fn connection_state(&self) -> ConnectionState {
        self.shared.registry.state()
    }

    /// Receiver notified on every connection state change.
    #[must_use]
    pub fn watch_connection(&self) -> watch::Receiver<ConnectionState> {
        self.shared.registry.watch()
    }

    /// Receiver for store change notifications published from now on.
    #[must_use]
    pub fn events(&self) -> BroadcastReceiver<FeedEvent> {
        self.shared.events.subscribe()
    }

    /// Number of consumers interested in a topic.
    #[must_use]
    pub fn interest_count(&self, channel: Channel, product_id: impl Into<ProductId>) -> usize {
        self.shared
            .registry
            .interest_count(&SubscriptionKey::new(channel, product_id))
    }

    /// Stops the connection task.
    pub fn shutdown(&self) {
        self.shared.shutdown.cancel();
    }
}

#[cfg(test)]
mod tests {
    use crate::builder::FeedBuilder;
    use crate::error::FeedError;
    use ironfeed_core::{BookSnapshot, Channel, Decimal, PriceLevel, ProductId};
    use ironfeed_marketdata::{BookState, Instrument};

    fn instrument(id: &str) -> Instrument {
        Instrument {
            product_id: ProductId::new(id),
            base_currency: "BTC".to_string(),
            quote_currency: "USD".to_string(),
            base_increment: Decimal::new(1, 8),
            quote_increment: Decimal::new(1, 2),
            base_min_size: None,
            base_max_size: None,
            status: "online".to_string(),
            trading_disabled: false,
        }
    }

    #[test]
    fn test_unsupported_channel_rejected() {
        let (_connection, handle) = FeedBuilder::new().build();
        let consumer = handle.consumer();
        assert_eq!(
            handle.subscribe(consumer, Channel::User, "BTC-USD"),
            Err(FeedError::UnsupportedChannel(Channel::User))
        );
        assert_eq!(
            handle.subscribe(consumer, Channel::Heartbeats, "BTC-USD"),
            Err(FeedError::UnsupportedChannel(Channel::Heartbeats))
        );
        assert_eq!(handle.interest_count(Channel::User, "BTC-USD"), 0);
    }

    #[test]
    fn test_unknown_instrument_rejected_once_catalog_loaded() {
        let (_connection, handle) = FeedBuilder::new().build();
        let consumer = handle.consumer();

        handle.replace_instruments(vec![instrument("BTC-USD")]);
        assert_eq!(
            handle.subscribe(consumer, Channel::Level2, "DOGE-EUR"),
            Err(FeedError::UnknownInstrument(ProductId::new("DOGE-EUR")))
        );
        assert!(handle.subscribe(consumer, Channel::Level2, "BTC-USD").is_ok());
        assert!(handle.instrument(&ProductId::new("BTC-USD")).is_some());
    }

    #[test]
    fn test_reads_without_interest() {
        let (_connection, handle) = FeedBuilder::new().build();
        let btc = ProductId::new("BTC-USD");
        assert!(handle.order_book(&btc).is_none());
        assert!(handle.recent_trades(&btc).is_empty());
        assert!(handle.ticker(&btc).is_none());
    }

    #[test]
    fn test_seed_requires_interest() {
        let (_connection, handle) = FeedBuilder::new().build();
        let snapshot = BookSnapshot {
            product_id: ProductId::new("BTC-USD"),
            bids: vec![PriceLevel {
                price: Decimal::new(100, 0),
                size: Decimal::ONE,
            }],
            asks: vec![PriceLevel {
                price: Decimal::new(101, 0),
                size: Decimal::ONE,
            }],
        };
        assert!(!handle.seed_order_book(&snapshot));

        let consumer = handle.consumer();
        handle
            .subscribe(consumer, Channel::Level2, "BTC-USD")
            .unwrap();
        assert!(handle.seed_order_book(&snapshot));

        let view = handle.order_book(&ProductId::new("BTC-USD")).unwrap();
        assert!(view.seeded);
        assert_eq!(view.state, BookState::Uninitialized);
        assert_eq!(view.spread, Some(Decimal::ONE));
    }

    #[test]
    fn test_consumer_ids_unique() {
        let (_connection, handle) = FeedBuilder::new().build();
        let other = handle.clone();
        assert_ne!(handle.consumer(), other.consumer());
    }
}
