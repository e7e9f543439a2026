//! Message dispatcher routing decoded frames to per-topic stores.

use crate::events::FeedEvent;
use ironfeed_channel::BroadcastSender;
use ironfeed_core::{Channel, FeedFrame, Payload, ProductId, SubscriptionKey, TickerSnapshot};
use ironfeed_marketdata::{
    ApplyOutcome, BookConfig, BookError, BookState, OrderBookStore, TickerCell, TickerRegistry,
    TradeTape,
};
use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::Arc;

/// Store a topic's messages are routed to.
#[derive(Debug, Clone)]
pub enum Route {
    /// Level2 order book.
    Book(Arc<OrderBookStore>),
    /// Matches trade tape.
    Trades(Arc<TradeTape>),
    /// Ticker cell.
    Ticker(Arc<TickerCell>),
}

/// Outcome of dispatching one frame.
#[derive(Debug, Default)]
pub struct DispatchReport {
    /// Books that applied a snapshot.
    pub snapshots: Vec<ProductId>,
    /// Books that must be re-subscribed.
    pub resyncs: Vec<(ProductId, BookError)>,
    /// Messages with no registered route.
    pub dropped: usize,
}

/// Routes topic messages to their single registered store.
///
/// The route table lock is held only long enough to clone a route; each
/// store carries its own lock.
#[derive(Debug)]
pub struct Dispatcher {
    routes: RwLock<HashMap<SubscriptionKey, Route>>,
    tickers: TickerRegistry,
    book_config: BookConfig,
    trade_capacity: usize,
    events: BroadcastSender<FeedEvent>,
}

impl Dispatcher {
    /// Creates an empty dispatcher.
    #[must_use]
    pub fn new(
        book_config: BookConfig,
        trade_capacity: usize,
        events: BroadcastSender<FeedEvent>,
    ) -> Self {
        Self {
            routes: RwLock::new(HashMap::new()),
            tickers: TickerRegistry::new(),
            book_config,
            trade_capacity,
            events,
        }
    }

    /// Creates the store for a topic and starts routing to it.
    ///
    /// Returns the existing route if the topic is already registered.
    pub fn register(&self, key: &SubscriptionKey) -> Option<Route> {
        let mut routes = self.routes.write();
        if let Some(route) = routes.get(key) {
            return Some(route.clone());
        }

        let product_id = key.product_id.clone();
        let route = match key.channel {
            Channel::Level2 => Route::Book(Arc::new(OrderBookStore::new(
                product_id,
                self.book_config.clone(),
            ))),
            Channel::Matches => {
                Route::Trades(Arc::new(TradeTape::new(product_id, self.trade_capacity)))
            }
            Channel::Ticker => Route::Ticker(self.tickers.cell(&product_id)),
            Channel::User | Channel::Heartbeats => return None,
        };
        tracing::debug!(key = %key, "route registered");
        routes.insert(key.clone(), route.clone());
        Some(route)
    }

    /// Stops routing a topic and releases its store.
    pub fn unregister(&self, key: &SubscriptionKey) -> Option<Route> {
        let route = self.routes.write().remove(key)?;
        if let Route::Ticker(_) = route {
            self.tickers.remove(&key.product_id);
        }
        tracing::debug!(key = %key, "route removed");
        Some(route)
    }

    /// Returns true if a route exists for the topic.
    #[must_use]
    pub fn is_registered(&self, key: &SubscriptionKey) -> bool {
        self.routes.read().contains_key(key)
    }

    /// Number of registered routes.
    #[must_use]
    pub fn route_count(&self) -> usize {
        self.routes.read().len()
    }

    fn route(&self, key: &SubscriptionKey) -> Option<Route> {
        self.routes.read().get(key).cloned()
    }

    /// Order book store for a product.
    #[must_use]
    pub fn order_book(&self, product_id: &ProductId) -> Option<Arc<OrderBookStore>> {
        match self.route(&SubscriptionKey::new(Channel::Level2, product_id.clone()))? {
            Route::Book(store) => Some(store),
            _ => None,
        }
    }

    /// Trade tape for a product.
    #[must_use]
    pub fn trade_tape(&self, product_id: &ProductId) -> Option<Arc<TradeTape>> {
        match self.route(&SubscriptionKey::new(Channel::Matches, product_id.clone()))? {
            Route::Trades(tape) => Some(tape),
            _ => None,
        }
    }

    /// Latest ticker for a product.
    #[must_use]
    pub fn ticker(&self, product_id: &ProductId) -> Option<TickerSnapshot> {
        self.tickers.get(product_id)
    }

    /// Records that a subscribe frame was written for the topic.
    pub fn mark_subscribed(&self, key: &SubscriptionKey) {
        if let Some(Route::Book(store)) = self.route(key) {
            store.mark_subscribed();
        }
    }

    /// Clears a book and waits for its next snapshot.
    pub fn reset_book(&self, product_id: &ProductId) {
        if let Some(store) = self.order_book(product_id) {
            store.reset();
        }
    }

    /// Products whose order book is `Live`.
    #[must_use]
    pub fn live_books(&self) -> Vec<ProductId> {
        self.routes
            .read()
            .values()
            .filter_map(|route| match route {
                Route::Book(store) if store.state() == BookState::Live => {
                    Some(store.product_id().clone())
                }
                _ => None,
            })
            .collect()
    }

    /// Routes every message of a frame, in order, to its store.
    pub fn dispatch(&self, frame: &FeedFrame) -> DispatchReport {
        let mut report = DispatchReport::default();

        for message in &frame.messages {
            let Some(route) = self.route(&message.key) else {
                tracing::trace!(key = %message.key, "no route, message dropped");
                report.dropped += 1;
                continue;
            };
            let product_id = &message.key.product_id;

            match (route, &message.payload) {
                (Route::Book(store), Payload::BookSnapshot(snapshot)) => {
                    let outcome = store.apply_snapshot(snapshot, frame.timestamp);
                    if outcome == ApplyOutcome::Applied {
                        report.snapshots.push(product_id.clone());
                    }
                    self.book_outcome(product_id, outcome, &mut report);
                }
                (Route::Book(store), Payload::BookDelta(delta)) => {
                    let outcome = store.apply_delta(delta, frame.timestamp);
                    self.book_outcome(product_id, outcome, &mut report);
                }
                (Route::Trades(tape), Payload::Trades(trades)) => {
                    if tape.record(trades, frame.timestamp) > 0 {
                        self.events.send(FeedEvent::TradesUpdated(product_id.clone()));
                    }
                }
                (Route::Ticker(cell), Payload::Ticker(ticker)) => {
                    cell.update(ticker.clone());
                    self.events.send(FeedEvent::TickerUpdated(product_id.clone()));
                }
                (_, payload) => {
                    tracing::debug!(key = %message.key, ?payload, "payload does not match route");
                    report.dropped += 1;
                }
            }
        }

        report
    }

    fn book_outcome(
        &self,
        product_id: &ProductId,
        outcome: ApplyOutcome,
        report: &mut DispatchReport,
    ) {
        match outcome {
            ApplyOutcome::Applied => {
                self.events.send(FeedEvent::BookUpdated(product_id.clone()));
            }
            ApplyOutcome::Discarded => {}
            ApplyOutcome::Resync(err) => {
                self.events.send(FeedEvent::BookUpdated(product_id.clone()));
                report.resyncs.push((product_id.clone(), err));
            }
        }
    }
}
