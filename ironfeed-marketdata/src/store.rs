//! Per-instrument order book state machine.
//!
//! ```text
//! Uninitialized --mark_subscribed--> AwaitingSnapshot --snapshot--> Live
//!        ^                                  ^                        |
//!        |                                  +------ crossed book ----+
//!        +-- (store dropped on last unsubscribe, recreated on next)
//! ```
//!
//! A store has one writer (the feed task) and any number of readers. Readers
//! get an owned [`OrderBookView`] so they never hold the lock while rendering.

use crate::book::{DepthLevel, OrderBook};
use crate::error::BookError;
use chrono::{DateTime, Utc};
use ironfeed_core::{BookDelta, BookSnapshot, ProductId};
use parking_lot::RwLock;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Lifecycle state of an order book store.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum BookState {
    /// Interest registered, no subscribe frame sent yet.
    Uninitialized,
    /// Subscribe sent; updates are discarded until a snapshot arrives.
    AwaitingSnapshot,
    /// Snapshot applied; updates are merged.
    Live,
}

/// Result of feeding one message to a store.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ApplyOutcome {
    /// Message merged into the book.
    Applied,
    /// Update arrived before the snapshot and was dropped.
    Discarded,
    /// Book is unusable; the caller must re-subscribe the level2 channel.
    Resync(BookError),
}

/// Order book store configuration.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct BookConfig {
    /// Levels per side returned in views.
    pub display_depth: usize,
    /// Levels per side kept in memory after each mutation (`None` keeps all).
    pub retain_depth: Option<usize>,
    /// Updates tolerated while awaiting a snapshot before a resync is requested.
    pub max_pending_updates: u64,
}

impl Default for BookConfig {
    fn default() -> Self {
        Self {
            display_depth: 10,
            retain_depth: None,
            max_pending_updates: 500,
        }
    }
}

/// Immutable read view of an order book.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct OrderBookView {
    /// Instrument identifier.
    pub product_id: ProductId,
    /// Store state when the view was taken.
    pub state: BookState,
    /// True if the content comes from a seed rather than the feed.
    pub seeded: bool,
    /// Best bids first.
    pub bids: Vec<DepthLevel>,
    /// Best asks first.
    pub asks: Vec<DepthLevel>,
    /// Best bid price.
    pub best_bid: Option<Decimal>,
    /// Best ask price.
    pub best_ask: Option<Decimal>,
    /// Best ask minus best bid.
    pub spread: Option<Decimal>,
    /// Spread relative to the best ask, in percent.
    pub spread_percent: Option<Decimal>,
    /// Mid price.
    pub mid_price: Option<Decimal>,
    /// Exchange timestamp of the last applied message.
    pub last_update: Option<DateTime<Utc>>,
    /// Messages applied since creation.
    pub applied: u64,
    /// Updates discarded since creation.
    pub discarded: u64,
}

#[derive(Debug)]
struct Inner {
    book: OrderBook,
    state: BookState,
    seeded: bool,
    last_update: Option<DateTime<Utc>>,
    applied: u64,
    discarded: u64,
    pending_updates: u64,
}

/// Order book state machine for one instrument.
#[derive(Debug)]
pub struct OrderBookStore {
    product_id: ProductId,
    config: BookConfig,
    inner: RwLock<Inner>,
}

impl OrderBookStore {
    /// Creates an `Uninitialized` store.
    #[must_use]
    pub fn new(product_id: ProductId, config: BookConfig) -> Self {
        Self {
            inner: RwLock::new(Inner {
                book: OrderBook::new(product_id.clone()),
                state: BookState::Uninitialized,
                seeded: false,
                last_update: None,
                applied: 0,
                discarded: 0,
                pending_updates: 0,
            }),
            product_id,
            config,
        }
    }

    /// Returns the instrument identifier.
    #[must_use]
    pub fn product_id(&self) -> &ProductId {
        &self.product_id
    }

    /// Returns the current state.
    #[must_use]
    pub fn state(&self) -> BookState {
        self.inner.read().state
    }

    /// Records that a subscribe frame was written for this book.
    ///
    /// Existing levels stay visible (marked stale by the state) until the
    /// snapshot replaces them.
    pub fn mark_subscribed(&self) {
        let mut inner = self.inner.write();
        inner.state = BookState::AwaitingSnapshot;
        inner.pending_updates = 0;
    }

    /// Clears the book and waits for a fresh snapshot.
    pub fn reset(&self) {
        let mut inner = self.inner.write();
        inner.book.clear();
        inner.seeded = false;
        inner.state = BookState::AwaitingSnapshot;
        inner.pending_updates = 0;
    }

    /// Applies a feed snapshot, replacing any seeded or stale content.
    pub fn apply_snapshot(
        &self,
        snapshot: &BookSnapshot,
        timestamp: Option<DateTime<Utc>>,
    ) -> ApplyOutcome {
        let mut inner = self.inner.write();
        match inner.book.apply_snapshot(snapshot) {
            Ok(()) => {
                if let Some(keep) = self.config.retain_depth {
                    inner.book.prune(keep);
                }
                inner.state = BookState::Live;
                inner.seeded = false;
                inner.pending_updates = 0;
                inner.applied += 1;
                inner.last_update = timestamp.or(inner.last_update);
                ApplyOutcome::Applied
            }
            Err(err @ BookError::ProductMismatch { .. }) => {
                tracing::warn!(product = %self.product_id, error = %err, "snapshot dropped");
                ApplyOutcome::Discarded
            }
            Err(err) => Self::fail(&mut inner, err),
        }
    }

    /// Applies an incremental update.
    pub fn apply_delta(&self, delta: &BookDelta, timestamp: Option<DateTime<Utc>>) -> ApplyOutcome {
        let mut inner = self.inner.write();

        if inner.state != BookState::Live {
            inner.discarded += 1;
            inner.pending_updates += 1;
            if inner.state == BookState::AwaitingSnapshot
                && inner.pending_updates > self.config.max_pending_updates
            {
                tracing::warn!(
                    product = %self.product_id,
                    pending = inner.pending_updates,
                    "no snapshot after subscribe"
                );
                inner.pending_updates = 0;
                return ApplyOutcome::Resync(BookError::MissingSnapshot {
                    product_id: self.product_id.clone(),
                });
            }
            tracing::debug!(
                product = %self.product_id,
                state = ?inner.state,
                "update before snapshot discarded"
            );
            return ApplyOutcome::Discarded;
        }

        match inner.book.apply_delta(delta) {
            Ok(()) => {
                if let Some(keep) = self.config.retain_depth {
                    inner.book.prune(keep);
                }
                inner.applied += 1;
                inner.last_update = timestamp.or(inner.last_update);
                ApplyOutcome::Applied
            }
            Err(err @ BookError::ProductMismatch { .. }) => {
                tracing::warn!(product = %self.product_id, error = %err, "update dropped");
                ApplyOutcome::Discarded
            }
            Err(err) => Self::fail(&mut inner, err),
        }
    }

    /// Seeds the book from an out-of-band snapshot while not `Live`.
    ///
    /// The state is left unchanged, so updates are still discarded until
    /// the feed's own snapshot arrives.
    ///
    /// # Returns
    /// `true` if the seed was applied.
    pub fn seed(&self, snapshot: &BookSnapshot) -> bool {
        let mut inner = self.inner.write();
        if inner.state == BookState::Live {
            return false;
        }
        let mut book = OrderBook::new(self.product_id.clone());
        if let Err(err) = book.apply_snapshot(snapshot) {
            tracing::warn!(product = %self.product_id, error = %err, "seed rejected");
            return false;
        }
        if let Some(keep) = self.config.retain_depth {
            book.prune(keep);
        }
        inner.book = book;
        inner.seeded = true;
        true
    }

    /// Returns an owned view of the top `display_depth` levels.
    #[must_use]
    pub fn view(&self) -> OrderBookView {
        let inner = self.inner.read();
        let (bids, asks) = inner.book.depth(self.config.display_depth);
        OrderBookView {
            product_id: self.product_id.clone(),
            state: inner.state,
            seeded: inner.seeded,
            bids,
            asks,
            best_bid: inner.book.best_bid(),
            best_ask: inner.book.best_ask(),
            spread: inner.book.spread(),
            spread_percent: inner.book.spread_percent(),
            mid_price: inner.book.mid_price(),
            last_update: inner.last_update,
            applied: inner.applied,
            discarded: inner.discarded,
        }
    }

    fn fail(inner: &mut Inner, err: BookError) -> ApplyOutcome {
        tracing::warn!(error = %err, "order book reset, resync required");
        inner.book.clear();
        inner.seeded = false;
        inner.state = BookState::AwaitingSnapshot;
        inner.pending_updates = 0;
        ApplyOutcome::Resync(err)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ironfeed_core::{LevelUpdate, PriceLevel, Side};

    fn d(s: &str) -> Decimal {
        s.parse().unwrap()
    }

    fn snapshot(bid: &str, ask: &str) -> BookSnapshot {
        BookSnapshot {
            product_id: ProductId::new("BTC-USD"),
            bids: vec![PriceLevel {
                price: d(bid),
                size: d("2"),
            }],
            asks: vec![PriceLevel {
                price: d(ask),
                size: d("3"),
            }],
        }
    }

    fn delta(side: Side, price: &str, size: &str) -> BookDelta {
        BookDelta {
            product_id: ProductId::new("BTC-USD"),
            updates: vec![LevelUpdate {
                side,
                price: d(price),
                size: d(size),
            }],
        }
    }

    fn store() -> OrderBookStore {
        OrderBookStore::new(ProductId::new("BTC-USD"), BookConfig::default())
    }

    #[test]
    fn test_store_lifecycle() {
        let store = store();
        assert_eq!(store.state(), BookState::Uninitialized);

        store.mark_subscribed();
        assert_eq!(store.state(), BookState::AwaitingSnapshot);

        let outcome = store.apply_snapshot(&snapshot("100.00", "101.00"), None);
        assert_eq!(outcome, ApplyOutcome::Applied);
        assert_eq!(store.state(), BookState::Live);
    }

    #[test]
    fn test_delta_before_snapshot_discarded() {
        let store = store();
        store.mark_subscribed();

        let outcome = store.apply_delta(&delta(Side::Bid, "100", "1"), None);
        assert_eq!(outcome, ApplyOutcome::Discarded);
        assert!(store.view().bids.is_empty());
        assert_eq!(store.view().discarded, 1);

        let store = self::store();
        assert_eq!(
            store.apply_delta(&delta(Side::Bid, "100", "1"), None),
            ApplyOutcome::Discarded
        );
    }

    #[test]
    fn test_spread_scenario_view() {
        let store = store();
        store.mark_subscribed();
        store.apply_snapshot(&snapshot("100.00", "101.00"), None);
        assert_eq!(store.view().spread, Some(d("1.00")));

        let outcome = store.apply_delta(&delta(Side::Bid, "100.00", "0"), None);
        assert_eq!(outcome, ApplyOutcome::Applied);

        let view = store.view();
        assert!(view.bids.is_empty());
        assert_eq!(view.best_bid, None);
        assert_eq!(view.spread, None);
        assert_eq!(view.best_ask, Some(d("101.00")));
    }

    #[test]
    fn test_crossed_delta_requests_resync() {
        let store = store();
        store.mark_subscribed();
        store.apply_snapshot(&snapshot("100", "101"), None);

        let outcome = store.apply_delta(&delta(Side::Ask, "99", "1"), None);
        assert!(matches!(
            outcome,
            ApplyOutcome::Resync(BookError::Crossed { .. })
        ));
        assert_eq!(store.state(), BookState::AwaitingSnapshot);

        let view = store.view();
        assert!(view.bids.is_empty() && view.asks.is_empty());

        // Further updates wait for the next snapshot.
        assert_eq!(
            store.apply_delta(&delta(Side::Bid, "98", "1"), None),
            ApplyOutcome::Discarded
        );
    }

    #[test]
    fn test_crossed_snapshot_requests_resync() {
        let store = store();
        store.mark_subscribed();
        let outcome = store.apply_snapshot(&snapshot("102", "101"), None);
        assert!(matches!(outcome, ApplyOutcome::Resync(_)));
        assert_eq!(store.state(), BookState::AwaitingSnapshot);
    }

    #[test]
    fn test_never_crossed_after_deltas() {
        let store = store();
        store.mark_subscribed();
        store.apply_snapshot(&snapshot("100", "101"), None);

        let updates = [
            (Side::Bid, "100.5", "1"),
            (Side::Ask, "100.5", "1"),
            (Side::Ask, "100.75", "2"),
            (Side::Bid, "100.5", "0"),
            (Side::Ask, "100.1", "1"),
            (Side::Bid, "101", "4"),
        ];
        for (side, price, size) in updates {
            store.apply_delta(&delta(side, price, size), None);
            let view = store.view();
            if let (Some(bid), Some(ask)) = (view.best_bid, view.best_ask) {
                assert!(bid < ask, "crossed: {bid} >= {ask}");
            }
        }
    }

    #[test]
    fn test_seed_until_feed_snapshot() {
        let store = store();
        store.mark_subscribed();

        assert!(store.seed(&snapshot("90", "91")));
        let view = store.view();
        assert!(view.seeded);
        assert_eq!(view.state, BookState::AwaitingSnapshot);
        assert_eq!(view.best_bid, Some(d("90")));

        // Updates still wait for the feed snapshot.
        assert_eq!(
            store.apply_delta(&delta(Side::Bid, "90", "5"), None),
            ApplyOutcome::Discarded
        );

        store.apply_snapshot(&snapshot("100", "101"), None);
        let view = store.view();
        assert!(!view.seeded);
        assert_eq!(view.best_bid, Some(d("100")));

        // Seeds are ignored once live.
        assert!(!store.seed(&snapshot("80", "81")));
        assert_eq!(store.view().best_bid, Some(d("100")));
    }

    #[test]
    fn test_missing_snapshot_escalates() {
        let config = BookConfig {
            max_pending_updates: 2,
            ..BookConfig::default()
        };
        let store = OrderBookStore::new(ProductId::new("BTC-USD"), config);
        store.mark_subscribed();

        let update = delta(Side::Bid, "100", "1");
        assert_eq!(store.apply_delta(&update, None), ApplyOutcome::Discarded);
        assert_eq!(store.apply_delta(&update, None), ApplyOutcome::Discarded);
        assert!(matches!(
            store.apply_delta(&update, None),
            ApplyOutcome::Resync(BookError::MissingSnapshot { .. })
        ));
    }

    #[test]
    fn test_retain_depth_prunes() {
        let config = BookConfig {
            display_depth: 2,
            retain_depth: Some(3),
            ..BookConfig::default()
        };
        let store = OrderBookStore::new(ProductId::new("BTC-USD"), config);
        store.mark_subscribed();
        let snap = BookSnapshot {
            product_id: ProductId::new("BTC-USD"),
            bids: (1..=5)
                .map(|p| PriceLevel {
                    price: Decimal::from(p),
                    size: Decimal::ONE,
                })
                .collect(),
            asks: (6..=10)
                .map(|p| PriceLevel {
                    price: Decimal::from(p),
                    size: Decimal::ONE,
                })
                .collect(),
        };
        store.apply_snapshot(&snap, None);

        let view = store.view();
        assert_eq!(view.bids.len(), 2);
        assert_eq!(view.best_bid, Some(Decimal::from(5)));
        assert_eq!(view.best_ask, Some(Decimal::from(6)));

        // Level 3 survived pruning, levels 1-2 did not.
        store.apply_delta(&delta(Side::Bid, "5", "0"), None);
        store.apply_delta(&delta(Side::Bid, "4", "0"), None);
        let view = store.view();
        assert_eq!(view.bids.len(), 1);
        assert_eq!(view.best_bid, Some(Decimal::from(3)));
    }

    #[test]
    fn test_last_update_tracks_timestamp() {
        let store = store();
        store.mark_subscribed();
        let ts: DateTime<Utc> = "2023-02-09T20:32:50.714964855Z".parse().unwrap();
        store.apply_snapshot(&snapshot("100", "101"), Some(ts));
        assert_eq!(store.view().last_update, Some(ts));

        store.apply_delta(&delta(Side::Bid, "99", "1"), None);
        assert_eq!(store.view().last_update, Some(ts));
        assert_eq!(store.view().applied, 2);
    }
}
