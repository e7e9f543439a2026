//! Bounded, de-duplicated trade tape.

use chrono::{DateTime, Utc};
use ironfeed_core::{ProductId, Trade};
use parking_lot::RwLock;
use std::collections::{HashSet, VecDeque};

/// Default number of trades kept per instrument.
pub const DEFAULT_TRADE_CAPACITY: usize = 10;

#[derive(Debug, Default)]
struct Tape {
    /// Newest first.
    trades: VecDeque<Trade>,
    ids: HashSet<String>,
    last_update: Option<DateTime<Utc>>,
}

/// Newest-first ring of the most recent trades for one instrument.
#[derive(Debug)]
pub struct TradeTape {
    product_id: ProductId,
    capacity: usize,
    inner: RwLock<Tape>,
}

impl TradeTape {
    /// Creates an empty tape holding at most `capacity` trades (at least 1).
    #[must_use]
    pub fn new(product_id: ProductId, capacity: usize) -> Self {
        Self {
            product_id,
            capacity: capacity.max(1),
            inner: RwLock::new(Tape::default()),
        }
    }

    /// Returns the instrument identifier.
    #[must_use]
    pub fn product_id(&self) -> &ProductId {
        &self.product_id
    }

    /// Returns the maximum number of trades kept.
    #[must_use]
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Records a batch of trades.
    ///
    /// Trades whose id is already on the tape, or repeated within the
    /// batch, are dropped. The remainder is ordered newest first by
    /// execution time when every trade carries one; otherwise the batch is
    /// taken to be in chronological wire order. It then goes in front of
    /// the existing trades and the tape is cut back to capacity.
    ///
    /// # Returns
    /// Number of trades added.
    pub fn record(&self, batch: &[Trade], timestamp: Option<DateTime<Utc>>) -> usize {
        let mut tape = self.inner.write();

        let mut fresh: Vec<&Trade> = Vec::with_capacity(batch.len());
        for trade in batch {
            if tape.ids.insert(trade.trade_id.clone()) {
                fresh.push(trade);
            }
        }
        if fresh.is_empty() {
            tracing::trace!(product = %self.product_id, "trade batch fully redelivered");
            return 0;
        }

        fresh.reverse();
        if fresh.iter().all(|t| t.time.is_some()) {
            // Stable, so equal times keep the reversed wire order.
            fresh.sort_by(|a, b| b.time.cmp(&a.time));
        }

        for trade in fresh.iter().rev() {
            tape.trades.push_front((*trade).clone());
        }
        while tape.trades.len() > self.capacity {
            if let Some(evicted) = tape.trades.pop_back() {
                tape.ids.remove(&evicted.trade_id);
            }
        }
        tape.last_update = timestamp
            .or_else(|| fresh.iter().filter_map(|t| t.time).max())
            .or(tape.last_update);

        fresh.len()
    }

    /// Returns up to `capacity` trades, newest first.
    #[must_use]
    pub fn recent(&self) -> Vec<Trade> {
        self.inner.read().trades.iter().cloned().collect()
    }

    /// Returns the timestamp of the last recorded batch.
    #[must_use]
    pub fn last_update(&self) -> Option<DateTime<Utc>> {
        self.inner.read().last_update
    }

    /// Returns the number of trades on the tape.
    #[must_use]
    pub fn len(&self) -> usize {
        self.inner.read().trades.len()
    }

    /// Returns true if no trades are recorded.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use ironfeed_core::{Decimal, Side};

    fn trade(id: &str) -> Trade {
        Trade {
            trade_id: id.to_string(),
            product_id: ProductId::new("BTC-USD"),
            price: Decimal::new(100, 0),
            size: Decimal::ONE,
            side: Side::Bid,
            time: None,
        }
    }

    fn timed(id: &str, second: u32) -> Trade {
        Trade {
            time: Utc.with_ymd_and_hms(2024, 1, 1, 12, 0, second).single(),
            ..trade(id)
        }
    }

    fn ids(tape: &TradeTape) -> Vec<String> {
        tape.recent().into_iter().map(|t| t.trade_id).collect()
    }

    #[test]
    fn test_redelivered_batch() {
        let tape = TradeTape::new(ProductId::new("BTC-USD"), 10);
        tape.record(&[trade("t1")], None);
        tape.record(&[trade("t2")], None);
        tape.record(&[trade("t3")], None);

        let added = tape.record(&[trade("t2"), trade("t3"), trade("t4")], None);
        assert_eq!(added, 1);
        assert_eq!(ids(&tape), vec!["t4", "t3", "t2", "t1"]);
    }

    #[test]
    fn test_redelivered_chronological_batch() {
        let tape = TradeTape::new(ProductId::new("BTC-USD"), 10);
        assert_eq!(tape.record(&[trade("t1"), trade("t2"), trade("t3")], None), 3);
        assert_eq!(tape.record(&[trade("t2"), trade("t3"), trade("t4")], None), 1);
        assert_eq!(ids(&tape), vec!["t4", "t3", "t2", "t1"]);
    }

    #[test]
    fn test_batch_ordered_by_time() {
        let tape = TradeTape::new(ProductId::new("BTC-USD"), 10);
        tape.record(&[timed("a", 1)], None);
        tape.record(&[timed("c", 3), timed("b", 2), timed("d", 4)], None);
        assert_eq!(ids(&tape), vec!["d", "c", "b", "a"]);
    }

    #[test]
    fn test_partial_times_fall_back_to_wire_order() {
        let tape = TradeTape::new(ProductId::new("BTC-USD"), 10);
        tape.record(&[timed("b", 9), trade("c")], None);
        assert_eq!(ids(&tape), vec!["c", "b"]);
    }

    #[test]
    fn test_duplicates_within_batch() {
        let tape = TradeTape::new(ProductId::new("BTC-USD"), 10);
        let added = tape.record(&[trade("x"), trade("x"), trade("y")], None);
        assert_eq!(added, 2);
        assert_eq!(ids(&tape), vec!["y", "x"]);
    }

    #[test]
    fn test_capacity_bound_and_unique_ids() {
        let tape = TradeTape::new(ProductId::new("BTC-USD"), 3);
        for i in 0..20 {
            let id = format!("t{}", i % 7);
            tape.record(&[trade(&id)], None);

            let recent = ids(&tape);
            assert!(recent.len() <= 3);
            let unique: HashSet<_> = recent.iter().collect();
            assert_eq!(unique.len(), recent.len());
        }
    }

    #[test]
    fn test_evicted_id_can_return() {
        let tape = TradeTape::new(ProductId::new("BTC-USD"), 2);
        tape.record(&[trade("1")], None);
        tape.record(&[trade("2")], None);
        tape.record(&[trade("3")], None);
        assert_eq!(ids(&tape), vec!["3", "2"]);

        // "1" is no longer on the tape, so it is treated as new.
        assert_eq!(tape.record(&[trade("1")], None), 1);
        assert_eq!(ids(&tape), vec!["1", "3"]);
    }

    #[test]
    fn test_zero_capacity_is_clamped() {
        let tape = TradeTape::new(ProductId::new("BTC-USD"), 0);
        tape.record(&[trade("a"), trade("b")], None);
        assert_eq!(tape.capacity(), 1);
        assert_eq!(ids(&tape), vec!["b"]);
    }
}
