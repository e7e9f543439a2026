//! Order book management.
//!
//! Levels are keyed by price, so a side holds at most one level per price.
//! Sizes are absolute: an update overwrites the level, a zero size removes it.

use crate::error::BookError;
use ironfeed_core::{BookDelta, BookSnapshot, PriceLevel, ProductId, Side};
use rust_decimal::Decimal;
use serde::Serialize;
use std::collections::BTreeMap;

const HUNDRED: Decimal = Decimal::ONE_HUNDRED;

/// Displayed price level with its relative depth.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct DepthLevel {
    /// Level price.
    pub price: Decimal,
    /// Absolute size.
    pub size: Decimal,
    /// `price * size`.
    pub notional: Decimal,
    /// Notional relative to the largest displayed notional, in percent.
    /// `None` when no displayed level has a positive notional.
    pub depth_percent: Option<Decimal>,
}

/// One side of the order book.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BookSide {
    levels: BTreeMap<Decimal, Decimal>,
    side: Side,
}

impl BookSide {
    /// Creates an empty book side.
    #[must_use]
    pub fn new(side: Side) -> Self {
        Self {
            levels: BTreeMap::new(),
            side,
        }
    }

    /// Returns which side this is.
    #[must_use]
    pub fn side(&self) -> Side {
        self.side
    }

    /// Sets the absolute size at a price; zero removes the level.
    #[inline]
    pub fn update(&mut self, price: Decimal, size: Decimal) {
        if size.is_zero() {
            self.levels.remove(&price);
        } else {
            self.levels.insert(price, size);
        }
    }

    /// Returns the top of book (best price).
    #[inline]
    #[must_use]
    pub fn top(&self) -> Option<PriceLevel> {
        let entry = match self.side {
            Side::Bid => self.levels.iter().next_back(),
            Side::Ask => self.levels.iter().next(),
        };
        entry.map(|(price, size)| PriceLevel {
            price: *price,
            size: *size,
        })
    }

    /// Iterates levels from best to worst price.
    pub fn iter(&self) -> Box<dyn Iterator<Item = PriceLevel> + '_> {
        let to_level = |(price, size): (&Decimal, &Decimal)| PriceLevel {
            price: *price,
            size: *size,
        };
        match self.side {
            Side::Bid => Box::new(self.levels.iter().rev().map(to_level)),
            Side::Ask => Box::new(self.levels.iter().map(to_level)),
        }
    }

    /// Returns the N best levels.
    #[must_use]
    pub fn best_n(&self, n: usize) -> Vec<PriceLevel> {
        self.iter().take(n).collect()
    }

    /// Returns the size resting at a specific price.
    #[must_use]
    pub fn get(&self, price: Decimal) -> Option<Decimal> {
        self.levels.get(&price).copied()
    }

    /// Drops every level beyond the best `keep` (never fewer than one).
    pub fn truncate(&mut self, keep: usize) {
        let keep = keep.max(1);
        while self.levels.len() > keep {
            match self.side {
                Side::Bid => self.levels.pop_first(),
                Side::Ask => self.levels.pop_last(),
            };
        }
    }

    /// Clears all levels.
    pub fn clear(&mut self) {
        self.levels.clear();
    }

    /// Returns the number of price levels.
    #[must_use]
    pub fn len(&self) -> usize {
        self.levels.len()
    }

    /// Returns true if there are no levels.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.levels.is_empty()
    }
}

/// Full order book for an instrument.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OrderBook {
    /// Instrument identifier.
    pub product_id: ProductId,
    /// Bid side, best = highest.
    pub bids: BookSide,
    /// Ask side, best = lowest.
    pub asks: BookSide,
}

impl OrderBook {
    /// Creates an empty order book for the given instrument.
    #[must_use]
    pub fn new(product_id: ProductId) -> Self {
        Self {
            product_id,
            bids: BookSide::new(Side::Bid),
            asks: BookSide::new(Side::Ask),
        }
    }

    /// Returns the best bid price.
    #[inline]
    #[must_use]
    pub fn best_bid(&self) -> Option<Decimal> {
        self.bids.top().map(|l| l.price)
    }

    /// Returns the best ask price.
    #[inline]
    #[must_use]
    pub fn best_ask(&self) -> Option<Decimal> {
        self.asks.top().map(|l| l.price)
    }

    /// Returns `best_ask - best_bid`, if both sides are populated.
    #[inline]
    #[must_use]
    pub fn spread(&self) -> Option<Decimal> {
        Some(self.best_ask()? - self.best_bid()?)
    }

    /// Returns the spread as a percentage of the best ask.
    #[must_use]
    pub fn spread_percent(&self) -> Option<Decimal> {
        let ask = self.best_ask()?;
        self.spread()?.checked_div(ask).map(|r| r * HUNDRED)
    }

    /// Returns the mid price.
    #[inline]
    #[must_use]
    pub fn mid_price(&self) -> Option<Decimal> {
        Some((self.best_bid()? + self.best_ask()?) / Decimal::TWO)
    }

    /// Returns true if best bid >= best ask.
    #[must_use]
    pub fn is_crossed(&self) -> bool {
        matches!((self.best_bid(), self.best_ask()), (Some(bid), Some(ask)) if bid >= ask)
    }

    /// Replaces both sides with the snapshot's levels.
    ///
    /// # Errors
    /// Returns `BookError::ProductMismatch` for another instrument's snapshot
    /// (the book is left untouched) and `BookError::Crossed` if the snapshot
    /// itself is crossed (the book holds the crossed content).
    pub fn apply_snapshot(&mut self, snapshot: &BookSnapshot) -> Result<(), BookError> {
        self.check_product(&snapshot.product_id)?;

        self.bids.clear();
        self.asks.clear();
        for level in &snapshot.bids {
            self.bids.update(level.price, level.size);
        }
        for level in &snapshot.asks {
            self.asks.update(level.price, level.size);
        }
        self.check_crossed()
    }

    /// Applies every level update of a delta, in order.
    ///
    /// # Errors
    /// Returns `BookError::ProductMismatch` for another instrument's delta
    /// and `BookError::Crossed` if the merged book is crossed.
    pub fn apply_delta(&mut self, delta: &BookDelta) -> Result<(), BookError> {
        self.check_product(&delta.product_id)?;

        for update in &delta.updates {
            match update.side {
                Side::Bid => self.bids.update(update.price, update.size),
                Side::Ask => self.asks.update(update.price, update.size),
            }
        }
        self.check_crossed()
    }

    /// Keeps only the best `keep` levels on each side.
    pub fn prune(&mut self, keep: usize) {
        self.bids.truncate(keep);
        self.asks.truncate(keep);
    }

    /// Returns the top `depth` levels of each side with relative depth.
    ///
    /// Depth is measured against the largest `price * size` among the
    /// displayed levels of both sides.
    #[must_use]
    pub fn depth(&self, depth: usize) -> (Vec<DepthLevel>, Vec<DepthLevel>) {
        let bids = self.bids.best_n(depth);
        let asks = self.asks.best_n(depth);

        let max = bids
            .iter()
            .chain(asks.iter())
            .map(|l| l.price * l.size)
            .max()
            .filter(|m| *m > Decimal::ZERO);

        let to_depth = |l: &PriceLevel| {
            let notional = l.price * l.size;
            DepthLevel {
                price: l.price,
                size: l.size,
                notional,
                depth_percent: max
                    .and_then(|m| notional.checked_div(m))
                    .map(|r| (r * HUNDRED).round_dp(2)),
            }
        };

        (
            bids.iter().map(to_depth).collect(),
            asks.iter().map(to_depth).collect(),
        )
    }

    /// Clears the entire book.
    pub fn clear(&mut self) {
        self.bids.clear();
        self.asks.clear();
    }

    fn check_product(&self, product_id: &ProductId) -> Result<(), BookError> {
        if *product_id != self.product_id {
            return Err(BookError::ProductMismatch {
                expected: self.product_id.clone(),
                received: product_id.clone(),
            });
        }
        Ok(())
    }

    fn check_crossed(&self) -> Result<(), BookError> {
        match (self.best_bid(), self.best_ask()) {
            (Some(bid), Some(ask)) if bid >= ask => Err(BookError::Crossed {
                product_id: self.product_id.clone(),
                bid,
                ask,
            }),
            _ => Ok(()),
        }
    }
}
