//! Last-write-wins ticker registry.

use ironfeed_core::{ProductId, TickerSnapshot};
use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

/// Latest ticker for one instrument.
#[derive(Debug)]
pub struct TickerCell {
    product_id: ProductId,
    latest: RwLock<Option<TickerSnapshot>>,
    updates: AtomicU64,
}

impl TickerCell {
    /// Creates an empty cell.
    #[must_use]
    pub fn new(product_id: ProductId) -> Self {
        Self {
            product_id,
            latest: RwLock::new(None),
            updates: AtomicU64::new(0),
        }
    }

    /// Returns the instrument identifier.
    #[must_use]
    pub fn product_id(&self) -> &ProductId {
        &self.product_id
    }

    /// Overwrites the stored snapshot.
    pub fn update(&self, snapshot: TickerSnapshot) {
        *self.latest.write() = Some(snapshot);
        self.updates.fetch_add(1, Ordering::Relaxed);
    }

    /// Returns the latest snapshot, if any arrived.
    #[must_use]
    pub fn get(&self) -> Option<TickerSnapshot> {
        self.latest.read().clone()
    }

    /// Number of updates received.
    #[must_use]
    pub fn update_count(&self) -> u64 {
        self.updates.load(Ordering::Relaxed)
    }
}

/// Product to ticker cell map.
///
/// The map lock is only taken to insert, remove or look up a cell, so a
/// writer updating one product never blocks readers of another.
#[derive(Debug, Default)]
pub struct TickerRegistry {
    cells: RwLock<HashMap<ProductId, Arc<TickerCell>>>,
}

impl TickerRegistry {
    /// Creates an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the cell for a product, creating it if needed.
    pub fn cell(&self, product_id: &ProductId) -> Arc<TickerCell> {
        if let Some(cell) = self.cells.read().get(product_id) {
            return Arc::clone(cell);
        }
        let mut cells = self.cells.write();
        Arc::clone(
            cells
                .entry(product_id.clone())
                .or_insert_with(|| Arc::new(TickerCell::new(product_id.clone()))),
        )
    }

    /// Drops the cell for a product.
    pub fn remove(&self, product_id: &ProductId) -> Option<Arc<TickerCell>> {
        self.cells.write().remove(product_id)
    }

    /// Returns the latest ticker for a product.
    #[must_use]
    pub fn get(&self, product_id: &ProductId) -> Option<TickerSnapshot> {
        let cell = self.cells.read().get(product_id).cloned()?;
        cell.get()
    }

    /// Returns the number of tracked products.
    #[must_use]
    pub fn len(&self) -> usize {
        self.cells.read().len()
    }

    /// Returns true if no product is tracked.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ironfeed_core::Decimal;

    fn snapshot(product: &str, price: i64) -> TickerSnapshot {
        TickerSnapshot {
            product_id: ProductId::new(product),
            price: Decimal::new(price, 0),
            volume_24h: None,
            low_24h: None,
            high_24h: None,
            price_percent_chg_24h: None,
            updated_at: None,
        }
    }

    #[test]
    fn test_last_write_wins() {
        let registry = TickerRegistry::new();
        let btc = ProductId::new("BTC-USD");
        let cell = registry.cell(&btc);

        cell.update(snapshot("BTC-USD", 100));
        cell.update(snapshot("BTC-USD", 99));

        assert_eq!(registry.get(&btc).unwrap().price, Decimal::new(99, 0));
        assert_eq!(cell.update_count(), 2);
    }

    #[test]
    fn test_cell_is_shared() {
        let registry = TickerRegistry::new();
        let eth = ProductId::new("ETH-USD");
        let a = registry.cell(&eth);
        let b = registry.cell(&eth);
        assert!(Arc::ptr_eq(&a, &b));
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn test_products_are_independent() {
        let registry = TickerRegistry::new();
        registry
            .cell(&ProductId::new("BTC-USD"))
            .update(snapshot("BTC-USD", 100));

        let eth = ProductId::new("ETH-USD");
        registry.cell(&eth);
        assert!(registry.get(&eth).is_none());

        registry.remove(&eth);
        assert_eq!(registry.len(), 1);
        assert!(registry.get(&ProductId::new("BTC-USD")).is_some());
    }
}
