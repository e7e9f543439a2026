//! Instrument definitions and catalog.

use ironfeed_core::ProductId;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Tradable instrument definition, loaded out of band (e.g. from REST).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Instrument {
    /// Instrument identifier.
    pub product_id: ProductId,
    /// Base currency code.
    pub base_currency: String,
    /// Quote currency code.
    pub quote_currency: String,
    /// Minimum size increment.
    pub base_increment: Decimal,
    /// Minimum price increment.
    pub quote_increment: Decimal,
    /// Minimum order size.
    #[serde(default)]
    pub base_min_size: Option<Decimal>,
    /// Maximum order size.
    #[serde(default)]
    pub base_max_size: Option<Decimal>,
    /// Exchange status string (e.g. `online`).
    #[serde(default = "default_status")]
    pub status: String,
    /// Trading halted flag.
    #[serde(default)]
    pub trading_disabled: bool,
}

fn default_status() -> String {
    "online".to_string()
}

impl Instrument {
    /// Returns true if the exchange reports the instrument as tradable.
    #[must_use]
    pub fn is_online(&self) -> bool {
        self.status.eq_ignore_ascii_case("online") && !self.trading_disabled
    }
}

/// Instrument catalog keyed by product id.
///
/// Refreshed wholesale; never patched from the streaming feed.
#[derive(Debug, Default)]
pub struct InstrumentCatalog {
    instruments: HashMap<ProductId, Instrument>,
}

impl InstrumentCatalog {
    /// Creates an empty catalog.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Replaces the whole catalog.
    pub fn replace_all(&mut self, instruments: impl IntoIterator<Item = Instrument>) {
        self.instruments = instruments
            .into_iter()
            .map(|i| (i.product_id.clone(), i))
            .collect();
    }

    /// Gets an instrument by product id.
    #[must_use]
    pub fn get(&self, product_id: &ProductId) -> Option<&Instrument> {
        self.instruments.get(product_id)
    }

    /// Returns true if the product is known.
    #[must_use]
    pub fn contains(&self, product_id: &ProductId) -> bool {
        self.instruments.contains_key(product_id)
    }

    /// Returns the number of instruments.
    #[must_use]
    pub fn len(&self) -> usize {
        self.instruments.len()
    }

    /// Returns true if there are no instruments.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.instruments.is_empty()
    }

    /// Iterates over all instruments.
    pub fn iter(&self) -> impl Iterator<Item = &Instrument> {
        self.instruments.values()
    }
}
