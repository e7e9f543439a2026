//! Order book resync tracking.

use crate::error::BookError;
use ironfeed_core::ProductId;
use std::collections::HashMap;
use std::time::{Duration, Instant};

/// Outstanding level2 resync for one instrument.
#[derive(Debug, Clone)]
pub struct ResyncRequest {
    /// Instrument identifier.
    pub product_id: ProductId,
    /// Error that triggered the resync, if any.
    pub reason: Option<BookError>,
    /// Time the resubscribe was issued.
    pub requested_at: Instant,
}

/// Tracks instruments waiting for a fresh snapshot after a resync.
///
/// A burst of bad messages for the same book produces one request; the
/// request clears when a snapshot is applied and is re-issued if none
/// arrives within the timeout.
#[derive(Debug)]
pub struct ResyncTracker {
    pending: HashMap<ProductId, ResyncRequest>,
    timeout: Duration,
}

impl ResyncTracker {
    /// Creates a new tracker.
    #[must_use]
    pub fn new(timeout: Duration) -> Self {
        Self {
            pending: HashMap::new(),
            timeout,
        }
    }

    /// Requests a resync.
    ///
    /// # Returns
    /// `true` if no resync was outstanding and the caller should
    /// resubscribe now.
    pub fn request(&mut self, product_id: &ProductId, reason: Option<BookError>) -> bool {
        if self.pending.contains_key(product_id) {
            return false;
        }
        self.pending.insert(
            product_id.clone(),
            ResyncRequest {
                product_id: product_id.clone(),
                reason,
                requested_at: Instant::now(),
            },
        );
        true
    }

    /// Marks a resync as complete.
    pub fn complete(&mut self, product_id: &ProductId) -> bool {
        self.pending.remove(product_id).is_some()
    }

    /// Returns expired requests and restarts their timers.
    pub fn expired(&mut self) -> Vec<ResyncRequest> {
        let now = Instant::now();
        let mut out = Vec::new();
        for request in self.pending.values_mut() {
            if now.duration_since(request.requested_at) > self.timeout {
                out.push(request.clone());
                request.requested_at = now;
            }
        }
        out
    }

    /// Returns true if a resync is outstanding for the instrument.
    #[must_use]
    pub fn is_pending(&self, product_id: &ProductId) -> bool {
        self.pending.contains_key(product_id)
    }

    /// Returns the number of outstanding resyncs.
    #[must_use]
    pub fn pending_count(&self) -> usize {
        self.pending.len()
    }

    /// Forgets every outstanding resync.
    pub fn clear(&mut self) {
        self.pending.clear();
    }
}

impl Default for ResyncTracker {
    fn default() -> Self {
        Self::new(Duration::from_secs(5))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_request_resync() {
        let mut tracker = ResyncTracker::default();
        let btc = ProductId::new("BTC-USD");

        assert!(tracker.request(&btc, None));
        assert!(tracker.is_pending(&btc));

        // Burst collapses to one request.
        assert!(!tracker.request(&btc, None));
        assert_eq!(tracker.pending_count(), 1);
    }

    #[test]
    fn test_complete_resync() {
        let mut tracker = ResyncTracker::default();
        let btc = ProductId::new("BTC-USD");

        tracker.request(&btc, None);
        assert!(tracker.complete(&btc));
        assert!(!tracker.is_pending(&btc));
        assert!(!tracker.complete(&btc));
        assert!(tracker.request(&btc, None));
    }

    #[test]
    fn test_expired_requests_reissued() {
        let mut tracker = ResyncTracker::new(Duration::ZERO);
        let eth = ProductId::new("ETH-USD");
        tracker.request(&eth, None);

        std::thread::sleep(Duration::from_millis(2));
        let expired = tracker.expired();
        assert_eq!(expired.len(), 1);
        assert_eq!(expired[0].product_id, eth);
        // Still outstanding until a snapshot lands.
        assert!(tracker.is_pending(&eth));
    }

    #[test]
    fn test_nothing_expires_early() {
        let mut tracker = ResyncTracker::new(Duration::from_secs(60));
        tracker.request(&ProductId::new("BTC-USD"), None);
        assert!(tracker.expired().is_empty());

        tracker.clear();
        assert_eq!(tracker.pending_count(), 0);
    }
}
