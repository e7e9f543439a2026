//! Synthetic feed frames and book messages.

use ironfeed_core::{BookDelta, BookSnapshot, Decimal, LevelUpdate, PriceLevel, ProductId, Side};

/// Mid price used by every fixture.
pub const MID: i64 = 30_000;

/// Snapshot with `levels` bids below and `levels` asks above [`MID`], one
/// cent apart.
#[must_use]
pub fn snapshot(product: &str, levels: usize) -> BookSnapshot {
    let mid = Decimal::from(MID);
    let tick = Decimal::new(1, 2);
    let size = Decimal::new(15, 1);

    let bids = (1..=levels)
        .map(|i| PriceLevel {
            price: mid - tick * Decimal::from(i),
            size,
        })
        .collect();
    let asks = (1..=levels)
        .map(|i| PriceLevel {
            price: mid + tick * Decimal::from(i),
            size,
        })
        .collect();

    BookSnapshot {
        product_id: ProductId::new(product),
        bids,
        asks,
    }
}

/// Stream of non-crossing updates touching the inner `levels` of each side.
///
/// Every fourth update deletes its level; the rest resize it.
#[must_use]
pub fn deltas(product: &str, count: usize, levels: usize) -> Vec<BookDelta> {
    let mid = Decimal::from(MID);
    let tick = Decimal::new(1, 2);
    let levels = levels.max(1);

    (0..count)
        .map(|i| {
            let offset = Decimal::from(i % levels + 1);
            let (side, price) = if i % 2 == 0 {
                (Side::Bid, mid - tick * offset)
            } else {
                (Side::Ask, mid + tick * offset)
            };
            let size = if i % 4 == 3 {
                Decimal::ZERO
            } else {
                Decimal::from(i % 7 + 1)
            };
            BookDelta {
                product_id: ProductId::new(product),
                updates: vec![LevelUpdate { side, price, size }],
            }
        })
        .collect()
}

/// Level2 snapshot frame text in the exchange's wire format.
#[must_use]
pub fn snapshot_frame(product: &str, levels: usize) -> String {
    let snapshot = snapshot(product, levels);
    let updates: Vec<String> = snapshot
        .bids
        .iter()
        .map(|l| ("bid", l))
        .chain(snapshot.asks.iter().map(|l| ("offer", l)))
        .map(|(side, l)| {
            format!(
                r#"{{"side":"{side}","event_time":"2023-02-09T20:32:50.714964855Z","price_level":"{}","new_quantity":"{}"}}"#,
                l.price, l.size
            )
        })
        .collect();
    format!(
        r#"{{"channel":"l2_data","client_id":"","timestamp":"2023-02-09T20:32:50.714964855Z","sequence_num":0,"events":[{{"type":"snapshot","product_id":"{product}","updates":[{}]}}]}}"#,
        updates.join(",")
    )
}

/// Level2 update frame text carrying `updates` resizes near the top.
#[must_use]
pub fn update_frame(product: &str, sequence_num: u64, updates: usize) -> String {
    let entries: Vec<String> = deltas(product, updates, 10)
        .into_iter()
        .flat_map(|d| d.updates)
        .map(|u| {
            let side = match u.side {
                Side::Bid => "bid",
                Side::Ask => "offer",
            };
            format!(
                r#"{{"side":"{side}","event_time":"2023-02-09T20:32:50.714964855Z","price_level":"{}","new_quantity":"{}"}}"#,
                u.price, u.size
            )
        })
        .collect();
    format!(
        r#"{{"channel":"l2_data","client_id":"","timestamp":"2023-02-09T20:32:50.714964855Z","sequence_num":{sequence_num},"events":[{{"type":"update","product_id":"{product}","updates":[{}]}}]}}"#,
        entries.join(",")
    )
}

/// Market trades frame text with `count` trades.
#[must_use]
pub fn trades_frame(product: &str, count: usize) -> String {
    let trades: Vec<String> = (0..count)
        .map(|i| {
            let side = if i % 2 == 0 { "BUY" } else { "SELL" };
            format!(
                r#"{{"trade_id":"{i}","product_id":"{product}","price":"{MID}.{:02}","size":"0.01","side":"{side}","time":"2023-02-09T20:32:50.714964855Z"}}"#,
                i % 100
            )
        })
        .collect();
    format!(
        r#"{{"channel":"market_trades","timestamp":"2023-02-09T20:32:50.714964855Z","sequence_num":1,"events":[{{"type":"update","trades":[{}]}}]}}"#,
        trades.join(",")
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use ironfeed_core::{InboundFrame, Payload, decode_frame};
    use ironfeed_marketdata::OrderBook;

    #[test]
    fn test_snapshot_not_crossed() {
        let mut book = OrderBook::new(ProductId::new("BTC-USD"));
        book.apply_snapshot(&snapshot("BTC-USD", 50)).unwrap();
        assert_eq!(book.bids.len(), 50);
        assert_eq!(book.spread(), Some(Decimal::new(2, 2)));
    }

    #[test]
    fn test_deltas_never_cross() {
        let mut book = OrderBook::new(ProductId::new("BTC-USD"));
        book.apply_snapshot(&snapshot("BTC-USD", 20)).unwrap();
        for delta in deltas("BTC-USD", 500, 10) {
            book.apply_delta(&delta).unwrap();
        }
    }

    #[test]
    fn test_frames_decode() {
        let InboundFrame::Data(frame) = decode_frame(&snapshot_frame("BTC-USD", 5)).unwrap() else {
            panic!("expected data frame");
        };
        assert!(matches!(
            &frame.messages[0].payload,
            Payload::BookSnapshot(s) if s.bids.len() == 5 && s.asks.len() == 5
        ));

        assert!(decode_frame(&update_frame("BTC-USD", 1, 8)).is_ok());

        let InboundFrame::Data(frame) = decode_frame(&trades_frame("BTC-USD", 12)).unwrap() else {
            panic!("expected data frame");
        };
        assert!(matches!(&frame.messages[0].payload, Payload::Trades(t) if t.len() == 12));
    }
}
