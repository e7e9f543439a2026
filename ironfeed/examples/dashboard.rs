//! Terminal dashboard printing top of book, trades and tickers.
//!
//! Run with: `RUST_LOG=info cargo run --example dashboard -- BTC-USD ETH-USD`

use ironfeed::prelude::*;
use std::time::Duration;

fn print_book(view: &OrderBookView) {
    println!(
        "{:<10} {:<16} bid {:>12} ask {:>12} spread {:>10} ({}%)",
        view.product_id.as_str(),
        format!("{:?}{}", view.state, if view.seeded { "*" } else { "" }),
        fmt(view.best_bid),
        fmt(view.best_ask),
        fmt(view.spread),
        fmt(view.spread_percent.map(|p| p.round_dp(4))),
    );
    for (bid, ask) in view.bids.iter().zip(view.asks.iter()).take(5) {
        println!(
            "           {:>12} x {:<10} {:>6}% | {:>12} x {:<10} {:>6}%",
            bid.price,
            bid.size,
            fmt(bid.depth_percent),
            ask.price,
            ask.size,
            fmt(ask.depth_percent),
        );
    }
}

fn fmt(value: Option<Decimal>) -> String {
    value.map_or_else(|| "-".to_string(), |v| v.to_string())
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let mut products: Vec<ProductId> = std::env::args().skip(1).map(ProductId::from).collect();
    if products.is_empty() {
        products.push(ProductId::new("BTC-USD"));
    }

    let (connection, feed) = FeedBuilder::new()
        .display_depth(10)
        .trade_capacity(10)
        .build();

    let connection_task = tokio::spawn(async move {
        if let Err(e) = connection.run().await {
            eprintln!("[Feed] Error: {e}");
        }
    });

    let panel = feed.consumer();
    for product in &products {
        feed.subscribe(panel, Channel::Level2, product.clone())?;
        feed.subscribe(panel, Channel::Matches, product.clone())?;
        feed.subscribe(panel, Channel::Ticker, product.clone())?;
    }

    let mut events = feed.events();
    let mut refresh = tokio::time::interval(Duration::from_secs(1));

    loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => break,
            _ = refresh.tick() => {
                let changes = events.drain();
                for event in changes.iter().filter(|e| {
                    matches!(
                        e,
                        FeedEvent::ConnectionChanged(_)
                            | FeedEvent::ResyncRequested(_)
                            | FeedEvent::GapDetected { .. }
                    )
                }) {
                    println!("[Event] {event:?}");
                }
                if events.missed() > 0 {
                    println!("[Event] {} notifications missed", events.missed());
                }

                println!("--- {} ---", feed.connection_state());
                for product in &products {
                    if let Some(ticker) = feed.ticker(product) {
                        println!(
                            "{:<10} last {:>12} 24h {:>8}%",
                            product.as_str(),
                            ticker.price,
                            fmt(ticker.price_percent_chg_24h),
                        );
                    }
                    if let Some(view) = feed.order_book(product) {
                        print_book(&view);
                    }
                    for trade in feed.recent_trades(product).iter().take(3) {
                        println!(
                            "           trade {:>12} x {:<10} {:?}",
                            trade.price, trade.size, trade.side
                        );
                    }
                }
            }
        }
    }

    feed.unsubscribe_all(panel);
    feed.shutdown();
    connection_task.await?;
    Ok(())
}
