//! Rust Brokerage Engine CLI
//!
//! Demo driver: opens a market of simulated price feeds, funds one account,
//! and walks it through a round of limit buys and sells.
//!
//! # Usage
//!
//! ```bash
//! cargo run
//! cargo run -- --tick-ms 50 --balance 1000000
//! cargo run -- listings.csv --workers 4
//! ```
//!
//! Without a listings file, a built-in set of three stocks is used. Buy
//! limits sit below the opening quotes and sell limits above them, so the
//! orders park on their feeds until the random walk satisfies them; with the
//! default one-second tick this takes a while, exactly as intended.
//!
//! # Exit Codes
//!
//! - 0: Success
//! - 1: Error (listings file not found, malformed CSV, etc.)

use std::process;
use std::sync::Arc;

use futures::future::join_all;
use rust_decimal::Decimal;
use tracing::info;
use tracing_subscriber::EnvFilter;

use rust_brokerage_engine::cli::{self, CliArgs};
use rust_brokerage_engine::{
    read_listings, Account, BrokerageError, Market, OrderExecutor, StockListing,
};

fn main() {
    // Parse command-line arguments using clap
    let args = cli::parse_args();

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let runtime = match tokio::runtime::Runtime::new() {
        Ok(runtime) => runtime,
        Err(e) => {
            eprintln!("Error: failed to start runtime: {}", e);
            process::exit(1);
        }
    };

    if let Err(e) = runtime.block_on(run(args)) {
        eprintln!("Error: {}", e);
        process::exit(1);
    }
}

/// The built-in market used when no listings file is given
fn default_listings() -> Vec<StockListing> {
    vec![
        StockListing::new("Google", "GOOGL", Decimal::new(2000, 0)),
        StockListing::new("Apple", "AAPL", Decimal::new(300, 0)),
        StockListing::new("Microsoft", "MSFT", Decimal::new(250, 0)),
    ]
}

async fn run(args: CliArgs) -> Result<(), BrokerageError> {
    let listings = match &args.listings_file {
        Some(path) => read_listings(path)?,
        None => default_listings(),
    };

    let handle = tokio::runtime::Handle::current();
    let market = Market::with_tick_interval(handle.clone(), args.tick_interval());
    let executor = OrderExecutor::with_workers(handle, args.workers);

    let mut feeds = Vec::new();
    for listing in listings {
        feeds.push(market.list(listing)?);
    }

    let account = Account::open_with_balance(1, args.balance);
    let opening_balance = account.balance().await;
    info!(balance = %opening_balance, "account opened");

    // Buy below the opening quote: each order parks until its feed dips.
    let buys: Vec<_> = feeds
        .iter()
        .map(|feed| {
            let limit = feed.current_price() * Decimal::new(95, 2);
            executor.submit_buy(Arc::clone(&account), Arc::clone(feed), 5, limit)
        })
        .collect::<Result<_, _>>()?;

    for (feed, result) in feeds.iter().zip(join_all(buys.into_iter().map(|h| h.settle())).await) {
        let cost = result?;
        info!(security = %feed.security(), %cost, "buy settled");
    }

    // Sell above the now-current quotes, liquidating each position fully.
    let sells: Vec<_> = feeds
        .iter()
        .map(|feed| {
            let limit = feed.current_price() * Decimal::new(105, 2);
            executor.submit_sell(Arc::clone(&account), feed.security().clone(), limit)
        })
        .collect::<Result<_, _>>()?;

    for (feed, result) in feeds.iter().zip(join_all(sells.into_iter().map(|h| h.settle())).await) {
        let proceeds = result?;
        info!(security = %feed.security(), %proceeds, "sell settled");
    }

    let snapshot = account.snapshot().await;
    info!(balance = %snapshot.balance, holdings = ?snapshot.holdings, "session complete");

    market.shutdown_all();
    Ok(())
}
