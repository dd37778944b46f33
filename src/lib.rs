//! Rust Brokerage Engine Library
//! # Overview
//!
//! This library provides an asynchronous order-execution engine for a
//! teaching bank-account model: shared, continuously-mutating stock price
//! feeds, and accounts whose buy/sell orders block until a price condition is
//! met while mutating balance and holdings under a single exclusive lock.
//!
//! # Architecture
//!
//! The system is organized into several key components:
//!
//! - [`types`] - Core data types (StockListing, Order, errors)
//! - [`cli`] - CLI argument parsing for the demo driver
//! - [`core`] - Business logic components:
//!   - [`core::feed`] - Price feeds: periodic random-walk mutation with
//!     broadcast change notification and cancellable shutdown
//!   - [`core::ledger`] - Account balance + holdings under one lock
//!   - [`core::executor`] - Bounded worker pool and order futures
//!   - [`core::market`] - Directory of open feeds
//! - [`io`] - CSV input for market listings
//!
//! # Concurrency model
//!
//! Order settlement holds its account's ledger lock for the entire
//! settlement, including across price waits: while any order on an account
//! is pending, every other operation on that account queues behind it. The
//! price wait itself parks only on the stock feed's own synchronization, so
//! the two lock domains always nest ledger-outer, feed-inner.
//!
//! Feeds broadcast every tick to all parked waiters; each settlement task
//! re-evaluates its own price condition after waking. Shutting a feed down
//! releases its waiters with an error instead of leaving them parked.

// Module declarations
pub mod cli;
pub mod core;
pub mod io;
pub mod types;

pub use core::{
    Account, AccountSnapshot, Market, OrderExecutor, OrderHandle, PriceFeed, DEFAULT_TICK_INTERVAL,
    DEFAULT_WORKERS,
};
pub use io::read_listings;
pub use types::{AccountId, BrokerageError, Order, SecurityId, ShareCount, StockListing};
