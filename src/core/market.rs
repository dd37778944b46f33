//! Market: the directory of open price feeds
//!
//! The `Market` is the composition point for feeds. It owns the runtime
//! handle its feeds tick on and the tick interval they share, so feed
//! lifecycle is explicit: whoever builds the market decides where the
//! mutators run and when they all stop. There is no global scheduler state.
//!
//! # Thread Safety
//!
//! The directory is a `DashMap`, so listings and lookups from concurrent
//! tasks synchronize per-entry without a global lock. One `PriceFeed` exists
//! per security; all readers and waiters of a stock share it.

use std::sync::Arc;
use std::time::Duration;

use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use tokio::runtime::Handle;
use tracing::info;

use crate::core::feed::PriceFeed;
use crate::types::{BrokerageError, SecurityId, StockListing};

/// Reference tick interval: quotes move once per second
pub const DEFAULT_TICK_INTERVAL: Duration = Duration::from_secs(1);

/// Directory of open price feeds, keyed by security identifier
#[derive(Debug)]
pub struct Market {
    /// Open feeds by security identifier
    feeds: DashMap<SecurityId, Arc<PriceFeed>>,

    /// Tick interval applied to every feed this market opens
    tick_interval: Duration,

    /// Runtime the feed mutators are spawned on
    handle: Handle,
}

impl Market {
    /// Create a market with the reference tick interval
    pub fn new(handle: Handle) -> Self {
        Self::with_tick_interval(handle, DEFAULT_TICK_INTERVAL)
    }

    /// Create a market with an explicit tick interval
    pub fn with_tick_interval(handle: Handle, tick_interval: Duration) -> Self {
        Market {
            feeds: DashMap::new(),
            tick_interval,
            handle,
        }
    }

    /// Open a feed for a stock listing and register it
    ///
    /// # Errors
    ///
    /// Returns an error if the security identifier is already listed, or if
    /// the listing fails validation.
    pub fn list(&self, listing: StockListing) -> Result<Arc<PriceFeed>, BrokerageError> {
        match self.feeds.entry(listing.security.clone()) {
            Entry::Occupied(_) => Err(BrokerageError::duplicate_listing(listing.security)),
            Entry::Vacant(slot) => {
                let feed = PriceFeed::open(listing, self.tick_interval, &self.handle)?;
                info!(security = %feed.security(), name = feed.name(), "listed");
                slot.insert(Arc::clone(&feed));
                Ok(feed)
            }
        }
    }

    /// Look up the feed for a security identifier
    pub fn feed(&self, security: &str) -> Option<Arc<PriceFeed>> {
        self.feeds.get(security).map(|entry| Arc::clone(entry.value()))
    }

    /// Look up a feed, failing on unknown identifiers
    pub fn require_feed(&self, security: &str) -> Result<Arc<PriceFeed>, BrokerageError> {
        self.feed(security)
            .ok_or_else(|| BrokerageError::unknown_security(security.to_string()))
    }

    /// All listed security identifiers
    pub fn securities(&self) -> Vec<SecurityId> {
        self.feeds.iter().map(|entry| entry.key().clone()).collect()
    }

    /// Number of listed securities
    pub fn len(&self) -> usize {
        self.feeds.len()
    }

    /// Whether the market has no listings
    pub fn is_empty(&self) -> bool {
        self.feeds.is_empty()
    }

    /// Shut down every listed feed
    ///
    /// Idempotent; feeds stay in the directory so late readers can still
    /// observe their last quote, but no quote mutates afterwards and every
    /// parked waiter is released.
    pub fn shutdown_all(&self) {
        for entry in self.feeds.iter() {
            entry.value().shutdown();
        }
    }
}
