//! Continuously-mutating stock price feed
//!
//! This module provides the `PriceFeed` struct: one stock's identity and its
//! current quote, plus a periodic background mutator that commits a random
//! walk step on every tick and broadcasts the change to all parked waiters.
//!
//! # Design
//!
//! The feed's quote lives in a `tokio::sync::watch` channel. The channel is
//! the feed's entire synchronization domain: committing a tick takes the
//! channel's internal lock, and `await_change` parks on the channel, never
//! on any caller-owned lock. Settlement tasks therefore keep holding their
//! account's ledger lock while they are parked here, and the two lock domains
//! nest in one direction only (ledger outer, feed inner).
//!
//! Every tick wakes **all** parked waiters, not one: each order task
//! re-evaluates its own price condition after waking, so wakeups are
//! spurious-tolerant by construction and single-wake semantics would be
//! wrong. A waiter that subscribes after a tick has committed is not woken
//! by that tick; it waits for the next one.
//!
//! Shutdown cancels the mutator and releases every parked waiter with
//! [`BrokerageError::FeedShutdown`]; nothing is ever left parked on a dead
//! feed.

use std::sync::{Arc, Weak};
use std::time::Duration;

use rand::Rng;
use rust_decimal::Decimal;
use tokio::runtime::Handle;
use tokio::sync::watch;
use tokio::time::{self, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use crate::types::{BrokerageError, SecurityId, StockListing};

/// Lower clamp for committed quotes
///
/// A pathological run of negative draws cannot drive a quote to zero or
/// below; it bottoms out here and stays positive for the feed's lifetime.
const QUOTE_FLOOR: Decimal = Decimal::from_parts(1, 0, 0, false, 4);

/// Random tick step bounds, in basis points: [-3%, +3%)
const STEP_BPS: std::ops::Range<i64> = -300..300;

/// A shared price feed for one stock
///
/// The feed is shared by all readers and waiters of its stock; it is not
/// owned by any single account. It is created from a validated
/// [`StockListing`] and mutates its quote once per tick interval until
/// [`PriceFeed::shutdown`] is called.
#[derive(Debug)]
pub struct PriceFeed {
    /// Display name of the stock
    name: String,

    /// Security identifier, the stable key sell orders match against
    security: SecurityId,

    /// Current quote and the broadcast primitive for quote changes
    ///
    /// Waiters subscribe to this channel; the subscription marks the current
    /// value as seen, so a subscriber only ever observes ticks committed
    /// after it started waiting.
    quote: watch::Sender<Decimal>,

    /// Cancelled exactly once, when the feed is shut down
    shutdown: CancellationToken,
}

impl PriceFeed {
    /// Open a feed for a stock listing and start its periodic mutator
    ///
    /// The mutator runs on the provided runtime handle; the feed owns no
    /// global scheduler state, so its lifecycle ends with [`shutdown`]
    /// (or with the last handle to it being dropped).
    ///
    /// # Arguments
    ///
    /// * `listing` - The stock's identity and initial quote
    /// * `tick_interval` - Period between quote mutations
    /// * `handle` - Runtime handle the mutator task is spawned on
    ///
    /// # Errors
    ///
    /// Returns an error if the listing fails validation (empty security
    /// identifier or non-positive initial quote).
    ///
    /// [`shutdown`]: PriceFeed::shutdown
    pub fn open(
        listing: StockListing,
        tick_interval: Duration,
        handle: &Handle,
    ) -> Result<Arc<Self>, BrokerageError> {
        listing.validate()?;

        let (quote, _) = watch::channel(listing.price);
        let feed = Arc::new(PriceFeed {
            name: listing.name,
            security: listing.security,
            quote,
            shutdown: CancellationToken::new(),
        });
        Self::spawn_ticker(&feed, tick_interval, handle);

        debug!(
            security = %feed.security,
            quote = %feed.current_price(),
            "price feed opened"
        );
        Ok(feed)
    }

    /// Display name of the stock
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Security identifier of the stock
    pub fn security(&self) -> &SecurityId {
        &self.security
    }

    /// The last committed quote
    ///
    /// Non-blocking and never fails; callable before, during, and after
    /// shutdown.
    pub fn current_price(&self) -> Decimal {
        *self.quote.borrow()
    }

    /// Park the calling task until the mutator next commits a quote
    ///
    /// Only the feed's own channel is involved in the wait; any locks the
    /// caller holds (in particular an account's ledger lock) stay held and
    /// are not released by parking here.
    ///
    /// # Errors
    ///
    /// Returns [`BrokerageError::FeedShutdown`] if the feed is shut down
    /// while the caller is parked, or if it was already shut down when the
    /// caller arrived. A parked waiter is never left hanging.
    pub async fn await_change(&self) -> Result<(), BrokerageError> {
        let mut rx = self.quote.subscribe();
        tokio::select! {
            _ = self.shutdown.cancelled() => {
                Err(BrokerageError::feed_shutdown(self.security.clone()))
            }
            changed = rx.changed() => {
                changed.map_err(|_| BrokerageError::feed_shutdown(self.security.clone()))
            }
        }
    }

    /// Stop the periodic mutator and release all parked waiters
    ///
    /// Idempotent. After this call the quote no longer mutates and
    /// [`await_change`](PriceFeed::await_change) fails immediately.
    pub fn shutdown(&self) {
        if !self.shutdown.is_cancelled() {
            info!(security = %self.security, "price feed shut down");
            self.shutdown.cancel();
        }
    }

    /// Whether [`shutdown`](PriceFeed::shutdown) has been called
    pub fn is_shut_down(&self) -> bool {
        self.shutdown.is_cancelled()
    }

    /// Spawn the periodic mutator task
    ///
    /// The task holds only a weak handle to the feed, so an abandoned feed
    /// (all strong handles dropped without a shutdown call) stops ticking on
    /// its next tick instead of living forever.
    fn spawn_ticker(feed: &Arc<Self>, tick_interval: Duration, handle: &Handle) {
        let weak: Weak<Self> = Arc::downgrade(feed);
        let shutdown = feed.shutdown.clone();

        handle.spawn(async move {
            let mut ticker = time::interval(tick_interval);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            // interval() yields its first tick immediately; consume it so the
            // first mutation lands one full interval after opening.
            ticker.tick().await;

            loop {
                tokio::select! {
                    _ = shutdown.cancelled() => break,
                    _ = ticker.tick() => {}
                }
                let Some(feed) = weak.upgrade() else { break };
                feed.commit_tick();
            }
        });
    }

    /// Commit one tick: step the quote by a uniform draw from [-3%, +3%)
    /// and broadcast the change to every parked waiter.
    fn commit_tick(&self) {
        if self.shutdown.is_cancelled() {
            return;
        }

        let step_bps = rand::thread_rng().gen_range(STEP_BPS);
        let step = Decimal::new(step_bps, 4);

        self.quote.send_modify(|quote| {
            // An overflowing draw leaves the quote unchanged; the broadcast
            // still goes out so waiters re-evaluate their conditions.
            if let Some(delta) = quote.checked_mul(step) {
                if let Some(next) = quote.checked_add(delta) {
                    *quote = next.max(QUOTE_FLOOR);
                }
            }
        });

        debug!(security = %self.security, quote = %self.current_price(), "tick");
    }
}
