//! Asynchronous order execution
//!
//! This module provides the `OrderExecutor`, a bounded worker pool that runs
//! submitted buy/sell settlements, and the `OrderHandle` future a caller gets
//! back for each accepted order.
//!
//! # Design
//!
//! Submission never blocks: invalid orders are rejected synchronously before
//! anything is scheduled, and accepted orders are spawned immediately onto
//! the runtime handle the executor was built with. Each settlement task first
//! acquires a permit from the pool semaphore, so at most `workers`
//! settlements run concurrently per executor; the rest queue on the
//! semaphore, not on the caller.
//!
//! The executor holds an explicit runtime handle rather than reaching for
//! any global scheduler, so its lifecycle, and the lifecycle of every
//! settlement it spawns, is owned by whoever built it.

use std::sync::Arc;

use rust_decimal::Decimal;
use tokio::runtime::Handle;
use tokio::sync::Semaphore;
use tokio::task::JoinHandle;
use tracing::debug;

use crate::core::feed::PriceFeed;
use crate::core::ledger::Account;
use crate::core::settlement;
use crate::types::{BrokerageError, Order, SecurityId, ShareCount};

/// Reference worker-pool size: up to ten settlements in flight per executor
pub const DEFAULT_WORKERS: usize = 10;

/// The future of a submitted order
///
/// Resolves exactly once: with the order's numeric result, or with the
/// failure that ended it (feed shutdown, cancellation, pool shutdown).
#[derive(Debug)]
pub struct OrderHandle {
    task: JoinHandle<Result<Decimal, BrokerageError>>,
}

impl OrderHandle {
    /// Whether the order has already settled (or failed)
    ///
    /// Non-blocking done-check; `settle` returns immediately once this is
    /// true.
    pub fn is_settled(&self) -> bool {
        self.task.is_finished()
    }

    /// Cancel the order
    ///
    /// The engine itself never cancels an order; this is the caller's escape
    /// hatch for an order whose condition never becomes true. Cancellation
    /// lands on the settlement task's next suspension point, the ledger
    /// guard drops there, and [`settle`](OrderHandle::settle) resolves with
    /// [`BrokerageError::OrderCancelled`]. An order that already settled is
    /// unaffected.
    pub fn cancel(&self) {
        self.task.abort();
    }

    /// Wait for the order to settle and take its result
    ///
    /// A result of `0` is the reference sentinel for "did not execute"
    /// (insufficient funds on a buy, no matching holdings on a sell) and is
    /// deliberately indistinguishable from an execution at price zero.
    pub async fn settle(self) -> Result<Decimal, BrokerageError> {
        match self.task.await {
            Ok(result) => result,
            Err(join) if join.is_cancelled() => Err(BrokerageError::OrderCancelled),
            Err(join) => Err(BrokerageError::order_interrupted(join.to_string())),
        }
    }
}

/// Bounded worker pool for order settlement
#[derive(Debug)]
pub struct OrderExecutor {
    /// Pool permits; closing the semaphore shuts the pool down
    workers: Arc<Semaphore>,

    /// Runtime the settlement tasks are spawned on
    handle: Handle,
}

impl OrderExecutor {
    /// Create an executor with the reference pool size
    pub fn new(handle: Handle) -> Self {
        Self::with_workers(handle, DEFAULT_WORKERS)
    }

    /// Create an executor with an explicit pool size
    ///
    /// A zero size falls back to the default; there is no meaningful
    /// zero-worker executor.
    pub fn with_workers(handle: Handle, workers: usize) -> Self {
        let workers = if workers == 0 { DEFAULT_WORKERS } else { workers };
        OrderExecutor {
            workers: Arc::new(Semaphore::new(workers)),
            handle,
        }
    }

    /// Submit a buy order
    ///
    /// Settles once the stock's quote is at or below `max_price`, paying
    /// `quote * quantity` and incrementing the account's holding. Resolves
    /// `0` when the balance cannot cover the cost at that moment: the
    /// ambiguous zero sentinel, see [`OrderHandle::settle`].
    ///
    /// # Errors
    ///
    /// Returns an error synchronously, without scheduling anything, if the
    /// quantity is zero or the limit price is negative.
    pub fn submit_buy(
        &self,
        account: Arc<Account>,
        feed: Arc<PriceFeed>,
        quantity: ShareCount,
        max_price: Decimal,
    ) -> Result<OrderHandle, BrokerageError> {
        let order = Order::Buy {
            security: feed.security().clone(),
            quantity,
            limit: max_price,
        };
        order.validate()?;
        debug!(
            account = account.id(),
            security = %feed.security(),
            quantity,
            limit = %max_price,
            "buy order submitted"
        );

        let workers = Arc::clone(&self.workers);
        let task = self.handle.spawn(async move {
            let _permit = workers
                .acquire_owned()
                .await
                .map_err(|_| BrokerageError::ExecutorShutdown)?;
            settlement::settle_buy(&account, &feed, quantity, max_price).await
        });
        Ok(OrderHandle { task })
    }

    /// Submit a sell order
    ///
    /// Settles once the quote of each matching holding is at or above
    /// `min_price`, crediting the proceeds and removing the position
    /// entirely. Resolves `0` when the account holds nothing under
    /// `security`, the same ambiguous sentinel as an unfunded buy.
    ///
    /// # Errors
    ///
    /// Returns an error synchronously if the limit price is negative.
    pub fn submit_sell(
        &self,
        account: Arc<Account>,
        security: impl Into<SecurityId>,
        min_price: Decimal,
    ) -> Result<OrderHandle, BrokerageError> {
        let security = security.into();
        let order = Order::Sell {
            security: security.clone(),
            limit: min_price,
        };
        order.validate()?;
        debug!(
            account = account.id(),
            %security,
            limit = %min_price,
            "sell order submitted"
        );

        let workers = Arc::clone(&self.workers);
        let task = self.handle.spawn(async move {
            let _permit = workers
                .acquire_owned()
                .await
                .map_err(|_| BrokerageError::ExecutorShutdown)?;
            settlement::settle_sell(&account, &security, min_price).await
        });
        Ok(OrderHandle { task })
    }

    /// Shut the pool down
    ///
    /// Settlements that already hold a permit run to completion; queued ones
    /// resolve [`BrokerageError::ExecutorShutdown`]. Idempotent.
    pub fn shutdown(&self) {
        self.workers.close();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;
    use tokio::time::{sleep, timeout};

    use crate::types::StockListing;

    const QUIET: Duration = Duration::from_secs(3600);

    fn executor() -> OrderExecutor {
        OrderExecutor::new(Handle::current())
    }

    fn feed(security: &str, price: Decimal) -> Arc<PriceFeed> {
        PriceFeed::open(
            StockListing::new(security, security, price),
            QUIET,
            &Handle::current(),
        )
        .unwrap()
    }

    #[tokio::test]
    async fn test_zero_quantity_buy_rejected_at_submission() {
        let account = Account::open_with_balance(1, Decimal::new(1000, 0));
        let googl = feed("GOOGL", Decimal::new(100, 0));

        let result = executor().submit_buy(account, googl, 0, Decimal::new(100, 0));
        assert_eq!(
            result.unwrap_err(),
            BrokerageError::invalid_quantity(0)
        );
    }

    #[tokio::test]
    async fn test_negative_limit_rejected_at_submission() {
        let account = Account::open_with_balance(1, Decimal::new(1000, 0));
        let googl = feed("GOOGL", Decimal::new(100, 0));
        let executor = executor();

        let buy = executor.submit_buy(
            Arc::clone(&account),
            Arc::clone(&googl),
            5,
            Decimal::new(-1, 0),
        );
        assert!(matches!(
            buy.unwrap_err(),
            BrokerageError::InvalidLimit { side: "buy", .. }
        ));

        let sell = executor.submit_sell(account, "GOOGL", Decimal::new(-1, 0));
        assert!(matches!(
            sell.unwrap_err(),
            BrokerageError::InvalidLimit { side: "sell", .. }
        ));
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_submitted_buy_settles_through_its_handle() {
        let account = Account::open_with_balance(1, Decimal::new(1000, 0));
        let googl = feed("GOOGL", Decimal::new(100, 0));

        let handle = executor()
            .submit_buy(Arc::clone(&account), googl, 5, Decimal::new(100, 0))
            .unwrap();

        let cost = timeout(Duration::from_secs(5), handle.settle())
            .await
            .unwrap()
            .unwrap();
        assert_eq!(cost, Decimal::new(500, 0));
        assert_eq!(account.balance().await, Decimal::new(500, 0));
        assert_eq!(account.shares_held("GOOGL").await, 5);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_done_check_tracks_settlement() {
        let account = Account::open_with_balance(1, Decimal::new(1000, 0));
        // Unreachable limit: the order parks until cancelled.
        let googl = feed("GOOGL", Decimal::new(100, 0));

        let handle = executor()
            .submit_buy(Arc::clone(&account), googl, 5, Decimal::new(1, 2))
            .unwrap();
        sleep(Duration::from_millis(20)).await;
        assert!(!handle.is_settled());

        handle.cancel();
        let result = timeout(Duration::from_secs(1), handle.settle())
            .await
            .unwrap();
        assert_eq!(result.unwrap_err(), BrokerageError::OrderCancelled);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_cancel_releases_the_ledger_lock() {
        let account = Account::open_with_balance(1, Decimal::new(1000, 0));
        let googl = feed("GOOGL", Decimal::new(100, 0));

        let handle = executor()
            .submit_buy(Arc::clone(&account), googl, 5, Decimal::new(1, 2))
            .unwrap();
        sleep(Duration::from_millis(20)).await;
        handle.cancel();

        // The parked settlement held the ledger lock; after cancellation a
        // deposit must get through.
        timeout(Duration::from_secs(1), account.deposit(Decimal::new(100, 0)))
            .await
            .expect("ledger lock must be released on cancellation")
            .unwrap();
        assert_eq!(account.balance().await, Decimal::new(1100, 0));
        assert_eq!(account.shares_held("GOOGL").await, 0);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_pool_bounds_concurrent_settlements() {
        let blocked_account = Account::open_with_balance(1, Decimal::new(1000, 0));
        let ready_account = Account::open_with_balance(2, Decimal::new(1000, 0));
        let googl = feed("GOOGL", Decimal::new(100, 0));
        let executor = OrderExecutor::with_workers(Handle::current(), 1);

        // The single worker parks on an unreachable limit...
        let blocked = executor
            .submit_buy(blocked_account, Arc::clone(&googl), 5, Decimal::new(1, 2))
            .unwrap();
        sleep(Duration::from_millis(20)).await;

        // ...so an immediately-satisfiable order on another account queues.
        let queued = executor
            .submit_buy(
                Arc::clone(&ready_account),
                googl,
                5,
                Decimal::new(100, 0),
            )
            .unwrap();
        sleep(Duration::from_millis(50)).await;
        assert!(!queued.is_settled());

        // Freeing the worker lets the queued order run.
        blocked.cancel();
        let cost = timeout(Duration::from_secs(1), queued.settle())
            .await
            .unwrap()
            .unwrap();
        assert_eq!(cost, Decimal::new(500, 0));
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_shutdown_fails_queued_orders() {
        let account = Account::open_with_balance(1, Decimal::new(1000, 0));
        let googl = feed("GOOGL", Decimal::new(100, 0));
        let executor = executor();
        executor.shutdown();

        let handle = executor
            .submit_buy(account, googl, 5, Decimal::new(100, 0))
            .unwrap();
        let result = timeout(Duration::from_secs(1), handle.settle())
            .await
            .unwrap();
        assert_eq!(result.unwrap_err(), BrokerageError::ExecutorShutdown);
    }
}
