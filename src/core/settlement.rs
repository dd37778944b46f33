//! Buy and sell settlement algorithms
//!
//! Settlement runs on an executor worker. It acquires the account's ledger
//! lock once, up front, and holds it for the entire remaining duration of the
//! order, including across every price-wait suspension. The only suspension
//! point is the price-wait loop, which parks on the stock feed's own
//! synchronization and never touches the ledger lock, so the lock ordering
//! (ledger outer, feed inner) is fixed by construction.
//!
//! On every exit path (execution, rejection, feed shutdown, cancellation)
//! the ledger guard is dropped and the lock released; no failure leaves the
//! account wedged.

use std::sync::Arc;

use rust_decimal::Decimal;
use tracing::{debug, info};

use crate::core::feed::PriceFeed;
use crate::core::ledger::Account;
use crate::types::{BrokerageError, SecurityId, ShareCount};

/// Settle a buy order
///
/// Parks until the quote is at or below `limit`, then pays `quote * quantity`
/// and increments the holding, or resolves with the zero sentinel when the
/// balance cannot cover the cost at the moment the condition is met.
pub(crate) async fn settle_buy(
    account: &Account,
    feed: &Arc<PriceFeed>,
    quantity: ShareCount,
    limit: Decimal,
) -> Result<Decimal, BrokerageError> {
    // Held until this function returns, across every price wait below.
    let mut ledger = account.ledger().await;

    let mut quote = feed.current_price();
    while quote > limit {
        feed.await_change().await?;
        quote = feed.current_price();
    }

    let cost = quote
        .checked_mul(Decimal::from(quantity))
        .ok_or_else(|| BrokerageError::arithmetic_overflow("buy settlement", account.id()))?;

    if ledger.balance() >= cost {
        ledger.debit("buy settlement", cost)?;
        ledger.add_shares(feed, quantity)?;
        info!(
            account = account.id(),
            security = %feed.security(),
            quantity,
            %quote,
            %cost,
            "buy executed"
        );
        Ok(cost)
    } else {
        debug!(
            account = account.id(),
            security = %feed.security(),
            balance = %ledger.balance(),
            %cost,
            "buy not executed: insufficient funds"
        );
        Ok(Decimal::ZERO)
    }
}

/// Settle a sell order
///
/// For every holdings entry matching `security` with a positive quantity:
/// parks until that stock's quote is at or above `limit`, then credits
/// `quote * quantity` and removes the entry entirely: the full position is
/// liquidated in one sale, never decremented. Resolves with the accumulated
/// proceeds, 0 when nothing matched.
pub(crate) async fn settle_sell(
    account: &Account,
    security: &SecurityId,
    limit: Decimal,
) -> Result<Decimal, BrokerageError> {
    // Held until this function returns; no entry can appear or vanish while
    // the sale is in progress.
    let mut ledger = account.ledger().await;

    let mut total = Decimal::ZERO;
    for position in ledger.matching_positions(security) {
        let mut quote = position.feed.current_price();
        while quote < limit {
            position.feed.await_change().await?;
            quote = position.feed.current_price();
        }

        let proceeds = quote
            .checked_mul(Decimal::from(position.quantity))
            .ok_or_else(|| BrokerageError::arithmetic_overflow("sell settlement", account.id()))?;

        ledger.credit("sell settlement", proceeds)?;
        ledger.remove_position(security);
        total = total
            .checked_add(proceeds)
            .ok_or_else(|| BrokerageError::arithmetic_overflow("sell settlement", account.id()))?;

        info!(
            account = account.id(),
            %security,
            quantity = position.quantity,
            %quote,
            %proceeds,
            "sell executed"
        );
    }

    if total.is_zero() {
        debug!(account = account.id(), %security, "sell matched no holdings");
    }
    Ok(total)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;
    use tokio::runtime::Handle;
    use tokio::time::timeout;

    use crate::types::StockListing;

    /// A tick interval long enough that no tick fires during a test, so the
    /// quote a feed opens at is the quote settlement sees.
    const QUIET: Duration = Duration::from_secs(3600);

    fn feed(security: &str, price: Decimal, tick: Duration) -> Arc<PriceFeed> {
        PriceFeed::open(
            StockListing::new(security, security, price),
            tick,
            &Handle::current(),
        )
        .unwrap()
    }

    #[tokio::test]
    async fn test_buy_settles_immediately_when_quote_is_acceptable() {
        let account = Account::open_with_balance(1, Decimal::new(1000, 0));
        let googl = feed("GOOGL", Decimal::new(100, 0), QUIET);

        let cost = settle_buy(&account, &googl, 5, Decimal::new(100, 0))
            .await
            .unwrap();

        assert_eq!(cost, Decimal::new(500, 0));
        assert_eq!(account.balance().await, Decimal::new(500, 0));
        assert_eq!(account.shares_held("GOOGL").await, 5);
    }

    #[tokio::test]
    async fn test_buy_with_insufficient_funds_resolves_zero_sentinel() {
        let account = Account::open_with_balance(1, Decimal::new(400, 0));
        let googl = feed("GOOGL", Decimal::new(100, 0), QUIET);

        let cost = settle_buy(&account, &googl, 5, Decimal::new(100, 0))
            .await
            .unwrap();

        // Not executed, and indistinguishable from an execution at zero.
        assert_eq!(cost, Decimal::ZERO);
        assert_eq!(account.balance().await, Decimal::new(400, 0));
        assert_eq!(account.shares_held("GOOGL").await, 0);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_buy_waits_for_the_quote_to_reach_its_limit() {
        let account = Account::open_with_balance(1, Decimal::new(1000, 0));
        let googl = feed("GOOGL", Decimal::new(100, 0), Duration::from_millis(5));
        let limit = Decimal::new(99, 0);

        // The walk dips below the limit with probability 1; the timeout is a
        // safety net, not an expectation.
        let cost = timeout(
            Duration::from_secs(30),
            settle_buy(&account, &googl, 5, limit),
        )
        .await
        .expect("walk dipped below the limit")
        .unwrap();

        assert!(cost > Decimal::ZERO);
        assert!(cost <= limit * Decimal::from(5u64));
        assert_eq!(account.shares_held("GOOGL").await, 5);
        assert_eq!(account.balance().await, Decimal::new(1000, 0) - cost);
        googl.shutdown();
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_buy_propagates_feed_shutdown_and_releases_the_ledger() {
        let account = Account::open_with_balance(1, Decimal::new(1000, 0));
        // Quote can never fall to 0.01, so the order parks forever.
        let googl = feed("GOOGL", Decimal::new(100, 0), QUIET);

        let task = {
            let account = Arc::clone(&account);
            let googl = Arc::clone(&googl);
            tokio::spawn(
                async move { settle_buy(&account, &googl, 5, Decimal::new(1, 2)).await },
            )
        };
        tokio::time::sleep(Duration::from_millis(20)).await;

        googl.shutdown();

        let result = timeout(Duration::from_secs(1), task)
            .await
            .expect("shutdown must release the parked order")
            .unwrap();
        assert!(matches!(
            result.unwrap_err(),
            BrokerageError::FeedShutdown { .. }
        ));

        // The ledger lock was released and nothing was settled.
        assert_eq!(account.balance().await, Decimal::new(1000, 0));
        assert_eq!(account.shares_held("GOOGL").await, 0);
    }

    #[tokio::test]
    async fn test_sell_liquidates_the_full_position() {
        let account = Account::open_with_balance(1, Decimal::ZERO);
        let stock_x = feed("X", Decimal::new(60, 0), QUIET);
        account.ledger().await.add_shares(&stock_x, 10).unwrap();

        let proceeds = settle_sell(&account, &"X".to_string(), Decimal::new(50, 0))
            .await
            .unwrap();

        assert_eq!(proceeds, Decimal::new(600, 0));
        assert_eq!(account.balance().await, Decimal::new(600, 0));
        // The entry is removed entirely, not decremented.
        assert!(account.snapshot().await.holdings.is_empty());
    }

    #[tokio::test]
    async fn test_sell_with_no_matching_holdings_resolves_zero() {
        let account = Account::open_with_balance(1, Decimal::new(100, 0));

        let proceeds = settle_sell(&account, &"GOOGL".to_string(), Decimal::new(50, 0))
            .await
            .unwrap();

        assert_eq!(proceeds, Decimal::ZERO);
        assert_eq!(account.balance().await, Decimal::new(100, 0));
    }

    #[tokio::test]
    async fn test_sell_ignores_positions_under_other_securities() {
        let account = Account::open_with_balance(1, Decimal::ZERO);
        let googl = feed("GOOGL", Decimal::new(100, 0), QUIET);
        let aapl = feed("AAPL", Decimal::new(300, 0), QUIET);
        {
            let mut ledger = account.ledger().await;
            ledger.add_shares(&googl, 10).unwrap();
            ledger.add_shares(&aapl, 3).unwrap();
        }

        let proceeds = settle_sell(&account, &"GOOGL".to_string(), Decimal::new(100, 0))
            .await
            .unwrap();

        assert_eq!(proceeds, Decimal::new(1000, 0));
        assert_eq!(account.shares_held("GOOGL").await, 0);
        assert_eq!(account.shares_held("AAPL").await, 3);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_sell_waits_for_the_quote_to_reach_its_limit() {
        let account = Account::open_with_balance(1, Decimal::ZERO);
        let stock_x = feed("X", Decimal::new(100, 0), Duration::from_millis(5));
        account.ledger().await.add_shares(&stock_x, 10).unwrap();
        let limit = Decimal::new(101, 0);

        let proceeds = timeout(
            Duration::from_secs(30),
            settle_sell(&account, &"X".to_string(), limit),
        )
        .await
        .expect("walk rose above the limit")
        .unwrap();

        assert!(proceeds >= limit * Decimal::from(10u64));
        assert_eq!(account.balance().await, proceeds);
        assert!(account.snapshot().await.holdings.is_empty());
        stock_x.shutdown();
    }
}
