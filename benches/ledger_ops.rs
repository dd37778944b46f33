//! Benchmark suite for account ledger operations
//!
//! Measures the cost of the balance/holdings mutations that every order
//! settlement performs under the account lock, using the divan benchmarking
//! framework. All operations go through the account's public surface, so the
//! numbers include one uncontended ledger-lock acquisition each.
//!
//! # Running Benchmarks
//!
//! ```bash
//! cargo bench
//! ```

use rust_brokerage_engine::Account;
use rust_decimal::Decimal;

fn main() {
    divan::main();
}

fn runtime() -> tokio::runtime::Runtime {
    tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .expect("failed to build runtime")
}

/// Benchmark an uncontended deposit
#[divan::bench]
fn deposit(bencher: divan::Bencher) {
    let runtime = runtime();
    let account = Account::open_with_balance(1, Decimal::ZERO);

    bencher.bench_local(|| {
        runtime
            .block_on(account.deposit(Decimal::new(100, 2)))
            .expect("deposit failed");
    });
}

/// Benchmark a deposit/withdrawal round trip
#[divan::bench]
fn deposit_withdraw_round_trip(bencher: divan::Bencher) {
    let runtime = runtime();
    let account = Account::open_with_balance(1, Decimal::new(1_000_000, 0));

    bencher.bench_local(|| {
        runtime.block_on(async {
            account.deposit(Decimal::new(100, 2)).await.expect("deposit failed");
            account
                .withdraw(Decimal::new(100, 2))
                .await
                .expect("withdrawal failed");
        });
    });
}

/// Benchmark a consistent balance+holdings snapshot
#[divan::bench]
fn snapshot(bencher: divan::Bencher) {
    let runtime = runtime();
    let account = Account::open_with_balance(1, Decimal::new(1_000_000, 0));

    bencher.bench_local(|| runtime.block_on(account.snapshot()));
}
