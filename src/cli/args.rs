use crate::core::DEFAULT_WORKERS;
use clap::Parser;
use rust_decimal::Decimal;
use std::path::PathBuf;
use std::time::Duration;

/// Run a demo brokerage session against simulated price feeds
#[derive(Parser, Debug)]
#[command(name = "brokerage-engine")]
#[command(about = "Run a demo brokerage session against simulated price feeds", long_about = None)]
pub struct CliArgs {
    /// Optional listings CSV file; a built-in set of three stocks is used
    /// when no file is given
    #[arg(
        value_name = "LISTINGS",
        help = "Path to a listings CSV file (name,security,price)"
    )]
    pub listings_file: Option<PathBuf>,

    /// Price feed tick interval in milliseconds
    #[arg(
        long = "tick-ms",
        value_name = "MILLIS",
        default_value_t = 1000,
        help = "Feed tick interval in milliseconds (default: 1000)"
    )]
    pub tick_ms: u64,

    /// Opening balance of the demo account
    #[arg(
        long = "balance",
        value_name = "AMOUNT",
        default_value = "1000000",
        help = "Opening balance of the demo account (default: 1000000)"
    )]
    pub balance: Decimal,

    /// Worker pool size of the order executor
    #[arg(
        long = "workers",
        value_name = "COUNT",
        default_value_t = DEFAULT_WORKERS,
        help = "Concurrent settlement workers (default: 10)"
    )]
    pub workers: usize,
}

impl CliArgs {
    /// The tick interval as a `Duration`
    ///
    /// A zero interval falls back to the default: feeds cannot tick
    /// continuously.
    pub fn tick_interval(&self) -> Duration {
        if self.tick_ms == 0 {
            Duration::from_millis(1000)
        } else {
            Duration::from_millis(self.tick_ms)
        }
    }
}
