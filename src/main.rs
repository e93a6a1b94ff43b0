//! Token economy replay CLI
//!
//! Replays liquidity, staking and payment operations from a CSV file and
//! prints the final pool states to stdout.
//!
//! # Usage
//!
//! ```bash
//! cargo run -- operations.csv > pools.csv
//! cargo run -- --strategy sync operations.csv > pools.csv
//! cargo run -- --strategy async --batch-size 2000 --max-concurrent 8 operations.csv > pools.csv
//! cargo run -- --payment-fee-rate 0.002 --log-level debug operations.csv > pools.csv
//! ```
//!
//! Logs go to stderr; `RUST_LOG` overrides `--log-level`.
//!
//! # Exit Codes
//!
//! - 0: Success
//! - 1: Error (missing arguments, file not found, output not writable, etc.)

use std::process;
use token_economy_engine::cli;
use token_economy_engine::strategy;
use tracing::error;
use tracing_subscriber::EnvFilter;

fn main() {
    let args = cli::parse_args();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&args.log_level)),
        )
        .with_writer(std::io::stderr)
        .init();

    let batch_config = if args.strategy == cli::StrategyType::Async {
        Some(args.to_batch_config())
    } else {
        None
    };
    let strategy =
        strategy::create_strategy(args.strategy.clone(), batch_config, args.to_engine_config());

    let mut output = std::io::stdout();
    if let Err(e) = strategy.process(&args.input_file, &mut output) {
        error!("{}", e);
        process::exit(1);
    }
}
