use crate::core::EngineConfig;
use crate::strategy::BatchConfig;
use clap::{Parser, ValueEnum};
use rust_decimal::Decimal;
use std::path::PathBuf;

/// Replay liquidity, staking and payment operations against the token economy
#[derive(Parser, Debug)]
#[command(name = "token-economy")]
#[command(
    about = "Replay liquidity, staking and payment operations and print final pool states",
    long_about = None
)]
pub struct CliArgs {
    /// Input CSV file path containing operation rows
    #[arg(value_name = "INPUT", help = "Path to the input CSV file")]
    pub input_file: PathBuf,

    /// Processing strategy to use for the replay
    #[arg(
        long = "strategy",
        value_name = "STRATEGY",
        default_value = "async",
        help = "Processing strategy: 'sync' for sequential or 'async' for batched concurrent replay"
    )]
    pub strategy: StrategyType,

    /// Number of operations per batch (async mode only)
    #[arg(
        long = "batch-size",
        value_name = "SIZE",
        help = "Number of operations per batch (default: 1000)"
    )]
    pub batch_size: Option<usize>,

    /// Number of runtime worker threads (async mode only)
    #[arg(
        long = "max-concurrent",
        value_name = "COUNT",
        help = "Number of worker threads processing partitions (default: CPU cores)"
    )]
    pub max_concurrent_batches: Option<usize>,

    #[arg(
        long = "payment-fee-rate",
        value_name = "RATE",
        help = "Fraction of each payment charged as fee (default: 0.001)"
    )]
    pub payment_fee_rate: Option<Decimal>,

    #[arg(
        long = "cross-rate",
        value_name = "RATE",
        help = "Base-token value of one quote-token unit, used for position valuation (default: 1000)"
    )]
    pub cross_rate: Option<Decimal>,

    #[arg(
        long = "treasury",
        value_name = "OWNER",
        help = "Owner of the seeded pool liquidity (default: treasury)"
    )]
    pub treasury: Option<String>,

    /// Log filter used when RUST_LOG is not set
    #[arg(long = "log-level", value_name = "FILTER", default_value = "info")]
    pub log_level: String,
}

/// Available processing strategies
#[derive(Clone, Debug, PartialEq, ValueEnum)]
pub enum StrategyType {
    Sync,
    Async,
}

impl CliArgs {
    /// Create a BatchConfig from CLI arguments, using defaults for omitted values
    pub fn to_batch_config(&self) -> BatchConfig {
        if self.batch_size.is_some() || self.max_concurrent_batches.is_some() {
            let default = BatchConfig::default();
            BatchConfig::new(
                self.batch_size.unwrap_or(default.batch_size),
                self.max_concurrent_batches
                    .unwrap_or(default.max_concurrent_batches),
            )
        } else {
            BatchConfig::default()
        }
    }

    /// Create an EngineConfig from CLI arguments
    ///
    /// Omitted values take their defaults; invalid ones are replaced by
    /// `EngineConfig::new` with a warning.
    pub fn to_engine_config(&self) -> EngineConfig {
        let default = EngineConfig::default();
        EngineConfig::new(
            self.payment_fee_rate.unwrap_or(default.payment_fee_rate),
            self.cross_rate.unwrap_or(default.cross_rate),
            self.treasury.clone().unwrap_or(default.treasury),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case::default_strategy(&["program", "input.csv"], StrategyType::Async)]
    #[case::explicit_sync(&["program", "--strategy", "sync", "input.csv"], StrategyType::Sync)]
    #[case::explicit_async(&["program", "--strategy", "async", "input.csv"], StrategyType::Async)]
    fn test_strategy_parsing(#[case] args: &[&str], #[case] expected: StrategyType) {
        let parsed = CliArgs::try_parse_from(args).unwrap();
        assert_eq!(parsed.strategy, expected);
    }

    #[rstest]
    #[case::all_defaults(&["program", "input.csv"], 1000, num_cpus::get())]
    #[case::custom_batch_size(&["program", "--batch-size", "2000", "input.csv"], 2000, num_cpus::get())]
    #[case::custom_max_concurrent(&["program", "--max-concurrent", "8", "input.csv"], 1000, 8)]
    #[case::zero_batch_size(&["program", "--batch-size", "0", "input.csv"], 1000, num_cpus::get())]
    #[case::zero_max_concurrent(&["program", "--max-concurrent", "0", "input.csv"], 1000, num_cpus::get())]
    fn test_batch_config_conversion(
        #[case] args: &[&str],
        #[case] expected_batch_size: usize,
        #[case] expected_max_concurrent: usize,
    ) {
        let config = CliArgs::try_parse_from(args).unwrap().to_batch_config();

        assert_eq!(config.batch_size, expected_batch_size);
        assert_eq!(config.max_concurrent_batches, expected_max_concurrent);
    }

    #[rstest]
    #[case::defaults(&["program", "input.csv"], EngineConfig::default())]
    #[case::custom(
        &["program", "--payment-fee-rate", "0.01", "--cross-rate", "2000", "--treasury", "dao", "input.csv"],
        EngineConfig {
            payment_fee_rate: Decimal::new(1, 2),
            cross_rate: Decimal::from(2000),
            treasury: "dao".to_string(),
        }
    )]
    #[case::fee_rate_of_one_falls_back(
        &["program", "--payment-fee-rate", "1", "input.csv"],
        EngineConfig::default()
    )]
    #[case::negative_cross_rate_falls_back(
        &["program", "--cross-rate=-5", "input.csv"],
        EngineConfig::default()
    )]
    fn test_engine_config_conversion(#[case] args: &[&str], #[case] expected: EngineConfig) {
        let config = CliArgs::try_parse_from(args).unwrap().to_engine_config();
        assert_eq!(config, expected);
    }

    #[test]
    fn test_log_level_defaults_to_info() {
        let parsed = CliArgs::try_parse_from(["program", "input.csv"]).unwrap();
        assert_eq!(parsed.log_level, "info");

        let parsed =
            CliArgs::try_parse_from(["program", "--log-level", "debug", "input.csv"]).unwrap();
        assert_eq!(parsed.log_level, "debug");
    }

    #[rstest]
    #[case::missing_input(&["program"])]
    #[case::invalid_strategy(&["program", "--strategy", "invalid", "input.csv"])]
    #[case::invalid_fee_rate(&["program", "--payment-fee-rate", "abc", "input.csv"])]
    fn test_parsing_errors(#[case] args: &[&str]) {
        let result = CliArgs::try_parse_from(args);
        assert!(result.is_err());
    }
}
