//! Cross-rate sources for position valuation
//!
//! Price-feed integration is out of scope; the engines only see the
//! [`PriceOracle`] trait, so a real feed can replace the constant without
//! touching pool accounting.

use crate::core::traits::PriceOracle;
use rust_decimal::Decimal;

/// Oracle returning the same cross-rate for every pair
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FixedRateOracle {
    rate: Decimal,
}

impl FixedRateOracle {
    pub fn new(rate: Decimal) -> Self {
        Self { rate }
    }
}

impl Default for FixedRateOracle {
    /// One quote unit is worth 1000 base units
    fn default() -> Self {
        Self::new(Decimal::from(1000))
    }
}

impl PriceOracle for FixedRateOracle {
    fn cross_rate(&self, _base: &str, _quote: &str) -> Decimal {
        self.rate
    }
}
