//! Conversion-rate sources for cross-quote setups.

use dashmap::DashMap;
use rust_decimal::Decimal;

/// Source of asset-to-asset conversion rates.
///
/// Injected at strategy construction; the strategy holds it for its whole
/// lifetime and never mutates it.
pub trait RateOracle: Send + Sync {
    /// The `from → to` conversion rate, if known.
    fn rate(&self, from_asset: &str, to_asset: &str) -> Option<Decimal>;
}

/// An oracle backed by explicitly set rates, for simulation and tests.
#[derive(Default)]
pub struct FixedRateOracle {
    rates: DashMap<(String, String), Decimal>,
}

impl FixedRateOracle {
    /// Create an oracle with no rates.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the `from → to` rate and its inverse.
    pub fn set_rate(&self, from_asset: &str, to_asset: &str, rate: Decimal) {
        self.rates.insert(
            (from_asset.to_uppercase(), to_asset.to_uppercase()),
            rate,
        );
        if !rate.is_zero() {
            self.rates.insert(
                (to_asset.to_uppercase(), from_asset.to_uppercase()),
                Decimal::ONE / rate,
            );
        }
    }
}

impl RateOracle for FixedRateOracle {
    fn rate(&self, from_asset: &str, to_asset: &str) -> Option<Decimal> {
        if from_asset.eq_ignore_ascii_case(to_asset) {
            return Some(Decimal::ONE);
        }
        self.rates
            .get(&(from_asset.to_uppercase(), to_asset.to_uppercase()))
            .map(|entry| *entry.value())
    }
}
