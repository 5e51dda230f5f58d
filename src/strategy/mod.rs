//! Cross-exchange market-making strategy: quote on the maker venue, hedge
//! fills on the taker venue.

mod config;
mod pricing;
mod rates;
mod xemm;

pub use config::XemmConfig;
pub use rates::{FixedRateOracle, RateOracle};
pub use xemm::{StrategyPair, XemmStrategy};
