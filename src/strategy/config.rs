//! Strategy configuration.

use rust_decimal::Decimal;
use serde::Deserialize;

/// Recognized options of the cross-exchange market-making strategy.
///
/// All ratios are plain fractions (`0.01` = 1%); all durations are
/// milliseconds of simulation time. The defaults mirror a conservative live
/// configuration and every field can be overridden individually when
/// deserializing from a config file.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct XemmConfig {
    /// Minimum hedged profit ratio before quoting; also the cancel
    /// threshold while active cancellation is enabled
    pub min_profitability: Decimal,

    /// Fixed maker order size in base units; zero uses the portfolio ratio
    pub order_amount: Decimal,

    /// Cap on order size as a fraction of the taker-side hedgeable volume
    pub order_size_taker_volume_factor: Decimal,

    /// Cap on order size as a fraction of the taker-side counter balance
    pub order_size_taker_balance_factor: Decimal,

    /// Order size as a fraction of the total maker portfolio, used when
    /// `order_amount` is zero
    pub order_size_portfolio_ratio_limit: Decimal,

    /// Quote volume skipped at the top of the book before reading the
    /// effective top price
    pub top_depth_tolerance: Decimal,

    /// Taker-price cushion applied to hedge orders
    pub slippage_buffer: Decimal,

    /// Minimum delay between two reprice actions for the same pair
    pub anti_hysteresis_duration_ms: u64,

    /// `true`: cancel unprofitable orders; `false`: rely on venue-side
    /// expiration and the loss threshold below
    pub active_order_canceling: bool,

    /// Loss tolerance applied instead of `min_profitability` when active
    /// cancellation is disabled; negative values tolerate a bounded loss
    pub cancel_order_threshold: Decimal,

    /// Step quotes inside the spread when the top of book allows it
    pub adjust_orders_enabled: bool,

    /// Fetch cross-quote conversion rates from the oracle instead of the
    /// fixed overrides
    pub use_oracle_conversion_rate: bool,

    /// Fixed taker-base to maker-base rate when the oracle is disabled
    pub taker_to_maker_base_conversion_rate: Decimal,

    /// Fixed taker-quote to maker-quote rate when the oracle is disabled
    pub taker_to_maker_quote_conversion_rate: Decimal,

    /// Expiration attached to maker orders when active cancellation is
    /// disabled
    pub limit_order_min_expiration_ms: u64,

    /// Minimum interval between connectivity warnings
    pub status_report_interval_ms: u64,
}

impl Default for XemmConfig {
    fn default() -> Self {
        Self {
            min_profitability: Decimal::new(3, 3),
            order_amount: Decimal::ZERO,
            order_size_taker_volume_factor: Decimal::new(25, 2),
            order_size_taker_balance_factor: Decimal::new(995, 3),
            order_size_portfolio_ratio_limit: Decimal::new(1667, 4),
            top_depth_tolerance: Decimal::ZERO,
            slippage_buffer: Decimal::new(5, 2),
            anti_hysteresis_duration_ms: 60_000,
            active_order_canceling: true,
            cancel_order_threshold: Decimal::new(-5, 2),
            adjust_orders_enabled: true,
            use_oracle_conversion_rate: false,
            taker_to_maker_base_conversion_rate: Decimal::ONE,
            taker_to_maker_quote_conversion_rate: Decimal::ONE,
            limit_order_min_expiration_ms: 130_000,
            status_report_interval_ms: 900_000,
        }
    }
}
