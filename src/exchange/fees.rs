//! Flat maker/taker fee schedule and the fee callback plugged into venues.

use crate::model::{OrderType, Side};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// Everything a fee callback may inspect when pricing one fill.
#[derive(Debug, Clone)]
pub struct FeeRequest<'a> {
    /// Venue name
    pub exchange: &'a str,
    /// `true` when the filled order was resting (maker side)
    pub is_maker: bool,
    /// Base asset code
    pub base: &'a str,
    /// Quote asset code
    pub quote: &'a str,
    /// Limit or market
    pub order_type: OrderType,
    /// Side of the filled order
    pub side: Side,
    /// Fill amount in base units
    pub amount: Decimal,
    /// Fill price
    pub price: Decimal,
}

/// Fee callback: returns the fee *ratio* applied to the fill's quote
/// notional. The venue computes the charged amount; the callback never
/// mutates venue state.
pub type FeeFn = Arc<dyn Fn(&FeeRequest<'_>) -> Decimal + Send + Sync>;

/// Flat maker/taker fee ratios.
///
/// Ratios are plain fractions: `0.001` is 10 bps. The default schedule is
/// zero-fee, which keeps simulated balances exact for accounting tests.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct FeeSchedule {
    /// Fee ratio for resting (maker) fills
    pub maker_ratio: Decimal,
    /// Fee ratio for aggressive (taker) fills
    pub taker_ratio: Decimal,
}

impl FeeSchedule {
    /// Create a schedule with explicit maker and taker ratios.
    #[must_use]
    pub fn new(maker_ratio: Decimal, taker_ratio: Decimal) -> Self {
        Self {
            maker_ratio,
            taker_ratio,
        }
    }

    /// A schedule that charges nothing on either side.
    #[must_use]
    pub fn zero_fee() -> Self {
        Self {
            maker_ratio: Decimal::ZERO,
            taker_ratio: Decimal::ZERO,
        }
    }

    /// The ratio for one fill.
    #[must_use]
    #[inline]
    pub fn ratio(&self, is_maker: bool) -> Decimal {
        if is_maker {
            self.maker_ratio
        } else {
            self.taker_ratio
        }
    }

    /// Wrap this schedule as the venue fee callback.
    #[must_use]
    pub fn as_fee_fn(self) -> FeeFn {
        Arc::new(move |request: &FeeRequest<'_>| self.ratio(request.is_maker))
    }
}

impl Default for FeeSchedule {
    fn default() -> Self {
        Self::zero_fee()
    }
}
