//! Quote sizing and pricing against the taker-side hedge.

use super::xemm::XemmStrategy;
use crate::model::Side;
use crate::quant::ceil_to;
use rust_decimal::Decimal;
use tracing::trace;

impl XemmStrategy {
    /// The VWAP the taker venue would pay or yield for an opposite-direction
    /// order of `size`, converted into the maker quote currency.
    ///
    /// `None` means undefined: thin taker book or missing conversion rate.
    /// Callers skip placement and treat active orders as unhedgeable.
    pub fn effective_hedge_price(
        &self,
        pair_id: usize,
        maker_side: Side,
        size: Decimal,
    ) -> Option<Decimal> {
        let taker = &self.pairs[pair_id].taker;
        let book = taker.order_book()?;
        // a maker bid is hedged by selling into the taker bids, a maker ask
        // by buying from the taker asks
        let is_buy = maker_side == Side::Sell;
        let vwap = book.vwap_for_volume(is_buy, size).ok()?.average_price;
        let rate = self.market_conversion_rate(pair_id)?;
        Some(vwap * rate)
    }

    /// The taker-quote → maker-quote and taker-base → maker-base rates per
    /// the configured source. `None` entries mean the oracle has no rate.
    pub(super) fn conversion_rates(&self, pair_id: usize) -> (Option<Decimal>, Option<Decimal>) {
        let pair = &self.pairs[pair_id];
        if self.config.use_oracle_conversion_rate {
            match &self.oracle {
                Some(oracle) => (
                    oracle.rate(&pair.taker.pair.quote, &pair.maker.pair.quote),
                    oracle.rate(&pair.taker.pair.base, &pair.maker.pair.base),
                ),
                None => (None, None),
            }
        } else {
            (
                Some(self.config.taker_to_maker_quote_conversion_rate),
                Some(self.config.taker_to_maker_base_conversion_rate),
            )
        }
    }

    /// `quote_rate / base_rate`: the factor converting a taker-denominated
    /// price into the maker quote currency. Applied exactly once, in
    /// [`Self::effective_hedge_price`] and the quote pricing.
    pub(super) fn market_conversion_rate(&self, pair_id: usize) -> Option<Decimal> {
        let (quote_rate, base_rate) = self.conversion_rates(pair_id);
        let quote_rate = quote_rate?;
        let base_rate = base_rate?;
        if base_rate.is_zero() {
            return None;
        }
        Some(quote_rate / base_rate)
    }

    /// The largest maker order size currently supportable on `maker_side`:
    /// the configured amount (or portfolio slice), capped by the maker-side
    /// balance, the taker counter balance and the taker hedgeable volume.
    pub fn order_size_limit(&self, pair_id: usize, maker_side: Side) -> Decimal {
        self.order_size_limit_with_locked(pair_id, maker_side, Decimal::ZERO)
    }

    /// Size limit with `locked` added back to the maker-side available
    /// balance. When re-checking an active order, its own hold is locked on
    /// the venue and must not count against it.
    pub(super) fn order_size_limit_with_locked(
        &self,
        pair_id: usize,
        maker_side: Side,
        locked: Decimal,
    ) -> Decimal {
        let pair = &self.pairs[pair_id];
        let maker = &pair.maker;
        let taker = &pair.taker;

        let user_amount = if self.config.order_amount > Decimal::ZERO {
            self.config.order_amount
        } else {
            // portfolio value in base units, scaled by the ratio limit
            let quote_in_base = match maker.mid_price() {
                Some(mid) if !mid.is_zero() => maker.quote_balance() / mid,
                _ => Decimal::ZERO,
            };
            (maker.base_balance() + quote_in_base) * self.config.order_size_portfolio_ratio_limit
        };

        let Some(book) = taker.order_book() else {
            return Decimal::ZERO;
        };
        // hedge reference: what the taker side would pay/charge at the top,
        // in maker quote terms for the maker-balance bound
        let hedge_is_buy = maker_side == Side::Sell;
        let Some(taker_top) = book.top_price(hedge_is_buy) else {
            return Decimal::ZERO;
        };
        let Some(rate) = self.market_conversion_rate(pair_id) else {
            return Decimal::ZERO;
        };

        let maker_bound = match maker_side {
            Side::Buy => {
                let ref_price = taker_top * rate * (Decimal::ONE + self.config.slippage_buffer);
                if ref_price.is_zero() {
                    Decimal::ZERO
                } else {
                    (maker.available_quote_balance() + locked) / ref_price
                }
            }
            Side::Sell => maker.available_base_balance() + locked,
        };

        let taker_bound = match maker_side {
            // maker bid hedges as a taker sell, consuming base
            Side::Buy => taker.available_base_balance(),
            // maker ask hedges as a taker buy, consuming quote
            Side::Sell => {
                if taker_top.is_zero() {
                    Decimal::ZERO
                } else {
                    taker.available_quote_balance() / taker_top
                }
            }
        } * self.config.order_size_taker_balance_factor;

        let volume_bound =
            book.side_volume(hedge_is_buy) * self.config.order_size_taker_volume_factor;

        let size = user_amount.min(maker_bound).min(taker_bound).min(volume_bound);
        let quantized = maker.market.quantize_order_amount(&maker.pair, size);
        trace!(
            pair = %maker.pair, side = %maker_side, %user_amount, %maker_bound,
            %taker_bound, %volume_bound, %quantized, "order size limit"
        );
        quantized
    }

    /// The maker quote price for `size` on `maker_side`: the hedge VWAP
    /// shifted by the profitability margin, optionally stepped inside the
    /// maker spread, quantized toward profitability.
    ///
    /// `None` when the taker book cannot absorb `size` or no conversion
    /// rate is available; the caller skips placement.
    pub fn market_making_price(
        &self,
        pair_id: usize,
        maker_side: Side,
        size: Decimal,
    ) -> Option<Decimal> {
        let pair = &self.pairs[pair_id];
        let maker = &pair.maker;
        let taker = &pair.taker;

        let book = taker.order_book()?;
        let hedge_is_buy = maker_side == Side::Sell;
        let vwap = book.vwap_for_volume(hedge_is_buy, size).ok()?.average_price;
        let rate = self.market_conversion_rate(pair_id)?;
        let hedge_vwap = vwap * rate;

        let margin = Decimal::ONE + self.config.min_profitability;
        let mut price = match maker_side {
            Side::Buy => {
                // floor keeps the bid below the profitable level
                maker
                    .market
                    .quantize_order_price(&maker.pair, hedge_vwap / margin)
            }
            Side::Sell => {
                // ceiling keeps the ask above the profitable level
                let raw = hedge_vwap * margin;
                let quantum = maker.market.order_price_quantum(&maker.pair, raw);
                ceil_to(raw, quantum)
            }
        };

        if self.config.adjust_orders_enabled {
            let tolerance = self.config.top_depth_tolerance;
            match maker_side {
                Side::Buy => {
                    if let Some(top_bid) = maker.top_price_with_tolerance(false, tolerance) {
                        let quantum =
                            maker.market.order_price_quantum(&maker.pair, top_bid);
                        // step at most one quantum above the top bid,
                        // never beyond the profitable level
                        price = price.min(top_bid + quantum);
                    }
                }
                Side::Sell => {
                    if let Some(top_ask) = maker.top_price_with_tolerance(true, tolerance) {
                        let quantum =
                            maker.market.order_price_quantum(&maker.pair, top_ask);
                        price = price.max(top_ask - quantum);
                    }
                }
            }
        }

        if price <= Decimal::ZERO {
            return None;
        }
        Some(price)
    }
}
