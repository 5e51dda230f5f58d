//! The cross-exchange market-making control loop.
//!
//! Every tick, for every (maker, taker) pair: sample the top of book,
//! re-examine active maker quotes against the taker-side hedge, cancel what
//! is no longer profitable, funded or close to the suggested price, and
//! re-quote empty sides. Maker fills are hedged immediately with taker
//! orders carrying a slippage cushion.

use super::config::XemmConfig;
use super::rates::RateOracle;
use crate::clock::Tickable;
use crate::exchange::{MarketEvent, MarketEventListener, OrderFilled};
use crate::market::{Market, MarketPair};
use crate::model::{OrderType, Side, TimestampMs};
use crate::tracker::OrderIdTracker;
use rust_decimal::Decimal;
use std::collections::{HashMap, HashSet, VecDeque};
use std::fmt::Write as _;
use std::panic::{AssertUnwindSafe, catch_unwind};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex, Weak};
use tracing::{debug, error, info, trace, warn};

/// Interval between top-of-book samples.
pub(super) const ORDER_ADJUST_SAMPLE_INTERVAL_MS: u64 = 5_000;

/// Length of the top-of-book sample window.
pub(super) const SAMPLE_WINDOW: usize = 12;

/// Interval between conversion-rate log lines.
const CONVERSION_LOG_INTERVAL_MS: u64 = 300_000;

/// One (maker, taker) bridge the strategy quotes.
#[derive(Clone)]
pub struct StrategyPair {
    /// Venue and pair where resting quotes are placed
    pub maker: MarketPair,
    /// Venue and pair where fills are hedged immediately
    pub taker: MarketPair,
}

impl StrategyPair {
    /// Bundle a maker and a taker market handle.
    pub fn new(maker: MarketPair, taker: MarketPair) -> Self {
        Self { maker, taker }
    }
}

/// A maker quote the strategy currently owns.
#[derive(Debug, Clone, PartialEq)]
pub(super) struct ActiveOrder {
    pub side: Side,
    pub price: Decimal,
    pub quantity: Decimal,
}

/// Mutable per-pair state of the control loop.
pub(super) struct PairState {
    /// No reprice cancel before this time
    pub anti_hysteresis_until: AtomicU64,
    /// Sample bucket last pushed into the deques
    last_sample_bucket: AtomicU64,
    /// Recent maker top bids, newest last
    pub bid_samples: Mutex<VecDeque<Decimal>>,
    /// Recent maker top asks, newest last
    pub ask_samples: Mutex<VecDeque<Decimal>>,
    /// Maker buy fills awaiting a taker-side sell hedge
    pub pending_buy: Mutex<Vec<OrderFilled>>,
    /// Maker sell fills awaiting a taker-side buy hedge
    pub pending_sell: Mutex<Vec<OrderFilled>>,
    /// Maker quotes owned by this pair, by order id
    pub maker_orders: Mutex<HashMap<String, ActiveOrder>>,
    /// Outstanding taker hedges, by order id
    pub taker_orders: Mutex<HashSet<String>>,
    /// Last time the conversion rates were logged
    last_conversion_log: AtomicU64,
}

impl PairState {
    fn new() -> Self {
        Self {
            anti_hysteresis_until: AtomicU64::new(0),
            last_sample_bucket: AtomicU64::new(u64::MAX),
            bid_samples: Mutex::new(VecDeque::with_capacity(SAMPLE_WINDOW)),
            ask_samples: Mutex::new(VecDeque::with_capacity(SAMPLE_WINDOW)),
            pending_buy: Mutex::new(Vec::new()),
            pending_sell: Mutex::new(Vec::new()),
            maker_orders: Mutex::new(HashMap::new()),
            taker_orders: Mutex::new(HashSet::new()),
            last_conversion_log: AtomicU64::new(0),
        }
    }
}

/// The cross-exchange market-making strategy.
///
/// Construct with [`XemmStrategy::new`], then [`start`](Self::start) to
/// subscribe to venue events, register the returned `Arc` with the clock,
/// and [`stop`](Self::stop) to withdraw quotes and unsubscribe.
pub struct XemmStrategy {
    pub(super) config: XemmConfig,
    pub(super) pairs: Vec<StrategyPair>,
    pub(super) states: Vec<PairState>,
    pub(super) tracker: OrderIdTracker,
    pub(super) oracle: Option<Arc<dyn RateOracle>>,
    /// Strong reference to the listener registered on the venues; dropping
    /// it (on stop) unsubscribes, since venues hold listeners weakly
    listener: Mutex<Option<MarketEventListener>>,
    started: AtomicBool,
    last_status_warn: AtomicU64,
}

impl XemmStrategy {
    /// Create a strategy over the given pairs.
    ///
    /// The rate oracle is only consulted when
    /// [`XemmConfig::use_oracle_conversion_rate`] is set; otherwise the
    /// fixed conversion overrides apply.
    pub fn new(
        config: XemmConfig,
        pairs: Vec<StrategyPair>,
        oracle: Option<Arc<dyn RateOracle>>,
    ) -> Arc<Self> {
        let states = pairs.iter().map(|_| PairState::new()).collect();
        Arc::new(Self {
            config,
            pairs,
            states,
            tracker: OrderIdTracker::new(),
            oracle,
            listener: Mutex::new(None),
            started: AtomicBool::new(false),
            last_status_warn: AtomicU64::new(u64::MAX),
        })
    }

    /// Subscribe to market events on every venue the pairs touch.
    pub fn start(self: &Arc<Self>) {
        if self.started.swap(true, Ordering::AcqRel) {
            return;
        }
        let weak: Weak<XemmStrategy> = Arc::downgrade(self);
        let listener: MarketEventListener = Arc::new(move |event: &MarketEvent| {
            if let Some(strategy) = weak.upgrade() {
                strategy.handle_market_event(event);
            }
        });
        for market in self.distinct_markets() {
            market.add_listener(&listener);
        }
        *self.listener.lock().expect("listener lock") = Some(listener);
        info!(pairs = self.pairs.len(), "xemm strategy started");
    }

    /// Withdraw all maker quotes and unsubscribe from venue events.
    pub fn stop(&self) {
        if !self.started.swap(false, Ordering::AcqRel) {
            return;
        }
        for (pair, state) in self.pairs.iter().zip(&self.states) {
            let order_ids: Vec<String> = state
                .maker_orders
                .lock()
                .expect("maker orders lock")
                .keys()
                .cloned()
                .collect();
            for order_id in order_ids {
                pair.maker.market.cancel(&pair.maker.pair, &order_id);
            }
        }
        if let Some(listener) = self.listener.lock().expect("listener lock").take() {
            for market in self.distinct_markets() {
                market.remove_listener(&listener);
            }
        }
        info!("xemm strategy stopped");
    }

    fn distinct_markets(&self) -> Vec<Arc<dyn Market>> {
        let mut seen = HashSet::new();
        let mut markets = Vec::new();
        for pair in &self.pairs {
            for market in [&pair.maker.market, &pair.taker.market] {
                if seen.insert(market.name().to_string()) {
                    markets.push(market.clone());
                }
            }
        }
        markets
    }

    /// The sampled maker top-of-book window for a pair: (bids, asks),
    /// oldest first, at most 12 entries each (one per 5 s sample interval).
    #[must_use]
    pub fn price_samples(&self, pair_id: usize) -> (Vec<Decimal>, Vec<Decimal>) {
        let state = &self.states[pair_id];
        let bids = state.bid_samples.lock().expect("sample lock");
        let asks = state.ask_samples.lock().expect("sample lock");
        (bids.iter().copied().collect(), asks.iter().copied().collect())
    }

    /// Human-readable per-pair summary of the strategy state.
    #[must_use]
    pub fn status_report(&self) -> String {
        let mut report = String::new();
        for (i, (pair, state)) in self.pairs.iter().zip(&self.states).enumerate() {
            let maker_ready = pair.maker.market.ready();
            let taker_ready = pair.taker.market.ready();
            let active = state.maker_orders.lock().expect("maker orders lock").len();
            let hedging = state.taker_orders.lock().expect("taker orders lock").len();
            let pending: Decimal = {
                let buys = state.pending_buy.lock().expect("pending lock");
                let sells = state.pending_sell.lock().expect("pending lock");
                buys.iter().chain(sells.iter()).map(|f| f.amount).sum()
            };
            let _ = writeln!(
                report,
                "pair {}: {} -> {} | maker ready: {maker_ready}, taker ready: {taker_ready} \
                 | top {:?}/{:?} | active quotes: {active}, hedges in flight: {hedging}, \
                 unhedged base: {pending}",
                i,
                pair.maker.pair,
                pair.taker.pair,
                pair.maker.best_bid(),
                pair.maker.best_ask(),
            );
        }
        report
    }

    // --- per-tick control flow ---

    fn process_pair(&self, i: usize, now: TimestampMs) {
        let pair = &self.pairs[i];
        let state = &self.states[i];

        if !pair.maker.market.ready() || !pair.taker.market.ready() {
            self.warn_not_ready(i, now);
            return;
        }

        self.sample_top_of_book(i, now);
        self.log_conversion_rates(i, now);

        // retry hedge buckets that could not be placed on the fill itself
        self.hedge(i);

        // re-examine the quotes we own; cancelled orders stay in the map
        // until the venue confirms, which keeps this tick from re-quoting
        // the same side
        let active: Vec<(String, ActiveOrder)> = {
            let orders = state.maker_orders.lock().expect("maker orders lock");
            orders
                .iter()
                .map(|(id, order)| (id.clone(), order.clone()))
                .collect()
        };
        for (order_id, order) in &active {
            self.check_active_order(i, now, order_id, order);
        }

        // skip while fully quoted or while a hedge is still in flight
        let (has_bid, has_ask) = {
            let orders = state.maker_orders.lock().expect("maker orders lock");
            (
                orders.values().any(|o| o.side == Side::Buy),
                orders.values().any(|o| o.side == Side::Sell),
            )
        };
        if has_bid && has_ask {
            return;
        }
        if !state.taker_orders.lock().expect("taker orders lock").is_empty() {
            return;
        }

        if !has_bid {
            self.create_maker_order(i, now, Side::Buy);
        }
        if !has_ask {
            self.create_maker_order(i, now, Side::Sell);
        }
    }

    /// Returns `true` when the order was cancelled.
    fn check_active_order(
        &self,
        i: usize,
        now: TimestampMs,
        order_id: &str,
        order: &ActiveOrder,
    ) -> bool {
        let pair = &self.pairs[i];
        let state = &self.states[i];

        let hedge = self.effective_hedge_price(i, order.side, order.quantity);
        let threshold = if self.config.active_order_canceling {
            self.config.min_profitability
        } else {
            self.config.cancel_order_threshold
        };
        let unprofitable = match order.side {
            Side::Buy => {
                hedge.is_none_or(|h| h < order.price * (Decimal::ONE + threshold))
            }
            Side::Sell => {
                hedge.is_none_or(|h| order.price < h * (Decimal::ONE + threshold))
            }
        };
        if unprofitable {
            debug!(
                order_id, price = %order.price, hedge = ?hedge,
                "cancelling unprofitable maker order"
            );
            pair.maker.market.cancel(&pair.maker.pair, order_id);
            return true;
        }

        // the size limit may have shrunk since placement; the order's own
        // hold is locked on the venue and added back before comparing
        let locked = match order.side {
            Side::Buy => order.price * order.quantity,
            Side::Sell => order.quantity,
        };
        let size_limit = self.order_size_limit_with_locked(i, order.side, locked);
        if order.quantity > size_limit {
            debug!(
                order_id, quantity = %order.quantity, %size_limit,
                "cancelling maker order to free balance"
            );
            pair.maker.market.cancel(&pair.maker.pair, order_id);
            return true;
        }

        // reprice when the suggested quote drifted by more than one quantum
        if let Some(suggested) = self.market_making_price(i, order.side, order.quantity) {
            let quantum = pair
                .maker
                .market
                .order_price_quantum(&pair.maker.pair, order.price);
            let drift = (suggested - order.price).abs();
            if drift > quantum && now >= state.anti_hysteresis_until.load(Ordering::Acquire) {
                debug!(
                    order_id, price = %order.price, %suggested,
                    "cancelling drifted maker order"
                );
                pair.maker.market.cancel(&pair.maker.pair, order_id);
                state.anti_hysteresis_until.store(
                    now + self.config.anti_hysteresis_duration_ms,
                    Ordering::Release,
                );
                return true;
            }
        }
        false
    }

    fn create_maker_order(&self, i: usize, _now: TimestampMs, side: Side) {
        let pair = &self.pairs[i];
        let state = &self.states[i];

        let size = self.order_size_limit(i, side);
        if size <= Decimal::ZERO {
            trace!(pair = %pair.maker.pair, %side, "no quotable size");
            return;
        }
        let Some(price) = self.market_making_price(i, side, size) else {
            trace!(pair = %pair.maker.pair, %side, "no quotable price");
            return;
        };
        if price <= Decimal::ZERO {
            return;
        }

        let expiration = (!self.config.active_order_canceling)
            .then_some(self.config.limit_order_min_expiration_ms);
        let placed = match side {
            Side::Buy => pair.maker.market.buy(
                &pair.maker.pair,
                size,
                OrderType::Limit,
                Some(price),
                expiration,
            ),
            Side::Sell => pair.maker.market.sell(
                &pair.maker.pair,
                size,
                OrderType::Limit,
                Some(price),
                expiration,
            ),
        };
        match placed {
            Ok(order_id) => {
                debug!(order_id = %order_id, %side, %price, %size, "placed maker order");
                self.tracker
                    .start_tracking(&order_id, pair.maker.market.name(), i);
                state.maker_orders.lock().expect("maker orders lock").insert(
                    order_id,
                    ActiveOrder {
                        side,
                        price,
                        quantity: size,
                    },
                );
            }
            Err(e) => {
                warn!(pair = %pair.maker.pair, %side, error = %e, "maker order rejected");
            }
        }
    }

    fn sample_top_of_book(&self, i: usize, now: TimestampMs) {
        let pair = &self.pairs[i];
        let state = &self.states[i];
        let bucket = now / ORDER_ADJUST_SAMPLE_INTERVAL_MS;
        if state.last_sample_bucket.swap(bucket, Ordering::AcqRel) == bucket {
            return;
        }
        if let (Some(bid), Some(ask)) = (pair.maker.best_bid(), pair.maker.best_ask()) {
            let mut bids = state.bid_samples.lock().expect("sample lock");
            let mut asks = state.ask_samples.lock().expect("sample lock");
            if bids.len() == SAMPLE_WINDOW {
                bids.pop_front();
            }
            if asks.len() == SAMPLE_WINDOW {
                asks.pop_front();
            }
            bids.push_back(bid);
            asks.push_back(ask);
        }
    }

    fn warn_not_ready(&self, i: usize, now: TimestampMs) {
        let last = self.last_status_warn.load(Ordering::Acquire);
        if last != u64::MAX && now < last + self.config.status_report_interval_ms {
            return;
        }
        self.last_status_warn.store(now, Ordering::Release);
        let pair = &self.pairs[i];
        warn!(
            maker = pair.maker.market.name(),
            taker = pair.taker.market.name(),
            maker_status = ?pair.maker.market.network_status(),
            taker_status = ?pair.taker.market.network_status(),
            "venues not ready, skipping pair"
        );
    }

    fn log_conversion_rates(&self, i: usize, now: TimestampMs) {
        let state = &self.states[i];
        let last = state.last_conversion_log.load(Ordering::Acquire);
        if last != 0 && now < last + CONVERSION_LOG_INTERVAL_MS {
            return;
        }
        state.last_conversion_log.store(now.max(1), Ordering::Release);
        let pair = &self.pairs[i];
        let (quote_rate, base_rate) = self.conversion_rates(i);
        info!(
            maker = %pair.maker.pair, taker = %pair.taker.pair,
            quote_rate = ?quote_rate, base_rate = ?base_rate,
            "conversion rates"
        );
    }

    // --- event handling & hedging ---

    fn handle_market_event(&self, event: &MarketEvent) {
        let order_id = event.order_id().to_string();
        let Some((_, pair_id)) = self.tracker.lookup(&order_id) else {
            return;
        };
        if pair_id >= self.states.len() {
            return;
        }
        let state = &self.states[pair_id];

        match event {
            MarketEvent::OrderFilled(fill) => {
                let is_maker_order = state
                    .maker_orders
                    .lock()
                    .expect("maker orders lock")
                    .contains_key(&order_id);
                if is_maker_order {
                    self.on_maker_fill(pair_id, fill.clone());
                }
            }
            MarketEvent::BuyOrderCompleted(done) | MarketEvent::SellOrderCompleted(done) => {
                state
                    .maker_orders
                    .lock()
                    .expect("maker orders lock")
                    .remove(&order_id);
                state
                    .taker_orders
                    .lock()
                    .expect("taker orders lock")
                    .remove(&order_id);
                self.tracker.stop_tracking(&order_id, done.ts);
            }
            MarketEvent::OrderCancelled(cancelled) => {
                state
                    .maker_orders
                    .lock()
                    .expect("maker orders lock")
                    .remove(&order_id);
                state
                    .taker_orders
                    .lock()
                    .expect("taker orders lock")
                    .remove(&order_id);
                self.tracker.stop_tracking(&order_id, cancelled.ts);
            }
            MarketEvent::OrderFailure(failure) => {
                warn!(order_id = %order_id, "order failed, removing from tracking");
                state
                    .maker_orders
                    .lock()
                    .expect("maker orders lock")
                    .remove(&order_id);
                state
                    .taker_orders
                    .lock()
                    .expect("taker orders lock")
                    .remove(&order_id);
                self.tracker.stop_tracking(&order_id, failure.ts);
            }
            MarketEvent::BuyOrderCreated(_) | MarketEvent::SellOrderCreated(_) => {}
        }
    }

    fn on_maker_fill(&self, pair_id: usize, fill: OrderFilled) {
        let state = &self.states[pair_id];
        debug!(
            order_id = %fill.order_id, side = %fill.trade_type,
            price = %fill.price, amount = %fill.amount, "maker fill, hedging"
        );
        {
            let mut orders = state.maker_orders.lock().expect("maker orders lock");
            if let Some(active) = orders.get_mut(&fill.order_id) {
                active.quantity -= fill.amount;
                if active.quantity <= Decimal::ZERO {
                    orders.remove(&fill.order_id);
                }
            }
        }
        match fill.trade_type {
            Side::Buy => state
                .pending_buy
                .lock()
                .expect("pending lock")
                .push(fill),
            Side::Sell => state
                .pending_sell
                .lock()
                .expect("pending lock")
                .push(fill),
        }
        self.hedge(pair_id);
    }

    /// Hedge accumulated maker fills with taker orders.
    ///
    /// A bucket that cannot be hedged yet (size quantizes to zero, book too
    /// thin, placement rejected) is left intact and retried on the next fill
    /// or tick.
    pub(super) fn hedge(&self, pair_id: usize) {
        self.hedge_side(pair_id, Side::Buy);
        self.hedge_side(pair_id, Side::Sell);
    }

    fn hedge_side(&self, pair_id: usize, maker_side: Side) {
        let pair = &self.pairs[pair_id];
        let state = &self.states[pair_id];
        let taker = &pair.taker;

        let pending_bucket = match maker_side {
            Side::Buy => &state.pending_buy,
            Side::Sell => &state.pending_sell,
        };
        let pending_quantity: Decimal = {
            let bucket = pending_bucket.lock().expect("pending lock");
            bucket.iter().map(|fill| fill.amount).sum()
        };
        if pending_quantity <= Decimal::ZERO {
            return;
        }

        let Some(book) = taker.order_book() else {
            return;
        };
        // maker buys are hedged by selling on the taker venue and vice versa
        let hedge_side = maker_side.opposite();
        let counter_balance = match hedge_side {
            Side::Sell => taker.available_base_balance(),
            Side::Buy => {
                let Some(ask) = taker.best_ask() else { return };
                if ask.is_zero() {
                    return;
                }
                taker.available_quote_balance() / ask
            }
        } * self.config.order_size_taker_balance_factor;

        let hedge_size = taker
            .market
            .quantize_order_amount(&taker.pair, pending_quantity.min(counter_balance));
        if hedge_size <= Decimal::ZERO {
            trace!(pair = %taker.pair, "hedge size quantizes to zero, accumulating");
            return;
        }

        let Ok(raw_price) = book.price_for_volume(hedge_side.is_buy(), hedge_size) else {
            warn!(pair = %taker.pair, %hedge_size, "taker book too thin to hedge");
            return;
        };
        let buffered = match hedge_side {
            Side::Buy => raw_price * (Decimal::ONE + self.config.slippage_buffer),
            Side::Sell => raw_price * (Decimal::ONE - self.config.slippage_buffer),
        };
        let price = taker.market.quantize_order_price(&taker.pair, buffered);
        if price <= Decimal::ZERO {
            return;
        }

        let placed = match hedge_side {
            Side::Buy => taker.market.buy(
                &taker.pair,
                hedge_size,
                OrderType::Limit,
                Some(price),
                None,
            ),
            Side::Sell => taker.market.sell(
                &taker.pair,
                hedge_size,
                OrderType::Limit,
                Some(price),
                None,
            ),
        };
        match placed {
            Ok(order_id) => {
                debug!(
                    order_id = %order_id, side = %hedge_side, %price, %hedge_size,
                    "placed taker hedge"
                );
                self.tracker
                    .start_tracking(&order_id, taker.market.name(), pair_id);
                state
                    .taker_orders
                    .lock()
                    .expect("taker orders lock")
                    .insert(order_id);
                pending_bucket.lock().expect("pending lock").clear();
            }
            Err(e) => {
                warn!(pair = %taker.pair, error = %e, "taker hedge rejected, accumulating");
            }
        }
    }
}

impl Tickable for XemmStrategy {
    fn tick(&self, now: TimestampMs) {
        if !self.started.load(Ordering::Acquire) {
            return;
        }
        self.tracker.collect_expired(now);
        for i in 0..self.pairs.len() {
            // a bug in one pair must not starve the others or abort the tick
            if catch_unwind(AssertUnwindSafe(|| self.process_pair(i, now))).is_err() {
                error!(pair = i, "process_pair panicked");
            }
        }
    }
}
