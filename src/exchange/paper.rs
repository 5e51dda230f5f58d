//! The paper-trading exchange: the venue contract implemented on top of the
//! replayed book and the open-order store.

use super::error::ExchangeError;
use super::events::{EventEmitter, MarketEvent, MarketEventListener, OrderCreated};
use super::fees::{FeeFn, FeeSchedule};
use super::limit_store::LimitOrderStore;
use crate::book::{BookTradeEvent, BookTradeListener, OrderBook};
use crate::market::Market;
use crate::model::{
    CancellationResult, LimitOrder, NetworkStatus, OrderType, QueuedOrder, Side, TimestampMs,
    TradingPair, new_client_order_id, side_from_order_id,
};
use crate::quant::QuantizationParams;
use crossbeam::atomic::AtomicCell;
use crossbeam::queue::SegQueue;
use dashmap::DashMap;
use rust_decimal::Decimal;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use tracing::{debug, trace, warn};

/// Delay between submitting a market order and simulating its execution.
pub const TRADE_EXECUTION_DELAY_MS: u64 = 5_000;

/// Cooperative delay before `*OrderCreated` events are delivered.
pub const ORDER_CREATED_DELAY_MS: u64 = 10;

/// A deterministic in-process exchange driven by replayed order books.
///
/// The exchange accepts limit and market orders, tracks per-asset balances
/// with on-hold accounting for resting orders, and matches on every clock
/// tick: queued market orders first, then limit orders the public book has
/// crossed, then limit orders swept by recorded trades.
///
/// All methods take `&self`; state lives in concurrent containers so the
/// exchange can be shared between the clock, the feed adapter and the
/// strategy through an `Arc`.
pub struct PaperExchange {
    /// Venue name reported to strategies and fee callbacks
    name: String,

    /// Connectivity reported through the venue contract
    status: AtomicCell<NetworkStatus>,

    /// Replayed public book per configured pair
    books: DashMap<String, Arc<OrderBook>>,

    /// Trading rules per configured pair
    rules: DashMap<String, (TradingPair, QuantizationParams)>,

    /// Open limit orders
    pub(super) orders: LimitOrderStore,

    /// Total balance per asset; holds are derived from open orders
    balances: DashMap<String, Decimal>,

    /// Market orders awaiting the execution delay, FIFO by submission time
    pub(super) queued: Mutex<VecDeque<QueuedOrder>>,

    /// Events scheduled for future delivery, in production order
    pub(super) deferred: Mutex<VecDeque<(TimestampMs, MarketEvent)>>,

    /// Thread-safe inbox of recorded public trades, drained at tick start
    pub(super) trade_inbox: Arc<SegQueue<BookTradeEvent>>,

    /// Strong references keeping the per-book trade subscriptions alive
    book_listeners: Mutex<Vec<BookTradeListener>>,

    /// Fan-out of market events to strategy listeners
    emitter: EventEmitter,

    /// Flat fee callback consulted per fill
    pub(super) fee_fn: FeeFn,

    /// Current simulation time, updated at the start of every tick
    now: AtomicU64,
}

impl PaperExchange {
    /// Create an exchange with the zero-fee schedule.
    pub fn new(name: &str) -> Self {
        Self::with_fee_fn(name, FeeSchedule::zero_fee().as_fee_fn())
    }

    /// Create an exchange with an explicit fee callback.
    pub fn with_fee_fn(name: &str, fee_fn: FeeFn) -> Self {
        Self {
            name: name.to_string(),
            status: AtomicCell::new(NetworkStatus::Connected),
            books: DashMap::new(),
            rules: DashMap::new(),
            orders: LimitOrderStore::new(),
            balances: DashMap::new(),
            queued: Mutex::new(VecDeque::new()),
            deferred: Mutex::new(VecDeque::new()),
            trade_inbox: Arc::new(SegQueue::new()),
            book_listeners: Mutex::new(Vec::new()),
            emitter: EventEmitter::new(),
            fee_fn,
            now: AtomicU64::new(0),
        }
    }

    /// Configure a pair on this venue and return its replayed book.
    ///
    /// The exchange subscribes to the book's trade events so that recorded
    /// public trades can fill resting limit orders on the next tick.
    pub fn add_pair(&self, pair: TradingPair, params: QuantizationParams) -> Arc<OrderBook> {
        let book = Arc::new(OrderBook::new(&pair.symbol));
        let inbox = self.trade_inbox.clone();
        let listener: BookTradeListener = Arc::new(move |event: &BookTradeEvent| {
            inbox.push(event.clone());
        });
        book.add_trade_listener(&listener);
        self.book_listeners
            .lock()
            .expect("book listener lock")
            .push(listener);

        self.books.insert(pair.symbol.clone(), book.clone());
        self.rules.insert(pair.symbol.clone(), (pair, params));
        book
    }

    /// The replayed book for a configured pair.
    #[must_use]
    pub fn book(&self, symbol: &str) -> Option<Arc<OrderBook>> {
        self.books.get(symbol).map(|entry| Arc::clone(entry.value()))
    }

    /// Current simulation time as seen by this venue.
    #[must_use]
    pub fn current_time(&self) -> TimestampMs {
        self.now.load(Ordering::Acquire)
    }

    pub(super) fn set_time(&self, now: TimestampMs) {
        self.now.store(now, Ordering::Release);
    }

    /// Override the reported connectivity, for failure-path tests.
    pub fn set_network_status(&self, status: NetworkStatus) {
        self.status.store(status);
    }

    /// Set the total balance of an asset.
    pub fn set_balance(&self, asset: &str, amount: Decimal) {
        self.balances.insert(asset.to_uppercase(), amount);
    }

    pub(super) fn credit(&self, asset: &str, amount: Decimal) {
        *self.balances.entry(asset.to_string()).or_insert(Decimal::ZERO) += amount;
    }

    pub(super) fn debit(&self, asset: &str, amount: Decimal) {
        *self.balances.entry(asset.to_string()).or_insert(Decimal::ZERO) -= amount;
    }

    /// Every open limit order, in (pair, side, price-priority) order.
    #[must_use]
    pub fn open_orders(&self) -> Vec<LimitOrder> {
        self.orders.all_orders()
    }

    /// Number of open limit orders.
    #[must_use]
    pub fn open_order_count(&self) -> usize {
        self.orders.len()
    }

    pub(super) fn emit(&self, event: MarketEvent) {
        self.emitter.emit(&event);
    }

    /// Schedule an event for delivery on the first tick at or after `at`.
    pub(super) fn defer(&self, at: TimestampMs, event: MarketEvent) {
        self.deferred
            .lock()
            .expect("deferred lock")
            .push_back((at, event));
    }

    fn place(
        &self,
        side: Side,
        pair: &TradingPair,
        amount: Decimal,
        order_type: OrderType,
        price: Option<Decimal>,
        expiration_ms: Option<u64>,
    ) -> Result<String, ExchangeError> {
        let rules = self
            .rules
            .get(&pair.symbol)
            .ok_or_else(|| ExchangeError::UnknownPair(pair.symbol.clone()))?;
        let (pair, params) = rules.value().clone();
        drop(rules);

        let quantity = params.quantize_size(amount);
        if quantity <= Decimal::ZERO {
            return Err(ExchangeError::InvalidOrderSize {
                symbol: pair.symbol.clone(),
                size: amount,
            });
        }

        let order_id = new_client_order_id(side, &pair);
        let now = self.current_time();

        let created_price = match order_type {
            OrderType::Limit => {
                let raw = price.ok_or_else(|| ExchangeError::MissingPrice {
                    order_id: order_id.clone(),
                })?;
                let quantized = params.quantize_price(raw);
                if quantized <= Decimal::ZERO {
                    return Err(ExchangeError::InvalidOrderPrice {
                        symbol: pair.symbol.clone(),
                        price: raw,
                    });
                }
                self.orders.insert(LimitOrder {
                    client_order_id: order_id.clone(),
                    pair: pair.clone(),
                    side,
                    price: quantized,
                    quantity,
                    created_at: now,
                    expiration_ts: expiration_ms.map(|ms| now + ms),
                });
                trace!(
                    exchange = %self.name, order_id = %order_id, %quantized, %quantity,
                    "accepted limit order"
                );
                Some(quantized)
            }
            OrderType::Market => {
                self.queued.lock().expect("queue lock").push_back(QueuedOrder {
                    created_at: now,
                    client_order_id: order_id.clone(),
                    side,
                    pair: pair.clone(),
                    amount: quantity,
                });
                trace!(
                    exchange = %self.name, order_id = %order_id, %quantity,
                    "queued market order"
                );
                None
            }
        };

        let created = OrderCreated {
            ts: now,
            order_id: order_id.clone(),
            symbol: pair.symbol.clone(),
            order_type,
            price: created_price,
            amount: quantity,
        };
        let event = match side {
            Side::Buy => MarketEvent::BuyOrderCreated(created),
            Side::Sell => MarketEvent::SellOrderCreated(created),
        };
        self.defer(now + ORDER_CREATED_DELAY_MS, event);

        Ok(order_id)
    }
}

impl Market for PaperExchange {
    fn name(&self) -> &str {
        &self.name
    }

    fn network_status(&self) -> NetworkStatus {
        self.status.load()
    }

    fn ready(&self) -> bool {
        self.status.load() == NetworkStatus::Connected
            && !self.rules.is_empty()
            && self.books.iter().all(|entry| entry.value().is_populated())
    }

    fn buy(
        &self,
        pair: &TradingPair,
        amount: Decimal,
        order_type: OrderType,
        price: Option<Decimal>,
        expiration_ms: Option<u64>,
    ) -> Result<String, ExchangeError> {
        self.place(Side::Buy, pair, amount, order_type, price, expiration_ms)
    }

    fn sell(
        &self,
        pair: &TradingPair,
        amount: Decimal,
        order_type: OrderType,
        price: Option<Decimal>,
        expiration_ms: Option<u64>,
    ) -> Result<String, ExchangeError> {
        self.place(Side::Sell, pair, amount, order_type, price, expiration_ms)
    }

    fn cancel(&self, _pair: &TradingPair, order_id: &str) {
        if side_from_order_id(order_id).is_none() {
            warn!(exchange = %self.name, order_id, "ignoring cancel for malformed order id");
            return;
        }
        if let Some(order) = self.orders.remove(order_id) {
            debug!(exchange = %self.name, order_id, "cancelling order");
            let now = self.current_time();
            self.defer(
                now,
                MarketEvent::OrderCancelled(super::events::OrderCancelled {
                    ts: now,
                    order_id: order.client_order_id,
                }),
            );
        }
    }

    fn cancel_all(&self, _timeout_ms: u64) -> Vec<CancellationResult> {
        let open = self.orders.all_orders();
        let mut results = Vec::with_capacity(open.len());
        for order in open {
            let pair = order.pair.clone();
            self.cancel(&pair, &order.client_order_id);
            results.push(CancellationResult::new(order.client_order_id, true));
        }
        results
    }

    fn get_price(&self, pair: &TradingPair, is_buy: bool) -> Option<Decimal> {
        self.book(&pair.symbol)?.top_price(is_buy)
    }

    fn order_book(&self, pair: &TradingPair) -> Option<Arc<OrderBook>> {
        self.book(&pair.symbol)
    }

    fn balance(&self, asset: &str) -> Decimal {
        self.balances
            .get(&asset.to_uppercase())
            .map(|entry| *entry.value())
            .unwrap_or(Decimal::ZERO)
    }

    fn available_balance(&self, asset: &str) -> Decimal {
        let asset = asset.to_uppercase();
        self.balance(&asset) - self.orders.hold_for_asset(&asset)
    }

    fn quantize_order_price(&self, pair: &TradingPair, price: Decimal) -> Decimal {
        self.params_for(pair).quantize_price(price)
    }

    fn quantize_order_amount(&self, pair: &TradingPair, amount: Decimal) -> Decimal {
        self.params_for(pair).quantize_size(amount)
    }

    fn order_price_quantum(&self, pair: &TradingPair, price: Decimal) -> Decimal {
        self.params_for(pair).price_quantum(price)
    }

    fn order_size_quantum(&self, pair: &TradingPair, size: Decimal) -> Decimal {
        self.params_for(pair).size_quantum(size)
    }

    fn add_listener(&self, listener: &MarketEventListener) {
        self.emitter.add_listener(listener);
    }

    fn remove_listener(&self, listener: &MarketEventListener) {
        self.emitter.remove_listener(listener);
    }
}

impl PaperExchange {
    fn params_for(&self, pair: &TradingPair) -> QuantizationParams {
        self.rules
            .get(&pair.symbol)
            .map(|entry| entry.value().1)
            .unwrap_or_default()
    }
}
